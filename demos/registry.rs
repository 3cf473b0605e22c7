use json_collections::CollectionRegistry;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), json_collections::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let dir = std::env::temp_dir().join("json_collections_example_registry");
    let registry = CollectionRegistry::standard(&dir);

    let cars = registry.cars()?;
    let car = cars.create(json!({"make": "Toyota", "model": "Camry"})).await?;
    println!(
        "new car: {} {} ({:?}), {:?} seats",
        car.make.as_deref().unwrap_or("?"),
        car.model.as_deref().unwrap_or("?"),
        car.year,
        car.seats
    );

    // two bookings at once; both land
    let (a, b) = tokio::join!(
        cars.record_rental(&car.id, 120.0),
        cars.record_rental(&car.id, 80.0)
    );
    a?;
    b?;
    let car = cars.get_by_id(&car.id).await?;
    println!(
        "rentals = {}, revenue = {}",
        car.total_rentals.unwrap_or(0),
        car.total_revenue.unwrap_or(0.0)
    );

    let admin = registry
        .admins()?
        .create(json!({"username": "ops", "email": "ops@example.com"}))
        .await?;
    println!(
        "admin {} has role {}",
        admin.username.as_deref().unwrap_or("?"),
        admin.role.as_deref().unwrap_or("?")
    );

    for name in registry.names() {
        println!("{name:8} -> {}", registry.path(name)?.display());
    }

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
