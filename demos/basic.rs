use json_collections::{EntityStore, Record};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), json_collections::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::temp_dir().join("json_collections_example_basic.json");
    let _ = std::fs::remove_file(&path);
    let store = EntityStore::<Record>::open(&path)?;

    // create / get
    let apples = store.create(json!({"name": "apples", "count": 3})).await?;
    store.create(json!({"name": "bananas", "count": 5})).await?;
    println!("apples  = {:?}", store.get_by_id(&apples.id).await?);

    // shallow update; id and createdAt can't be changed
    let apples = store
        .update(&apples.id, json!({"id": "hijack", "colour": "red"}))
        .await?;
    println!("apples after update = {apples:?}");

    // counters accumulate instead of overwriting
    let apples = store
        .increment_counters(&apples.id, &[("count", 2.into())])
        .await?;
    println!("apples count = {:?}", apples.get("count"));

    // listing and deleting
    println!("len    = {}", store.len().await?);
    println!("gone?  = {}", store.delete(&apples.id).await?);
    println!("gone again? = {}", store.delete(&apples.id).await?);

    let _ = std::fs::remove_file(&path);
    Ok(())
}
