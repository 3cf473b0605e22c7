use json_collections::{Defaults, Durability, EntityStore, Record};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join("json_collections_example_builder.json");
    let _ = std::fs::remove_file(&path);

    // named collection, a default table, and rename-only writes
    let store = EntityStore::<Record>::builder(&path)
        .name("fleet")
        .defaults(Defaults::new().with("seats", 5).with("available", true))
        .pretty(true)
        .durability(Durability::Buffered)
        .build()?;

    store.create(json!({"make": "Volvo", "model": "XC40"})).await?;
    store
        .create(json!({"make": "Fiat", "model": "500", "seats": 4, "available": false}))
        .await?;

    // the file on disk is indented and diffable
    let contents = std::fs::read_to_string(store.path())?;
    println!("On-disk JSON:\n{contents}");

    println!("\nDebug output: {store:?}");

    let _ = std::fs::remove_file(&path);
    Ok(())
}
