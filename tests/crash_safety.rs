use json_collections::{
    CollectionRegistry, Document, Durability, EntityStore, Error, FileBackend, JsonSerializer,
    Record, Serializer,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn scratch() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn temp_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().ends_with(".tmp"))
        .collect()
}

fn on_disk(path: &std::path::Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn corrupt_copies(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().contains(".corrupt-"))
        .collect()
}

// ---- codec ------------------------------------------------------------------

#[tokio::test]
async fn round_trip_keeps_unknown_fields() {
    let dir = scratch();
    let store = EntityStore::<json_collections::Car>::open(dir.path().join("cars.json")).unwrap();
    let car = store
        .create(json!({"make": "Volvo", "licensePlate": "AB-123", "notes": {"dent": true}}))
        .await
        .unwrap();
    assert_eq!(car.extra.get("licensePlate"), Some(&json!("AB-123")));

    let ser = JsonSerializer::pretty();
    let raw = std::fs::read(store.path()).unwrap();
    let doc: Document<json_collections::Car> = ser.decode(&raw).unwrap();
    assert_eq!(ser.decode::<json_collections::Car>(&ser.encode(&doc).unwrap()).unwrap(), doc);
    assert_eq!(doc.items[0].extra.get("notes"), Some(&json!({"dent": true})));
    assert!(doc.last_updated.is_some());
}

#[test]
fn encoding_is_deterministic() {
    let ser = JsonSerializer::pretty();
    let doc: Document<Value> = Document {
        items: vec![json!({"z": 1, "a": 2})],
        last_updated: None,
    };
    assert_eq!(ser.encode(&doc).unwrap(), ser.encode(&doc.clone()).unwrap());
    let text = String::from_utf8(ser.encode(&doc).unwrap()).unwrap();
    assert!(text.find("\"a\"").unwrap() < text.find("\"z\"").unwrap());
}

// ---- bootstrap --------------------------------------------------------------

#[tokio::test]
async fn ensure_exists_is_idempotent() {
    let dir = scratch();
    let path = dir.path().join("nested").join("deeper").join("admins.json");
    let backend = FileBackend::new(&path);

    backend.ensure_exists().await.unwrap();
    let first = std::fs::read(&path).unwrap();
    for _ in 0..5 {
        backend.ensure_exists().await.unwrap();
    }
    assert_eq!(std::fs::read(&path).unwrap(), first);

    let doc: Document<Value> = backend.load().await.unwrap();
    assert_eq!(doc, Document::empty());
    assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
}

#[tokio::test]
async fn ensure_exists_never_overwrites() {
    let dir = scratch();
    let path = dir.path().join("users.json");
    let store = EntityStore::<Record>::open(&path).unwrap();
    store.create(json!({"name": "Ann"})).await.unwrap();
    let before = std::fs::read(&path).unwrap();

    FileBackend::new(&path).ensure_exists().await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

// ---- interrupted writes -----------------------------------------------------

#[tokio::test]
async fn leftover_temp_file_is_ignored() {
    let dir = scratch();
    let path = dir.path().join("cars.json");
    let store = EntityStore::<Record>::open(&path).unwrap();
    let rec = store.create(json!({"make": "Fiat"})).await.unwrap();
    let before = std::fs::read(&path).unwrap();

    // What a crash between write and rename leaves behind.
    let stray = dir.path().join(".cars.json.deadbeef.tmp");
    std::fs::write(&stray, b"{\"items\": [{\"id\": \"half").unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let listed = store.list().await.unwrap();
    assert_eq!(listed, vec![rec.clone()]);
    assert_eq!(store.corrupt_recoveries(), 0);

    // The next successful write is unaffected by the leftover.
    store.update(&rec.id, json!({"make": "Lancia"})).await.unwrap();
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_rename_reports_io_and_cleans_up() {
    let dir = scratch();
    // A non-empty directory can't be renamed over, so the write fails after
    // the temp file is fully written.
    let path = dir.path().join("cars.json");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("keep"), b"still here").unwrap();

    let backend = FileBackend::with_options(&path, JsonSerializer::pretty(), Durability::Buffered);
    let mut doc: Document<Value> = Document {
        items: vec![json!({"id": "a"})],
        last_updated: None,
    };
    let err = backend.store(&mut doc).await.unwrap_err();

    assert!(err.is_io(), "{err}");
    assert!(temp_files(dir.path()).is_empty());
    assert_eq!(std::fs::read(path.join("keep")).unwrap(), b"still here");
}

#[tokio::test]
async fn successful_writes_leave_no_temp_files() {
    let dir = scratch();
    let store = EntityStore::<Record>::builder(dir.path().join("cars.json"))
        .durability(Durability::Buffered)
        .build()
        .unwrap();
    for i in 0..5 {
        store.create(json!({"n": i})).await.unwrap();
    }
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["cars.json".to_string()]);
}

// ---- corrupt files ----------------------------------------------------------

#[tokio::test]
async fn corrupt_file_recovers_to_empty() {
    let dir = scratch();
    let path = dir.path().join("cars.json");
    std::fs::write(&path, b"this is not json at all").unwrap();

    let store = EntityStore::<Record>::open(&path).unwrap();
    assert_eq!(store.list().await.unwrap(), vec![]);
    assert_eq!(store.corrupt_recoveries(), 1);

    let quarantined = corrupt_copies(dir.path());
    assert_eq!(quarantined.len(), 1);
    assert_eq!(std::fs::read(&quarantined[0]).unwrap(), b"this is not json at all");

    // The replacement is a clean empty document, so later loads are quiet.
    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(store.corrupt_recoveries(), 1);
    store.create(json!({"make": "Seat"})).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_file_is_treated_as_no_data() {
    let dir = scratch();
    let path = dir.path().join("cruises.json");
    std::fs::write(&path, b"  \n").unwrap();

    let store = EntityStore::<Record>::open(&path).unwrap();
    assert!(store.list().await.unwrap().is_empty());
    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(store.corrupt_recoveries(), 0);
    assert!(corrupt_copies(dir.path()).is_empty());

    // Rewritten as a proper empty document on the first load.
    let doc: Document<Value> = JsonSerializer::pretty()
        .decode(&std::fs::read(&path).unwrap())
        .unwrap();
    assert_eq!(doc, Document::empty());

    store.create(json!({"name": "Fjords"})).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 1);
}

// ---- records that don't fit the typed model ----------------------------------

#[tokio::test]
async fn odd_record_does_not_cost_the_collection() {
    let dir = scratch();
    let registry = CollectionRegistry::standard(dir.path());
    let path = registry.path("cars").unwrap();
    let stamp = "2024-01-01T00:00:00Z";
    let seeded = json!({
        "items": [
            {"id": "a", "make": "Kia", "seats": 5, "createdAt": stamp, "updatedAt": stamp},
            {"id": "b", "make": "Fiat", "seats": "5", "createdAt": stamp, "updatedAt": stamp},
            {"id": "c", "make": "Opel", "createdAt": "a while ago", "updatedAt": stamp}
        ],
        "lastUpdated": null
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&seeded).unwrap()).unwrap();

    let cars = registry.cars().unwrap();
    let listed = cars.list().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(listed[0].seats, Some(5));
    assert_eq!(listed[1].seats, None);
    assert_eq!(listed[1].extra.get("seats"), Some(&json!("5")));
    assert!(matches!(cars.get_by_id("c").await, Err(Error::InvalidFields(_))));
    assert_eq!(cars.corrupt_recoveries(), 0);
    assert!(corrupt_copies(dir.path()).is_empty());

    // A write elsewhere keeps every record, including the unreadable one.
    cars.record_rental("a", 40.0).await.unwrap();
    let disk = on_disk(&path);
    assert_eq!(disk["items"].as_array().unwrap().len(), 3);
    assert_eq!(disk["items"][1]["seats"], json!("5"));
    assert_eq!(disk["items"][2]["createdAt"], json!("a while ago"));
}

#[tokio::test]
async fn untouched_records_are_written_back_unchanged() {
    let dir = scratch();
    let registry = CollectionRegistry::standard(dir.path());
    let path = registry.path("cars").unwrap();

    // Seed through the untyped view so no car defaults are applied.
    let raw = registry.open::<Record>("cars").unwrap();
    let a = raw.create(json!({"make": "Kia"})).await.unwrap();
    let b = raw.create(json!({"make": "Fiat"})).await.unwrap();
    let before = serde_json::to_vec(&on_disk(&path)["items"][0]).unwrap();

    let cars = registry.cars().unwrap();
    let updated = cars.update(&b.id, json!({"make": "Audi"})).await.unwrap();
    assert_eq!(updated.make.as_deref(), Some("Audi"));
    assert_eq!(updated.year, None);

    let disk = on_disk(&path);
    assert_eq!(disk["items"][0]["id"], json!(a.id));
    assert_eq!(serde_json::to_vec(&disk["items"][0]).unwrap(), before);
    for key in ["year", "available", "seats", "transmission", "category"] {
        assert!(disk["items"][0].get(key).is_none(), "{key} was invented");
        assert!(disk["items"][1].get(key).is_none(), "{key} was invented");
    }
}

#[tokio::test]
async fn decode_error_is_corrupt_document() {
    let err = JsonSerializer::pretty()
        .decode::<Record>(b"{\"items\": [{\"id\": 1}]}")
        .unwrap_err();
    assert!(matches!(err, Error::CorruptDocument(_)));
}

// ---- i/o failures -----------------------------------------------------------

#[tokio::test]
async fn io_failure_is_never_not_found() {
    let dir = scratch();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let store = EntityStore::<Record>::open(blocker.join("cars.json")).unwrap();

    let err = store.list().await.unwrap_err();
    assert!(err.is_io(), "{err}");
    assert_eq!(err.http_status(), 500);

    let err = store.get_by_id("anything").await.unwrap_err();
    assert!(err.is_io());
    assert!(!err.is_not_found());

    assert!(store.delete("anything").await.unwrap_err().is_io());
    assert!(store.create(json!({})).await.unwrap_err().is_io());
}
