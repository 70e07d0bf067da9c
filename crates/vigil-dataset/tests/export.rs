//! Full and delta exports against in-memory databases and blob store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use vigil_config::{GeneralConfig, StorageConfig};
use vigil_core::entities::{DatasetFile, DeltaTrack, IngestedObject, Table};
use vigil_core::enums::{DatasetFileType, DeltaOperation};
use vigil_core::value::FieldValue;
use vigil_dataset::{
    BlobStore, DatasetBuilder, DatasetError, DeltaOp, DeltaRecord, ExportedCatalog, FtmEntity,
};
use vigil_db::VigilDb;
use vigil_db::repos::{data_model, datasets, delta_tracks, ingested};

const ORG: &str = "org-1";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
}

async fn setup() -> (Arc<VigilDb>, BlobStore, DatasetBuilder) {
    let db = Arc::new(VigilDb::open_in_memory().await.unwrap());
    {
        let conn = db.control().await;
        let table = Table::new(
            "customers",
            Some("Person"),
            &[("full_name", Some("name")), ("country", Some("nationality")), ("note", None)],
        );
        data_model::upsert_table(&conn, ORG, &table).await.unwrap();
    }
    let store = BlobStore::in_memory();
    // A page size of one walks every page boundary.
    let builder = DatasetBuilder::new(Arc::clone(&db), store.clone(), 1);
    (db, store, builder)
}

async fn ingest(db: &VigilDb, internal_id: &str, object_id: &str, name: &str, country: &str) {
    let object = IngestedObject {
        internal_id: internal_id.into(),
        object_type: "customers".into(),
        object_id: object_id.into(),
        valid_from: now(),
        data: [
            ("full_name".to_string(), FieldValue::from(name)),
            ("country".to_string(), FieldValue::from(country)),
            ("note".to_string(), FieldValue::Null),
        ]
        .into_iter()
        .collect(),
    };
    let conn = db.org(ORG).await.unwrap();
    ingested::insert_version(&conn, &object).await.unwrap();
}

async fn track(
    db: &VigilDb,
    entity_id: &str,
    object_id: &str,
    internal_id: Option<&str>,
    operation: DeltaOperation,
) {
    let track = DeltaTrack {
        id: vigil_core::new_id(),
        entity_id: entity_id.into(),
        object_type: "customers".into(),
        object_id: object_id.into(),
        object_internal_id: internal_id.map(String::from),
        operation,
        dataset_file_id: None,
        created_at: now(),
    };
    let conn = db.org(ORG).await.unwrap();
    delta_tracks::insert(&conn, &track).await.unwrap();
}

async fn lines<T: serde::de::DeserializeOwned>(store: &BlobStore, file: &DatasetFile) -> Vec<T> {
    let body = store.read(&file.file_path).await.unwrap();
    body.split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect()
}

#[tokio::test]
async fn nothing_tracked_builds_nothing() {
    let (_db, _store, builder) = setup().await;
    assert!(builder.build_next(ORG, now()).await.unwrap().is_none());
}

#[tokio::test]
async fn full_then_delta() {
    let (db, store, builder) = setup().await;

    ingest(&db, "i1", "c1", "Ada Lovelace", "United Kingdom").await;
    ingest(&db, "i2", "c2", "Alan Turing", "GBR").await;
    track(&db, "ent-1", "c1", Some("i1"), DeltaOperation::Add).await;
    track(&db, "ent-2", "c2", Some("i2"), DeltaOperation::Add).await;

    let full = builder.build_next(ORG, now()).await.unwrap().unwrap();
    assert_eq!(full.file_type, DatasetFileType::Full);
    assert_eq!(full.version, "20260314092653-001");
    assert_eq!(full.file_path, "datasets/org-1/full/20260314092653-001.jsonl");
    assert_eq!(full.item_count, 2);

    let entities: Vec<FtmEntity> = lines(&store, &full).await;
    let summary: Vec<(&str, &str, Vec<String>)> = entities
        .iter()
        .map(|e| {
            (
                e.id.as_str(),
                e.schema.as_str(),
                e.properties["nationality"]
                    .iter()
                    .map(|v| v.as_str().unwrap().to_string())
                    .collect(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("ent-1", "Person", vec!["gb".to_string()]),
            ("ent-2", "Person", vec!["gb".to_string()]),
        ]
    );
    assert!(entities.iter().all(|e| e.datasets == vec![ORG.to_string()]));
    assert!(entities.iter().all(|e| e.properties.contains_key("notes")));

    {
        let conn = db.org(ORG).await.unwrap();
        assert_eq!(delta_tracks::count_unexported(&conn).await.unwrap(), 0);
    }
    assert!(builder.build_next(ORG, now()).await.unwrap().is_none());

    // c1 changes, c2 goes away, c3 comes and goes before ever being exported.
    ingest(&db, "i1b", "c1", "Ada King", "UK").await;
    track(&db, "ent-1", "c1", Some("i1b"), DeltaOperation::Update).await;
    track(&db, "ent-2", "c2", None, DeltaOperation::Delete).await;
    ingest(&db, "i3", "c3", "Charles Babbage", "gb").await;
    track(&db, "ent-3", "c3", Some("i3"), DeltaOperation::Add).await;
    track(&db, "ent-3", "c3", None, DeltaOperation::Delete).await;

    let delta = builder.build_next(ORG, now()).await.unwrap().unwrap();
    assert_eq!(delta.file_type, DatasetFileType::Delta);
    assert_eq!(delta.version, "20260314092653-002");
    assert_eq!(delta.item_count, 2);

    let records: Vec<DeltaRecord> = lines(&store, &delta).await;
    let ops: Vec<(DeltaOp, &str)> = records.iter().map(|r| (r.op, r.entity.id.as_str())).collect();
    assert_eq!(ops, vec![(DeltaOp::Mod, "ent-1"), (DeltaOp::Del, "ent-2")]);
    assert_eq!(
        records[0].entity.properties["name"],
        vec![serde_json::json!("Ada King")]
    );
    assert_eq!(records[1].entity.schema, "Person");

    // The catalog advertises the full file and the newest version.
    let storage = StorageConfig {
        public_url: "https://files.example.com".into(),
        ..StorageConfig::default()
    };
    let catalog = ExportedCatalog::new(Arc::clone(&db), storage, GeneralConfig::default(), 30);
    let document = catalog.document().await.unwrap();
    assert_eq!(document.current, vec!["marble_org_1".to_string()]);
    let entry = &document.datasets[0];
    assert_eq!(entry.version, delta.version);
    assert_eq!(
        entry.entities_url,
        "https://files.example.com/datasets/org-1/full/20260314092653-001.jsonl"
    );
    assert_eq!(entry.delta_url, "https://files.example.com/datasets/org-1/deltas.json");
    assert_eq!(entry.tags, vec!["internal.marble".to_string()]);

    let published = catalog.publish_delta_list(&store, ORG).await.unwrap();
    assert_eq!(published.versions.len(), 1);
    let stored: serde_json::Value =
        serde_json::from_slice(&store.read("datasets/org-1/deltas.json").await.unwrap()).unwrap();
    assert_eq!(
        stored["versions"]["20260314092653-002"],
        "https://files.example.com/datasets/org-1/delta/20260314092653-002.jsonl"
    );
}

#[tokio::test]
async fn failed_marking_records_no_file() {
    let (db, store, builder) = setup().await;
    ingest(&db, "i1", "c1", "Ada Lovelace", "gb").await;
    track(&db, "ent-1", "c1", Some("i1"), DeltaOperation::Add).await;
    let full = builder.build_next(ORG, now()).await.unwrap().unwrap();

    ingest(&db, "i1b", "c1", "Ada King", "gb").await;
    track(&db, "ent-1", "c1", Some("i1b"), DeltaOperation::Update).await;
    ingest(&db, "i2", "c2", "Alan Turing", "gb").await;
    track(&db, "ent-2", "c2", Some("i2"), DeltaOperation::Add).await;

    {
        let conn = db.org(ORG).await.unwrap();
        conn.execute(
            "CREATE TRIGGER hold_tracks BEFORE UPDATE ON delta_tracks
             BEGIN SELECT RAISE(ABORT, 'delta tracks are read only'); END",
            (),
        )
        .await
        .unwrap();
    }
    builder.build_next(ORG, now()).await.unwrap_err();

    {
        let conn = db.control().await;
        let latest = datasets::latest_file(&conn, ORG).await.unwrap().unwrap();
        assert_eq!(latest.id, full.id);
    }
    {
        let conn = db.org(ORG).await.unwrap();
        assert_eq!(delta_tracks::count_unexported(&conn).await.unwrap(), 2);
        conn.execute("DROP TRIGGER hold_tracks", ()).await.unwrap();
    }

    let delta = builder.build_next(ORG, now()).await.unwrap().unwrap();
    assert_eq!(delta.version, "20260314092653-002");
    let records: Vec<DeltaRecord> = lines(&store, &delta).await;
    let ops: Vec<(DeltaOp, &str)> = records.iter().map(|r| (r.op, r.entity.id.as_str())).collect();
    assert_eq!(ops, vec![(DeltaOp::Mod, "ent-1"), (DeltaOp::Add, "ent-2")]);
}

#[tokio::test]
async fn missing_ingested_row_is_fatal() {
    let (db, store, builder) = setup().await;
    ingest(&db, "i1", "c1", "Ada Lovelace", "gb").await;
    track(&db, "ent-1", "c1", Some("i1"), DeltaOperation::Add).await;
    track(&db, "ent-2", "c2", Some("gone"), DeltaOperation::Add).await;

    let err = builder.build_next(ORG, now()).await.unwrap_err();
    assert!(
        matches!(err, DatasetError::MissingObjects { expected: 1, found: 0, .. }),
        "{err:?}"
    );
    assert!(store.read("datasets/org-1/full/20260314092653-001.jsonl").await.is_err());

    let conn = db.org(ORG).await.unwrap();
    assert_eq!(delta_tracks::count_unexported(&conn).await.unwrap(), 2);
}

#[tokio::test]
async fn unmapped_table_is_not_found() {
    let (db, _store, builder) = setup().await;
    {
        let conn = db.org(ORG).await.unwrap();
        let object = IngestedObject {
            internal_id: "v1".into(),
            object_type: "vessels".into(),
            object_id: "imo-1".into(),
            valid_from: now(),
            data: std::collections::BTreeMap::new(),
        };
        ingested::insert_version(&conn, &object).await.unwrap();
        let track = DeltaTrack {
            id: vigil_core::new_id(),
            entity_id: "ent-v".into(),
            object_type: "vessels".into(),
            object_id: "imo-1".into(),
            object_internal_id: Some("v1".into()),
            operation: DeltaOperation::Add,
            dataset_file_id: None,
            created_at: now(),
        };
        delta_tracks::insert(&conn, &track).await.unwrap();
    }
    let err = builder.build_next(ORG, now()).await.unwrap_err();
    assert_eq!(err.kind(), vigil_core::errors::ErrorKind::NotFound);
}
