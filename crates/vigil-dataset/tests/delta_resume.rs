//! Resuming a delta file at a saved offset.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use vigil_dataset::{BlobStore, DeltaFileDecoder, DeltaOp, DeltaRecord};

const RECORDS: [&str; 3] = [
    r#"{"op":"ADD","entity":{"id":"Q1","schema":"Person","datasets":["sanctions"]}}"#,
    r#"{"op":"MOD","entity":{"id":"Q2","schema":"Company","datasets":["sanctions"],"properties":{"name":["Acme"]}}}"#,
    r#"{"op":"DEL","entity":{"id":"Q3","schema":"Person","datasets":["sanctions"]}}"#,
];

async fn stored() -> BlobStore {
    let store = BlobStore::in_memory();
    store
        .put("updates/sanctions/v2.jsonl", format!("{}\n", RECORDS.join("\n")))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn resume_after_first_record() {
    let store = stored().await;

    let mut first = DeltaFileDecoder::new(store.open("updates/sanctions/v2.jsonl", 0).await.unwrap(), 0);
    let record: DeltaRecord = first.next_record().await.unwrap().unwrap();
    assert_eq!((record.op, record.entity.id.as_str()), (DeltaOp::Add, "Q1"));
    let saved = first.offset();
    assert_eq!(saved, RECORDS[0].len() as u64);
    drop(first);

    let stream = store.open("updates/sanctions/v2.jsonl", saved).await.unwrap();
    let mut resumed = DeltaFileDecoder::new(stream, saved);
    let mut seen = Vec::new();
    let mut offsets = Vec::new();
    while let Some(record) = resumed.next_record::<DeltaRecord>().await.unwrap() {
        seen.push((record.op, record.entity.id));
        offsets.push(resumed.offset());
    }

    assert_eq!(
        seen,
        vec![(DeltaOp::Mod, "Q2".to_string()), (DeltaOp::Del, "Q3".to_string())]
    );
    let expected_second = (RECORDS[0].len() + 1 + RECORDS[1].len()) as u64;
    let expected_third = expected_second + 1 + RECORDS[2].len() as u64;
    assert_eq!(offsets, vec![expected_second, expected_third]);
}

#[tokio::test]
async fn resume_at_end_yields_nothing() {
    let store = stored().await;
    let size = store.size("updates/sanctions/v2.jsonl").await.unwrap();
    let mut decoder =
        DeltaFileDecoder::new(store.open("updates/sanctions/v2.jsonl", size).await.unwrap(), size);
    assert_eq!(decoder.next_record::<Value>().await.unwrap(), None);
}

#[tokio::test]
async fn every_offset_boundary_resumes_cleanly() {
    let store = stored().await;
    let path = "updates/sanctions/v2.jsonl";

    let mut decoder = DeltaFileDecoder::new(store.open(path, 0).await.unwrap(), 0);
    let mut boundaries = vec![0];
    while decoder.next_record::<Value>().await.unwrap().is_some() {
        boundaries.push(decoder.offset());
    }

    for (index, offset) in boundaries.iter().copied().enumerate() {
        let mut resumed = DeltaFileDecoder::new(store.open(path, offset).await.unwrap(), offset);
        let mut rest = Vec::new();
        while let Some(v) = resumed.next_record::<Value>().await.unwrap() {
            rest.push(v["entity"]["id"].clone());
        }
        let expected: Vec<Value> = ["Q1", "Q2", "Q3"][index.min(3)..]
            .iter()
            .map(|id| json!(id))
            .collect();
        assert_eq!(rest, expected, "resuming at {offset}");
    }
}
