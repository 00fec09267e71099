use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use uni_scraper::domain::Gender;
use uni_scraper::error::{PipelineError, Result};
use uni_scraper::lookups::LookupTables;
use uni_scraper::merge::RemoteOutcome;
use uni_scraper::pipeline::IngestService;
use uni_scraper::remote::{RemoteRow, RemoteSink};
use uni_scraper::staging::{BatchStatus, StagingStore};
use uni_scraper::storage::{InMemoryMergeStore, MergeStore};

const LISTING: &str = "\
(241498191) Abel Rapha de Jesus Macedo (***)   Matematica - Licenciatura (N)
(241498202) Maria Clara Souza   Pedagogia (N)

(241498213) Zyx Desconhecido   Curso Fantasma (X)
linha invalida sem matricula
";

struct RecordingSink {
    rows: Mutex<Vec<RemoteRow>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteSink for RecordingSink {
    async fn upsert(&self, rows: &[RemoteRow]) -> Result<usize> {
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len())
    }
}

fn tables() -> LookupTables {
    let mut gender = HashMap::new();
    gender.insert("ABEL".to_string(), Gender::Male);
    gender.insert("MARIA".to_string(), Gender::Female);

    let mut course_units = HashMap::new();
    course_units.insert(
        "Matematica - Licenciatura (N)".to_string(),
        vec!["IMECC".to_string(), "IFGW".to_string()],
    );
    course_units.insert("Pedagogia (N)".to_string(), vec!["FE".to_string()]);

    let mut unit_city = HashMap::new();
    unit_city.insert("IMECC".to_string(), "Campinas".to_string());
    unit_city.insert("IFGW".to_string(), "Limeira".to_string());
    unit_city.insert("FE".to_string(), "Campinas".to_string());

    LookupTables::from_maps(gender, course_units, unit_city)
}

fn service(
    store: Arc<dyn MergeStore>,
    remote: Option<Arc<dyn RemoteSink>>,
) -> IngestService {
    IngestService::new(
        tables(),
        StagingStore::new(chrono::Duration::minutes(60)),
        store,
        remote,
    )
}

#[tokio::test]
async fn end_to_end_confirm_populates_all_views() {
    let store = Arc::new(InMemoryMergeStore::new());
    let sink = Arc::new(RecordingSink::new());
    let service = service(store.clone(), Some(sink.clone()));

    let outcome = service.parse_batch(LISTING, 1, "unicamp");
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.failures.len(), 1);

    // The first classified record matches the documented line semantics.
    let abel = &outcome.preview[0];
    assert_eq!(abel.enrollment_id, "241498191");
    assert_eq!(abel.raw_name, "Abel Rapha de Jesus Macedo");
    assert_eq!(abel.quota_marker.as_deref(), Some("(***)"));
    assert_eq!(abel.course_normalized, "Matematica");
    assert_eq!(abel.gender, Gender::Male);
    // First unit in the curated list wins the tie.
    assert_eq!(abel.unit.as_deref(), Some("IMECC"));
    assert_eq!(abel.city.as_deref(), Some("Campinas"));
    assert!(!abel.reassigned);

    let confirmed = service.confirm(outcome.batch_id).await.unwrap();
    assert_eq!(confirmed.merge.inserted, 2);

    // Local views: both resolved records accumulate under Campinas, the
    // unresolved one only reaches its snapshot group and the dump.
    assert_eq!(store.load_cumulative("Campinas").await.unwrap().len(), 2);
    assert_eq!(store.load_call_snapshot("Campinas", 1).await.unwrap().len(), 2);
    assert_eq!(
        store.load_call_snapshot("indeterminado", 1).await.unwrap().len(),
        1
    );
    assert!(store.load_cumulative("indeterminado").await.unwrap().is_empty());
    assert_eq!(store.load_call_dump(1).await.unwrap().len(), 3);

    // Remote mirror: the record without a resolved city was rejected.
    match confirmed.merge.remote {
        RemoteOutcome::Uploaded { sent, skipped } => {
            assert_eq!(sent, 2);
            assert_eq!(skipped, 1);
        }
        other => panic!("unexpected remote outcome: {:?}", other),
    }
    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.cidade == "Campinas"));

    let status = service.status(outcome.batch_id).unwrap();
    assert_eq!(status.status, BatchStatus::Confirmed);
    assert_eq!(status.total, 3);
}

#[tokio::test]
async fn confirming_twice_is_a_conflict() {
    let store = Arc::new(InMemoryMergeStore::new());
    let service = service(store, None);

    let outcome = service.parse_batch(LISTING, 1, "unicamp");
    service.confirm(outcome.batch_id).await.unwrap();

    let err = service.confirm(outcome.batch_id).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::BatchConflict { status: "confirmed", .. }
    ));
}

#[tokio::test]
async fn reingesting_the_same_listing_changes_nothing() {
    let store = Arc::new(InMemoryMergeStore::new());
    let service = service(store.clone(), None);

    let first = service.parse_batch(LISTING, 1, "unicamp");
    let confirmed = service.confirm(first.batch_id).await.unwrap();
    assert_eq!(confirmed.merge.inserted, 2);

    let second = service.parse_batch(LISTING, 1, "unicamp");
    let reconfirmed = service.confirm(second.batch_id).await.unwrap();
    assert_eq!(reconfirmed.merge.inserted, 0);
    assert_eq!(reconfirmed.merge.skipped_existing, 2);

    assert_eq!(store.load_cumulative("Campinas").await.unwrap().len(), 2);
}

#[tokio::test]
async fn reassigned_student_is_deduplicated_across_calls() {
    let store = Arc::new(InMemoryMergeStore::new());
    let service = service(store.clone(), None);

    let call1 = "(241498191) Abel Rapha de Jesus Macedo   Pedagogia (N)";
    let call2 = "(241498191) Abel Rapha de Jesus Macedo   Matematica - Licenciatura (N) REMANEJADO";

    let first = service.parse_batch(call1, 1, "unicamp");
    service.confirm(first.batch_id).await.unwrap();

    let second = service.parse_batch(call2, 2, "unicamp");
    let reconfirmed = service.confirm(second.batch_id).await.unwrap();

    // Same enrollment id: the cumulative store keeps the call-1 entry only,
    // but each call keeps its own snapshot.
    assert_eq!(reconfirmed.merge.inserted, 0);
    assert_eq!(reconfirmed.merge.skipped_existing, 1);

    let cumulative = store.load_cumulative("Campinas").await.unwrap();
    assert_eq!(cumulative.len(), 1);
    assert_eq!(cumulative[0].call_number, 1);

    assert_eq!(store.load_call_snapshot("Campinas", 1).await.unwrap().len(), 1);
    let snapshot2 = store.load_call_snapshot("Campinas", 2).await.unwrap();
    assert_eq!(snapshot2.len(), 1);
    assert!(snapshot2[0].reassigned);
}

#[tokio::test]
async fn cancelled_batch_has_no_side_effects_and_rejects_confirm() {
    let store = Arc::new(InMemoryMergeStore::new());
    let service = service(store.clone(), None);

    let outcome = service.parse_batch(LISTING, 1, "unicamp");
    service.cancel(outcome.batch_id).await.unwrap();

    assert!(store.load_cumulative("Campinas").await.unwrap().is_empty());
    assert!(store.load_call_dump(1).await.unwrap().is_empty());

    let err = service.confirm(outcome.batch_id).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::BatchConflict { status: "cancelled", .. }
    ));

    let status = service.status(outcome.batch_id).unwrap();
    assert_eq!(status.status, BatchStatus::Cancelled);
}
