//! End-to-end behaviour of the store and the board over record services.

use super::*;
use crate::board::{partition_by_stage, stage_aggregate, PipelineBoard};
use crate::events::CollectingEventSink;
use crate::records::deal_record::encode_deal;
use crate::records::{InMemoryRecordService, MockRecordService, DEAL_ENTITY};
use crate::testing::{
    assert_partition_covers, assert_stage_consistent, sample_draft, seed_deals, DealFixture,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn fast_reads() -> StoreConfig {
    StoreConfig::new().with_read_retry(RetryConfig::reads().with_base_delay_ms(1))
}

fn unavailable() -> RemoteError {
    RemoteError::Unavailable("connection refused".to_string())
}

/// Applies updates at once but acknowledges them after `delay`.
struct SlowUpdateAck {
    inner: Arc<InMemoryRecordService>,
    delay: Duration,
}

#[async_trait]
impl RecordService for SlowUpdateAck {
    async fn fetch_all(
        &self,
        entity: &str,
        query: &FetchQuery,
    ) -> std::result::Result<Vec<Record>, RemoteError> {
        self.inner.fetch_all(entity, query).await
    }

    async fn fetch_by_id(
        &self,
        entity: &str,
        id: RecordId,
        fields: &[String],
    ) -> std::result::Result<Option<Record>, RemoteError> {
        self.inner.fetch_by_id(entity, id, fields).await
    }

    async fn create_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> std::result::Result<Vec<RecordResult>, RemoteError> {
        self.inner.create_records(entity, records).await
    }

    async fn update_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> std::result::Result<Vec<RecordResult>, RemoteError> {
        let results = self.inner.update_records(entity, records).await;
        tokio::time::sleep(self.delay).await;
        results
    }

    async fn delete_records(
        &self,
        entity: &str,
        ids: Vec<RecordId>,
    ) -> std::result::Result<Vec<RecordResult>, RemoteError> {
        self.inner.delete_records(entity, ids).await
    }
}

fn by_id(mut deals: Vec<Deal>) -> Vec<Deal> {
    deals.sort_by_key(|d| d.id);
    deals
}

async fn store_with(
    stages: &[DealStage],
) -> (Arc<InMemoryRecordService>, Arc<DealStore>, Vec<Deal>) {
    let records = Arc::new(InMemoryRecordService::new());
    let store = Arc::new(DealStore::new(records.clone()));
    let mut deals = Vec::new();
    for (i, stage) in stages.iter().enumerate() {
        let draft = sample_draft(&format!("Deal {i}")).stage(stage);
        deals.push(store.create(&draft).await.unwrap());
    }
    (records, store, deals)
}

#[tokio::test]
async fn test_every_stage_transition_keeps_probability_consistent() {
    for from in DealStage::ALL {
        for to in DealStage::ALL {
            let (_, store, deals) = store_with(&[from]).await;

            let moved = store.update_stage(deals[0].id, to).await.unwrap();
            assert_eq!(moved.stage, to);
            assert_eq!(moved.probability, to.probability());
            assert_stage_consistent(&store.deals()[0]);
        }
    }
}

#[tokio::test]
async fn test_closed_won_moves_back_to_lead() {
    let (records, store, deals) = store_with(&[DealStage::ClosedWon]).await;

    let reopened = store.update_stage(deals[0].id, DealStage::Lead).await.unwrap();
    assert_eq!(reopened.probability, 20);

    let stored = records.record(DEAL_ENTITY, deals[0].id.get()).unwrap();
    assert_eq!(stored["stage"], serde_json::json!("Lead"));
    assert_eq!(stored["probability"], serde_json::json!(20.0));
}

#[tokio::test]
async fn test_partition_of_store_snapshot_is_exact() {
    let (_, store, _) = store_with(&[
        DealStage::Lead,
        DealStage::Proposal,
        DealStage::Lead,
        DealStage::ClosedWon,
    ])
    .await;

    let snapshot = store.snapshot();
    let partition = partition_by_stage(snapshot.iter());
    assert_partition_covers(&snapshot.deals, &partition);
    assert_eq!(partition.column(DealStage::Lead).deals.len(), 2);
    assert!(partition.column(DealStage::Negotiation).deals.is_empty());
}

#[tokio::test]
async fn test_pipeline_value_excludes_won_deals() {
    let records = Arc::new(InMemoryRecordService::new());
    let store = Arc::new(DealStore::new(records));
    for (name, value, stage) in [
        ("Small", "100", DealStage::Lead),
        ("Medium", "50", DealStage::Qualified),
        ("Won", "200", DealStage::ClosedWon),
    ] {
        store
            .create(&sample_draft(name).value(value).stage(stage))
            .await
            .unwrap();
    }

    let board = PipelineBoard::new(store);
    assert!((board.total_pipeline_value() - 150.0).abs() < f64::EPSILON);
    assert!((board.summary().won_value - 200.0).abs() < f64::EPSILON);
}

#[test]
fn test_aggregate_of_empty_column() {
    let deals: Vec<Deal> = Vec::new();
    let aggregate = stage_aggregate(&deals);
    assert_eq!(aggregate.count, 0);
    assert!(aggregate.total_value.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_invalid_create_leaves_collection_unchanged() {
    let (records, store, _) = store_with(&[DealStage::Lead]).await;
    let before = store.snapshot();

    let err = assert_err!(store.create(&sample_draft("").value("-5")).await);
    let errors = err.field_errors();
    assert!(errors.iter().any(|e| e.field == "name"));
    assert!(errors.iter().any(|e| e.field == "value"));

    let after = store.snapshot();
    assert_eq!(after.version, before.version);
    assert_eq!(after.deals, before.deals);
    assert_eq!(records.call_count("create_records"), 1);
}

#[tokio::test]
async fn test_delete_missing_leaves_collection_unchanged() {
    let (_, store, _) = store_with(&[DealStage::Lead, DealStage::Qualified]).await;
    let before = store.snapshot();

    let err = assert_err!(store.delete(DealId::new(9_999)).await);
    assert!(err.is_not_found());
    assert_eq!(store.snapshot().deals, before.deals);

    let listed = store.list_all().await.unwrap();
    assert_eq!(by_id(listed), by_id(before.deals.as_ref().clone()));
}

#[tokio::test]
async fn test_delete_during_stage_change_stays_deleted() {
    let records = Arc::new(InMemoryRecordService::new());
    let store = DealStore::new(Arc::new(SlowUpdateAck {
        inner: records.clone(),
        delay: Duration::from_millis(50),
    }));
    let deal = store.create(&sample_draft("Contested")).await.unwrap();

    let (moved, deleted) = tokio::join!(
        store.update_stage(deal.id, DealStage::Proposal),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.delete(deal.id).await
        },
    );

    assert_ok!(deleted);
    assert!(assert_err!(moved).is_not_found());
    assert!(records.record(DEAL_ENTITY, deal.id.get()).is_none());
    assert!(store.snapshot().get(deal.id).is_none());
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_update_of_deleted_deal_is_not_restored() {
    let records = Arc::new(InMemoryRecordService::new());
    let store = DealStore::new(Arc::new(SlowUpdateAck {
        inner: records.clone(),
        delay: Duration::from_millis(50),
    }));
    let deal = store.create(&sample_draft("Contested")).await.unwrap();

    let renamed = sample_draft("Renamed");
    let (updated, deleted) = tokio::join!(
        store.update(deal.id, &renamed),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.delete(deal.id).await
        },
    );

    assert_ok!(deleted);
    assert!(assert_err!(updated).is_not_found());
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_concurrent_stage_changes_last_write_wins() {
    let (records, store, deals) = store_with(&[DealStage::Lead]).await;
    let id = deals[0].id;
    records.script_delays([Duration::from_millis(40), Duration::from_millis(1)]);

    let (slow, fast) = tokio::join!(
        store.update_stage(id, DealStage::Proposal),
        store.update_stage(id, DealStage::Negotiation),
    );
    assert_ok!(slow);
    assert_ok!(fast);

    let deal = store.snapshot().get(id).cloned().unwrap();
    assert_eq!(deal.stage, DealStage::Proposal);
    assert_stage_consistent(&deal);

    let stored = decode_deal(records.record(DEAL_ENTITY, id.get()).unwrap()).unwrap();
    assert_eq!(stored.stage, DealStage::Proposal);
    assert_eq!(stored.probability, 65);
}

#[tokio::test]
async fn test_concurrent_creates_all_land() {
    let (_, store, _) = store_with(&[]).await;

    let drafts: Vec<DealDraft> = (0..8).map(|i| sample_draft(&format!("Deal {i}"))).collect();
    let created = futures::future::join_all(drafts.iter().map(|d| store.create(d))).await;

    assert!(created.iter().all(Result::is_ok));
    assert_eq!(store.snapshot().len(), 8);
}

#[tokio::test]
async fn test_create_many_commits_successes() {
    let records = Arc::new(
        InMemoryRecordService::new().with_required_fields(DEAL_ENTITY, &["contact_id"]),
    );
    let store = DealStore::new(records.clone());

    let outcome = store
        .create_many(&[
            sample_draft("With contact").contact(7, "Ada Lovelace"),
            sample_draft("No contact"),
            sample_draft(""),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.committed(), 1);
    assert_eq!(outcome.succeeded[0].name, "With contact");
    assert_eq!(
        outcome.failed.iter().map(|f| f.index).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(outcome.failed[0].errors[0].field, "contact_id");
    assert_eq!(outcome.failed[1].errors[0].field, "name");
    assert_eq!(store.snapshot().len(), 1);

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(
        err,
        DealflowError::PartialBatchFailure { committed: 1, .. }
    ));
}

#[tokio::test]
async fn test_delete_many_reports_each_failure() {
    let (records, store, deals) = store_with(&[DealStage::Lead, DealStage::Qualified]).await;

    let outcome = store
        .delete_many(&[deals[0].id, DealId::new(404), deals[1].id])
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, vec![deals[0].id, deals[1].id]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].index, 1);
    assert_eq!(outcome.failed[0].kind, FailureKind::NotFound);
    assert!(store.snapshot().is_empty());
    assert!(records.records(DEAL_ENTITY).is_empty());
}

#[tokio::test]
async fn test_delete_many_offline_commits_nothing() {
    let (records, store, deals) = store_with(&[DealStage::Lead, DealStage::Proposal]).await;
    records.set_available(false);

    let ids: Vec<DealId> = deals.iter().map(|d| d.id).collect();
    let err = assert_err!(store.delete_many(&ids).await);

    assert!(err.is_remote_unavailable());
    assert_eq!(store.snapshot().len(), 2);
}

#[tokio::test]
async fn test_offline_session_serves_samples_and_local_writes() {
    let records = Arc::new(InMemoryRecordService::new());
    records.set_available(false);
    let sink = Arc::new(CollectingEventSink::new());
    let store = DealStore::with_config(records.clone(), fast_reads()).with_event_sink(sink.clone());

    let deals = store.list_all().await.unwrap();
    assert_eq!(deals, sample_deals());
    assert!(deals.iter().all(|d| store.origin(d.id) == Some(Origin::Sample)));

    let sample = deals[0].id;
    let moved = store.update_stage(sample, DealStage::ClosedWon).await.unwrap();
    assert_stage_consistent(&moved);

    let created = store.create(&sample_draft("Offline deal")).await.unwrap();
    assert!(created.id.is_local());
    assert_eq!(store.get_by_id(created.id).await, Some(created));

    assert_eq!(records.call_count("update_records"), 0);
    assert_eq!(sink.events_of_type("deal.fallback").len(), 2);
}

#[tokio::test]
async fn test_samples_retire_when_service_returns() {
    let records = Arc::new(InMemoryRecordService::new());
    records.set_available(false);
    let store = DealStore::with_config(records.clone(), fast_reads());
    store.list_all().await.unwrap();
    let offline = store.create(&sample_draft("Offline")).await.unwrap();

    records.set_available(true);
    let fresh = store.create(&sample_draft("Fresh")).await.unwrap();
    assert_eq!(fresh.id, DealId::new(1));

    let snapshot = store.snapshot();
    let ids: HashSet<DealId> = snapshot.iter().map(|d| d.id).collect();
    assert_eq!(ids.len(), snapshot.len());
    assert_eq!(ids, HashSet::from([offline.id, fresh.id]));
    assert_eq!(store.origin(fresh.id), Some(Origin::Remote));

    store.delete(fresh.id).await.unwrap();
    assert_eq!(store.get_by_id(fresh.id).await, None);
    assert_eq!(store.snapshot().len(), 1);
}

#[tokio::test]
async fn test_remote_read_retires_samples() {
    let records = Arc::new(InMemoryRecordService::new());
    records.set_available(false);
    let store = DealStore::with_config(records.clone(), fast_reads());
    assert!(!store.list_all().await.unwrap().is_empty());

    records.set_available(true);
    assert_eq!(store.get_by_id(DealId::new(99)).await, None);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_get_by_id_offline_uses_samples() {
    let records = Arc::new(InMemoryRecordService::new());
    records.set_available(false);
    let store = DealStore::with_config(records, fast_reads());

    let deal = store.get_by_id(DealId::new(1)).await;
    assert_eq!(deal, sample_deal(DealId::new(1)));
    assert_eq!(store.get_by_id(DealId::new(9_999)).await, None);
}

#[tokio::test]
async fn test_list_all_reads_seeded_records() {
    let records = Arc::new(InMemoryRecordService::new());
    let older = DealFixture::new(1).name("Older").created_days_ago(3).build();
    let newer = DealFixture::new(2)
        .name("Newer")
        .stage(DealStage::Negotiation)
        .created_days_ago(1)
        .build();
    seed_deals(&records, &[older.clone(), newer.clone()]);

    let store = DealStore::new(records);
    let deals = store.list_all().await.unwrap();
    assert_eq!(deals, vec![newer, older]);
}

#[tokio::test]
async fn test_board_follows_store_mutations() {
    let (_, store, deals) = store_with(&[DealStage::Lead, DealStage::Lead]).await;
    let board = PipelineBoard::new(store.clone());
    let mut updates = store.subscribe();

    board
        .request_stage_change(deals[0].id, "Negotiation")
        .await
        .unwrap();
    assert!(updates.has_changed().unwrap());
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.get(deals[0].id).unwrap().stage, DealStage::Negotiation);

    let columns = board.columns();
    assert_eq!(columns[0].aggregate.count, 1);
    assert_eq!(columns[3].aggregate.count, 1);

    store.delete(deals[1].id).await.unwrap();
    assert_eq!(board.columns()[0].aggregate.count, 0);
}

#[tokio::test]
async fn test_reads_are_retried() {
    let mut mock = MockRecordService::new();
    mock.expect_fetch_all()
        .times(2)
        .returning(|_, _| Err(unavailable()));

    let store = DealStore::with_config(Arc::new(mock), fast_reads());
    let deals = store.list_all().await.unwrap();
    assert_eq!(deals.len(), sample_deals().len());
}

#[tokio::test]
async fn test_rejected_reads_are_not_retried() {
    let mut mock = MockRecordService::new();
    mock.expect_fetch_all()
        .times(1)
        .returning(|_, _| Err(RemoteError::Rejected("Invalid project".to_string())));

    let store = DealStore::with_config(Arc::new(mock), fast_reads().with_sample_fallback(false));
    let err = store.list_all().await.unwrap_err();
    assert!(err.is_remote_unavailable());
}

#[tokio::test]
async fn test_writes_are_not_retried() {
    let mut mock = MockRecordService::new();
    mock.expect_create_records()
        .times(1)
        .returning(|_, _| Err(unavailable()));

    let store = DealStore::with_config(
        Arc::new(mock),
        StoreConfig::new().with_synthesize_on_failure(false),
    );
    let err = store.create(&sample_draft("Retry me")).await.unwrap_err();
    assert!(err.is_remote_unavailable());
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_synthesized_deal_stays_off_the_wire() {
    let mut mock = MockRecordService::new();
    mock.expect_create_records()
        .times(1)
        .returning(|_, _| Err(unavailable()));
    mock.expect_update_records().never();
    mock.expect_delete_records().never();

    let store = DealStore::new(Arc::new(mock));
    let deal = store.create(&sample_draft("Local")).await.unwrap();
    assert_eq!(deal.id, DealId::new(-1));

    let moved = store.update_stage(deal.id, DealStage::Proposal).await.unwrap();
    assert_eq!(moved.probability, 65);
    store
        .update(deal.id, &sample_draft("Renamed").stage("Proposal"))
        .await
        .unwrap();
    store.delete(deal.id).await.unwrap();
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_per_record_update_failure_is_typed() {
    let mut mock = MockRecordService::new();
    mock.expect_fetch_all().returning(|_, _| {
        Ok(vec![encode_deal(&DealFixture::new(5).build())])
    });
    mock.expect_update_records()
        .times(1)
        .returning(|_, _| Ok(vec![RecordResult::not_found(5)]));

    let store = DealStore::new(Arc::new(mock));
    store.list_all().await.unwrap();

    let err = store
        .update_stage(DealId::new(5), DealStage::Qualified)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.deals()[0].stage, DealStage::Lead);
}
