//! In-process record service.
//!
//! Behaves like the remote service: assigns identifiers, projects fields,
//! honours `order_by`, merges partial updates and reports per-record
//! failures. Latency and outages can be scripted, which makes it the
//! collaborator of choice for demos and tests.

use super::{FetchQuery, Record, RecordId, RecordResult, RecordService, RemoteError, SortDirection};
use crate::errors::FieldError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// An in-memory [`RecordService`].
#[derive(Debug)]
pub struct InMemoryRecordService {
    tables: Mutex<HashMap<String, BTreeMap<RecordId, Record>>>,
    required: Mutex<HashMap<String, Vec<String>>>,
    next_id: AtomicI64,
    available: AtomicBool,
    fail_next: AtomicUsize,
    latency: Mutex<Option<Duration>>,
    scripted_delays: Mutex<VecDeque<Duration>>,
    calls: Mutex<Vec<String>>,
}

impl Default for InMemoryRecordService {
    fn default() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            required: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            available: AtomicBool::new(true),
            fail_next: AtomicUsize::new(0),
            latency: Mutex::new(None),
            scripted_delays: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl InMemoryRecordService {
    /// Creates an empty, available service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a fixed latency to every call.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Requires `fields` to be present and non-null on created records of `entity`.
    #[must_use]
    pub fn with_required_fields(self, entity: &str, fields: &[&str]) -> Self {
        self.required.lock().insert(
            entity.to_string(),
            fields.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Inserts records that already carry an `id`.
    ///
    /// Records without an integer `id` are skipped. Later identifiers are
    /// assigned above the highest seeded one.
    pub fn seed(&self, entity: &str, records: Vec<Record>) {
        let mut tables = self.tables.lock();
        let table = tables.entry(entity.to_string()).or_default();
        for record in records {
            if let Some(id) = record.get("id").and_then(serde_json::Value::as_i64) {
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                table.insert(id, record);
            }
        }
    }

    /// Returns a copy of every stored record of `entity`, by identifier.
    #[must_use]
    pub fn records(&self, entity: &str) -> Vec<Record> {
        self.tables
            .lock()
            .get(entity)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a copy of one stored record.
    #[must_use]
    pub fn record(&self, entity: &str, id: RecordId) -> Option<Record> {
        self.tables
            .lock()
            .get(entity)
            .and_then(|table| table.get(&id).cloned())
    }

    /// Takes the service offline or brings it back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fails the next `count` calls with [`RemoteError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Queues per-call delays, consumed in call order before the fixed latency applies.
    pub fn script_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.scripted_delays.lock().extend(delays);
    }

    /// Names of the calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls made to `operation`.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == operation).count()
    }

    async fn enter(&self, operation: &str) -> Result<(), RemoteError> {
        self.calls.lock().push(operation.to_string());

        let delay = self
            .scripted_delays
            .lock()
            .pop_front()
            .or(*self.latency.lock());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("record service is offline".to_string()));
        }

        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RemoteError::Unavailable(format!("injected failure in {operation}")));
        }

        debug!(operation = %operation, "In-memory record call");
        Ok(())
    }

    fn missing_required(&self, entity: &str, record: &Record) -> Vec<FieldError> {
        self.required
            .lock()
            .get(entity)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|f| record.get(f.as_str()).map_or(true, serde_json::Value::is_null))
                    .map(|f| FieldError::new(f.clone(), "is required"))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(key, _)| key.as_str() == "id" || fields.iter().any(|f| f == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn compare_values(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> CmpOrdering {
    use serde_json::Value;

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => CmpOrdering::Equal,
        (None | Some(Value::Null), _) => CmpOrdering::Less,
        (_, None | Some(Value::Null)) => CmpOrdering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RecordService for InMemoryRecordService {
    async fn fetch_all(&self, entity: &str, query: &FetchQuery) -> Result<Vec<Record>, RemoteError> {
        self.enter("fetch_all").await?;

        let mut records = self.records(entity);
        records.sort_by(|a, b| {
            query
                .order_by
                .iter()
                .map(|order| {
                    let ord = compare_values(a.get(&order.field_name), b.get(&order.field_name));
                    match order.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != CmpOrdering::Equal)
                .unwrap_or(CmpOrdering::Equal)
        });

        Ok(records
            .iter()
            .map(|record| project(record, &query.fields))
            .collect())
    }

    async fn fetch_by_id(
        &self,
        entity: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, RemoteError> {
        self.enter("fetch_by_id").await?;
        Ok(self.record(entity, id).map(|record| project(&record, fields)))
    }

    async fn create_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordResult>, RemoteError> {
        self.enter("create_records").await?;

        let mut results = Vec::with_capacity(records.len());
        for mut record in records {
            let missing = self.missing_required(entity, &record);
            if !missing.is_empty() {
                results.push(RecordResult::invalid(None, missing));
                continue;
            }

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            record.insert("id".to_string(), serde_json::json!(id));
            self.tables
                .lock()
                .entry(entity.to_string())
                .or_default()
                .insert(id, record.clone());
            results.push(RecordResult::ok(id, Some(record)));
        }
        Ok(results)
    }

    async fn update_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordResult>, RemoteError> {
        self.enter("update_records").await?;

        let mut tables = self.tables.lock();
        let table = tables.entry(entity.to_string()).or_default();

        Ok(records
            .into_iter()
            .map(|patch| {
                let Some(id) = patch.get("id").and_then(serde_json::Value::as_i64) else {
                    return RecordResult::invalid(None, vec![FieldError::new("id", "is required")]);
                };
                match table.get_mut(&id) {
                    None => RecordResult::not_found(id),
                    Some(stored) => {
                        stored.extend(patch);
                        RecordResult::ok(id, Some(stored.clone()))
                    }
                }
            })
            .collect())
    }

    async fn delete_records(
        &self,
        entity: &str,
        ids: Vec<RecordId>,
    ) -> Result<Vec<RecordResult>, RemoteError> {
        self.enter("delete_records").await?;

        let mut tables = self.tables.lock();
        let table = tables.entry(entity.to_string()).or_default();

        Ok(ids
            .into_iter()
            .map(|id| match table.remove(&id) {
                Some(_) => RecordResult::ok(id, None),
                None => RecordResult::not_found(id),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use crate::records::OrderBy;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let service = InMemoryRecordService::new();
        let results = service
            .create_records("deal", vec![record(json!({"name": "a"})), record(json!({"name": "b"}))])
            .await
            .unwrap();

        assert_eq!(results[0].id, Some(1));
        assert_eq!(results[1].id, Some(2));
        assert_eq!(results[1].data.as_ref().unwrap()["id"], 2);
        assert_eq!(service.records("deal").len(), 2);
    }

    #[tokio::test]
    async fn test_seed_moves_id_counter() {
        let service = InMemoryRecordService::new();
        service.seed("deal", vec![record(json!({"id": 40, "name": "seeded"}))]);

        let results = service
            .create_records("deal", vec![record(json!({"name": "new"}))])
            .await
            .unwrap();
        assert_eq!(results[0].id, Some(41));
    }

    #[tokio::test]
    async fn test_fetch_all_orders_and_projects() {
        let service = InMemoryRecordService::new();
        service.seed(
            "deal",
            vec![
                record(json!({"id": 1, "name": "a", "created_at": "2024-01-01", "notes": "x"})),
                record(json!({"id": 2, "name": "b", "created_at": "2024-03-01", "notes": "y"})),
                record(json!({"id": 3, "name": "c", "created_at": "2024-02-01", "notes": "z"})),
            ],
        );

        let query = FetchQuery::new(vec!["name".to_string()]).order_by(OrderBy::desc("created_at"));
        let records = service.fetch_all("deal", &query).await.unwrap();

        let names: Vec<&str> = records.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert!(records[0].contains_key("id"));
        assert!(!records[0].contains_key("notes"));
    }

    #[tokio::test]
    async fn test_update_merges_and_reports_missing() {
        let service = InMemoryRecordService::new();
        service.seed("deal", vec![record(json!({"id": 1, "name": "a", "stage": "Lead"}))]);

        let results = service
            .update_records(
                "deal",
                vec![
                    record(json!({"id": 1, "stage": "Proposal"})),
                    record(json!({"id": 99, "stage": "Proposal"})),
                ],
            )
            .await
            .unwrap();

        assert!(results[0].success);
        assert_eq!(results[0].data.as_ref().unwrap()["name"], "a");
        assert_eq!(service.record("deal", 1).unwrap()["stage"], "Proposal");
        assert_eq!(results[1].kind, Some(FailureKind::NotFound));
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let service = InMemoryRecordService::new();
        service.seed("deal", vec![record(json!({"id": 1}))]);

        let results = service.delete_records("deal", vec![1, 1]).await.unwrap();
        assert!(results[0].success);
        assert_eq!(results[1].kind, Some(FailureKind::NotFound));
    }

    #[tokio::test]
    async fn test_required_fields_rejected_per_record() {
        let service = InMemoryRecordService::new().with_required_fields("deal", &["value"]);
        let results = service
            .create_records(
                "deal",
                vec![record(json!({"value": 5})), record(json!({"value": null}))],
            )
            .await
            .unwrap();

        assert!(results[0].success);
        assert_eq!(results[1].kind, Some(FailureKind::Invalid));
        assert_eq!(results[1].errors[0].field, "value");
    }

    #[tokio::test]
    async fn test_outage_and_injected_failures() {
        let service = InMemoryRecordService::new();
        service.set_available(false);
        assert!(matches!(
            service.fetch_all("deal", &FetchQuery::default()).await,
            Err(RemoteError::Unavailable(_))
        ));

        service.set_available(true);
        service.fail_next(1);
        assert!(service.fetch_by_id("deal", 1, &[]).await.is_err());
        assert!(service.fetch_by_id("deal", 1, &[]).await.unwrap().is_none());
        assert_eq!(service.call_count("fetch_by_id"), 2);
    }
}
