//! The Deal Store.
//!
//! [`DealStore`] exclusively owns the in-memory deal collection and mediates
//! every change to it. Each mutation performs the remote call first and
//! reconciles the cache only once the outcome is known, then publishes the
//! full collection as a new [`DealSnapshot`].
//!
//! Remote failures are handled by one policy:
//!
//! - the initial load falls back to the bundled sample deals,
//! - lookups fall back to the cache, then to the sample deals,
//! - creates fall back to a locally synthesized record with a negative id,
//! - updates, stage changes and deletes of remote-backed deals report
//!   [`DealflowError::RemoteUnavailable`] and leave the cache untouched.
//!
//! Deals that exist only locally (sample or synthesized) never reach the
//! record service; their writes are applied to the cache directly.
//! Sample deals are dropped as soon as the service answers again.

mod batch;
mod config;
mod resilient;
mod sample;
mod snapshot;

#[cfg(test)]
mod integration_tests;

pub use batch::BatchOutcome;
pub use config::{BackoffStrategy, JitterStrategy, RetryConfig, StoreConfig};
pub use resilient::{resilient, with_retry, Fallback, Resolved};
pub use sample::{sample_deal, sample_deals};
pub use snapshot::DealSnapshot;

use crate::core::{Deal, DealDraft, DealFields, DealId, DealStage, StageChange};
use crate::errors::{DealflowError, FailureKind, RecordFailure, Result};
use crate::events::{DealEvent, EventSink, NoOpEventSink};
use crate::records::deal_record::{encode_new, encode_stage_change, encode_update};
use crate::records::{
    deal_fields, decode_deal, merge_deal, FetchQuery, OrderBy, Record, RecordId, RecordResult,
    RecordService, RemoteError,
};
use crate::utils::{now_utc, Timestamp};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a cached deal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Loaded from or confirmed by the record service.
    Remote,
    /// Served from the bundled sample deals.
    Sample,
    /// Synthesized locally after a failed create.
    Local,
}

impl Origin {
    /// Returns true for deals the record service does not know about.
    #[must_use]
    pub const fn is_local_only(self) -> bool {
        !matches!(self, Self::Remote)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    deal: Deal,
    origin: Origin,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: Vec<Entry>,
    version: u64,
}

impl StoreState {
    fn get(&self, id: DealId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.deal.id == id)
    }

    fn get_mut(&mut self, id: DealId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.deal.id == id)
    }

    /// Inserts ahead of every deal created at the same time or earlier.
    fn insert_sorted(&mut self, entry: Entry) {
        let created_at = entry.deal.created_at;
        let pos = self
            .entries
            .partition_point(|e| e.deal.created_at > created_at);
        self.entries.insert(pos, entry);
    }

    fn upsert(&mut self, entry: Entry) {
        match self.get_mut(entry.deal.id) {
            Some(existing) => *existing = entry,
            None => self.insert_sorted(entry),
        }
    }

    /// Drops every sample deal, returning how many were dropped.
    fn drop_samples(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.origin != Origin::Sample);
        before - self.entries.len()
    }

    fn remove(&mut self, id: DealId) -> Option<Entry> {
        let pos = self.entries.iter().position(|e| e.deal.id == id)?;
        Some(self.entries.remove(pos))
    }

    fn deals(&self) -> Vec<Deal> {
        self.entries.iter().map(|e| e.deal.clone()).collect()
    }
}

/// Routing of a write by the origin of its target.
enum Target {
    LocalOnly,
    Remote,
    Missing,
}

/// The authoritative deal collection and its CRUD surface.
pub struct DealStore {
    records: Arc<dyn RecordService>,
    config: StoreConfig,
    fields: Vec<String>,
    state: RwLock<StoreState>,
    snapshots: watch::Sender<DealSnapshot>,
    events: Arc<dyn EventSink>,
    next_local_id: AtomicI64,
    session_id: Uuid,
}

impl fmt::Debug for DealStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DealStore")
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .field("deals", &self.state.read().entries.len())
            .finish_non_exhaustive()
    }
}

impl DealStore {
    /// Creates a store with the default configuration.
    #[must_use]
    pub fn new(records: Arc<dyn RecordService>) -> Self {
        Self::with_config(records, StoreConfig::default())
    }

    /// Creates a store with `config`.
    #[must_use]
    pub fn with_config(records: Arc<dyn RecordService>, config: StoreConfig) -> Self {
        let (snapshots, _) = watch::channel(DealSnapshot::default());
        let session_id = Uuid::new_v4();
        debug!(session = %session_id, entity = %config.entity, "Deal store created");

        Self {
            records,
            config,
            fields: deal_fields(),
            state: RwLock::new(StoreState::default()),
            snapshots,
            events: Arc::new(NoOpEventSink),
            next_local_id: AtomicI64::new(-1),
            session_id,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// The store configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Identifier of this store's session.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DealSnapshot {
        self.snapshots.borrow().clone()
    }

    /// The current deals, newest first.
    #[must_use]
    pub fn deals(&self) -> Vec<Deal> {
        self.snapshot().deals.as_ref().clone()
    }

    /// Subscribes to snapshots. The receiver sees every published version.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DealSnapshot> {
        self.snapshots.subscribe()
    }

    /// Where a cached deal came from.
    #[must_use]
    pub fn origin(&self, id: DealId) -> Option<Origin> {
        self.state.read().get(id).map(|e| e.origin)
    }

    /// Returns true when the deal exists only locally.
    #[must_use]
    pub fn is_local(&self, id: DealId) -> bool {
        id.is_local() || self.origin(id).is_some_and(Origin::is_local_only)
    }

    /// Loads every deal, newest first, and replaces the cache.
    ///
    /// When the record service cannot be reached the bundled sample deals
    /// are served instead (unless `sample_fallback` is off). Locally
    /// synthesized deals survive a reload.
    pub async fn list_all(&self) -> Result<Vec<Deal>> {
        let records = &self.records;
        let entity = self.config.entity.as_str();
        let query = FetchQuery::new(self.fields.clone()).order_by(OrderBy::desc("created_at"));
        let query = &query;
        let sample_fallback = self.config.sample_fallback;

        let resolved = resilient(
            &self.config.read_retry,
            "list_all",
            Fallback::SampleData,
            move || async move { records.fetch_all(entity, query).await.map(decode_all) },
            || sample_fallback.then(sample_deals),
        )
        .await?;

        let (deals, origin, source) = match resolved {
            Resolved::Remote(deals) => (deals, Origin::Remote, "remote"),
            Resolved::Degraded {
                value,
                strategy,
                reason,
            } => {
                self.emit_fallback("list_all", strategy, &reason).await;
                (value, Origin::Sample, "sample")
            }
        };

        let deals = self.commit(|state| {
            let locals = std::mem::take(&mut state.entries)
                .into_iter()
                .filter(|e| e.origin == Origin::Local);
            state.entries = deals
                .into_iter()
                .map(|deal| Entry { deal, origin })
                .chain(locals)
                .collect();
            state
                .entries
                .sort_by(|a, b| b.deal.created_at.cmp(&a.deal.created_at));
            state.deals()
        });

        info!(session = %self.session_id, count = deals.len(), source, "Deals loaded");
        self.emit(DealEvent::Loaded {
            count: deals.len(),
            source,
        })
        .await;
        Ok(deals)
    }

    /// Looks up one deal. Never fails; `None` means not found.
    ///
    /// Local-only deals are answered from the cache. Otherwise the record
    /// service is asked first, falling back to the cache and then to the
    /// sample deals.
    pub async fn get_by_id(&self, id: DealId) -> Option<Deal> {
        let cached = self.state.read().get(id).cloned();
        if let Some(entry) = &cached {
            if entry.origin.is_local_only() {
                return Some(entry.deal.clone());
            }
        }
        if id.is_local() {
            return None;
        }

        let records = &self.records;
        let entity = self.config.entity.as_str();
        let fields = self.fields.as_slice();
        let sample_fallback = self.config.sample_fallback;

        let resolved = resilient(
            &self.config.read_retry,
            "get_by_id",
            Fallback::LocalCache,
            move || async move {
                records
                    .fetch_by_id(entity, id.get(), fields)
                    .await
                    .map(|found| found.and_then(decode_logged))
            },
            || {
                Some(
                    cached
                        .map(|e| e.deal)
                        .or_else(|| sample_fallback.then(|| sample_deal(id)).flatten()),
                )
            },
        )
        .await;

        match resolved {
            Ok(Resolved::Remote(found)) => {
                self.retire_samples();
                found
            }
            Ok(Resolved::Degraded {
                value,
                strategy,
                reason,
            }) => {
                self.emit_fallback("get_by_id", strategy, &reason).await;
                value
            }
            Err(_) => None,
        }
    }

    /// Validates and creates a deal.
    ///
    /// The created deal is prepended to the cache without a re-fetch. When
    /// the record service cannot be reached the deal is kept as a local
    /// record with a negative identifier (unless `synthesize_on_failure`
    /// is off).
    pub async fn create(&self, draft: &DealDraft) -> Result<Deal> {
        let fields = draft.validate()?;
        let mut outcome = self.create_validated("create", vec![(0, fields)]).await?;

        match outcome.failed.pop() {
            Some(failure) => Err(failure.into_error()),
            None => outcome
                .succeeded
                .pop()
                .ok_or_else(|| DealflowError::Internal("create produced no deal".to_string())),
        }
    }

    /// Creates several deals in one remote call, committing every one that succeeds.
    pub async fn create_many(&self, drafts: &[DealDraft]) -> Result<BatchOutcome<Deal>> {
        let mut invalid = Vec::new();
        let mut valid = Vec::new();
        for (index, draft) in drafts.iter().enumerate() {
            match draft.validate() {
                Ok(fields) => valid.push((index, fields)),
                Err(err) => invalid.push(
                    RecordFailure::new(index, FailureKind::Invalid).with_errors(err.errors),
                ),
            }
        }

        let mut outcome = if valid.is_empty() {
            BatchOutcome::new()
        } else {
            self.create_validated("create_many", valid).await?
        };
        outcome.failed.extend(invalid);
        outcome.sort_failures();
        Ok(outcome)
    }

    /// Replaces every editable field of a deal.
    pub async fn update(&self, id: DealId, draft: &DealDraft) -> Result<Deal> {
        let fields = draft.validate()?;
        let now = now_utc();
        let was_cached = self.origin(id).is_some();

        match self.target(id) {
            Target::Missing => return Err(DealflowError::NotFound { id }),
            Target::LocalOnly => {
                let ((), deal) = self.modify(id, |deal| deal.replace_fields(fields, now))?;
                self.emit(DealEvent::Updated { deal_id: id }).await;
                return Ok(deal);
            }
            Target::Remote => {}
        }

        let patch = encode_update(id, &fields, now);
        let result = self.write_one("update", id, patch).await?;

        let mut base = self
            .state
            .read()
            .get(id)
            .map_or_else(|| Deal::from_fields(id, fields.clone(), now), |e| e.deal.clone());
        base.replace_fields(fields, now);
        let deal = match result.data {
            None => base,
            Some(data) => merge_deal(&base, data).unwrap_or_else(|e| {
                warn!(deal_id = %id, error = %e, "Ignoring undecodable update response");
                base
            }),
        };

        self.reconcile(deal.clone(), was_cached)?;
        info!(session = %self.session_id, deal_id = %id, "Deal updated");
        self.emit(DealEvent::Updated { deal_id: id }).await;
        Ok(deal)
    }

    /// Moves a deal to `stage`.
    ///
    /// Only the stage, the probability derived from it and the activity
    /// time change. The change is computed here and applied under one lock,
    /// so stage and probability always agree. Nothing moves until the
    /// record service has confirmed the change.
    pub async fn update_stage(&self, id: DealId, stage: DealStage) -> Result<Deal> {
        let change = StageChange::to(stage);

        match self.target(id) {
            Target::Missing => return Err(DealflowError::NotFound { id }),
            Target::LocalOnly => {
                let (from, deal) = self.modify(id, |deal| {
                    let from = deal.stage;
                    deal.apply_stage_change(&change);
                    from
                })?;
                self.stage_changed(&deal, from).await;
                return Ok(deal);
            }
            Target::Remote => {}
        }

        let was_cached = self.origin(id).is_some();
        let patch = encode_stage_change(id, &change);
        let result = self.write_one("update_stage", id, patch).await?;

        let applied = self.modify(id, |deal| {
            let from = deal.stage;
            deal.apply_stage_change(&change);
            from
        });
        let (from, deal) = match applied {
            Ok(applied) => applied,
            Err(err) if was_cached => {
                warn!(deal_id = %id, "Deal was removed while its stage change was in flight");
                return Err(err);
            }
            Err(_) => {
                let mut deal = match result.data {
                    Some(data) => decode_deal(data)?,
                    None => self
                        .get_by_id(id)
                        .await
                        .ok_or(DealflowError::NotFound { id })?,
                };
                let from = deal.stage;
                deal.apply_stage_change(&change);
                self.reconcile(deal.clone(), false)?;
                (from, deal)
            }
        };

        self.stage_changed(&deal, from).await;
        Ok(deal)
    }

    /// Deletes a deal. A missing identifier is reported as
    /// [`DealflowError::NotFound`] and changes nothing.
    pub async fn delete(&self, id: DealId) -> Result<()> {
        match self.target(id) {
            Target::Missing => return Err(DealflowError::NotFound { id }),
            Target::LocalOnly => {}
            Target::Remote => {
                let records = &self.records;
                let entity = self.config.entity.as_str();
                let results = resilient(
                    &self.config.write_retry,
                    "delete",
                    Fallback::Propagate,
                    move || records.delete_records(entity, vec![id.get()]),
                    || None,
                )
                .await?
                .into_value();
                self.retire_samples();

                let result = single_result("delete", results)?;
                if !result.success {
                    return Err(record_failure(result, 0, Some(id)).into_error());
                }
            }
        }

        self.commit(|state| {
            state.remove(id);
        });
        info!(session = %self.session_id, deal_id = %id, "Deal deleted");
        self.emit(DealEvent::Deleted { deal_ids: vec![id] }).await;
        Ok(())
    }

    /// Deletes several deals, committing every deletion that succeeds.
    pub async fn delete_many(&self, ids: &[DealId]) -> Result<BatchOutcome<DealId>> {
        let mut outcome = BatchOutcome::new();
        let mut removed = Vec::new();
        let mut remote = Vec::new();

        for (index, &id) in ids.iter().enumerate() {
            match self.target(id) {
                Target::LocalOnly => removed.push((index, id)),
                Target::Remote => remote.push((index, id)),
                Target::Missing => outcome.failed.push(
                    RecordFailure::new(index, FailureKind::NotFound)
                        .with_id(id)
                        .with_message(format!("Deal {id} not found")),
                ),
            }
        }

        if !remote.is_empty() {
            let records = &self.records;
            let entity = self.config.entity.as_str();
            let raw: Vec<RecordId> = remote.iter().map(|(_, id)| id.get()).collect();
            let results = resilient(
                &self.config.write_retry,
                "delete_many",
                Fallback::Propagate,
                move || records.delete_records(entity, raw.clone()),
                || None,
            )
            .await?
            .into_value();
            self.retire_samples();

            let results = expect_results("delete_many", results, remote.len())?;
            for ((index, id), result) in remote.into_iter().zip(results) {
                if result.success {
                    removed.push((index, id));
                } else {
                    outcome.failed.push(record_failure(result, index, Some(id)));
                }
            }
        }

        removed.sort_by_key(|(index, _)| *index);
        outcome.succeeded = removed.into_iter().map(|(_, id)| id).collect();
        outcome.sort_failures();

        if !outcome.succeeded.is_empty() {
            self.commit(|state| {
                for id in &outcome.succeeded {
                    state.remove(*id);
                }
            });
            info!(
                session = %self.session_id,
                deleted = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "Deals deleted"
            );
            self.emit(DealEvent::Deleted {
                deal_ids: outcome.succeeded.clone(),
            })
            .await;
        }
        Ok(outcome)
    }

    async fn create_validated(
        &self,
        operation: &'static str,
        valid: Vec<(usize, DealFields)>,
    ) -> Result<BatchOutcome<Deal>> {
        let now = now_utc();
        let records = &self.records;
        let entity = self.config.entity.as_str();
        let batch: Vec<Record> = valid.iter().map(|(_, f)| encode_new(f, now)).collect();
        let synthesize = self.config.synthesize_on_failure;

        let resolved = resilient(
            &self.config.write_retry,
            operation,
            Fallback::SynthesizedRecord,
            move || records.create_records(entity, batch.clone()),
            || synthesize.then(Vec::new),
        )
        .await?;

        let mut outcome = BatchOutcome::new();
        let mut created = Vec::new();
        match resolved {
            Resolved::Remote(results) => {
                self.retire_samples();
                let results = expect_results(operation, results, valid.len())?;
                for ((index, fields), result) in valid.into_iter().zip(results) {
                    if !result.success {
                        outcome.failed.push(record_failure(result, index, None));
                        continue;
                    }
                    match created_deal(result, fields, now) {
                        Ok(deal) => created.push((deal, Origin::Remote)),
                        Err(e) => outcome.failed.push(
                            RecordFailure::new(index, FailureKind::Rejected)
                                .with_message(e.to_string()),
                        ),
                    }
                }
            }
            Resolved::Degraded {
                strategy, reason, ..
            } => {
                self.emit_fallback(operation, strategy, &reason).await;
                for (_, fields) in valid {
                    created.push((Deal::from_fields(self.next_local_id(), fields, now), Origin::Local));
                }
            }
        }

        if !created.is_empty() {
            self.commit(|state| {
                for (deal, origin) in created.iter().rev() {
                    state.upsert(Entry {
                        deal: deal.clone(),
                        origin: *origin,
                    });
                }
            });
        }

        for (deal, origin) in created {
            let local = origin == Origin::Local;
            info!(session = %self.session_id, deal_id = %deal.id, local, "Deal created");
            self.emit(DealEvent::Created {
                deal_id: deal.id,
                local,
            })
            .await;
            outcome.succeeded.push(deal);
        }
        Ok(outcome)
    }

    /// Sends a single-record update and returns its result, failing on a
    /// per-record failure.
    async fn write_one(&self, operation: &'static str, id: DealId, patch: Record) -> Result<RecordResult> {
        let records = &self.records;
        let entity = self.config.entity.as_str();
        let results = resilient(
            &self.config.write_retry,
            operation,
            Fallback::Propagate,
            move || records.update_records(entity, vec![patch.clone()]),
            || None,
        )
        .await?
        .into_value();
        self.retire_samples();

        let result = single_result(operation, results)?;
        if result.success {
            Ok(result)
        } else {
            Err(record_failure(result, 0, Some(id)).into_error())
        }
    }

    fn target(&self, id: DealId) -> Target {
        match self.origin(id) {
            Some(origin) if origin.is_local_only() => Target::LocalOnly,
            Some(_) => Target::Remote,
            None if id.is_local() => Target::Missing,
            None => Target::Remote,
        }
    }

    fn next_local_id(&self) -> DealId {
        DealId::new(self.next_local_id.fetch_sub(1, Ordering::SeqCst))
    }

    /// Applies `change` to the cached deal and publishes, `NotFound` if it is not cached.
    fn modify<R>(&self, id: DealId, change: impl FnOnce(&mut Deal) -> R) -> Result<(R, Deal)> {
        let mut state = self.state.write();
        let entry = state
            .get_mut(id)
            .ok_or(DealflowError::NotFound { id })?;
        let result = change(&mut entry.deal);
        let deal = entry.deal.clone();
        self.publish(&mut state);
        Ok((result, deal))
    }

    /// Stores a remotely confirmed deal. A deal that was cached before the
    /// remote call and has been removed since stays removed.
    fn reconcile(&self, deal: Deal, was_cached: bool) -> Result<()> {
        let mut state = self.state.write();
        if was_cached && state.get(deal.id).is_none() {
            return Err(DealflowError::NotFound { id: deal.id });
        }
        state.upsert(Entry {
            deal,
            origin: Origin::Remote,
        });
        self.publish(&mut state);
        Ok(())
    }

    /// Drops the sample deals once the service answers. They share its id space.
    fn retire_samples(&self) {
        let mut state = self.state.write();
        let retired = state.drop_samples();
        if retired > 0 {
            self.publish(&mut state);
            drop(state);
            info!(
                session = %self.session_id,
                retired,
                "Record service reachable, sample deals retired"
            );
        }
    }

    fn commit<R>(&self, apply: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.state.write();
        let result = apply(&mut state);
        self.publish(&mut state);
        result
    }

    fn publish(&self, state: &mut StoreState) {
        state.version += 1;
        self.snapshots.send_replace(DealSnapshot {
            version: state.version,
            deals: Arc::new(state.deals()),
        });
    }

    async fn stage_changed(&self, deal: &Deal, from: DealStage) {
        info!(
            session = %self.session_id,
            deal_id = %deal.id,
            from = %from,
            stage = %deal.stage,
            probability = deal.probability,
            "Deal stage changed"
        );
        self.emit(DealEvent::StageChanged {
            deal_id: deal.id,
            from,
            to: deal.stage,
            probability: deal.probability,
        })
        .await;
    }

    async fn emit_fallback(&self, operation: &str, strategy: Fallback, reason: &RemoteError) {
        self.emit(DealEvent::Fallback {
            operation: operation.to_string(),
            strategy: strategy.to_string(),
            reason: reason.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: DealEvent) {
        self.events.emit(&event).await;
    }
}

fn decode_logged(record: Record) -> Option<Deal> {
    match decode_deal(record) {
        Ok(deal) => Some(deal),
        Err(e) => {
            warn!(error = %e, "Skipping undecodable deal record");
            None
        }
    }
}

fn decode_all(records: Vec<Record>) -> Vec<Deal> {
    records.into_iter().filter_map(decode_logged).collect()
}

fn expect_results(
    operation: &str,
    results: Vec<RecordResult>,
    expected: usize,
) -> Result<Vec<RecordResult>> {
    if results.len() == expected {
        Ok(results)
    } else {
        Err(DealflowError::remote_unavailable(
            operation,
            format!("expected {expected} results, got {}", results.len()),
        ))
    }
}

fn single_result(operation: &str, results: Vec<RecordResult>) -> Result<RecordResult> {
    let mut results = expect_results(operation, results, 1)?;
    results
        .pop()
        .ok_or_else(|| DealflowError::Internal(format!("{operation} returned no result")))
}

fn record_failure(result: RecordResult, index: usize, id: Option<DealId>) -> RecordFailure {
    let kind = result.kind.unwrap_or(if result.errors.is_empty() {
        FailureKind::Rejected
    } else {
        FailureKind::Invalid
    });
    let mut failure = RecordFailure::new(index, kind).with_errors(result.errors);
    if let Some(id) = result.id.map(DealId::new).or(id) {
        failure = failure.with_id(id);
    }
    if let Some(message) = result.message {
        failure = failure.with_message(message);
    }
    failure
}

fn created_deal(result: RecordResult, fields: DealFields, now: Timestamp) -> Result<Deal> {
    let id = result
        .id
        .or_else(|| {
            result
                .data
                .as_ref()
                .and_then(|data| data.get("id"))
                .and_then(serde_json::Value::as_i64)
        })
        .ok_or_else(|| DealflowError::Decode("created record carries no id".to_string()))?;

    let base = Deal::from_fields(DealId::new(id), fields, now);
    match result.data {
        Some(data) => merge_deal(&base, data),
        None => Ok(base),
    }
}
