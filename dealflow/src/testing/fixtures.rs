//! Deal fixtures.

use crate::core::{Deal, DealDraft, DealId, DealStage};
use crate::records::deal_record::encode_deal;
use crate::records::{InMemoryRecordService, DEAL_ENTITY};
use crate::utils::{now_utc, Timestamp};
use chrono::{Duration, NaiveDate};

/// A complete, valid draft named `name`: Acme Corp, 10 000, closing 2025-03-31.
#[must_use]
pub fn sample_draft(name: &str) -> DealDraft {
    DealDraft::new()
        .name(name)
        .company("Acme Corp")
        .value("10000")
        .expected_close_date("2025-03-31")
}

/// Builder for deals used directly, without going through a store.
///
/// Probability follows the stage unless set explicitly.
#[derive(Debug, Clone)]
pub struct DealFixture {
    deal: Deal,
    probability: Option<u8>,
}

impl DealFixture {
    /// A Lead deal with identifier `id`, valued 1 000.
    #[must_use]
    pub fn new(id: i64) -> Self {
        let now = now_utc();
        Self {
            deal: Deal {
                id: DealId::new(id),
                name: format!("Deal {id}"),
                company: "Acme Corp".to_string(),
                contact_id: None,
                contact_name: String::new(),
                value: 1_000.0,
                stage: DealStage::Lead,
                probability: DealStage::Lead.probability(),
                expected_close_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap_or_default(),
                description: String::new(),
                notes: String::new(),
                source: String::new(),
                tags: String::new(),
                created_at: now,
                last_activity_at: now,
            },
            probability: None,
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.deal.name = name.into();
        self
    }

    /// Sets the company.
    #[must_use]
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.deal.company = company.into();
        self
    }

    /// Sets the value.
    #[must_use]
    pub const fn value(mut self, value: f64) -> Self {
        self.deal.value = value;
        self
    }

    /// Sets the stage.
    #[must_use]
    pub const fn stage(mut self, stage: DealStage) -> Self {
        self.deal.stage = stage;
        self
    }

    /// Overrides the probability.
    #[must_use]
    pub const fn probability(mut self, probability: u8) -> Self {
        self.probability = Some(probability);
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.deal.source = source.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.deal.tags = tags.into();
        self
    }

    /// Sets both timestamps.
    #[must_use]
    pub const fn created_at(mut self, at: Timestamp) -> Self {
        self.deal.created_at = at;
        self.deal.last_activity_at = at;
        self
    }

    /// Backdates creation by `days`.
    #[must_use]
    pub fn created_days_ago(self, days: i64) -> Self {
        let at = now_utc() - Duration::days(days);
        self.created_at(at)
    }

    /// Builds the deal.
    #[must_use]
    pub fn build(self) -> Deal {
        let mut deal = self.deal;
        deal.probability = self.probability.unwrap_or_else(|| deal.stage.probability());
        deal
    }
}

/// Stores `deals` in `service` as deal records.
pub fn seed_deals(service: &InMemoryRecordService, deals: &[Deal]) {
    service.seed(DEAL_ENTITY, deals.iter().map(encode_deal).collect());
}
