//! The deal entity, its raw input form and validation.

use super::DealStage;
use crate::errors::ValidationError;
use crate::utils::{format_date, now_utc, parse_date, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Stable deal identifier.
///
/// Identifiers assigned by the record service are positive. Identifiers
/// synthesized locally while the service is unreachable are negative, so
/// the two never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(i64);

impl DealId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns true for identifiers synthesized locally.
    #[must_use]
    pub const fn is_local(self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for DealId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked sales opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    /// Immutable identifier.
    pub id: DealId,
    /// Deal title.
    pub name: String,
    /// Associated company name.
    pub company: String,
    /// Associated contact identifier.
    pub contact_id: Option<i64>,
    /// Associated contact display name.
    pub contact_name: String,
    /// Monetary value, never negative.
    pub value: f64,
    /// Current funnel stage.
    pub stage: DealStage,
    /// Win probability, 0-100.
    pub probability: u8,
    /// Expected close date.
    pub expected_close_date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Free-text notes.
    pub notes: String,
    /// Where the deal came from (referral, website, ...).
    pub source: String,
    /// Comma-separated tags.
    pub tags: String,
    /// When the deal was created.
    pub created_at: Timestamp,
    /// Last time the deal was touched.
    pub last_activity_at: Timestamp,
}

impl Deal {
    /// Builds a deal from validated fields, stamping both timestamps with `now`.
    #[must_use]
    pub fn from_fields(id: DealId, fields: DealFields, now: Timestamp) -> Self {
        Self {
            id,
            name: fields.name,
            company: fields.company,
            contact_id: fields.contact_id,
            contact_name: fields.contact_name,
            value: fields.value,
            stage: fields.stage,
            probability: fields.probability,
            expected_close_date: fields.expected_close_date,
            description: fields.description,
            notes: fields.notes,
            source: fields.source,
            tags: fields.tags,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Replaces every editable field. Identifier and creation time are kept.
    pub fn replace_fields(&mut self, fields: DealFields, now: Timestamp) {
        let id = self.id;
        let created_at = self.created_at;
        *self = Self::from_fields(id, fields, now);
        self.created_at = created_at;
    }

    /// Applies a stage change: stage, derived probability and activity time only.
    pub fn apply_stage_change(&mut self, change: &StageChange) {
        self.stage = change.stage;
        self.probability = change.probability;
        self.last_activity_at = change.at;
    }

    /// Returns true while the deal has not been won.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stage.is_open()
    }

    /// Returns true when the probability matches the stage mapping.
    #[must_use]
    pub const fn has_stage_probability(&self) -> bool {
        self.probability == self.stage.probability()
    }

    /// Value weighted by win probability.
    #[must_use]
    pub fn weighted_value(&self) -> f64 {
        self.value * f64::from(self.probability) / 100.0
    }

    /// The tag string split on commas, trimmed, empty entries dropped.
    #[must_use]
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// A partial update produced by a stage transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageChange {
    /// The new stage.
    pub stage: DealStage,
    /// Probability derived from the stage.
    pub probability: u8,
    /// Activity timestamp.
    pub at: Timestamp,
}

impl StageChange {
    /// A change to `stage` now, with the mapped probability.
    #[must_use]
    pub fn to(stage: DealStage) -> Self {
        Self::at(stage, now_utc())
    }

    /// A change to `stage` at a fixed time.
    #[must_use]
    pub const fn at(stage: DealStage, at: Timestamp) -> Self {
        Self {
            stage,
            probability: stage.probability(),
            at,
        }
    }
}

/// Validated, typed deal fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DealFields {
    /// Deal title.
    pub name: String,
    /// Company name.
    pub company: String,
    /// Contact identifier.
    pub contact_id: Option<i64>,
    /// Contact display name.
    pub contact_name: String,
    /// Non-negative value.
    pub value: f64,
    /// Funnel stage.
    pub stage: DealStage,
    /// Win probability, 0-100.
    pub probability: u8,
    /// Expected close date.
    pub expected_close_date: NaiveDate,
    /// Description.
    pub description: String,
    /// Notes.
    pub notes: String,
    /// Source tag.
    pub source: String,
    /// Comma-separated tags.
    pub tags: String,
}

/// Raw deal input as it arrives from a form.
///
/// Every field is optional text; numbers may also arrive as JSON numbers.
/// Unknown fields are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DealDraft {
    /// Deal title (required).
    #[serde(default, deserialize_with = "text_or_number")]
    pub name: Option<String>,
    /// Company name (required).
    #[serde(default, deserialize_with = "text_or_number")]
    pub company: Option<String>,
    /// Contact identifier.
    #[serde(default, deserialize_with = "text_or_number")]
    pub contact_id: Option<String>,
    /// Contact display name.
    #[serde(default, deserialize_with = "text_or_number")]
    pub contact_name: Option<String>,
    /// Monetary value (required).
    #[serde(default, deserialize_with = "text_or_number")]
    pub value: Option<String>,
    /// Stage label, defaults to Lead.
    #[serde(default, deserialize_with = "text_or_number")]
    pub stage: Option<String>,
    /// Probability override, defaults to the stage mapping.
    #[serde(default, deserialize_with = "text_or_number")]
    pub probability: Option<String>,
    /// Expected close date (required).
    #[serde(default, deserialize_with = "text_or_number")]
    pub expected_close_date: Option<String>,
    /// Description.
    #[serde(default, deserialize_with = "text_or_number")]
    pub description: Option<String>,
    /// Notes.
    #[serde(default, deserialize_with = "text_or_number")]
    pub notes: Option<String>,
    /// Source tag.
    #[serde(default, deserialize_with = "text_or_number")]
    pub source: Option<String>,
    /// Comma-separated tags.
    #[serde(default, deserialize_with = "text_or_number")]
    pub tags: Option<String>,
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!("expected text or number, got {other}"))),
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl DealDraft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the company.
    #[must_use]
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Sets the contact.
    #[must_use]
    pub fn contact(mut self, id: i64, name: impl Into<String>) -> Self {
        self.contact_id = Some(id.to_string());
        self.contact_name = Some(name.into());
        self
    }

    /// Sets the value.
    #[must_use]
    pub fn value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Sets the stage.
    #[must_use]
    pub fn stage(mut self, stage: impl ToString) -> Self {
        self.stage = Some(stage.to_string());
        self
    }

    /// Overrides the probability.
    #[must_use]
    pub fn probability(mut self, probability: impl ToString) -> Self {
        self.probability = Some(probability.to_string());
        self
    }

    /// Sets the expected close date.
    #[must_use]
    pub fn expected_close_date(mut self, date: impl Into<String>) -> Self {
        self.expected_close_date = Some(date.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the notes.
    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Checks every field and converts the draft into typed fields.
    ///
    /// Name, company, value and expected close date are required. All
    /// failing fields are reported together.
    pub fn validate(&self) -> Result<DealFields, ValidationError> {
        let mut errors = ValidationError::new();

        let name = non_blank(self.name.as_ref());
        if name.is_none() {
            errors.push("name", "is required");
        }

        let company = non_blank(self.company.as_ref());
        if company.is_none() {
            errors.push("company", "is required");
        }

        let value = match non_blank(self.value.as_ref()) {
            None => {
                errors.push("value", "is required");
                None
            }
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
                _ => {
                    errors.push("value", format!("must be a non-negative number, got '{raw}'"));
                    None
                }
            },
        };

        let expected_close_date = match non_blank(self.expected_close_date.as_ref()) {
            None => {
                errors.push("expected_close_date", "is required");
                None
            }
            Some(raw) => match parse_date(raw) {
                Ok(date) => Some(date),
                Err(err) => {
                    errors.push("expected_close_date", err.to_string());
                    None
                }
            },
        };

        let stage = match non_blank(self.stage.as_ref()) {
            None => DealStage::default(),
            Some(raw) => raw.parse::<DealStage>().unwrap_or_else(|err| {
                errors.push("stage", err.to_string());
                DealStage::default()
            }),
        };

        let probability = match non_blank(self.probability.as_ref()) {
            None => stage.probability(),
            Some(raw) => parse_probability(raw).unwrap_or_else(|| {
                errors.push("probability", format!("must be between 0 and 100, got '{raw}'"));
                stage.probability()
            }),
        };

        let contact_id = match non_blank(self.contact_id.as_ref()) {
            None => None,
            Some(raw) => raw.parse::<i64>().map_or_else(
                |_| {
                    errors.push("contact_id", format!("must be an integer, got '{raw}'"));
                    None
                },
                Some,
            ),
        };

        match (name, company, value, expected_close_date) {
            (Some(name), Some(company), Some(value), Some(expected_close_date))
                if errors.is_empty() =>
            {
                Ok(DealFields {
                    name: name.to_string(),
                    company: company.to_string(),
                    contact_id,
                    contact_name: self.contact_name.clone().unwrap_or_default(),
                    value,
                    stage,
                    probability,
                    expected_close_date,
                    description: self.description.clone().unwrap_or_default(),
                    notes: self.notes.clone().unwrap_or_default(),
                    source: self.source.clone().unwrap_or_default(),
                    tags: self.tags.clone().unwrap_or_default(),
                })
            }
            _ => Err(errors),
        }
    }
}

fn parse_probability(raw: &str) -> Option<u8> {
    raw.parse::<f64>().ok().and_then(probability_from_f64)
}

/// Rounds a percentage to a probability, `None` outside 0-100.
pub(crate) fn probability_from_f64(value: f64) -> Option<u8> {
    if !(0.0..=100.0).contains(&value) {
        return None;
    }
    // In range, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let probability = value.round() as u8;
    Some(probability)
}

impl From<&Deal> for DealDraft {
    fn from(deal: &Deal) -> Self {
        Self {
            name: Some(deal.name.clone()),
            company: Some(deal.company.clone()),
            contact_id: deal.contact_id.map(|id| id.to_string()),
            contact_name: Some(deal.contact_name.clone()),
            value: Some(deal.value.to_string()),
            stage: Some(deal.stage.label().to_string()),
            probability: Some(deal.probability.to_string()),
            expected_close_date: Some(format_date(deal.expected_close_date)),
            description: Some(deal.description.clone()),
            notes: Some(deal.notes.clone()),
            source: Some(deal.source.clone()),
            tags: Some(deal.tags.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn complete_draft() -> DealDraft {
        DealDraft::new()
            .name("Enterprise licence")
            .company("Acme Corp")
            .value("25000")
            .expected_close_date("2024-06-30")
    }

    #[test]
    fn test_validate_applies_defaults() {
        let fields = complete_draft().validate().unwrap();

        assert_eq!(fields.stage, DealStage::Lead);
        assert_eq!(fields.probability, 20);
        assert_eq!(fields.value, 25000.0);
        assert_eq!(fields.source, "");
        assert_eq!(fields.contact_id, None);
    }

    #[test]
    fn test_validate_missing_value() {
        let mut draft = complete_draft();
        draft.value = None;

        let err = draft.validate().unwrap_err();
        assert!(err.has_field("value"));
        assert_eq!(err.errors.len(), 1);
    }

    #[test]
    fn test_validate_reports_all_missing_fields() {
        let err = DealDraft::new().validate().unwrap_err();
        let fields: Vec<&str> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "company", "value", "expected_close_date"]);
    }

    #[test]
    fn test_validate_rejects_malformed_value() {
        for raw in ["abc", "-5", "NaN", "inf"] {
            let err = complete_draft().value(raw).validate().unwrap_err();
            assert!(err.has_field("value"), "'{raw}' should be rejected");
        }
        assert!(complete_draft().value("0").validate().is_ok());
    }

    #[test]
    fn test_validate_stage_and_probability() {
        let fields = complete_draft().stage("Negotiation").validate().unwrap();
        assert_eq!(fields.probability, 80);

        let fields = complete_draft()
            .stage("Negotiation")
            .probability("55")
            .validate()
            .unwrap();
        assert_eq!(fields.probability, 55);

        let err = complete_draft().stage("Lost").validate().unwrap_err();
        assert!(err.has_field("stage"));

        let err = complete_draft().probability("150").validate().unwrap_err();
        assert!(err.has_field("probability"));
    }

    #[test]
    fn test_validate_contact_id() {
        let fields = complete_draft().contact(12, "Jane Doe").validate().unwrap();
        assert_eq!(fields.contact_id, Some(12));
        assert_eq!(fields.contact_name, "Jane Doe");

        let mut draft = complete_draft();
        draft.contact_id = Some("twelve".to_string());
        assert!(draft.validate().unwrap_err().has_field("contact_id"));
    }

    #[test]
    fn test_draft_deserialize_accepts_numbers() {
        let draft: DealDraft = serde_json::from_value(serde_json::json!({
            "name": "Renewal",
            "company": "Globex",
            "value": 1200.5,
            "contact_id": 3,
            "expected_close_date": "2024-09-01"
        }))
        .unwrap();

        let fields = draft.validate().unwrap();
        assert_eq!(fields.value, 1200.5);
        assert_eq!(fields.contact_id, Some(3));
    }

    #[test]
    fn test_draft_rejects_unknown_fields() {
        let result = serde_json::from_value::<DealDraft>(serde_json::json!({
            "name": "Renewal",
            "value_c": 10
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_change_derives_probability() {
        let change = StageChange::to(DealStage::Proposal);
        assert_eq!(change.probability, 65);
    }

    #[test]
    fn test_replace_fields_keeps_identity() {
        let created = now_utc();
        let mut deal = Deal::from_fields(DealId::new(5), complete_draft().validate().unwrap(), created);

        let later = created + chrono::Duration::minutes(5);
        let fields = complete_draft().name("Renamed").validate().unwrap();
        deal.replace_fields(fields, later);

        assert_eq!(deal.id, DealId::new(5));
        assert_eq!(deal.name, "Renamed");
        assert_eq!(deal.created_at, created);
        assert_eq!(deal.last_activity_at, later);
    }

    #[test]
    fn test_draft_from_deal_round_trips_fields() {
        let fields = complete_draft()
            .stage("Proposal")
            .tags("enterprise, q3")
            .validate()
            .unwrap();
        let deal = Deal::from_fields(DealId::new(1), fields.clone(), now_utc());

        assert_eq!(DealDraft::from(&deal).validate().unwrap(), fields);
    }

    #[test]
    fn test_tag_list_and_weighted_value() {
        let fields = complete_draft()
            .stage("Proposal")
            .tags(" enterprise, ,q3 ")
            .validate()
            .unwrap();
        let deal = Deal::from_fields(DealId::new(1), fields, now_utc());

        assert_eq!(deal.tag_list(), vec!["enterprise", "q3"]);
        assert!((deal.weighted_value() - 16250.0).abs() < f64::EPSILON);
        assert!(deal.has_stage_probability());
    }

    #[test]
    fn test_local_ids() {
        assert!(DealId::new(-3).is_local());
        assert!(!DealId::new(3).is_local());
    }
}
