//! Codec between [`Deal`] and the record service's field maps.
//!
//! Field names follow a single snake_case scheme. Records carrying fields
//! outside that scheme are rejected rather than passed through.

use super::{Record, RecordId};
use crate::core::{probability_from_f64, Deal, DealFields, DealId, DealStage, StageChange};
use crate::errors::{DealflowError, Result};
use crate::utils::{format_date, parse_date, Timestamp};
use serde::{Deserialize, Serialize};

/// Entity name of deals in the record service.
pub const DEAL_ENTITY: &str = "deal";

/// Every field of a deal record.
pub const DEAL_FIELDS: [&str; 15] = [
    "id",
    "name",
    "company",
    "contact_id",
    "contact_name",
    "value",
    "stage",
    "probability",
    "expected_close_date",
    "description",
    "notes",
    "source",
    "tags",
    "created_at",
    "last_activity_at",
];

/// The field list requested on every fetch.
#[must_use]
pub fn deal_fields() -> Vec<String> {
    DEAL_FIELDS.iter().map(ToString::to_string).collect()
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DealRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contact_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stage: Option<DealStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_close_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_activity_at: Option<Timestamp>,
}

impl DealRecord {
    fn from_fields(fields: &DealFields) -> Self {
        Self {
            name: Some(fields.name.clone()),
            company: Some(fields.company.clone()),
            contact_id: fields.contact_id,
            contact_name: Some(fields.contact_name.clone()),
            value: Some(fields.value),
            stage: Some(fields.stage),
            probability: Some(f64::from(fields.probability)),
            expected_close_date: Some(format_date(fields.expected_close_date)),
            description: Some(fields.description.clone()),
            notes: Some(fields.notes.clone()),
            source: Some(fields.source.clone()),
            tags: Some(fields.tags.clone()),
            ..Self::default()
        }
    }

    fn into_record(self) -> Record {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct of plain options always serializes to an object.
            _ => Record::new(),
        }
    }

    fn from_record(record: Record) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(record))
            .map_err(|e| DealflowError::Decode(e.to_string()))
    }

    fn into_deal(self) -> Result<Deal> {
        fn required<T>(value: Option<T>, field: &str) -> Result<T> {
            value.ok_or_else(|| DealflowError::Decode(format!("missing field '{field}'")))
        }

        let id = required(self.id, "id")?;
        let value = required(self.value, "value")?;
        if !value.is_finite() || value < 0.0 {
            return Err(DealflowError::Decode(format!(
                "deal {id}: value must be non-negative, got {value}"
            )));
        }

        let stage = self.stage.unwrap_or_default();
        let probability = match self.probability {
            None => stage.probability(),
            Some(p) => probability_from_f64(p).ok_or_else(|| {
                DealflowError::Decode(format!("deal {id}: probability out of range: {p}"))
            })?,
        };

        let raw_date = required(self.expected_close_date, "expected_close_date")?;
        let expected_close_date =
            parse_date(&raw_date).map_err(|e| DealflowError::Decode(format!("deal {id}: {e}")))?;
        let created_at = required(self.created_at, "created_at")?;

        Ok(Deal {
            id: DealId::new(id),
            name: required(self.name, "name")?,
            company: required(self.company, "company")?,
            contact_id: self.contact_id,
            contact_name: self.contact_name.unwrap_or_default(),
            value,
            stage,
            probability,
            expected_close_date,
            description: self.description.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            created_at,
            last_activity_at: self.last_activity_at.unwrap_or(created_at),
        })
    }
}

/// Encodes a complete deal.
#[must_use]
pub fn encode_deal(deal: &Deal) -> Record {
    let fields = DealFields {
        name: deal.name.clone(),
        company: deal.company.clone(),
        contact_id: deal.contact_id,
        contact_name: deal.contact_name.clone(),
        value: deal.value,
        stage: deal.stage,
        probability: deal.probability,
        expected_close_date: deal.expected_close_date,
        description: deal.description.clone(),
        notes: deal.notes.clone(),
        source: deal.source.clone(),
        tags: deal.tags.clone(),
    };
    DealRecord {
        id: Some(deal.id.get()),
        created_at: Some(deal.created_at),
        last_activity_at: Some(deal.last_activity_at),
        ..DealRecord::from_fields(&fields)
    }
    .into_record()
}

/// Encodes a new deal for creation. The service assigns the identifier.
#[must_use]
pub fn encode_new(fields: &DealFields, now: Timestamp) -> Record {
    DealRecord {
        created_at: Some(now),
        last_activity_at: Some(now),
        ..DealRecord::from_fields(fields)
    }
    .into_record()
}

/// Encodes a full-field replacement. Creation time is not sent.
#[must_use]
pub fn encode_update(id: DealId, fields: &DealFields, now: Timestamp) -> Record {
    DealRecord {
        id: Some(id.get()),
        last_activity_at: Some(now),
        ..DealRecord::from_fields(fields)
    }
    .into_record()
}

/// Encodes the partial update of a stage transition.
#[must_use]
pub fn encode_stage_change(id: DealId, change: &StageChange) -> Record {
    DealRecord {
        id: Some(id.get()),
        stage: Some(change.stage),
        probability: Some(f64::from(change.probability)),
        last_activity_at: Some(change.at),
        ..DealRecord::default()
    }
    .into_record()
}

/// Decodes a complete deal record.
pub fn decode_deal(record: Record) -> Result<Deal> {
    DealRecord::from_record(record)?.into_deal()
}

/// Overlays a possibly partial record onto `base` and decodes the result.
pub fn merge_deal(base: &Deal, partial: Record) -> Result<Deal> {
    let mut merged = encode_deal(base);
    merged.extend(partial);
    decode_deal(merged)
}
