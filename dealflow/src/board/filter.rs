//! Client-side search, filtering and sorting of deal lists.

use crate::core::{Deal, DealStage};
use crate::records::SortDirection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Column a deal list can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Deal name.
    Name,
    /// Company name.
    Company,
    /// Monetary value.
    Value,
    /// Funnel stage.
    Stage,
    /// Win probability.
    Probability,
    /// Expected close date.
    ExpectedCloseDate,
    /// Creation time.
    CreatedAt,
}

impl SortKey {
    fn compare(self, a: &Deal, b: &Deal) -> Ordering {
        match self {
            Self::Name => cmp_text(&a.name, &b.name),
            Self::Company => cmp_text(&a.company, &b.company),
            Self::Value => a.value.total_cmp(&b.value),
            Self::Stage => a.stage.cmp(&b.stage),
            Self::Probability => a.probability.cmp(&b.probability),
            Self::ExpectedCloseDate => a.expected_close_date.cmp(&b.expected_close_date),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Active sort column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Column.
    pub key: SortKey,
    /// Direction.
    pub direction: SortDirection,
}

/// Search, filters and sort applied to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealQuery {
    /// Case-insensitive text matched against name, company, contact and tags.
    #[serde(default)]
    pub search: Option<String>,
    /// Only deals in this stage.
    #[serde(default)]
    pub stage: Option<DealStage>,
    /// Only deals from this source (case-insensitive).
    #[serde(default)]
    pub source: Option<String>,
    /// Sort order. `None` keeps snapshot order.
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

impl DealQuery {
    /// An empty query matching everything in snapshot order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the search text.
    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Restricts to one stage.
    #[must_use]
    pub const fn with_stage(mut self, stage: DealStage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Restricts to one source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sorts by `key` in `direction`.
    #[must_use]
    pub const fn sorted_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec { key, direction });
        self
    }

    /// Column-header click: the active column flips direction, another column starts ascending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        let direction = match self.sort {
            Some(spec) if spec.key == key => spec.direction.reversed(),
            _ => SortDirection::Asc,
        };
        self.sort = Some(SortSpec { key, direction });
    }

    /// Returns true if `deal` passes the search and filters.
    #[must_use]
    pub fn matches(&self, deal: &Deal) -> bool {
        if self.stage.is_some_and(|stage| deal.stage != stage) {
            return false;
        }
        if let Some(source) = self.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !deal.source.eq_ignore_ascii_case(source) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(text) => {
                let needle = text.to_lowercase();
                [&deal.name, &deal.company, &deal.contact_name]
                    .into_iter()
                    .any(|field| field.to_lowercase().contains(&needle))
                    || deal
                        .tag_list()
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle))
            }
        }
    }

    /// Matching deals, sorted. Ties keep snapshot order.
    #[must_use]
    pub fn apply<'a>(&self, deals: &'a [Deal]) -> Vec<&'a Deal> {
        let mut matched: Vec<&Deal> = deals.iter().filter(|d| self.matches(d)).collect();
        if let Some(SortSpec { key, direction }) = self.sort {
            matched.sort_by(|a, b| {
                let ord = key.compare(a, b);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        matched
    }
}
