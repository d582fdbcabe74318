//! Stage transition table.
//!
//! The funnel order is a suggested visual order, not a gate. The default
//! policy allows every stage to reach every other stage, including moving a
//! won deal back into the open funnel. Restrictive policies can be built
//! explicitly so the rules live in one place.

use super::DealStage;
use std::collections::{HashMap, HashSet};

/// Map from a stage to the set of stages a deal may move to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPolicy {
    allowed: HashMap<DealStage, HashSet<DealStage>>,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::any_to_any()
    }
}

impl TransitionPolicy {
    /// Every stage may move to every stage.
    #[must_use]
    pub fn any_to_any() -> Self {
        let all: HashSet<DealStage> = DealStage::ALL.into_iter().collect();
        Self {
            allowed: DealStage::ALL
                .into_iter()
                .map(|stage| (stage, all.clone()))
                .collect(),
        }
    }

    /// A policy with no transitions at all; build it up with [`allow`](Self::allow).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            allowed: HashMap::new(),
        }
    }

    /// Deals may stay put or advance; they never move backwards.
    #[must_use]
    pub fn forward_only() -> Self {
        let mut policy = Self::empty();
        for from in DealStage::ALL {
            for to in DealStage::ALL.into_iter().filter(|to| *to >= from) {
                policy = policy.allow(from, to);
            }
        }
        policy
    }

    /// Adds a permitted transition.
    #[must_use]
    pub fn allow(mut self, from: DealStage, to: DealStage) -> Self {
        self.allowed.entry(from).or_default().insert(to);
        self
    }

    /// Removes a permitted transition.
    #[must_use]
    pub fn deny(mut self, from: DealStage, to: DealStage) -> Self {
        if let Some(targets) = self.allowed.get_mut(&from) {
            targets.remove(&to);
        }
        self
    }

    /// Returns true if a deal in `from` may move to `to`.
    #[must_use]
    pub fn allows(&self, from: DealStage, to: DealStage) -> bool {
        self.allowed
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Stages reachable from `from`, in funnel order.
    #[must_use]
    pub fn targets(&self, from: DealStage) -> Vec<DealStage> {
        DealStage::ALL
            .into_iter()
            .filter(|to| self.allows(from, *to))
            .collect()
    }
}
