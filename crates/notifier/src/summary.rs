//! Per-dispatch grouping of device tokens by delivery classification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::gateway::{Classification, DeliveryOutcome};

/// Tag recorded when the recipient has no registered device tokens.
pub const NOT_EXIST_USER: &str = "NOT_EXIST_USER";

/// Classification tag → tokens that received it, in input order.
///
/// Serialized verbatim into `fcm_notifications.result`. Every token of a
/// dispatch lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSummary(BTreeMap<String, Vec<String>>);

impl ResultSummary {
    /// Group delivery outcomes by classification.
    ///
    /// The `SUCCESS` bucket is always present, even when empty, so readers of
    /// the stored result can tell "nothing succeeded" apart from "not sent".
    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        let mut buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        buckets.insert(Classification::Success.to_string(), Vec::new());

        for outcome in outcomes {
            buckets
                .entry(outcome.classification.to_string())
                .or_default()
                .push(outcome.token.clone());
        }

        Self(buckets)
    }

    /// `{ "NOT_EXIST_USER": [] }`
    pub fn not_exist_user() -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(NOT_EXIST_USER.to_string(), Vec::new());
        Self(buckets)
    }

    /// Every token classified `SEND_ERROR`; used when no credential could be issued.
    pub fn send_error(tokens: &[String]) -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(Classification::SendError.to_string(), tokens.to_vec());
        Self(buckets)
    }

    pub fn bucket(&self, tag: &str) -> Option<&[String]> {
        self.0.get(tag).map(Vec::as_slice)
    }

    /// All tokens across all buckets.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.values().flatten().map(String::as_str)
    }

    pub fn token_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }
}

impl From<BTreeMap<String, Vec<String>>> for ResultSummary {
    fn from(buckets: BTreeMap<String, Vec<String>>) -> Self {
        Self(buckets)
    }
}
