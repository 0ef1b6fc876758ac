//! Partial-failure and warning records split by scope
//!
//! Merging is plain list concatenation per scope, so the order in which
//! concurrent workers report does not change the per-scope contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Messages reported at global, cluster, and per-namespace scope
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Results {
    /// Operator-level messages not tied to any resource
    #[serde(rename = "velero", default, skip_serializing_if = "Vec::is_empty")]
    pub global: Vec<String>,

    /// Messages about cluster-scoped resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster: Vec<String>,

    /// Messages keyed by namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespaces: BTreeMap<String, Vec<String>>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a namespace; an empty namespace means cluster scope
    pub fn add(&mut self, namespace: &str, message: impl ToString) {
        if namespace.is_empty() {
            self.add_cluster(message);
        } else {
            self.namespaces
                .entry(namespace.to_string())
                .or_default()
                .push(message.to_string());
        }
    }

    pub fn add_cluster(&mut self, message: impl ToString) {
        self.cluster.push(message.to_string());
    }

    pub fn add_global(&mut self, message: impl ToString) {
        self.global.push(message.to_string());
    }

    /// Append every message of `other` to the matching scope
    pub fn merge(&mut self, other: &Results) {
        self.global.extend(other.global.iter().cloned());
        self.cluster.extend(other.cluster.iter().cloned());
        for (namespace, messages) in &other.namespaces {
            self.namespaces
                .entry(namespace.clone())
                .or_default()
                .extend(messages.iter().cloned());
        }
    }

    /// Total number of messages across all scopes
    pub fn count(&self) -> usize {
        self.global.len()
            + self.cluster.len()
            + self.namespaces.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
