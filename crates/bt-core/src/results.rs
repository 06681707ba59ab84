//! Results of one project across every target framework it was built for.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::result::AnalyzerResult;
use crate::types::BuildStatus;

/// Per-target-framework results for a single project file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyzerResults {
    results: BTreeMap<String, AnalyzerResult>,
    overall_success: BuildStatus,
    #[serde(skip)]
    batches: usize,
}

impl AnalyzerResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a batch from one build. A later result for the same target
    /// framework replaces the earlier one; the overall status is the
    /// conjunction of every batch status, so a batch of unknown outcome keeps
    /// it from reading as succeeded.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = AnalyzerResult>, success: BuildStatus) {
        for result in batch {
            let target_framework = result.key().target_framework.clone();
            if self.results.insert(target_framework.clone(), result).is_some() {
                tracing::debug!(%target_framework, "replacing earlier result");
            }
        }
        self.overall_success = if self.batches == 0 {
            success
        } else {
            self.overall_success.and(success)
        };
        self.batches += 1;
    }

    pub fn get(&self, target_framework: &str) -> Option<&AnalyzerResult> {
        self.results.get(target_framework)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalyzerResult> {
        self.results.values()
    }

    pub fn target_frameworks(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub const fn overall_success(&self) -> BuildStatus {
        self.overall_success
    }
}

impl<'a> IntoIterator for &'a AnalyzerResults {
    type Item = &'a AnalyzerResult;
    type IntoIter = std::collections::btree_map::Values<'a, String, AnalyzerResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.values()
    }
}
