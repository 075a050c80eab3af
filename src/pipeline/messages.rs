//! Requests and reports exchanged with the pipeline orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EnrichedPattern, FinishedProduct, QueueItem};

/// One idea to turn into products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub idea: String,
    /// Patterns to ask the generator for.
    pub patterns: u32,
    /// Publish each product to the storefront after creation.
    pub publish: bool,
}

/// An idea to stage in the work queue; `patterns` falls back to the queue default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRequest {
    pub idea: String,
    #[serde(default)]
    pub patterns: Option<u32>,
}

/// Where a pattern dropped out of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Render,
    Upload,
    Fulfillment,
    Publish,
    Persist,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Render => "render",
            Self::Upload => "upload",
            Self::Fulfillment => "fulfillment",
            Self::Publish => "publish",
            Self::Persist => "persist",
        })
    }
}

/// A pattern that did not become a finished product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFailure {
    pub pattern_id: Uuid,
    pub product_name: String,
    pub stage: FailureStage,
    pub error: String,
    /// Set when the product was created before the failing step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

/// Outcome of one run: finished products plus per-pattern failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamped folder the run's images were written to.
    pub run_folder: String,
    pub products: Vec<FinishedProduct>,
    pub failures: Vec<PatternFailure>,
}

impl RunReport {
    pub fn new(run_folder: impl Into<String>) -> Self {
        Self {
            run_folder: run_folder.into(),
            products: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub(crate) fn fail(
        &mut self,
        pattern: &EnrichedPattern,
        stage: FailureStage,
        error: impl std::fmt::Display,
        product_id: Option<String>,
    ) {
        let error = error.to_string();
        tracing::warn!(
            pattern_id = %pattern.id,
            %stage,
            error = %error,
            "pattern failed"
        );
        self.failures.push(PatternFailure {
            pattern_id: pattern.id,
            product_name: pattern.product_name.clone(),
            stage,
            error,
            product_id,
        });
    }

    /// True when every pattern produced a product.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of processing the next queued idea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueRun {
    /// Nothing was waiting.
    Empty,
    /// The claimed item and the run it produced.
    Processed { item: QueueItem, report: RunReport },
}
