//! Pipeline stages and the record of a finished job.

use crate::error::ErrorCategory;

/// Where a command is in its processing.
///
/// Stages only move forward; `Delivered` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Acknowledged,
    Validating,
    GeneratingSql,
    Executing,
    Formatting,
    Delivered,
    Failed(ErrorCategory),
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed(_))
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => f.write_str("received"),
            Self::Acknowledged => f.write_str("acknowledged"),
            Self::Validating => f.write_str("validating"),
            Self::GeneratingSql => f.write_str("generating_sql"),
            Self::Executing => f.write_str("executing"),
            Self::Formatting => f.write_str("formatting"),
            Self::Delivered => f.write_str("delivered"),
            Self::Failed(category) => write!(f, "failed({})", category),
        }
    }
}

/// Stages a job went through and the text it tried to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub stages: Vec<PipelineStage>,
    pub message: String,
}

impl PipelineOutcome {
    pub fn final_stage(&self) -> PipelineStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(PipelineStage::Received)
    }

    pub fn is_delivered(&self) -> bool {
        self.final_stage() == PipelineStage::Delivered
    }
}

/// Forward-only stage recorder used while a job runs.
#[derive(Debug)]
pub(crate) struct Progress {
    stages: Vec<PipelineStage>,
}

impl Progress {
    /// A job handed to the worker has already been received and acknowledged.
    pub(crate) fn acknowledged() -> Self {
        Self {
            stages: vec![PipelineStage::Received, PipelineStage::Acknowledged],
        }
    }

    pub(crate) fn advance(&mut self, stage: PipelineStage) {
        debug_assert!(!self.current().is_terminal());
        tracing::debug!(stage = %stage, "Pipeline stage");
        self.stages.push(stage);
    }

    pub(crate) fn current(&self) -> PipelineStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(PipelineStage::Received)
    }

    pub(crate) fn delivered(mut self, message: String) -> PipelineOutcome {
        self.advance(PipelineStage::Delivered);
        PipelineOutcome {
            stages: self.stages,
            message,
        }
    }

    pub(crate) fn failed(mut self, category: ErrorCategory, message: String) -> PipelineOutcome {
        self.advance(PipelineStage::Failed(category));
        PipelineOutcome {
            stages: self.stages,
            message,
        }
    }
}
