//! Run bookkeeping: the in-flight request and the last visible output.

use frames::Language;

use crate::net::types::{ExecuteRequest, ExecutionResult};

/// Where the most recent run stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Succeeded,
    Failed,
}

/// A run that has been requested but not yet answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingExecution {
    /// Monotonic per session; completions carrying another seq are stale.
    pub seq: u64,
    pub code: String,
    pub language: Language,
}

impl PendingExecution {
    #[must_use]
    pub fn request(&self) -> ExecuteRequest {
        ExecuteRequest { code: self.code.clone(), language: self.language }
    }
}

/// Output of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub seq: u64,
    pub language: Language,
    pub result: ExecutionResult,
}

/// Kind of one console line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Log,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLine<'a> {
    pub kind: LineKind,
    pub text: &'a str,
}

impl ExecutionOutput {
    /// Record `outcome` for `pending`. A failed call becomes a failed result.
    #[must_use]
    pub fn complete(pending: PendingExecution, outcome: Result<ExecutionResult, String>) -> Self {
        let result = outcome.unwrap_or_else(ExecutionResult::fault);
        Self { seq: pending.seq, language: pending.language, result }
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        if self.result.success { RunStatus::Succeeded } else { RunStatus::Failed }
    }

    /// Console lines: stdout first, then error text.
    #[must_use]
    pub fn lines(&self) -> Vec<OutputLine<'_>> {
        let log = self.result.output.lines().map(|text| OutputLine { kind: LineKind::Log, text });
        let error = self
            .result
            .error
            .as_deref()
            .into_iter()
            .flat_map(str::lines)
            .map(|text| OutputLine { kind: LineKind::Error, text });
        log.chain(error).collect()
    }
}

#[cfg(test)]
#[path = "execution_test.rs"]
mod tests;
