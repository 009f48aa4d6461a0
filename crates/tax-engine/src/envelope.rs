//! The result envelope every tax service call returns.

use serde::Serialize;

use tax_client::TransportError;

use crate::error::TaxError;
use crate::reconciler::ReconciliationSummary;

/// Coarse failure category callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ErrorCategory {
    Transport { retryable: bool },
    Validation,
    Consistency,
    Persistence,
}

/// What a caller should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Retry the same call; the document code keeps it idempotent.
    Retry,
    /// Give up on remote tax for this attempt and fall back.
    Abort,
    /// Adjustments may be wrong; a person should look.
    ManualReview,
}

impl TaxError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            // A body that does not parse is a malformed document, not a
            // network failure.
            TaxError::Transport(TransportError::Decode { .. }) => ErrorCategory::Validation,
            TaxError::Transport(e) => ErrorCategory::Transport {
                retryable: e.is_retryable(),
            },
            TaxError::Validation(_) | TaxError::TransactionClosed { .. } | TaxError::NotRegistered(_) => {
                ErrorCategory::Validation
            }
            TaxError::Consistency { .. } => ErrorCategory::Consistency,
            TaxError::Persistence(_) => ErrorCategory::Persistence,
        }
    }

    pub fn recommended_action(&self) -> RecommendedAction {
        match self.category() {
            ErrorCategory::Transport { retryable: true } => RecommendedAction::Retry,
            ErrorCategory::Transport { retryable: false } | ErrorCategory::Validation => {
                RecommendedAction::Abort
            }
            ErrorCategory::Consistency | ErrorCategory::Persistence => {
                RecommendedAction::ManualReview
            }
        }
    }
}

/// Outcome of a tax service call.
///
/// `Bypassed` means the service is disabled and did nothing; the host's
/// default tax behaviour applies.
#[derive(Debug)]
pub enum TaxResult<T = ReconciliationSummary> {
    Applied(T),
    Bypassed,
    Failed(TaxError),
}

impl<T> TaxResult<T> {
    pub fn success(&self) -> bool {
        !matches!(self, TaxResult::Failed(_))
    }

    pub fn is_bypassed(&self) -> bool {
        matches!(self, TaxResult::Bypassed)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            TaxResult::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaxError> {
        match self {
            TaxResult::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.error().map(TaxError::category)
    }

    pub fn recommended_action(&self) -> Option<RecommendedAction> {
        self.error().map(TaxError::recommended_action)
    }

    pub fn into_result(self) -> Result<Option<T>, TaxError> {
        match self {
            TaxResult::Applied(value) => Ok(Some(value)),
            TaxResult::Bypassed => Ok(None),
            TaxResult::Failed(error) => Err(error),
        }
    }
}

impl TaxResult<ReconciliationSummary> {
    /// The reconciliation summary, also available for consistency failures
    /// whose adjustments were applied.
    pub fn summary(&self) -> Option<&ReconciliationSummary> {
        match self {
            TaxResult::Applied(summary) => Some(summary),
            TaxResult::Failed(TaxError::Consistency { summary, .. }) => Some(&**summary),
            _ => None,
        }
    }
}

impl<T> From<Result<T, TaxError>> for TaxResult<T> {
    fn from(result: Result<T, TaxError>) -> Self {
        match result {
            Ok(value) => TaxResult::Applied(value),
            Err(error) => TaxResult::Failed(error),
        }
    }
}
