use thiserror::Error;

/// Failures surfaced by the selection controller.
///
/// Engines never fail once a session has started; a session ends either by
/// resolving or by being cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("invalid selection input: {reason}")]
    InvalidInput { reason: String },
    #[error("a selection is already running")]
    AlreadyRunning,
    #[error("selection was cancelled before a winner was chosen")]
    Cancelled,
}

impl SelectionError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        SelectionError::InvalidInput {
            reason: reason.into(),
        }
    }
}
