use thiserror::Error;

/// Errors raised by the approval state machine. All of them are recovered
/// at the call boundary and surfaced to the caller; none are retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflow configuration error: {0}")]
    Configuration(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("user `{user}` is not authorized: {reason}")]
    NotAuthorized { user: String, reason: String },
    #[error("validation failed: {0}")]
    Validation(String),
}

impl WorkflowError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "The validation circuit is not configured correctly. Contact an administrator."
            }
            Self::InvalidState(_) => {
                "This request is not in a state that allows the action. Reload and try again."
            }
            Self::NotAuthorized { .. } => "You are not allowed to act on this approval.",
            Self::Validation(_) => "The request could not be processed. Check inputs and try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkflowError;

    #[test]
    fn user_messages_never_leak_internals() {
        let error = WorkflowError::NotAuthorized {
            user: "u-intern".to_string(),
            reason: "approval assigned to u-director".to_string(),
        };
        assert!(!error.user_message().contains("u-director"));

        let error = WorkflowError::Configuration("circuit `CIR-X` has no levels".to_string());
        assert!(!error.user_message().contains("CIR-X"));
    }
}
