//! Scheduler error types

use thiserror::Error;

/// Errors that can surface out of a tick
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A queue group reached execution with no handler bound. Handlers are
    /// resolved lazily, so this surfaces on the first attempt to run an item,
    /// not at enqueue time.
    #[error("no handler registered for queue group '{key}'")]
    MissingHandler { key: String },

    /// A handler invocation failed. The item was dequeued before the call
    /// and is lost; the core never retries.
    #[error("handler failed for queue group '{key}'")]
    Handler {
        key: String,
        #[source]
        source: eyre::Report,
    },
}

impl SchedulerError {
    /// Check if this is a configuration error (fixable by registering a handler)
    pub fn is_configuration(&self) -> bool {
        matches!(self, SchedulerError::MissingHandler { .. })
    }

    /// The key of the queue group the error came from
    pub fn key(&self) -> &str {
        match self {
            SchedulerError::MissingHandler { key } => key,
            SchedulerError::Handler { key, .. } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configuration() {
        let err = SchedulerError::MissingHandler { key: "a".to_string() };
        assert!(err.is_configuration());

        let err = SchedulerError::Handler {
            key: "b".to_string(),
            source: eyre::eyre!("boom"),
        };
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_key_accessor() {
        let err = SchedulerError::MissingHandler { key: "orders".to_string() };
        assert_eq!(err.key(), "orders");
    }

    #[test]
    fn test_display_names_group() {
        let err = SchedulerError::Handler {
            key: "orders".to_string(),
            source: eyre::eyre!("boom"),
        };
        assert_eq!(err.to_string(), "handler failed for queue group 'orders'");
    }
}
