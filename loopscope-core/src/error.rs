use thiserror::Error;

/// All errors produced by loopscope-core.
#[derive(Debug, Error)]
pub enum LoopScopeError {
    #[error("loop resource not found: {id}")]
    MissingResource { id: String },

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot allocate a sample buffer of {frames} frames")]
    AllocationFailure { frames: usize },

    #[error("audio output could not be started: {0}")]
    EngineStartFailure(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoopScopeError {
    /// `true` for errors caused by the loop asset itself (missing or corrupt).
    ///
    /// These are permanent configuration errors; retrying will not help.
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            LoopScopeError::MissingResource { .. } | LoopScopeError::UnsupportedFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LoopScopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_errors_are_grouped() {
        assert!(LoopScopeError::MissingResource { id: "a.wav".into() }.is_resource_error());
        assert!(LoopScopeError::UnsupportedFormat("24ch".into()).is_resource_error());
        assert!(!LoopScopeError::EngineStartFailure("busy".into()).is_resource_error());
        assert!(!LoopScopeError::AllocationFailure { frames: 1 }.is_resource_error());
    }

    #[test]
    fn messages_name_the_cause() {
        let err = LoopScopeError::MissingResource {
            id: "Amen-break.wav".into(),
        };
        assert_eq!(err.to_string(), "loop resource not found: Amen-break.wav");
    }
}
