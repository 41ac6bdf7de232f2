use std::fmt;

/// Typed errors for queue construction and pool opt-in
#[derive(Debug, Clone)]
pub enum QueueError {
    /// Every queue-id slot in the process-wide table is taken
    RegistryFull,
    /// The node pool reservation could not be mapped
    PoolMapFailed(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::RegistryFull => {
                write!(f, "queue registry is full")
            }
            QueueError::PoolMapFailed(msg) => {
                write!(f, "node pool mapping failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for QueueError {}
