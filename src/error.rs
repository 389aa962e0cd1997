use thiserror::Error;

/// Outcome of a failed dict operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DictError {
    #[error("key already exists")]
    KeyExists,
    #[error("key not found")]
    KeyNotFound,
    #[error("resize rejected: {0}")]
    ResizeRejected(ResizeRejection),
}

/// Why `expand`/`resize` refused to allocate a new generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResizeRejection {
    #[error("a rehash is already in progress")]
    Rehashing,
    #[error("requested capacity {requested} is below the {used} live entries")]
    BelowUsed { requested: usize, used: usize },
    #[error("resizing is disabled")]
    Disabled,
    #[error("cannot allocate {buckets} buckets")]
    TooLarge { buckets: usize },
}

impl From<ResizeRejection> for DictError {
    fn from(r: ResizeRejection) -> Self {
        DictError::ResizeRejected(r)
    }
}
