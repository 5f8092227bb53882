use thiserror::Error;

#[derive(Debug, Error)]
pub enum TracelensError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("trace {trace_id} is empty after decoding")]
    EmptyTrace { trace_id: String },

    #[error("trace {trace_id}: aggregation invariant violated: group count {count} < parent count {parent_count}")]
    InvariantViolation {
        trace_id: String,
        count: usize,
        parent_count: usize,
    },

    #[error("storage error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, TracelensError>;
