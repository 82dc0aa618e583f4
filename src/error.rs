use thiserror::Error;

/// Failure to issue a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InsertError {
    /// The counter reached the largest value of the handle type. The table
    /// never wraps around, so no further handles can be issued.
    #[error("handle space exhausted; no further handles can be issued")]
    Exhausted,
}
