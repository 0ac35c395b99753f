use ulid::Ulid;

#[derive(Debug)]
pub enum StoreError {
    NotFound(Ulid),
    AlreadyExists(String),
    /// Storage-level backstop: the range overlaps this existing booking.
    Overlap(Ulid),
    Invalid(&'static str),
    /// The requester does not own the spot or review.
    Forbidden(&'static str),
    /// Other records still depend on the one being removed.
    InUse(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::AlreadyExists(key) => write!(f, "already exists: {key}"),
            StoreError::Overlap(id) => write!(f, "overlaps booking: {id}"),
            StoreError::Invalid(msg) => write!(f, "invalid: {msg}"),
            StoreError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            StoreError::InUse(msg) => write!(f, "in use: {msg}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
