use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Booking or spot absent.
    NotFound(Ulid),
    /// Wrong user, or the booking's dates make it immutable.
    Forbidden(&'static str),
    InvalidInput {
        field: &'static str,
        reason: &'static str,
    },
    /// Requested dates overlap an existing booking of the same spot.
    /// `existing` is known when the overlapping booking could be identified.
    Conflict { existing: Option<Ulid> },
    LimitExceeded(&'static str),
    Storage(String),
}

impl EngineError {
    /// Request fields the error is attributed to.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            EngineError::InvalidInput { field, .. } => match *field {
                "start_date" => &["start_date"],
                "end_date" => &["end_date"],
                _ => &[],
            },
            EngineError::Conflict { .. } => &["start_date", "end_date"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            EngineError::InvalidInput { field, reason } => write!(f, "invalid {field}: {reason}"),
            EngineError::Conflict { existing } => {
                write!(
                    f,
                    "spot is already booked for the specified dates: start_date and end_date conflict with "
                )?;
                match existing {
                    Some(id) => write!(f, "booking {id}"),
                    None => write!(f, "an existing booking"),
                }
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::Overlap(id) => EngineError::Conflict { existing: Some(id) },
            StoreError::Invalid(reason) => EngineError::InvalidInput {
                field: "request",
                reason,
            },
            StoreError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
            StoreError::Forbidden(msg) => EngineError::Forbidden(msg),
            other @ (StoreError::AlreadyExists(_)
            | StoreError::InUse(_)
            | StoreError::WalError(_)) => {
                EngineError::Storage(other.to_string())
            }
        }
    }
}
