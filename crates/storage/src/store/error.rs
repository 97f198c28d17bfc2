#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    EngineFailure,
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    NotFound(&'static str),
    Conflict,
    MissingStub {
        name: String,
    },
    UnsupportedSchema {
        found: i64,
        supported: i64,
    },
    ReadOnly,
    Closed,
    TransactionFinished,
    Internal(&'static str),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict => ErrorKind::Conflict,
            Self::InvalidInput(_)
            | Self::MissingStub { .. }
            | Self::UnsupportedSchema { .. }
            | Self::ReadOnly => ErrorKind::BadRequest,
            Self::Io(_)
            | Self::Sql(_)
            | Self::Json(_)
            | Self::Closed
            | Self::TransactionFinished
            | Self::Internal(_) => ErrorKind::EngineFailure,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQLITE",
            Self::Json(_) => "CORRUPT_JSON",
            Self::InvalidInput(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::MissingStub { .. } => "MISSING_STUB",
            Self::UnsupportedSchema { .. } => "UNSUPPORTED_SCHEMA",
            Self::ReadOnly => "READ_ONLY",
            Self::Closed => "CLOSED",
            Self::TransactionFinished => "TRANSACTION_FINISHED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Per-document failures are recorded in bulk results; everything else aborts the batch.
    pub fn is_per_document(&self) -> bool {
        self.kind() != ErrorKind::EngineFailure
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "stored json is invalid: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NotFound(reason) => write!(f, "not found: {reason}"),
            Self::Conflict => write!(f, "document update conflict"),
            Self::MissingStub { name } => {
                write!(f, "attachment stub has no stored content (name={name})")
            }
            Self::UnsupportedSchema { found, supported } => write!(
                f,
                "unsupported schema version (found={found}, supported={supported})"
            ),
            Self::ReadOnly => write!(f, "store was opened read-only"),
            Self::Closed => write!(f, "store is closed"),
            Self::TransactionFinished => {
                write!(f, "transaction was already committed or rolled back")
            }
            Self::Internal(message) => write!(f, "internal: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
