use crate::domain::messages::{ErrorCode, ErrorComponent, MessageType, ProtocolError, TransactionIds};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThreeDsError {
    #[error("no acquiring issuer service for range: {0}")]
    Routing(String),
    #[error("card range {start}-{end} overlaps active range with serial {serial} for {acs_id}")]
    Overlap {
        acs_id: String,
        start: String,
        end: String,
        serial: u64,
    },
    #[error("{0}")]
    OutOfState(String),
    #[error("mismatched {field}: expected {expected}, received {received}")]
    MismatchedIdentifier {
        field: &'static str,
        expected: String,
        received: String,
    },
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("timed out: {0}")]
    TimedOut(String),
    #[error("invalid serial number: {0}")]
    InvalidSerial(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    Protocol(Box<ProtocolError>),
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ThreeDsError {
    fn from(err: rocksdb::Error) -> Self {
        ThreeDsError::Storage(Box::new(err))
    }
}

impl From<ProtocolError> for ThreeDsError {
    fn from(err: ProtocolError) -> Self {
        ThreeDsError::Protocol(Box::new(err))
    }
}

impl ThreeDsError {
    /// EMV error code the failure is reported under.
    pub fn code(&self) -> ErrorCode {
        match self {
            ThreeDsError::Routing(_) => ErrorCode::TransactionDataNotValid,
            ThreeDsError::Overlap { .. } | ThreeDsError::Validation(_) => {
                ErrorCode::InvalidFormat
            }
            ThreeDsError::OutOfState(_) => ErrorCode::MessageReceivedInvalid,
            ThreeDsError::MismatchedIdentifier { .. } => ErrorCode::TransactionIdNotRecognised,
            ThreeDsError::UpstreamUnavailable(_) => ErrorCode::SystemConnectionFailure,
            ThreeDsError::TimedOut(_) => ErrorCode::TransactionTimedOut,
            ThreeDsError::InvalidSerial(_) => ErrorCode::SerialNumberNotValid,
            ThreeDsError::Protocol(err) => err.error_code,
            ThreeDsError::Storage(_)
            | ThreeDsError::Csv(_)
            | ThreeDsError::Io(_)
            | ThreeDsError::Json(_) => ErrorCode::TransientSystemFailure,
        }
    }

    /// Converts the error into a `ProtocolError` message tagged with the
    /// reporting role. A `Protocol` error keeps the tag of the role that
    /// raised it.
    pub fn reported_by(
        self,
        component: ErrorComponent,
        ids: TransactionIds,
        message_type: MessageType,
    ) -> ThreeDsError {
        if let ThreeDsError::Protocol(_) = self {
            return self;
        }
        let description = match &self {
            ThreeDsError::Routing(_) => "no acquiring issuer service for range".to_string(),
            other => other.code().description().to_string(),
        };
        ProtocolError::new(
            component,
            self.code(),
            description,
            self.to_string(),
            ids,
            Some(message_type),
        )
        .into()
    }

    /// Returns the protocol error message, if this error already is one.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            ThreeDsError::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ThreeDsError>;
