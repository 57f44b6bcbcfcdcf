use super::card_range::ProtocolVersion;
use super::messages::{
    AuthenticationResponse, ChallengeCancel, DeviceChannel, MessageCategory, TransStatus,
    TransactionIds,
};
use crate::error::{Result, ThreeDsError};
use serde::{Deserialize, Serialize};

/// What the issuer policy decides for an authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub trans_status: TransStatus,
    pub reason: Option<String>,
}

impl Decision {
    pub fn new(trans_status: TransStatus) -> Self {
        Self {
            trans_status,
            reason: None,
        }
    }

    pub fn with_reason(trans_status: TransStatus, reason: impl Into<String>) -> Self {
        Self {
            trans_status,
            reason: Some(reason.into()),
        }
    }
}

/// The issuer policy's judgement of one round of cardholder input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeVerdict {
    Verified,
    Retry,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Started,
    AwaitingCardholderInput,
    Completed,
    Cancelled,
    TimedOut,
    Declined,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed
                | SessionState::Cancelled
                | SessionState::TimedOut
                | SessionState::Declined
        )
    }
}

/// A challenge session that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOutcome {
    pub ids: TransactionIds,
    pub message_version: ProtocolVersion,
    pub message_category: MessageCategory,
    pub state: SessionState,
    pub rounds: u32,
    pub cancel: Option<ChallengeCancel>,
}

/// What the requesting application needs to start a challenge: the
/// transaction ids and where the issuer service expects the challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeContext {
    pub ids: TransactionIds,
    pub message_version: ProtocolVersion,
    pub device_channel: DeviceChannel,
    pub acs_url: Option<String>,
}

impl ChallengeContext {
    pub fn from_response(
        response: &AuthenticationResponse,
        device_channel: DeviceChannel,
    ) -> Result<Self> {
        if response.ids.acs.is_none() {
            return Err(ThreeDsError::Validation(
                "challenge response carries no acsTransID".to_string(),
            ));
        }
        Ok(Self {
            ids: response.ids,
            message_version: response.message_version,
            device_channel,
            acs_url: response.acs_url.clone(),
        })
    }
}

/// What the cardholder does with the challenge currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardholderAction {
    Submit(String),
    Resend,
    OobContinue,
    Cancel,
}

/// The terminal status handed back to the requesting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationOutcome {
    Authenticated,
    NotAuthenticated,
    Rejected,
    Unavailable,
}

impl From<TransStatus> for AuthenticationOutcome {
    fn from(status: TransStatus) -> Self {
        match status {
            // Attempts processing and informational outcomes are not declines.
            TransStatus::Authenticated | TransStatus::Attempted | TransStatus::InformationalOnly => {
                AuthenticationOutcome::Authenticated
            }
            TransStatus::NotAuthenticated | TransStatus::ChallengeRequired => {
                AuthenticationOutcome::NotAuthenticated
            }
            TransStatus::Rejected => AuthenticationOutcome::Rejected,
            TransStatus::Unavailable => AuthenticationOutcome::Unavailable,
        }
    }
}

/// The device client's view of a finished challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResult {
    pub ids: TransactionIds,
    pub trans_status: Option<TransStatus>,
    pub rounds: u32,
    pub cancelled: bool,
}
