//! Default issuer policies. Real deployments plug their own risk engine in
//! through [`IssuerPolicy`]; these cover the CLI and tests.

use crate::domain::card_range::ProtocolVersion;
use crate::domain::messages::{
    AuthenticationRequest, ChallengeIndicator, ChallengeRequest, MessageCategory, TransStatus,
};
use crate::domain::outcome::{ChallengeVerdict, Decision, SessionState};
use crate::domain::ports::{ChallengeOutcomePolicy, IssuerPolicy};
use rust_decimal::Decimal;

/// Transaction status reason codes used by the default policy.
pub mod reason {
    pub const INVALID_TRANSACTION: &str = "07";
    pub const LOW_CONFIDENCE: &str = "15";
    pub const NON_PAYMENT_NOT_SUPPORTED: &str = "20";
}

/// Frictionless below an amount limit, challenge above it or whenever the
/// requestor asks for one. Challenges are verified against a one-time code.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    pub frictionless_limit: Decimal,
    pub one_time_code: String,
    pub allow_non_payment: bool,
    /// Whether the out-of-band authenticator has confirmed the cardholder.
    /// Until it has, an `oobContinue` request only retries.
    pub oob_approved: bool,
    /// Message versions the issuer accepts; anything else is rejected.
    pub versions: (ProtocolVersion, ProtocolVersion),
}

impl ThresholdPolicy {
    pub fn new(frictionless_limit: Decimal, one_time_code: impl Into<String>) -> Self {
        Self {
            frictionless_limit,
            one_time_code: one_time_code.into(),
            allow_non_payment: true,
            oob_approved: false,
            versions: (ProtocolVersion::new(2, 1, 0), ProtocolVersion::new(2, 2, 0)),
        }
    }

    /// Accepts `oobContinue` requests as verified.
    pub fn with_oob_approval(mut self) -> Self {
        self.oob_approved = true;
        self
    }

    /// Purchase amount in major units, from the minor-unit wire fields.
    fn purchase_amount(request: &AuthenticationRequest) -> Option<Decimal> {
        let minor: i64 = request.purchase_amount.as_deref()?.parse().ok()?;
        let exponent: u32 = request.purchase_exponent.as_deref()?.parse().ok()?;
        if minor < 0 || exponent > 28 {
            return None;
        }
        Some(Decimal::new(minor, exponent))
    }
}

impl IssuerPolicy for ThresholdPolicy {
    fn decide(&self, request: &AuthenticationRequest) -> Decision {
        let (oldest, newest) = self.versions;
        if request.message_version < oldest || request.message_version > newest {
            return Decision::with_reason(TransStatus::Rejected, reason::INVALID_TRANSACTION);
        }
        if request.challenge_ind == Some(ChallengeIndicator::ChallengeMandated) {
            return Decision::new(TransStatus::ChallengeRequired);
        }

        match request.message_category {
            MessageCategory::NonPayment if !self.allow_non_payment => {
                Decision::with_reason(TransStatus::Rejected, reason::NON_PAYMENT_NOT_SUPPORTED)
            }
            MessageCategory::NonPayment => Decision::new(TransStatus::Authenticated),
            MessageCategory::Payment => {
                let Some(amount) = Self::purchase_amount(request) else {
                    return Decision::with_reason(
                        TransStatus::Rejected,
                        reason::INVALID_TRANSACTION,
                    );
                };
                if request.challenge_ind == Some(ChallengeIndicator::ChallengeRequested)
                    || amount > self.frictionless_limit
                {
                    Decision::with_reason(TransStatus::ChallengeRequired, reason::LOW_CONFIDENCE)
                } else {
                    Decision::new(TransStatus::Authenticated)
                }
            }
        }
    }

    fn verify(&self, request: &ChallengeRequest, _round: u32) -> ChallengeVerdict {
        if request.oob_continue == Some(true) {
            return if self.oob_approved {
                ChallengeVerdict::Verified
            } else {
                ChallengeVerdict::Retry
            };
        }
        let entry = request
            .challenge_data_entry
            .as_deref()
            .or(request.challenge_html_data_entry.as_deref());
        match entry {
            Some(code) if code == self.one_time_code => ChallengeVerdict::Verified,
            _ => ChallengeVerdict::Retry,
        }
    }
}

/// Injectable map from terminal challenge state to final transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeMapping {
    pub completed: TransStatus,
    pub cancelled: TransStatus,
    pub timed_out: TransStatus,
    pub declined: TransStatus,
}

impl Default for OutcomeMapping {
    fn default() -> Self {
        Self {
            completed: TransStatus::Authenticated,
            cancelled: TransStatus::NotAuthenticated,
            timed_out: TransStatus::NotAuthenticated,
            declined: TransStatus::NotAuthenticated,
        }
    }
}

impl ChallengeOutcomePolicy for OutcomeMapping {
    fn trans_status(&self, state: SessionState) -> TransStatus {
        match state {
            SessionState::Completed => self.completed,
            SessionState::Cancelled => self.cancelled,
            SessionState::TimedOut => self.timed_out,
            SessionState::Declined => self.declined,
            // Not terminal; callers only ask about finished sessions.
            SessionState::Started | SessionState::AwaitingCardholderInput => {
                TransStatus::NotAuthenticated
            }
        }
    }
}
