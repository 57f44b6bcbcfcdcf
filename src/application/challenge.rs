use crate::domain::card_range::ProtocolVersion;
use crate::domain::messages::{
    AcsUiType, ChallengeCancel, ChallengeRequest, ChallengeResponse, DeviceChannel, Indicator,
    MessageCategory, MessageType, ProtocolMessage, TransactionIds,
};
use crate::domain::outcome::{ChallengeOutcome, ChallengeVerdict, SessionState};
use crate::domain::ports::{ChallengeOutcomePolicy, IssuerPolicy};
use crate::error::{Result, ThreeDsError};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// One recorded request/response pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub round: u32,
    pub request: ChallengeRequest,
    pub response: ChallengeResponse,
}

/// Settings a session is opened with.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_rounds: u32,
    pub deadline: Instant,
}

/// The interaction loop between the issuer service and the cardholder's
/// device for one transaction.
///
/// A browser-channel session takes exactly one request. An app-channel
/// session loops until the policy verifies or declines the cardholder, the
/// cardholder cancels, or the round limit is spent.
pub struct ChallengeSession {
    ids: TransactionIds,
    message_version: ProtocolVersion,
    message_category: MessageCategory,
    channel: DeviceChannel,
    limits: SessionLimits,
    state: SessionState,
    rounds: u32,
    requests_received: u32,
    cancel: Option<ChallengeCancel>,
    exchanges: Vec<Exchange>,
    policy: Arc<dyn IssuerPolicy>,
    outcomes: Arc<dyn ChallengeOutcomePolicy>,
}

impl ChallengeSession {
    pub fn new(
        ids: TransactionIds,
        message_version: ProtocolVersion,
        message_category: MessageCategory,
        channel: DeviceChannel,
        limits: SessionLimits,
        policy: Arc<dyn IssuerPolicy>,
        outcomes: Arc<dyn ChallengeOutcomePolicy>,
    ) -> Self {
        Self {
            ids,
            message_version,
            message_category,
            channel,
            limits,
            state: SessionState::Started,
            rounds: 0,
            requests_received: 0,
            cancel: None,
            exchanges: Vec::new(),
            policy,
            outcomes,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn ids(&self) -> &TransactionIds {
        &self.ids
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn into_exchanges(self) -> Vec<Exchange> {
        self.exchanges
    }

    /// The terminal result, once the session has one.
    pub fn outcome(&self) -> Option<ChallengeOutcome> {
        self.state.is_terminal().then(|| ChallengeOutcome {
            ids: self.ids,
            message_version: self.message_version,
            message_category: self.message_category,
            state: self.state,
            rounds: self.rounds,
            cancel: self.cancel,
        })
    }

    /// Times the session out if `now` is past its deadline. Returns whether
    /// this call moved it to a terminal state.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.state.is_terminal() || now < self.limits.deadline {
            return false;
        }
        let cancel = if self.requests_received == 0 {
            ChallengeCancel::FirstRequestTimeout
        } else {
            ChallengeCancel::AcsTimeout
        };
        self.transition(SessionState::TimedOut, Some(cancel));
        true
    }

    /// Processes one challenge request and returns the response for it.
    pub fn submit(&mut self, request: ChallengeRequest) -> Result<ChallengeResponse> {
        if self.state.is_terminal() {
            return Err(ThreeDsError::OutOfState(format!(
                "challenge session is {:?}, no further requests accepted",
                self.state
            )));
        }
        request.ensure_type()?;
        request.ids.ensure_consistent(&self.ids)?;
        self.check_counter(&request)?;
        self.requests_received += 1;

        if self.expire(Instant::now()) {
            return Ok(self.record(request, None));
        }

        if let Some(cancel) = request.challenge_cancel {
            self.rounds += 1;
            self.transition(SessionState::Cancelled, Some(cancel));
            return Ok(self.record(request, None));
        }

        if Indicator::is_set(request.resend_challenge) && self.rounds > 0 {
            debug!(round = self.rounds, "challenge resend requested");
            let label = Some("A new code has been sent".to_string());
            return Ok(self.record(request, label));
        }

        self.rounds += 1;
        let verdict = self.policy.verify(&request, self.rounds);
        debug!(round = self.rounds, ?verdict, "challenge round verified");
        match (verdict, self.channel) {
            (ChallengeVerdict::Verified, _) => self.transition(SessionState::Completed, None),
            (ChallengeVerdict::Declined, _) | (ChallengeVerdict::Retry, DeviceChannel::Browser) => {
                self.transition(SessionState::Declined, None)
            }
            (ChallengeVerdict::Retry, DeviceChannel::App) => {
                if self.rounds >= self.limits.max_rounds {
                    self.transition(SessionState::TimedOut, None);
                } else {
                    self.state = SessionState::AwaitingCardholderInput;
                }
            }
        }
        Ok(self.record(request, None))
    }

    /// App-channel requests must count up from zero without gaps.
    fn check_counter(&self, request: &ChallengeRequest) -> Result<()> {
        if self.channel != DeviceChannel::App {
            return Ok(());
        }
        let Some(counter) = &request.sdk_counter_s_to_a else {
            return Ok(());
        };
        let expected = format!("{:03}", self.requests_received);
        if counter != &expected {
            return Err(ThreeDsError::MismatchedIdentifier {
                field: "sdkCounterStoA",
                expected,
                received: counter.clone(),
            });
        }
        Ok(())
    }

    fn transition(&mut self, state: SessionState, cancel: Option<ChallengeCancel>) {
        info!(
            acs_trans_id = ?self.ids.acs,
            from = ?self.state,
            to = ?state,
            rounds = self.rounds,
            "challenge session transition"
        );
        self.state = state;
        self.cancel = cancel;
    }

    fn record(&mut self, request: ChallengeRequest, resend_label: Option<String>) -> ChallengeResponse {
        let response = self.respond(resend_label);
        self.exchanges.push(Exchange {
            round: self.rounds,
            request,
            response: response.clone(),
        });
        response
    }

    fn respond(&self, resend_label: Option<String>) -> ChallengeResponse {
        let terminal = self.state.is_terminal();
        let prompt = !terminal;
        let app = self.channel == DeviceChannel::App;
        ChallengeResponse {
            message_type: MessageType::CRes,
            message_version: self.message_version,
            ids: self.ids,
            acs_counter_a_to_s: app.then(|| format!("{:03}", self.exchanges.len())),
            acs_ui_type: (prompt && app).then_some(AcsUiType::Text),
            acs_html: None,
            challenge_completion_ind: Indicator::from(terminal),
            challenge_info_header: prompt.then(|| "Purchase authentication".to_string()),
            challenge_info_label: prompt.then(|| "Enter the code".to_string()),
            challenge_info_text: prompt.then(|| {
                format!(
                    "Attempt {} of {}",
                    (self.rounds + 1).min(self.limits.max_rounds),
                    self.limits.max_rounds
                )
            }),
            oob_app_url: None,
            oob_continue_label: None,
            resend_information_label: resend_label.or_else(|| prompt.then(|| "Resend code".to_string())),
            submit_authentication_label: prompt.then(|| "Submit".to_string()),
            why_info_label: None,
            why_info_text: None,
            trans_status: terminal.then(|| self.outcomes.trans_status(self.state)),
            message_extension: None,
        }
    }
}
