use crate::application::challenge::{ChallengeSession, Exchange, SessionLimits};
use crate::config::ThreeDsConfig;
use crate::domain::messages::{
    AuthenticationRequest, AuthenticationResponse, ChallengeIndicator, ChallengeRequest,
    ChallengeResponse, DeviceChannel, ErrorComponent, Indicator, MessageType, ProtocolMessage,
    ResultsRequest, TransStatus, TransactionIds,
};
use crate::domain::outcome::ChallengeOutcome;
use crate::domain::ports::{
    AuthenticationService, ChallengeOutcomePolicy, ChallengeService, IssuerPolicy, ResultsRelay,
};
use crate::error::{Result, ThreeDsError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

struct Finished {
    exchanges: Vec<Exchange>,
    at: Instant,
}

#[derive(Default)]
struct AcsState {
    /// Directory transaction ids of AReqs already evaluated, with when.
    evaluated: HashMap<Uuid, Instant>,
    /// Open challenge sessions by acsTransID.
    sessions: HashMap<Uuid, ChallengeSession>,
    /// Recorded rounds of finished sessions by acsTransID.
    audit: HashMap<Uuid, Finished>,
    /// acsTransIDs whose outcome has been handed to the directory.
    reported: HashMap<Uuid, Instant>,
}

impl AcsState {
    fn finish(&mut self, acs_id: Uuid, session: ChallengeSession, now: Instant) {
        let exchanges = session.into_exchanges();
        self.audit.insert(acs_id, Finished { exchanges, at: now });
    }

    /// Drops bookkeeping for transactions settled longer than `retention` ago.
    fn evict_settled(&mut self, now: Instant, retention: Duration) -> usize {
        let fresh = |at: &Instant| now.saturating_duration_since(*at) < retention;
        let before = self.evaluated.len() + self.audit.len() + self.reported.len();
        self.evaluated.retain(|_, at| fresh(at));
        self.audit.retain(|_, finished| fresh(&finished.at));
        self.reported.retain(|_, at| fresh(at));
        before - (self.evaluated.len() + self.audit.len() + self.reported.len())
    }
}

/// The issuer authentication service.
///
/// Decides each AReq with the injected [`IssuerPolicy`], owns the challenge
/// sessions it opens, and sends the final result of every challenge back
/// through the directory. It only knows the directory as a [`ResultsRelay`]
/// and holds it weakly, since the directory in turn owns a handle to it.
pub struct AccessControlServer {
    acs_id: String,
    acs_url: String,
    reference_number: String,
    policy: Arc<dyn IssuerPolicy>,
    outcomes: Arc<dyn ChallengeOutcomePolicy>,
    relay: Weak<dyn ResultsRelay>,
    config: ThreeDsConfig,
    state: Mutex<AcsState>,
}

impl AccessControlServer {
    pub fn new(
        acs_id: impl Into<String>,
        acs_url: impl Into<String>,
        policy: Arc<dyn IssuerPolicy>,
        outcomes: Arc<dyn ChallengeOutcomePolicy>,
        relay: Weak<dyn ResultsRelay>,
        config: ThreeDsConfig,
    ) -> Self {
        let acs_id = acs_id.into();
        Self {
            reference_number: format!("3DS_LOA_ACS_{acs_id}"),
            acs_id,
            acs_url: acs_url.into(),
            policy,
            outcomes,
            relay,
            config,
            state: Mutex::new(AcsState::default()),
        }
    }

    pub fn acs_id(&self) -> &str {
        &self.acs_id
    }

    pub fn acs_url(&self) -> &str {
        &self.acs_url
    }

    /// Decides an AReq. A challenge decision opens the session before the
    /// ARes is returned; the challenge itself runs later through
    /// [`ChallengeService::challenge`].
    #[instrument(skip_all, fields(acs = %self.acs_id, ds_trans_id = ?request.ids.ds))]
    pub async fn evaluate(&self, request: AuthenticationRequest) -> Result<AuthenticationResponse> {
        request.ensure_type()?;
        let ds_id = request
            .ids
            .ds
            .ok_or_else(|| ThreeDsError::Validation("AReq carries no dsTransID".to_string()))?;
        if request.device_channel == DeviceChannel::App && request.ids.sdk.is_none() {
            return Err(ThreeDsError::Validation(
                "app-channel AReq carries no sdkTransID".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        if state.evaluated.insert(ds_id, Instant::now()).is_some() {
            return Err(ThreeDsError::OutOfState(format!(
                "AReq for dsTransID {ds_id} was already evaluated"
            )));
        }

        let decision = self.policy.decide(&request);
        let ids = request.ids.with_acs(Uuid::new_v4());
        let challenge = decision.trans_status == TransStatus::ChallengeRequired;
        if challenge {
            let session = ChallengeSession::new(
                ids,
                request.message_version,
                request.message_category,
                request.device_channel,
                SessionLimits {
                    max_rounds: self.config.max_challenge_rounds,
                    deadline: Instant::now() + self.config.challenge_timeout(),
                },
                self.policy.clone(),
                self.outcomes.clone(),
            );
            if let Some(acs) = ids.acs {
                state.sessions.insert(acs, session);
            }
        }
        drop(state);

        info!(
            trans_status = ?decision.trans_status,
            reason = ?decision.reason,
            acs_trans_id = ?ids.acs,
            "authentication decided"
        );
        let status = decision.trans_status;
        Ok(AuthenticationResponse {
            message_type: MessageType::ARes,
            message_version: request.message_version,
            ids,
            trans_status: status,
            trans_status_reason: decision.reason,
            acs_url: challenge.then(|| self.acs_url.clone()),
            acs_challenge_mandated: challenge.then(|| {
                Indicator::from(request.challenge_ind == Some(ChallengeIndicator::ChallengeMandated))
            }),
            acs_reference_number: Some(self.reference_number.clone()),
            ds_reference_number: None,
            authentication_type: challenge.then(|| "02".to_string()),
            authentication_value: authentication_value(status, &ids),
            eci: eci(status),
            cardholder_info: None,
            message_extension: None,
        })
    }

    /// Builds the RReq for a finished session and sends it through the
    /// directory. Each session is reported at most once.
    #[instrument(skip_all, fields(acs = %self.acs_id, acs_trans_id = ?outcome.ids.acs))]
    pub async fn handle_challenge_outcome(&self, outcome: ChallengeOutcome) -> Result<ResultsRequest> {
        let ids = outcome.ids;
        self.report(outcome)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::IssuerService, ids, MessageType::RReq))
    }

    async fn report(&self, outcome: ChallengeOutcome) -> Result<ResultsRequest> {
        let acs_id = outcome.ids.acs.ok_or_else(|| {
            ThreeDsError::Validation("challenge outcome carries no acsTransID".to_string())
        })?;
        if self
            .state
            .lock()
            .await
            .reported
            .insert(acs_id, Instant::now())
            .is_some()
        {
            return Err(ThreeDsError::OutOfState(format!(
                "outcome of challenge {acs_id} was already reported"
            )));
        }

        let trans_status = self.outcomes.trans_status(outcome.state);
        let request = ResultsRequest {
            message_type: MessageType::RReq,
            message_version: outcome.message_version,
            ids: outcome.ids,
            trans_status,
            trans_status_reason: None,
            challenge_cancel: outcome.cancel,
            interaction_counter: Some(format!("{:02}", outcome.rounds)),
            message_category: outcome.message_category,
            authentication_type: Some("02".to_string()),
            authentication_value: authentication_value(trans_status, &outcome.ids),
            eci: eci(trans_status),
            message_extension: None,
        };

        let relay = self.relay.upgrade().ok_or_else(|| {
            ThreeDsError::UpstreamUnavailable("directory is no longer running".to_string())
        })?;
        let response = relay.route_results(request.clone()).await?;
        response.ensure_type()?;
        response.ids.ensure_consistent(&request.ids)?;
        info!(
            state = ?outcome.state,
            ?trans_status,
            rounds = outcome.rounds,
            "challenge results delivered"
        );
        Ok(request)
    }

    async fn dispatch(&self, request: ChallengeRequest) -> Result<ChallengeResponse> {
        let acs_id = request
            .ids
            .acs
            .ok_or_else(|| ThreeDsError::Validation("CReq carries no acsTransID".to_string()))?;

        let (response, outcome) = {
            let mut state = self.state.lock().await;
            let Some(session) = state.sessions.get_mut(&acs_id) else {
                if state.audit.contains_key(&acs_id) {
                    return Err(ThreeDsError::OutOfState(format!(
                        "challenge {acs_id} has already finished"
                    )));
                }
                return Err(ThreeDsError::MismatchedIdentifier {
                    field: "acsTransID",
                    expected: "an open challenge".to_string(),
                    received: acs_id.to_string(),
                });
            };
            let response = session.submit(request)?;
            let outcome = session.outcome();
            if outcome.is_some()
                && let Some(session) = state.sessions.remove(&acs_id)
            {
                state.finish(acs_id, session, Instant::now());
            }
            (response, outcome)
        };

        // The lock is released: results travel back through the directory
        // and may take a while.
        if let Some(outcome) = outcome
            && let Err(err) = self.handle_challenge_outcome(outcome).await
        {
            warn!(error = %err, %acs_id, "failed to deliver challenge results");
        }
        Ok(response)
    }

    /// Times out every session past its deadline and reports each one, then
    /// forgets transactions settled longer ago than the results timeout.
    /// Returns how many sessions expired.
    pub async fn expire_sessions(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<ChallengeOutcome> = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let ids: Vec<Uuid> = state
                .sessions
                .iter_mut()
                .filter_map(|(id, session)| session.expire(now).then_some(*id))
                .collect();
            let expired: Vec<ChallengeOutcome> = ids
                .into_iter()
                .filter_map(|id| {
                    let session = state.sessions.remove(&id)?;
                    let outcome = session.outcome();
                    state.finish(id, session, now);
                    outcome
                })
                .collect();
            let evicted = state.evict_settled(now, self.config.results_timeout());
            if evicted > 0 {
                debug!(evicted, acs = %self.acs_id, "forgot settled transactions");
            }
            expired
        };

        let count = expired.len();
        for outcome in expired {
            let acs_id = outcome.ids.acs;
            if let Err(err) = self.handle_challenge_outcome(outcome).await {
                warn!(error = %err, ?acs_id, "failed to deliver timed out challenge results");
            }
        }
        if count > 0 {
            info!(count, acs = %self.acs_id, "challenge sessions expired");
        }
        count
    }

    /// Recorded rounds of a finished challenge.
    pub async fn exchanges(&self, acs_trans_id: Uuid) -> Option<Vec<Exchange>> {
        self.state
            .lock()
            .await
            .audit
            .get(&acs_trans_id)
            .map(|finished| finished.exchanges.clone())
    }

    /// Evaluated, finished and reported transactions still remembered.
    pub async fn settled_records(&self) -> usize {
        let state = self.state.lock().await;
        state.evaluated.len() + state.audit.len() + state.reported.len()
    }

    pub async fn open_sessions(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}

/// Spawns a background task that expires overdue challenge sessions every
/// `interval`. The task stops once the service is dropped.
pub fn spawn_expiry_sweeper(
    acs: &Arc<AccessControlServer>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let acs = Arc::downgrade(acs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(acs) = acs.upgrade() else {
                debug!("issuer service dropped, stopping expiry sweeper");
                return;
            };
            acs.expire_sessions().await;
        }
    })
}

/// Cardholder authentication verification value for a successful outcome.
fn authentication_value(status: TransStatus, ids: &TransactionIds) -> Option<String> {
    matches!(status, TransStatus::Authenticated | TransStatus::Attempted)
        .then(|| ids.acs.unwrap_or_default().simple().to_string())
}

fn eci(status: TransStatus) -> Option<String> {
    match status {
        TransStatus::Authenticated => Some("05".to_string()),
        TransStatus::Attempted => Some("06".to_string()),
        _ => None,
    }
}

#[async_trait]
impl AuthenticationService for AccessControlServer {
    async fn authenticate(&self, request: AuthenticationRequest) -> Result<AuthenticationResponse> {
        let ids = request.ids;
        self.evaluate(request)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::IssuerService, ids, MessageType::AReq))
    }
}

#[async_trait]
impl ChallengeService for AccessControlServer {
    #[instrument(skip_all, fields(acs = %self.acs_id, acs_trans_id = ?request.ids.acs))]
    async fn challenge(&self, request: ChallengeRequest) -> Result<ChallengeResponse> {
        let ids = request.ids;
        self.dispatch(request)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::IssuerService, ids, MessageType::CReq))
    }
}
