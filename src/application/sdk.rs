use crate::domain::messages::{
    ChallengeCancel, ChallengeRequest, ChallengeResponse, DeviceChannel, ErrorComponent,
    Indicator, MessageType, ProtocolMessage,
};
use crate::domain::outcome::{CardholderAction, ChallengeContext, ChallengeResult};
use crate::domain::ports::{Cardholder, ChallengeHandler, ChallengeService};
use crate::error::{Result, ThreeDsError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Drives one challenge from the cardholder's device. Talks to the issuer
/// service only through [`ChallengeService`].
pub struct DeviceChallengeClient {
    service: Arc<dyn ChallengeService>,
    cardholder: Arc<dyn Cardholder>,
    max_requests: u32,
}

impl DeviceChallengeClient {
    /// `max_rounds` is the issuer's round limit. Resends do not count as
    /// rounds, so the client allows twice as many requests before giving up.
    pub fn new(
        service: Arc<dyn ChallengeService>,
        cardholder: Arc<dyn Cardholder>,
        max_rounds: u32,
    ) -> Self {
        Self {
            service,
            cardholder,
            max_requests: max_rounds.saturating_mul(2).max(1),
        }
    }

    #[instrument(skip_all, fields(acs_trans_id = ?context.ids.acs, channel = ?context.device_channel))]
    pub async fn run_challenge(&self, context: ChallengeContext) -> Result<ChallengeResult> {
        let ids = context.ids;
        self.drive(context)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::DeviceClient, ids, MessageType::CReq))
    }

    async fn drive(&self, context: ChallengeContext) -> Result<ChallengeResult> {
        let app = context.device_channel == DeviceChannel::App;
        if app && context.ids.sdk.is_none() {
            return Err(ThreeDsError::Validation(
                "app-channel challenge carries no sdkTransID".to_string(),
            ));
        }

        let mut previous: Option<ChallengeResponse> = None;
        for sent in 0..self.max_requests {
            let action = self.cardholder.respond(previous.as_ref()).await;
            debug!(sent, ?action, "cardholder responded");
            let mut request = self.request(&context, sent);
            let cancelled = apply(action, &mut request, app);

            let response = self.exchange(&context, request, sent).await?;
            if response.is_complete() {
                return Ok(ChallengeResult {
                    ids: context.ids,
                    trans_status: response.trans_status,
                    rounds: sent + 1,
                    cancelled,
                });
            }
            if !app {
                return Err(ThreeDsError::OutOfState(
                    "browser challenge did not complete on its only request".to_string(),
                ));
            }
            previous = Some(response);
        }

        warn!(requests = self.max_requests, "challenge request limit reached, cancelling");
        let mut request = self.request(&context, self.max_requests);
        request.challenge_cancel = Some(ChallengeCancel::SdkTimeout);
        let response = self
            .exchange(&context, request, self.max_requests)
            .await?;
        Ok(ChallengeResult {
            ids: context.ids,
            trans_status: response.trans_status,
            rounds: self.max_requests + 1,
            cancelled: true,
        })
    }

    fn request(&self, context: &ChallengeContext, sent: u32) -> ChallengeRequest {
        let mut request = ChallengeRequest::new(context.message_version, context.ids);
        if context.device_channel == DeviceChannel::App {
            request.sdk_counter_s_to_a = Some(format!("{sent:03}"));
        }
        request
    }

    async fn exchange(
        &self,
        context: &ChallengeContext,
        request: ChallengeRequest,
        sent: u32,
    ) -> Result<ChallengeResponse> {
        let response = self.service.challenge(request).await?;
        response.ensure_type()?;
        response.ids.ensure_consistent(&context.ids)?;
        if context.device_channel == DeviceChannel::App {
            let expected = format!("{sent:03}");
            if response.acs_counter_a_to_s.as_deref() != Some(expected.as_str()) {
                return Err(ThreeDsError::MismatchedIdentifier {
                    field: "acsCounterAtoS",
                    expected,
                    received: response
                        .acs_counter_a_to_s
                        .clone()
                        .unwrap_or_else(|| "none".to_string()),
                });
            }
        }
        Ok(response)
    }
}

/// Fills in the cardholder's action. Returns whether it cancels.
fn apply(action: CardholderAction, request: &mut ChallengeRequest, app: bool) -> bool {
    match action {
        CardholderAction::Submit(entry) if app => request.challenge_data_entry = Some(entry),
        CardholderAction::Submit(entry) => request.challenge_html_data_entry = Some(entry),
        CardholderAction::Resend => request.resend_challenge = Some(Indicator::Yes),
        CardholderAction::OobContinue => request.oob_continue = Some(true),
        CardholderAction::Cancel => {
            request.challenge_cancel = Some(ChallengeCancel::CardholderCancelled);
            return true;
        }
    }
    false
}

/// Plays back a fixed list of actions, then cancels.
pub struct ScriptedCardholder {
    actions: Mutex<VecDeque<CardholderAction>>,
}

impl ScriptedCardholder {
    pub fn new(actions: impl IntoIterator<Item = CardholderAction>) -> Self {
        Self {
            actions: Mutex::new(actions.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Cardholder for ScriptedCardholder {
    async fn respond(&self, _prompt: Option<&ChallengeResponse>) -> CardholderAction {
        self.actions
            .lock()
            .await
            .pop_front()
            .unwrap_or(CardholderAction::Cancel)
    }
}

/// The requesting application's challenge handler: runs a
/// [`DeviceChallengeClient`] against the issuer service published at the
/// context's `acsURL`.
pub struct SdkChallengeHandler {
    services: HashMap<String, Arc<dyn ChallengeService>>,
    cardholder: Arc<dyn Cardholder>,
    max_rounds: u32,
    completed: Mutex<Vec<ChallengeResult>>,
}

impl SdkChallengeHandler {
    pub fn new(cardholder: Arc<dyn Cardholder>, max_rounds: u32) -> Self {
        Self {
            services: HashMap::new(),
            cardholder,
            max_rounds,
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_service(mut self, acs_url: impl Into<String>, service: Arc<dyn ChallengeService>) -> Self {
        self.services.insert(acs_url.into(), service);
        self
    }

    /// Results of every challenge run so far.
    pub async fn completed(&self) -> Vec<ChallengeResult> {
        self.completed.lock().await.clone()
    }
}

#[async_trait]
impl ChallengeHandler for SdkChallengeHandler {
    async fn on_challenge(&self, context: ChallengeContext) -> Result<()> {
        let acs_url = context.acs_url.as_deref().ok_or_else(|| {
            ThreeDsError::Validation("challenge context carries no acsURL".to_string())
        })?;
        let service = self.services.get(acs_url).cloned().ok_or_else(|| {
            ThreeDsError::UpstreamUnavailable(format!("no challenge endpoint at {acs_url}"))
        })?;

        let client = DeviceChallengeClient::new(service, self.cardholder.clone(), self.max_rounds);
        let result = client.run_challenge(context).await?;
        info!(
            rounds = result.rounds,
            cancelled = result.cancelled,
            trans_status = ?result.trans_status,
            "challenge finished on device"
        );
        self.completed.lock().await.push(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::acs::AccessControlServer;
    use crate::application::policy::{OutcomeMapping, ThresholdPolicy};
    use crate::application::testing::authentication_request;
    use crate::config::ThreeDsConfig;
    use crate::domain::messages::{ResultsRequest, ResultsResponse, TransStatus};
    use crate::domain::ports::ResultsRelay;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingRelay {
        received: Mutex<Vec<ResultsRequest>>,
    }

    #[async_trait]
    impl ResultsRelay for RecordingRelay {
        async fn route_results(&self, request: ResultsRequest) -> Result<ResultsResponse> {
            let response = ResultsResponse::acknowledge(&request);
            self.received.lock().await.push(request);
            Ok(response)
        }
    }

    struct Fixture {
        relay: Arc<RecordingRelay>,
        acs: Arc<AccessControlServer>,
    }

    impl Fixture {
        fn new(max_rounds: u32) -> Self {
            let relay = Arc::new(RecordingRelay::default());
            let dyn_relay: Arc<dyn ResultsRelay> = relay.clone();
            let acs = Arc::new(AccessControlServer::new(
                "ACS_1",
                "https://acs.example/challenge",
                Arc::new(ThresholdPolicy::new(dec!(100), "123456")),
                Arc::new(OutcomeMapping::default()),
                Arc::downgrade(&dyn_relay),
                ThreeDsConfig {
                    max_challenge_rounds: max_rounds,
                    ..ThreeDsConfig::default()
                },
            ));
            Self { relay, acs }
        }

        async fn challenge(&self, channel: DeviceChannel) -> ChallengeContext {
            let mut request = authentication_request("4012000000001234", "25000", channel);
            request.ids = request.ids.with_ds(Uuid::new_v4());
            let ares = self.acs.evaluate(request).await.unwrap();
            assert_eq!(ares.trans_status, TransStatus::ChallengeRequired);
            ChallengeContext::from_response(&ares, channel).unwrap()
        }

        fn client(&self, actions: Vec<CardholderAction>, max_rounds: u32) -> DeviceChallengeClient {
            DeviceChallengeClient::new(
                self.acs.clone(),
                Arc::new(ScriptedCardholder::new(actions)),
                max_rounds,
            )
        }
    }

    fn submit(code: &str) -> CardholderAction {
        CardholderAction::Submit(code.to_string())
    }

    #[tokio::test]
    async fn test_app_challenge_completes_on_third_round() {
        let fx = Fixture::new(10);
        let context = fx.challenge(DeviceChannel::App).await;
        let client = fx.client(vec![submit("000000"), submit("111111"), submit("123456")], 10);

        let result = client.run_challenge(context.clone()).await.unwrap();
        assert_eq!(result.rounds, 3);
        assert!(!result.cancelled);
        assert_eq!(result.trans_status, Some(TransStatus::Authenticated));

        let received = fx.relay.received.lock().await.clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].ids, context.ids);
        assert_eq!(received[0].interaction_counter.as_deref(), Some("03"));
        let exchanges = fx.acs.exchanges(context.ids.acs.unwrap()).await.unwrap();
        assert_eq!(exchanges.len(), 3);
    }

    #[tokio::test]
    async fn test_browser_challenge_single_request() {
        let fx = Fixture::new(10);
        let context = fx.challenge(DeviceChannel::Browser).await;
        let client = fx.client(vec![submit("123456")], 10);

        let result = client.run_challenge(context).await.unwrap();
        assert_eq!(result.rounds, 1);
        assert_eq!(result.trans_status, Some(TransStatus::Authenticated));
    }

    #[tokio::test]
    async fn test_cardholder_cancel() {
        let fx = Fixture::new(10);
        let context = fx.challenge(DeviceChannel::App).await;
        let client = fx.client(vec![submit("000000"), CardholderAction::Cancel], 10);

        let result = client.run_challenge(context).await.unwrap();
        assert!(result.cancelled);
        assert_eq!(result.rounds, 2);
        assert_eq!(result.trans_status, Some(TransStatus::NotAuthenticated));
        let received = fx.relay.received.lock().await.clone();
        assert_eq!(
            received[0].challenge_cancel,
            Some(ChallengeCancel::CardholderCancelled)
        );
    }

    #[tokio::test]
    async fn test_resends_stop_at_request_limit() {
        let fx = Fixture::new(2);
        let context = fx.challenge(DeviceChannel::App).await;
        let client = fx.client(vec![CardholderAction::Resend; 10], 2);

        let result = client.run_challenge(context).await.unwrap();
        assert!(result.cancelled);
        assert_eq!(result.rounds, 5);
        let received = fx.relay.received.lock().await.clone();
        assert_eq!(received[0].challenge_cancel, Some(ChallengeCancel::SdkTimeout));
        assert_eq!(received[0].trans_status, TransStatus::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_handler_rejects_unknown_acs_url() {
        let fx = Fixture::new(10);
        let mut context = fx.challenge(DeviceChannel::Browser).await;
        context.acs_url = Some("https://elsewhere.example".to_string());
        let handler = SdkChallengeHandler::new(Arc::new(ScriptedCardholder::new([])), 10)
            .with_service("https://acs.example/challenge", fx.acs.clone());

        assert!(matches!(
            handler.on_challenge(context).await,
            Err(ThreeDsError::UpstreamUnavailable(_))
        ));
        assert!(handler.completed().await.is_empty());
    }
}
