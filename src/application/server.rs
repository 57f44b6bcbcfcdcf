use crate::config::ThreeDsConfig;
use crate::domain::card_range::AccountNumber;
use crate::domain::messages::{
    AuthenticationRequest, ChallengeIndicator, DeviceChannel, ErrorComponent, MessageCategory,
    MessageType, ProtocolMessage, ProvisioningRequest, ProvisioningResponse, ResultsRequest,
    ResultsResponse, TransactionIds,
};
use crate::domain::outcome::{AuthenticationOutcome, ChallengeContext};
use crate::domain::ports::{ChallengeHandler, DirectoryService, ResultsHandler};
use crate::error::{Result, ThreeDsError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Who the originator is and which merchant it acts for. Copied into every
/// AReq.
#[derive(Debug, Clone)]
pub struct RequestorProfile {
    pub server_ref_number: String,
    pub server_url: String,
    pub requestor_id: String,
    pub requestor_name: String,
    pub requestor_url: String,
    pub acquirer_bin: String,
    pub acquirer_merchant_id: String,
    pub mcc: String,
    pub merchant_country_code: String,
    pub merchant_name: String,
}

impl Default for RequestorProfile {
    fn default() -> Self {
        Self {
            server_ref_number: "3DS_SERVER_001".to_string(),
            server_url: "https://3ds-server.example".to_string(),
            requestor_id: "REQUESTOR_001".to_string(),
            requestor_name: "Example Merchant".to_string(),
            requestor_url: "https://merchant.example".to_string(),
            acquirer_bin: "400000".to_string(),
            acquirer_merchant_id: "MERCHANT_001".to_string(),
            mcc: "5411".to_string(),
            merchant_country_code: "840".to_string(),
            merchant_name: "Example Merchant".to_string(),
        }
    }
}

/// What the requesting application wants authenticated.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub account_number: AccountNumber,
    /// Purchase amount in major units.
    pub amount: Decimal,
    /// ISO 4217 numeric currency code.
    pub currency: String,
    pub exponent: u32,
    pub device_channel: DeviceChannel,
    pub message_category: MessageCategory,
    pub challenge_ind: Option<ChallengeIndicator>,
    /// Required on the app channel.
    pub sdk_trans_id: Option<Uuid>,
    pub card_expiry_date: Option<String>,
}

impl PaymentDetails {
    /// A browser-channel payment in US dollars.
    pub fn new(account_number: AccountNumber, amount: Decimal) -> Self {
        Self {
            account_number,
            amount,
            currency: "840".to_string(),
            exponent: 2,
            device_channel: DeviceChannel::Browser,
            message_category: MessageCategory::Payment,
            challenge_ind: None,
            sdk_trans_id: None,
            card_expiry_date: None,
        }
    }

    /// The amount in minor units, as carried by `purchaseAmount`.
    pub fn minor_units(&self) -> Result<String> {
        let invalid = || {
            ThreeDsError::Validation(format!(
                "amount {} is not representable with exponent {}",
                self.amount, self.exponent
            ))
        };
        let factor = 10u64.checked_pow(self.exponent).ok_or_else(invalid)?;
        let scaled = self
            .amount
            .checked_mul(Decimal::from(factor))
            .ok_or_else(invalid)?;
        if scaled.is_sign_negative() || !scaled.fract().is_zero() {
            return Err(invalid());
        }
        scaled
            .to_u64()
            .map(|units| units.to_string())
            .ok_or_else(invalid)
    }
}

struct Waiting {
    ids: TransactionIds,
    sender: oneshot::Sender<ResultsRequest>,
}

#[derive(Default)]
struct PendingTable {
    waiting: HashMap<Uuid, Waiting>,
    /// When each settled transaction stopped waiting. Kept for the
    /// retention window so duplicate or late results are refused.
    resolved: HashMap<Uuid, Instant>,
}

impl PendingTable {
    fn settle(&mut self, id: Uuid) {
        self.waiting.remove(&id);
        self.resolved.insert(id, Instant::now());
    }

    fn evict_resolved(&mut self, retention: Duration) -> usize {
        let now = Instant::now();
        let before = self.resolved.len();
        self.resolved
            .retain(|_, settled| now.saturating_duration_since(*settled) < retention);
        before - self.resolved.len()
    }
}

/// Authentications suspended until their results arrive, keyed by
/// threeDSServerTransID. Each one resolves at most once.
///
/// This is the originator's results endpoint; clones share the same table.
#[derive(Clone)]
pub struct PendingTransactions {
    table: Arc<Mutex<PendingTable>>,
    retention: Duration,
}

impl Default for PendingTransactions {
    fn default() -> Self {
        Self::new(ThreeDsConfig::default().results_timeout())
    }
}

impl PendingTransactions {
    /// Settled transactions are remembered for `retention` and then
    /// forgotten.
    pub fn new(retention: Duration) -> Self {
        Self {
            table: Arc::new(Mutex::new(PendingTable::default())),
            retention,
        }
    }

    async fn register(&self, ids: TransactionIds) -> Result<oneshot::Receiver<ResultsRequest>> {
        let id = server_trans_id(&ids)?;
        let (sender, receiver) = oneshot::channel();
        let mut table = self.table.lock().await;
        table.evict_resolved(self.retention);
        if table.resolved.contains_key(&id) || table.waiting.contains_key(&id) {
            return Err(ThreeDsError::OutOfState(format!(
                "transaction {id} was already started"
            )));
        }
        table.waiting.insert(id, Waiting { ids, sender });
        Ok(receiver)
    }

    /// Records the identifiers the ARes assigned, so results must echo them.
    async fn bind(&self, ids: TransactionIds) {
        let Some(id) = ids.three_ds_server else {
            return;
        };
        if let Some(waiting) = self.table.lock().await.waiting.get_mut(&id) {
            waiting.ids = ids;
        }
    }

    /// Stops waiting. Results arriving afterwards are out of state.
    async fn abandon(&self, id: Uuid) {
        self.table.lock().await.settle(id);
    }

    /// Forgets settled transactions older than the retention window.
    /// Returns how many were dropped.
    pub async fn evict_expired(&self) -> usize {
        let evicted = self.table.lock().await.evict_resolved(self.retention);
        if evicted > 0 {
            debug!(evicted, "forgot settled transactions");
        }
        evicted
    }

    /// Settled transactions still remembered.
    pub async fn settled(&self) -> usize {
        self.table.lock().await.resolved.len()
    }

    /// Authentications currently waiting for results.
    pub async fn waiting(&self) -> usize {
        self.table.lock().await.waiting.len()
    }

    async fn resolve(&self, request: ResultsRequest) -> Result<ResultsResponse> {
        request.ensure_type()?;
        let id = server_trans_id(&request.ids)?;
        let mut table = self.table.lock().await;
        table.evict_resolved(self.retention);
        if table.resolved.contains_key(&id) {
            return Err(ThreeDsError::OutOfState(format!(
                "results for transaction {id} were already received"
            )));
        }
        let Some(waiting) = table.waiting.remove(&id) else {
            return Err(ThreeDsError::MismatchedIdentifier {
                field: "threeDSServerTransID",
                expected: "a pending transaction".to_string(),
                received: id.to_string(),
            });
        };
        if let Err(err) = request.ids.ensure_consistent(&waiting.ids) {
            table.waiting.insert(id, waiting);
            return Err(err);
        }
        table.resolved.insert(id, Instant::now());
        drop(table);

        let response = ResultsResponse::acknowledge(&request);
        if waiting.sender.send(request).is_err() {
            warn!(%id, "authentication stopped waiting before results arrived");
        }
        Ok(response)
    }
}

#[async_trait]
impl ResultsHandler for PendingTransactions {
    async fn receive_results(&self, request: ResultsRequest) -> Result<ResultsResponse> {
        let ids = request.ids;
        self.resolve(request)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::Originator, ids, MessageType::RReq))
    }
}

fn server_trans_id(ids: &TransactionIds) -> Result<Uuid> {
    ids.three_ds_server.ok_or_else(|| {
        ThreeDsError::Validation("message carries no threeDSServerTransID".to_string())
    })
}

/// One authentication's claim on the pending table. Dropping it before
/// `release` (a cancelled `authenticate`) still settles the transaction and
/// stops the challenge task.
struct InFlight {
    pending: PendingTransactions,
    id: Uuid,
    challenge: Option<AbortHandle>,
    armed: bool,
}

impl InFlight {
    fn new(pending: &PendingTransactions, id: Uuid) -> Self {
        Self {
            pending: pending.clone(),
            id,
            challenge: None,
            armed: true,
        }
    }

    fn watch(&mut self, challenge: AbortHandle) {
        self.challenge = Some(challenge);
    }

    async fn release(mut self) {
        if let Some(challenge) = self.challenge.take() {
            challenge.abort();
        }
        self.pending.abandon(self.id).await;
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(challenge) = self.challenge.take() {
            challenge.abort();
        }
        if !self.armed {
            return;
        }
        if let Ok(mut table) = self.pending.table.try_lock() {
            table.settle(self.id);
        } else if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let pending = self.pending.clone();
            let id = self.id;
            runtime.spawn(async move { pending.abandon(id).await });
        }
    }
}

/// The originator: builds the AReq for a payment, sends it through the
/// directory and, when the issuer asks for a challenge, hands the challenge
/// to the requesting application and waits for the results.
pub struct OriginatorOrchestrator {
    profile: RequestorProfile,
    directory: Arc<dyn DirectoryService>,
    challenges: Arc<dyn ChallengeHandler>,
    pending: PendingTransactions,
    config: ThreeDsConfig,
}

impl OriginatorOrchestrator {
    pub fn new(
        profile: RequestorProfile,
        directory: Arc<dyn DirectoryService>,
        challenges: Arc<dyn ChallengeHandler>,
        config: ThreeDsConfig,
    ) -> Self {
        Self {
            profile,
            directory,
            challenges,
            pending: PendingTransactions::new(config.results_timeout()),
            config,
        }
    }

    pub fn server_ref_number(&self) -> &str {
        &self.profile.server_ref_number
    }

    /// The handle the directory delivers results to.
    pub fn results_handler(&self) -> Arc<dyn ResultsHandler> {
        Arc::new(self.pending.clone())
    }

    pub fn pending(&self) -> &PendingTransactions {
        &self.pending
    }

    pub async fn receive_results(&self, request: ResultsRequest) -> Result<ResultsResponse> {
        self.pending.receive_results(request).await
    }

    fn build_request(&self, payment: &PaymentDetails) -> Result<AuthenticationRequest> {
        if payment.device_channel == DeviceChannel::App && payment.sdk_trans_id.is_none() {
            return Err(ThreeDsError::Validation(
                "app-channel payment carries no sdkTransID".to_string(),
            ));
        }
        let profile = &self.profile;
        Ok(AuthenticationRequest {
            message_type: MessageType::AReq,
            message_version: self.config.message_version,
            ids: TransactionIds::originated(Uuid::new_v4()).with_sdk(payment.sdk_trans_id),
            server_ref_number: profile.server_ref_number.clone(),
            server_url: profile.server_url.clone(),
            requestor_id: profile.requestor_id.clone(),
            requestor_name: profile.requestor_name.clone(),
            requestor_url: profile.requestor_url.clone(),
            challenge_ind: payment.challenge_ind,
            requestor_app_url: None,
            comp_ind: None,
            acct_number: payment.account_number.clone(),
            card_expiry_date: payment.card_expiry_date.clone(),
            acquirer_bin: profile.acquirer_bin.clone(),
            acquirer_merchant_id: profile.acquirer_merchant_id.clone(),
            mcc: profile.mcc.clone(),
            merchant_country_code: profile.merchant_country_code.clone(),
            merchant_name: profile.merchant_name.clone(),
            device_channel: payment.device_channel,
            message_category: payment.message_category,
            notification_url: (payment.device_channel == DeviceChannel::Browser)
                .then(|| format!("{}/notification", profile.server_url)),
            purchase_amount: Some(payment.minor_units()?),
            purchase_currency: Some(payment.currency.clone()),
            purchase_exponent: Some(payment.exponent.to_string()),
            purchase_date: None,
            browser_accept_header: None,
            browser_ip: None,
            browser_language: None,
            browser_user_agent: None,
            sdk_app_id: None,
            sdk_max_timeout: None,
            sdk_reference_number: None,
            message_extension: None,
        })
    }

    /// Authenticates a payment. A challenged transaction only returns once
    /// its results arrive, or with `NotAuthenticated` once the challenge is
    /// abandoned or the results timeout passes, whether or not the
    /// challenge handler ever returns.
    #[instrument(skip_all, fields(pan = %payment.account_number.masked()))]
    pub async fn authenticate(&self, payment: PaymentDetails) -> Result<AuthenticationOutcome> {
        let request = self.build_request(&payment)?;
        let ids = request.ids;
        let server_id = server_trans_id(&ids)?;
        let mut results = self.pending.register(ids).await?;
        let mut in_flight = InFlight::new(&self.pending, server_id);

        let response = match self.directory.route_authentication(request).await {
            Ok(response) => response,
            Err(err) => {
                in_flight.release().await;
                return Err(err);
            }
        };
        let checked = response
            .ensure_type()
            .and_then(|()| response.ids.ensure_consistent(&ids))
            .and_then(|()| {
                if response.trans_status.is_final() {
                    return Ok(None);
                }
                ChallengeContext::from_response(&response, payment.device_channel).map(Some)
            });
        let context = match checked {
            Ok(Some(context)) => context,
            Ok(None) => {
                in_flight.release().await;
                info!(%server_id, trans_status = ?response.trans_status, "frictionless outcome");
                return Ok(response.trans_status.into());
            }
            Err(err) => {
                in_flight.release().await;
                return Err(err.reported_by(ErrorComponent::Originator, ids, MessageType::ARes));
            }
        };

        self.pending.bind(response.ids).await;
        info!(%server_id, acs_trans_id = ?response.ids.acs, "challenge required");
        let challenges = self.challenges.clone();
        let mut challenge = tokio::spawn(async move { challenges.on_challenge(context).await });
        in_flight.watch(challenge.abort_handle());

        let deadline = tokio::time::sleep(self.config.results_timeout());
        tokio::pin!(deadline);
        let mut challenge_running = true;
        let outcome = loop {
            tokio::select! {
                biased;
                received = &mut results => {
                    break match received {
                        Ok(request) => {
                            info!(%server_id, trans_status = ?request.trans_status, "challenge results received");
                            request.trans_status.into()
                        }
                        Err(_) => {
                            warn!(%server_id, "results channel closed");
                            AuthenticationOutcome::NotAuthenticated
                        }
                    };
                }
                handled = &mut challenge, if challenge_running => {
                    challenge_running = false;
                    let failure = match handled {
                        Ok(Ok(())) => continue,
                        Ok(Err(err)) => err.to_string(),
                        Err(err) => err.to_string(),
                    };
                    warn!(error = %failure, %server_id, "challenge was abandoned");
                    break match results.try_recv() {
                        Ok(request) => request.trans_status.into(),
                        Err(_) => AuthenticationOutcome::NotAuthenticated,
                    };
                }
                () = &mut deadline => {
                    warn!(%server_id, "timed out waiting for challenge results");
                    break AuthenticationOutcome::NotAuthenticated;
                }
            }
        };
        in_flight.release().await;
        Ok(outcome)
    }

    /// Asks the directory for card ranges written after `serial`, or for the
    /// full active set.
    #[instrument(skip(self))]
    pub async fn request_card_ranges(&self, serial: Option<u64>) -> Result<ProvisioningResponse> {
        let ids = TransactionIds::originated(Uuid::new_v4());
        let request = ProvisioningRequest {
            message_type: MessageType::PReq,
            message_version: self.config.message_version,
            ids,
            server_ref_number: self.profile.server_ref_number.clone(),
            server_operator_id: None,
            serial_num: serial.map(|serial| serial.to_string()),
            message_extension: None,
        };
        let response = self.directory.serve_provisioning(request).await?;
        response
            .ensure_type()
            .and_then(|()| response.ids.ensure_consistent(&ids))
            .map_err(|e| e.reported_by(ErrorComponent::Originator, ids, MessageType::PRes))?;
        Ok(response)
    }
}
