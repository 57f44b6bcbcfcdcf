use crate::application::directory::CardRangeDirectory;
use crate::config::ThreeDsConfig;
use crate::domain::card_range::{ActionIndicator, CardRange};
use crate::domain::messages::{
    AuthenticationRequest, AuthenticationResponse, ErrorCode, ErrorComponent, MessageType,
    ProtocolError, ProtocolMessage, ProvisioningRequest, ProvisioningResponse, ResultsRequest,
    ResultsResponse, TransStatus, TransactionIds,
};
use crate::domain::ports::{AuthenticationService, DirectoryService, ResultsHandler, ResultsRelay};
use crate::error::{Result, ThreeDsError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A challenged transaction whose results have not been relayed yet.
#[derive(Debug, Clone)]
struct RoutedTransaction {
    ids: TransactionIds,
    server_ref_number: String,
    routed_at: Instant,
}

/// The directory: the single mediator between originators and issuer
/// authentication services.
///
/// Owns the card range directory it routes against. Issuer services and
/// originators are registered as port handles, never as concrete types.
pub struct DirectoryRouter {
    directory: Arc<CardRangeDirectory>,
    config: ThreeDsConfig,
    reference_number: String,
    issuers: RwLock<HashMap<String, Arc<dyn AuthenticationService>>>,
    originators: RwLock<HashMap<String, Arc<dyn ResultsHandler>>>,
    routed: Mutex<HashMap<Uuid, RoutedTransaction>>,
}

impl DirectoryRouter {
    pub fn new(
        directory: Arc<CardRangeDirectory>,
        config: ThreeDsConfig,
        reference_number: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            config,
            reference_number: reference_number.into(),
            issuers: RwLock::new(HashMap::new()),
            originators: RwLock::new(HashMap::new()),
            routed: Mutex::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Arc<CardRangeDirectory> {
        &self.directory
    }

    pub fn reference_number(&self) -> &str {
        &self.reference_number
    }

    /// Registers the issuer service that card ranges with `acs_id` route to.
    pub async fn register_issuer(
        &self,
        acs_id: impl Into<String>,
        service: Arc<dyn AuthenticationService>,
    ) {
        let acs_id = acs_id.into();
        info!(%acs_id, "issuer service registered");
        self.issuers.write().await.insert(acs_id, service);
    }

    /// Registers where results for AReqs carrying `server_ref_number` go.
    pub async fn register_originator(
        &self,
        server_ref_number: impl Into<String>,
        handler: Arc<dyn ResultsHandler>,
    ) {
        let server_ref_number = server_ref_number.into();
        info!(%server_ref_number, "originator registered");
        self.originators
            .write()
            .await
            .insert(server_ref_number, handler);
    }

    /// Challenged transactions still waiting for their results.
    pub async fn pending_results(&self) -> usize {
        self.routed.lock().await.len()
    }

    /// Forgets challenged transactions whose results never arrived within
    /// the results timeout. Returns how many were dropped.
    pub async fn expire_routed(&self) -> usize {
        let now = Instant::now();
        let timeout = self.config.results_timeout();
        let mut routed = self.routed.lock().await;
        let before = routed.len();
        routed.retain(|_, transaction| {
            now.saturating_duration_since(transaction.routed_at) < timeout
        });
        let expired = before - routed.len();
        if expired > 0 {
            debug!(expired, "forgot transactions that never received results");
        }
        expired
    }

    fn version_not_supported(&self, detail: String, ids: TransactionIds) -> ThreeDsError {
        ProtocolError::new(
            ErrorComponent::Directory,
            ErrorCode::VersionNotSupported,
            ErrorCode::VersionNotSupported.description(),
            detail,
            ids,
            Some(MessageType::AReq),
        )
        .into()
    }

    async fn route(&self, mut request: AuthenticationRequest) -> Result<AuthenticationResponse> {
        request.ensure_type()?;
        self.expire_routed().await;
        if request.ids.three_ds_server.is_none() {
            return Err(ThreeDsError::Validation(
                "AReq carries no threeDSServerTransID".to_string(),
            ));
        }
        let version = request.message_version;
        if version < self.config.ds_start_protocol_version
            || version > self.config.ds_end_protocol_version
        {
            return Err(self.version_not_supported(
                format!("directory does not support message version {version}"),
                request.ids,
            ));
        }

        let range = self
            .directory
            .resolve(&request.acct_number)
            .await
            .ok_or_else(|| ThreeDsError::Routing(request.acct_number.masked()))?;
        if !range.supports(version) {
            return Err(self.version_not_supported(
                format!(
                    "range {}-{} does not support message version {version}",
                    range.start_range.masked(),
                    range.end_range.masked()
                ),
                request.ids,
            ));
        }
        let issuer = self
            .issuers
            .read()
            .await
            .get(&range.acs_id)
            .cloned()
            .ok_or_else(|| ThreeDsError::Routing(request.acct_number.masked()))?;

        let ids = request.ids.with_ds(Uuid::new_v4());
        request.ids = ids;
        let server_ref_number = request.server_ref_number.clone();
        debug!(acs_id = %range.acs_id, ds_trans_id = ?ids.ds, "routing AReq");

        let response = self.forward(issuer.as_ref(), request).await?;
        response.ensure_type()?;
        response.ids.ensure_consistent(&ids)?;

        if response.trans_status == TransStatus::ChallengeRequired
            && let Some(ds) = ids.ds
        {
            self.routed.lock().await.insert(
                ds,
                RoutedTransaction {
                    ids: response.ids,
                    server_ref_number,
                    routed_at: Instant::now(),
                },
            );
        }
        info!(
            acs_id = %range.acs_id,
            trans_status = ?response.trans_status,
            "AReq routed"
        );
        Ok(response)
    }

    /// Sends the request, retrying only while the issuer service is
    /// unreachable.
    async fn forward(
        &self,
        issuer: &dyn AuthenticationService,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse> {
        let mut attempt = 1;
        loop {
            match issuer.authenticate(request.clone()).await {
                Err(ThreeDsError::UpstreamUnavailable(reason))
                    if attempt < self.config.route_attempts =>
                {
                    warn!(attempt, %reason, "issuer service unavailable, retrying");
                    tokio::time::sleep(self.config.route_backoff() * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn relay(&self, request: ResultsRequest) -> Result<ResultsResponse> {
        request.ensure_type()?;
        let ds = request
            .ids
            .ds
            .ok_or_else(|| ThreeDsError::Validation("RReq carries no dsTransID".to_string()))?;
        let routed = self
            .routed
            .lock()
            .await
            .get(&ds)
            .cloned()
            .ok_or_else(|| ThreeDsError::MismatchedIdentifier {
                field: "dsTransID",
                expected: "a transaction awaiting results".to_string(),
                received: ds.to_string(),
            })?;
        request.ids.ensure_consistent(&routed.ids)?;

        let handler = self
            .originators
            .read()
            .await
            .get(&routed.server_ref_number)
            .cloned()
            .ok_or_else(|| {
                ThreeDsError::UpstreamUnavailable(format!(
                    "originator {} is not registered",
                    routed.server_ref_number
                ))
            })?;
        let trans_status = request.trans_status;
        let response = handler.receive_results(request).await?;
        self.routed.lock().await.remove(&ds);
        info!(ds_trans_id = %ds, ?trans_status, "results relayed");
        Ok(response)
    }

    async fn provision(&self, request: ProvisioningRequest) -> Result<ProvisioningResponse> {
        request.ensure_type()?;
        let watermark = request
            .serial_num
            .as_deref()
            .map(|serial| {
                serial
                    .parse::<u64>()
                    .map_err(|_| ThreeDsError::InvalidSerial(serial.to_string()))
            })
            .transpose()?;

        let (rows, high_watermark) = self.directory.query_with_serial(watermark).await;
        if let Some(watermark) = watermark
            && watermark > high_watermark
        {
            return Err(ThreeDsError::InvalidSerial(format!(
                "{watermark} is ahead of the directory serial {high_watermark}"
            )));
        }

        let ranges: Vec<CardRange> = rows
            .into_iter()
            .map(|row| {
                let mut range = row.range;
                // A full listing describes the current state, not its history.
                if watermark.is_none() {
                    range.action_ind = Some(ActionIndicator::Add);
                    range.previous_range = None;
                }
                range
            })
            .collect();
        info!(
            ?watermark,
            ranges = ranges.len(),
            serial = high_watermark,
            "provisioning served"
        );

        Ok(ProvisioningResponse {
            message_type: MessageType::PRes,
            message_version: request.message_version,
            ids: request.ids.with_ds(Uuid::new_v4()),
            card_range_data: (!ranges.is_empty()).then_some(ranges),
            ds_start_protocol_version: self.config.ds_start_protocol_version,
            ds_end_protocol_version: self.config.ds_end_protocol_version,
            serial_num: Some(high_watermark.to_string()),
            message_extension: None,
        })
    }
}

/// Spawns a background task that forgets unanswered challenged
/// transactions every `interval`. The task stops once the router is dropped.
pub fn spawn_routed_sweeper(
    router: &Arc<DirectoryRouter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let router = Arc::downgrade(router);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(router) = router.upgrade() else {
                debug!("directory router dropped, stopping routed sweeper");
                return;
            };
            router.expire_routed().await;
        }
    })
}

#[async_trait]
impl DirectoryService for DirectoryRouter {
    #[instrument(skip_all, fields(three_ds_server_trans_id = ?request.ids.three_ds_server))]
    async fn route_authentication(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse> {
        let ids = request.ids;
        self.route(request)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::Directory, ids, MessageType::AReq))
    }

    #[instrument(skip_all, fields(serial_num = ?request.serial_num))]
    async fn serve_provisioning(
        &self,
        request: ProvisioningRequest,
    ) -> Result<ProvisioningResponse> {
        let ids = request.ids;
        self.provision(request)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::Directory, ids, MessageType::PReq))
    }
}

#[async_trait]
impl ResultsRelay for DirectoryRouter {
    #[instrument(skip_all, fields(ds_trans_id = ?request.ids.ds))]
    async fn route_results(&self, request: ResultsRequest) -> Result<ResultsResponse> {
        let ids = request.ids;
        self.relay(request)
            .await
            .map_err(|e| e.reported_by(ErrorComponent::Directory, ids, MessageType::RReq))
    }
}
