//! Contracts between roles, and between roles and their external
//! collaborators.
//!
//! Roles never hold each other's concrete types: the originator talks to a
//! [`DirectoryService`], the directory to [`AuthenticationService`]s and
//! [`ResultsHandler`]s, the issuer service to a [`ResultsRelay`], and the
//! device client to a [`ChallengeService`].

use super::card_range::CardRangeRecord;
use super::messages::{
    AuthenticationRequest, AuthenticationResponse, ChallengeRequest, ChallengeResponse,
    ProvisioningRequest, ProvisioningResponse, ResultsRequest, ResultsResponse, TransStatus,
};
use super::outcome::{CardholderAction, ChallengeContext, ChallengeVerdict, Decision, SessionState};
use crate::error::Result;
use async_trait::async_trait;

/// Durable form of the card range directory.
#[async_trait]
pub trait CardRangeStore: Send + Sync {
    /// Inserts the row, replacing any stored row with the same `id`.
    async fn put(&self, record: CardRangeRecord) -> Result<()>;
    /// Every stored row, in any order.
    async fn load_all(&self) -> Result<Vec<CardRangeRecord>>;
}

pub type CardRangeStoreBox = Box<dyn CardRangeStore>;

/// Issuer authentication service entry point used by the directory.
#[async_trait]
pub trait AuthenticationService: Send + Sync {
    async fn authenticate(&self, request: AuthenticationRequest) -> Result<AuthenticationResponse>;
}

/// The challenge request/response contract, the only one the device client sees.
#[async_trait]
pub trait ChallengeService: Send + Sync {
    async fn challenge(&self, request: ChallengeRequest) -> Result<ChallengeResponse>;
}

/// The directory as seen from the originator.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn route_authentication(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse>;

    async fn serve_provisioning(&self, request: ProvisioningRequest)
    -> Result<ProvisioningResponse>;
}

/// The directory as seen from the issuer service: where results go.
#[async_trait]
pub trait ResultsRelay: Send + Sync {
    async fn route_results(&self, request: ResultsRequest) -> Result<ResultsResponse>;
}

/// The originator's results endpoint.
#[async_trait]
pub trait ResultsHandler: Send + Sync {
    async fn receive_results(&self, request: ResultsRequest) -> Result<ResultsResponse>;
}

/// The requesting application, told to start a challenge while
/// `authenticate` waits for the results.
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    async fn on_challenge(&self, context: ChallengeContext) -> Result<()>;
}

/// The cardholder in front of the challenge UI. `prompt` is the last
/// response shown, `None` before the first request.
#[async_trait]
pub trait Cardholder: Send + Sync {
    async fn respond(&self, prompt: Option<&ChallengeResponse>) -> CardholderAction;
}

/// Issuer risk and verification policy.
pub trait IssuerPolicy: Send + Sync {
    fn decide(&self, request: &AuthenticationRequest) -> Decision;
    fn verify(&self, request: &ChallengeRequest, round: u32) -> ChallengeVerdict;
}

/// Maps a terminal challenge state to the final transaction status.
pub trait ChallengeOutcomePolicy: Send + Sync {
    fn trans_status(&self, state: SessionState) -> TransStatus;
}
