use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use threeds::application::acs::spawn_expiry_sweeper;
use threeds::application::router::spawn_routed_sweeper;
use threeds::application::sdk::{DeviceChallengeClient, ScriptedCardholder, SdkChallengeHandler};
use threeds::application::server::PaymentDetails;
use threeds::config::ThreeDsConfig;
use threeds::domain::card_range::AccountNumber;
use threeds::domain::messages::{
    AuthenticationRequest, AuthenticationResponse, ChallengeResponse, DeviceChannel, ErrorCode,
    ErrorComponent,
};
use threeds::domain::outcome::{AuthenticationOutcome, CardholderAction, ChallengeContext};
use threeds::domain::ports::{AuthenticationService, Cardholder, ChallengeHandler};
use threeds::error::Result;
use tokio::sync::mpsc;
use uuid::Uuid;

mod common;

use common::{Network, ONE_TIME_CODE, card_range};

fn pan(digits: &str) -> AccountNumber {
    AccountNumber::new(digits).unwrap()
}

async fn five_block_network(config: ThreeDsConfig) -> Network {
    let ranges: Vec<_> = common::five_blocks()
        .iter()
        .enumerate()
        .map(|(i, (start, end))| card_range(&format!("ACS_{}", i % 2 + 1), start, end))
        .collect();
    Network::new(config, &ranges).await
}

/// Hands each challenge context to the test and returns straight away.
struct ForwardingHandler {
    contexts: mpsc::UnboundedSender<ChallengeContext>,
}

#[async_trait]
impl ChallengeHandler for ForwardingHandler {
    async fn on_challenge(&self, context: ChallengeContext) -> Result<()> {
        self.contexts.send(context).ok();
        Ok(())
    }
}

/// Walks away from the challenge screen without ever answering.
struct SilentCardholder;

#[async_trait]
impl Cardholder for SilentCardholder {
    async fn respond(&self, _prompt: Option<&ChallengeResponse>) -> CardholderAction {
        std::future::pending().await
    }
}

/// Counts AReqs and never answers them successfully.
struct CountingIssuer {
    calls: AtomicU32,
}

#[async_trait]
impl AuthenticationService for CountingIssuer {
    async fn authenticate(&self, _request: AuthenticationRequest) -> Result<AuthenticationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(threeds::error::ThreeDsError::UpstreamUnavailable(
            "counting issuer".to_string(),
        ))
    }
}

#[tokio::test]
async fn test_five_blocks_provisioned_in_serial_order() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    let originator = network.originator(network.sdk_handler(vec![])).await;

    let full = originator.request_card_ranges(None).await.unwrap();
    let ranges = full.card_range_data.unwrap();
    assert_eq!(ranges.len(), 5);
    assert_eq!(full.serial_num.as_deref(), Some("5"));
    let starts: Vec<&str> = ranges.iter().map(|r| r.start_range.as_str()).collect();
    assert_eq!(
        starts,
        [
            "4012000000001000",
            "4012000000002000",
            "4012000000003000",
            "4012000000004000",
            "4012000000005000"
        ]
    );

    let incremental = originator.request_card_ranges(Some(3)).await.unwrap();
    assert_eq!(incremental.card_range_data.unwrap().len(), 2);

    let nothing_new = originator.request_card_ranges(Some(5)).await.unwrap();
    assert!(nothing_new.card_range_data.is_none());
    assert_eq!(nothing_new.serial_num.as_deref(), Some("5"));
}

#[tokio::test]
async fn test_frictionless_authentication_routes_to_owning_issuer() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    let originator = network.originator(network.sdk_handler(vec![])).await;

    let outcome = originator
        .authenticate(PaymentDetails::new(pan("4012000000002500"), dec!(19.99)))
        .await
        .unwrap();

    assert_eq!(outcome, AuthenticationOutcome::Authenticated);
    assert_eq!(network.router.pending_results().await, 0);
    assert_eq!(originator.pending().waiting().await, 0);
}

#[tokio::test]
async fn test_authenticate_suspends_until_results_arrive() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    let (tx, mut contexts) = mpsc::unbounded_channel();
    let originator = network
        .originator(Arc::new(ForwardingHandler { contexts: tx }))
        .await;

    let pending = {
        let originator = originator.clone();
        tokio::spawn(async move {
            originator
                .authenticate(PaymentDetails::new(pan("4012000000001234"), dec!(500)))
                .await
        })
    };

    let context = contexts.recv().await.unwrap();
    assert!(!pending.is_finished());
    assert_eq!(originator.pending().waiting().await, 1);
    assert_eq!(network.router.pending_results().await, 1);

    let acs = network
        .issuers
        .iter()
        .find(|acs| Some(acs.acs_url()) == context.acs_url.as_deref())
        .unwrap()
        .clone();
    let client = DeviceChallengeClient::new(
        acs,
        Arc::new(ScriptedCardholder::new([CardholderAction::Submit(
            ONE_TIME_CODE.to_string(),
        )])),
        network.config.max_challenge_rounds,
    );
    let result = client.run_challenge(context).await.unwrap();
    assert_eq!(result.rounds, 1);

    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(outcome, AuthenticationOutcome::Authenticated);
    assert_eq!(originator.pending().waiting().await, 0);
    assert_eq!(network.router.pending_results().await, 0);
}

#[tokio::test]
async fn test_routing_error_never_reaches_an_issuer() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    let counting = Arc::new(CountingIssuer {
        calls: AtomicU32::new(0),
    });
    network.router.register_issuer("ACS_1", counting.clone()).await;
    network.router.register_issuer("ACS_2", counting.clone()).await;
    let originator = network.originator(network.sdk_handler(vec![])).await;

    let err = originator
        .authenticate(PaymentDetails::new(pan("5100000000000000"), dec!(10)))
        .await
        .unwrap_err();

    let protocol = err.protocol().unwrap();
    assert_eq!(protocol.error_code, ErrorCode::TransactionDataNotValid);
    assert_eq!(protocol.error_component, ErrorComponent::Directory);
    assert_eq!(
        protocol.error_description,
        "no acquiring issuer service for range"
    );
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    assert_eq!(originator.pending().waiting().await, 0);
}

#[tokio::test]
async fn test_app_channel_challenge_over_several_rounds() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    let handler = network.sdk_handler(vec![
        CardholderAction::Submit("111111".to_string()),
        CardholderAction::Resend,
        CardholderAction::Submit("222222".to_string()),
        CardholderAction::Submit(ONE_TIME_CODE.to_string()),
    ]);
    let originator = network.originator(handler.clone()).await;

    let mut payment = PaymentDetails::new(pan("4012000000003100"), dec!(1500));
    payment.device_channel = DeviceChannel::App;
    payment.sdk_trans_id = Some(Uuid::new_v4());

    let outcome = originator.authenticate(payment).await.unwrap();
    assert_eq!(outcome, AuthenticationOutcome::Authenticated);

    let completed = handler.completed().await;
    assert_eq!(completed.len(), 1);
    // Requests sent, the resend included
    assert_eq!(completed[0].rounds, 4);
    assert!(!completed[0].cancelled);
}

#[tokio::test]
async fn test_app_channel_round_limit_fails_authentication() {
    let config = ThreeDsConfig {
        max_challenge_rounds: 2,
        ..ThreeDsConfig::default()
    };
    let network = five_block_network(config).await;
    let handler = network.sdk_handler(vec![
        CardholderAction::Submit("111111".to_string()),
        CardholderAction::Submit("222222".to_string()),
        CardholderAction::Submit(ONE_TIME_CODE.to_string()),
    ]);
    let originator = network.originator(handler.clone()).await;

    let mut payment = PaymentDetails::new(pan("4012000000004100"), dec!(1500));
    payment.device_channel = DeviceChannel::App;
    payment.sdk_trans_id = Some(Uuid::new_v4());

    let outcome = originator.authenticate(payment).await.unwrap();
    assert_eq!(outcome, AuthenticationOutcome::NotAuthenticated);
}

#[tokio::test]
async fn test_cancelled_challenge_is_not_authenticated() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    let originator = network
        .originator(network.sdk_handler(vec![CardholderAction::Cancel]))
        .await;

    let outcome = originator
        .authenticate(PaymentDetails::new(pan("4012000000005100"), dec!(750)))
        .await
        .unwrap();

    assert_eq!(outcome, AuthenticationOutcome::NotAuthenticated);
    assert_eq!(network.router.pending_results().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_cardholder_settles_and_leaves_no_state() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    for acs in &network.issuers {
        spawn_expiry_sweeper(acs, Duration::from_secs(1));
    }
    spawn_routed_sweeper(&network.router, Duration::from_secs(1));

    let mut handler = SdkChallengeHandler::new(
        Arc::new(SilentCardholder),
        network.config.max_challenge_rounds,
    );
    for acs in &network.issuers {
        handler = handler.with_service(acs.acs_url().to_string(), acs.clone());
    }
    let originator = network.originator(Arc::new(handler)).await;

    let mut payment = PaymentDetails::new(pan("4012000000002100"), dec!(1500));
    payment.device_channel = DeviceChannel::App;
    payment.sdk_trans_id = Some(Uuid::new_v4());
    let task = {
        let originator = originator.clone();
        tokio::spawn(async move { originator.authenticate(payment).await })
    };

    tokio::time::sleep(Duration::from_secs(2000)).await;
    assert!(task.is_finished());
    assert_eq!(
        task.await.unwrap().unwrap(),
        AuthenticationOutcome::NotAuthenticated
    );

    assert_eq!(originator.pending().waiting().await, 0);
    originator.pending().evict_expired().await;
    assert_eq!(originator.pending().settled().await, 0);
    assert_eq!(network.router.pending_results().await, 0);
    for acs in &network.issuers {
        assert_eq!(acs.open_sessions().await, 0);
        assert_eq!(acs.settled_records().await, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_authentications_share_one_network() {
    let network = five_block_network(ThreeDsConfig::default()).await;
    let codes = vec![CardholderAction::Submit(ONE_TIME_CODE.to_string()); 8];
    let originator = network.originator(network.sdk_handler(codes)).await;

    let mut tasks = Vec::new();
    for i in 0..16u32 {
        let originator = originator.clone();
        tasks.push(tokio::spawn(async move {
            let block = i % 5 + 1;
            let number = pan(&format!("401200000000{block}{:03}", i * 7));
            // Every other payment crosses the frictionless limit
            let amount = if i % 2 == 0 { dec!(20) } else { dec!(400) };
            originator
                .authenticate(PaymentDetails::new(number, amount))
                .await
        }));
    }

    for task in tasks {
        assert_eq!(
            task.await.unwrap().unwrap(),
            AuthenticationOutcome::Authenticated
        );
    }
    assert_eq!(network.router.pending_results().await, 0);
    assert_eq!(originator.pending().waiting().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_see_consistent_snapshots() {
    let network = Network::new(ThreeDsConfig::default(), &[]).await;
    let directory = network.directory.clone();

    let writer = {
        let directory = directory.clone();
        tokio::spawn(async move {
            for i in 0..200u64 {
                let start = 4_500_000_000_000_000 + i * 10;
                directory
                    .add_range(card_range(
                        "ACS_1",
                        &start.to_string(),
                        &(start + 9).to_string(),
                    ))
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let directory = directory.clone();
        readers.push(tokio::spawn(async move {
            let mut last = 0;
            loop {
                let (rows, serial) = directory.query_with_serial(None).await;
                // A snapshot holds exactly the writes up to its serial
                assert_eq!(rows.len() as u64, serial);
                assert!(rows.iter().map(|r| r.serial).eq(1..=serial));
                assert!(serial >= last);
                last = serial;
                if serial == 200 {
                    break;
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
