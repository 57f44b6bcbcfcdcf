use std::collections::BTreeSet;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use threeds::application::acs::AccessControlServer;
use threeds::application::directory::CardRangeDirectory;
use threeds::application::policy::{OutcomeMapping, ThresholdPolicy};
use threeds::application::router::DirectoryRouter;
use threeds::application::sdk::{ScriptedCardholder, SdkChallengeHandler};
use threeds::application::server::{OriginatorOrchestrator, RequestorProfile};
use threeds::config::ThreeDsConfig;
use threeds::domain::card_range::{AccountNumber, CardRange, ProtocolVersion};
use threeds::domain::outcome::CardholderAction;
use threeds::domain::ports::{ChallengeHandler, ResultsRelay};
use threeds::infrastructure::in_memory::InMemoryCardRangeStore;

pub const HEADER: [&str; 6] = [
    "action",
    "acs_id",
    "start_range",
    "end_range",
    "acs_start_version",
    "acs_end_version",
];

pub const ONE_TIME_CODE: &str = "123456";

/// Writes `rows` of (action, acs_id, start, end) with protocol versions 2.1.0-2.2.0.
pub fn generate_ranges_csv(path: &Path, rows: &[(&str, &str, &str, &str)]) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(HEADER)?;
    for (action, acs_id, start, end) in rows {
        wtr.write_record([*action, *acs_id, *start, *end, "2.1.0", "2.2.0"])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Five 1000-wide blocks from 4012000000001000 to 4012000000005999.
pub fn five_blocks() -> Vec<(String, String)> {
    (1..=5)
        .map(|block| {
            (
                format!("401200000000{block}000"),
                format!("401200000000{block}999"),
            )
        })
        .collect()
}

pub fn card_range(acs_id: &str, start: &str, end: &str) -> CardRange {
    CardRange::new(
        acs_id,
        AccountNumber::new(start).unwrap(),
        AccountNumber::new(end).unwrap(),
        ProtocolVersion::new(2, 1, 0),
        ProtocolVersion::new(2, 2, 0),
    )
}

/// A directory, its router and one issuer service per issuer target, all
/// in process.
pub struct Network {
    pub config: ThreeDsConfig,
    pub directory: Arc<CardRangeDirectory>,
    pub router: Arc<DirectoryRouter>,
    pub issuers: Vec<Arc<AccessControlServer>>,
}

impl Network {
    pub async fn new(config: ThreeDsConfig, ranges: &[CardRange]) -> Self {
        let directory = CardRangeDirectory::open(Box::new(InMemoryCardRangeStore::new()))
            .await
            .unwrap();
        for range in ranges {
            directory.add_range(range.clone()).await.unwrap();
        }
        let directory = Arc::new(directory);
        let router = Arc::new(DirectoryRouter::new(
            directory.clone(),
            config.clone(),
            "DS_TEST",
        ));
        let dyn_relay: Arc<dyn ResultsRelay> = router.clone();
        let relay = Arc::downgrade(&dyn_relay);

        let acs_ids: BTreeSet<&str> = ranges.iter().map(|r| r.acs_id.as_str()).collect();
        let mut issuers = Vec::new();
        for acs_id in acs_ids {
            let acs = Arc::new(AccessControlServer::new(
                acs_id,
                format!("https://acs.test/{acs_id}"),
                Arc::new(ThresholdPolicy::new(100.into(), ONE_TIME_CODE)),
                Arc::new(OutcomeMapping::default()),
                relay.clone(),
                config.clone(),
            ));
            router.register_issuer(acs_id, acs.clone()).await;
            issuers.push(acs);
        }

        Self {
            config,
            directory,
            router,
            issuers,
        }
    }

    /// A device-side handler that can reach every issuer service and plays
    /// back `actions`.
    pub fn sdk_handler(&self, actions: Vec<CardholderAction>) -> Arc<SdkChallengeHandler> {
        let mut handler = SdkChallengeHandler::new(
            Arc::new(ScriptedCardholder::new(actions)),
            self.config.max_challenge_rounds,
        );
        for acs in &self.issuers {
            handler = handler.with_service(acs.acs_url().to_string(), acs.clone());
        }
        Arc::new(handler)
    }

    /// An originator registered with the router.
    pub async fn originator(&self, handler: Arc<dyn ChallengeHandler>) -> Arc<OriginatorOrchestrator> {
        let orchestrator = Arc::new(OriginatorOrchestrator::new(
            RequestorProfile::default(),
            self.router.clone(),
            handler,
            self.config.clone(),
        ));
        self.router
            .register_originator(
                orchestrator.server_ref_number().to_string(),
                orchestrator.results_handler(),
            )
            .await;
        orchestrator
    }
}

/// Writes `count` disjoint 100-wide ranges spread over four issuer services.
pub fn generate_many_ranges_csv(path: &Path, count: u64) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(HEADER)?;
    for i in 0..count {
        let start = 4_000_000_000_000_000 + i * 100;
        let acs_id = format!("ACS_{}", i % 4);
        wtr.write_record([
            "A",
            acs_id.as_str(),
            &start.to_string(),
            &(start + 99).to_string(),
            "2.1.0",
            "2.2.0",
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
