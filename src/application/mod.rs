//! Application layer: the four protocol roles and the directory state they
//! share.
//!
//! The `DirectoryRouter` owns the `CardRangeDirectory` and mediates between
//! the `OriginatorOrchestrator` and each `AccessControlServer`. Challenges
//! run between a `DeviceChallengeClient` and the issuer's `ChallengeSession`,
//! and their results travel back through the router.

pub mod acs;
pub mod challenge;
pub mod directory;
pub mod policy;
pub mod router;
pub mod sdk;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;
