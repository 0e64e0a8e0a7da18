//! dmp-eval-lookup: external lookup services for the DMP evaluator
//!
//! ## Layer 1 - External collaborators
//!
//! Checks that depend on a remote service see only the
//! [`LookupResponse`] contract and the lookup traits; transport failures are
//! folded into `success == false` and never reach the check as errors.
//!
//! - `UnpaywallClient`: open-access status of a DOI
//! - `FairChampionClient`: FAIR Champion single-test assessments
//! - `fakes::StaticLookup`: preset answers for tests

mod error;
pub mod fair_champion;
pub mod fakes;
mod response;
pub mod unpaywall;

pub use error::LookupError;
pub use fair_champion::{FairChampionClient, FairChampionConfig};
pub use response::{FairAssessmentLookup, LookupResponse, OpenAccessLookup};
pub use unpaywall::{UnpaywallClient, UnpaywallConfig};
