//! Citation integration: candidate pool, collaborator interface, per-section
//! integration and run orchestration.

mod generator;
mod options;
mod pool;
mod profile;
mod progress;
mod prompt;
#[cfg(feature = "providers")]
pub mod providers;
mod runner;
mod section;

pub use generator::{
    call_with_timeout, CatalogEntry, EchoGenerator, Generation, GenerationRequest, TextGenerator,
    TokenUsage,
};
pub use options::{IntegrationOptions, Scheduling, Strictness};
pub use pool::CandidatePool;
pub use profile::ContentProfile;
pub use progress::{
    CancelFlag, FnObserver, IntegrationObserver, NoopObserver, RevertReason, SectionStatus,
    SkipReason,
};
pub use prompt::{build_catalog, eligible_candidates, system_instructions, SYSTEM_INSTRUCTIONS};
pub use runner::Integrator;
pub use section::{SectionIntegrator, SectionOutcome};
