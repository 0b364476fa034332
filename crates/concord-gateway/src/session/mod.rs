//! Sessions
//!
//! Resumable session state, its replay buffer, shard claims and the
//! process-wide registry.

mod registry;
mod replay;
mod shard;
mod state;

pub use registry::{random_session_id, Claim, RegistryError, SessionRegistry};
pub use replay::ReplayBuffer;
pub use shard::{ShardError, ShardInfo};
pub use state::{
    DeliveryOutcome, ResumeRejection, ResumeSummary, Session, SessionSeed, SessionStream,
};
