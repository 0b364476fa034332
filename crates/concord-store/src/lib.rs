//! # concord-store
//!
//! In-memory implementation of the collaborator ports defined in
//! `concord-core`. The gateway only reads from it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use concord_store::MemoryStore;
//! use concord_core::UserRepository;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::from_fixture_file("fixtures/dev.json").await?;
//!     let user = store.find_by_token("token-alice").await?;
//!     Ok(())
//! }
//! ```

pub mod fixture;
pub mod memory;

pub use fixture::{Fixture, FixtureError};
pub use memory::MemoryStore;
