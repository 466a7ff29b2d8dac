//! Conversation context persistence for the flow engine.
//!
//! [`traits::ContextStore`] is the storage seam: implement it against
//! whatever durable backend a deployment needs (Redis, Postgres, DynamoDB)
//! and the engine doesn't care. [`memory::InMemoryContextStore`] is the
//! reference implementation for development, tests, and single-process
//! deployments where losing state on restart is acceptable.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{ContextStoreError, Result};
pub use memory::InMemoryContextStore;
pub use traits::{ContextStore, ContextStream};
