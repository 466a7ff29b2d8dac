//! Conversation-flow execution engine for lead-qualification chatbots.
//!
//! A [`graph::Graph`] is a directed graph of [`graph::Node`]s keyed by kind
//! (greetings, typed-input questions, branching, outbound actions, media,
//! flow control). [`engine::Engine`] drives a [`context::ConversationContext`]
//! through that graph one [`step::StepResult`] at a time via
//! [`engine::Engine::process_message`], validating input with
//! [`validators`], resolving branches with [`navigator`], scoring leads with
//! [`scorer`], and reporting progress through an [`analytics::EventSink`].
//!
//! Graphs are authored as data (JSON deserialized into [`graph::Graph`],
//! per the wire format §6 of the engine's HTTP boundary defines) and
//! checked with [`loader::validate`] / [`loader::autocorrect`] before being
//! handed to the engine.

pub mod actions;
pub mod analytics;
pub mod condition;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod loader;
pub mod navigator;
pub mod render;
pub mod scorer;
pub mod step;
pub mod validators;

pub use context::{ConversationContext, ConversationStatus};
pub use engine::{ConversationLocks, Engine};
pub use error::{EngineError, Result};
pub use graph::{Graph, GlobalConfig, Node, NodeKind};
pub use step::{StepResult, StepResultKind};
