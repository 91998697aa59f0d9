//! Orchestration core of the SQL chat agent.
//!
//! A [`SessionController`] owns one [`Transcript`] per conversation and hands it to the
//! [`AgentLoop`], which alternates between the reasoning model and the [`ToolCatalog`]
//! until the question is answered.

pub mod agent_loop;
pub mod catalog;
pub mod error;
pub mod prompt;
pub mod render;
pub mod session;
pub mod tools;
pub mod transcript;

pub use agent_loop::{AbortReason, AgentLoop, LoopSettings, LoopState, RunOutcome};
pub use catalog::{CatalogMetadata, CatalogSettings, ToolCatalog};
pub use error::{AgentError, ToolError};
pub use prompt::system_prompt;
pub use session::{Session, SessionController};
pub use tools::Tool;
pub use transcript::Transcript;
