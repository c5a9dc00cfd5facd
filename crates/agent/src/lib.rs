//! Conversational front end for restart requests.
//!
//! The model never touches a repository. It can only emit action payloads, which are extracted
//! ([`extract`]), bound to the closed action set ([`tools`]) and executed by the core restart
//! service. Each result goes back to the model as an `Action_Response` turn until it answers or
//! the turn budget runs out ([`runtime`]).

pub mod extract;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use extract::{extract, ActionRequest, ExtractError};
pub use llm::{ConversationTurn, LlmClient, OpenAiChatClient, Role};
pub use runtime::{AgentRuntime, LoopObserver, RunReport, RuntimeError, Termination};
pub use tools::{ActionKind, ActionRegistry, DispatchError, RestartHandler};
