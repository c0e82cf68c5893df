//! Conversational ITSM request creation.
//!
//! Walks a chat user through service desk, portal group and request type
//! selection, then collects the request's fields one message at a time and
//! submits the request.
//!
//! # Modules
//!
//! - **store**: per-conversation state storage and message serialization
//! - **field**: the field model and collected values
//! - **reconcile**: merges portal fields with form questions
//! - **validate**: per-field input parsing and value formatting
//! - **state**: the step and cached selections of one conversation
//! - **flow**: the state machine driving a conversation
//! - **render**: prompt and report text
//! - **submit**: request submission with best-effort form attachment
//! - **transport**: the outbound chat seam and typing keep-alive
//!
//! # Commands
//!
//! - `create request` / `itsm create` - start a request
//! - a number (or a project key at the first step) - select an entry
//! - `skip` - leave an optional field empty
//! - `back` - return to the previous step or field
//! - `cancel` - abandon the request
//! - `yes` / `y` / `retry` - submit, `no` / `n` - discard

pub mod error;
pub mod field;
pub mod flow;
pub mod reconcile;
pub mod render;
pub mod state;
pub mod store;
pub mod submit;
pub mod transport;
pub mod validate;

pub use error::{ItsmError, Result};
pub use field::{Field, FieldCollection, FieldKind, FieldSource, FieldValue};
pub use flow::{is_entry_command, FlowSettings, RequestFlow};
pub use reconcile::reconcile_fields;
pub use state::{ConversationState, Step};
pub use store::{ConversationLocks, ConversationStore, InMemoryConversationStore};
pub use submit::{FormStep, SubmissionReport, SubmitOutcome};
pub use transport::{ChatTransport, TypingIndicator};
pub use validate::{validate_input, Outcome};
