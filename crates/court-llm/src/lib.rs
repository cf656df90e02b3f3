//! Resilient model invocation
//!
//! Everything between a stage and an unreliable external generative
//! service.
//!
//! # Core Concepts
//!
//! - [`LanguageModel`]: One call to an external service
//! - [`OpenAiCompatibleModel`]: Chat-completions HTTP backend
//! - [`CallGate`]: Process-wide serialization of outbound calls
//! - [`Invoker`]: Bounded retry with salvage, simplification and rate-limit restart
//! - [`ServiceFailure`] / [`ExternalServiceError`]: Per-call and exhausted failures
//!
//! # Example
//!
//! ```rust,ignore
//! use court_llm::{complete_json, CallGate, ChatRequest, Invoker, RequestVariant, RetryPolicy};
//!
//! let invoker = Invoker::new(CallGate::new(), RetryPolicy::default());
//! let opinion = invoker
//!     .invoke("judge_prosecutor", |variant| {
//!         let request = match variant {
//!             RequestVariant::Original => full.clone(),
//!             RequestVariant::Simplified => short.clone(),
//!         };
//!         async move { complete_json::<JudicialOpinion>(model.as_ref(), &request).await }
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod failure;
mod gate;
mod invoke;
mod model;
mod openai;
mod salvage;

pub use failure::{classify_http, ExternalServiceError, ServiceFailure};
pub use gate::CallGate;
pub use invoke::{Invocation, Invoker, RequestVariant, RetryPolicy};
pub use model::{complete_json, ChatRequest, ImageAttachment, LanguageModel, ResponseFormat};
pub use openai::{OpenAiCompatibleModel, DEFAULT_ENDPOINT};
pub use salvage::{extract_json_object, salvage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        complete_json, CallGate, ChatRequest, ExternalServiceError, Invocation, Invoker,
        LanguageModel, RequestVariant, RetryPolicy, ServiceFailure,
    };
}
