//! `gateway-core`: a unified, provider-agnostic LLM gateway.
//!
//! The crate is organized around the gateway's components: a [`capability`]
//! registry of provider/model features and pricing, a [`context`] manager
//! that fits conversation history into a model's window, a single-flight
//! [`cache`], a [`retry`] engine and [`circuit`] breaker, the [`adapter`]
//! contract each provider implements, the [`pipeline`] runtime that folds
//! plugs over a [`request::Request`], the [`stream`] coordinator, the
//! [`functions`] normalizer, a [`cost`] tracker, and the
//! [`facade::Gateway`] that ties all of it into the one surface
//! applications are meant to call.

pub mod adapter;
pub mod auth;
pub mod cache;
pub mod capability;
pub mod circuit;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod facade;
pub mod functions;
pub mod message;
pub mod model_ref;
pub mod options;
#[cfg(feature = "http-client")]
pub mod outbound;
pub mod pipeline;
pub mod registries;
pub mod request;
pub mod response;
pub mod retry;
pub mod session;
pub mod stream;

pub use adapter::ProviderAdapter;
pub use error::GatewayError;
pub use facade::{Gateway, GatewayBuilder};
pub use message::{ContentPart, Message, Role};
pub use options::RequestOptions;
pub use registries::GatewayRegistries;
pub use request::Request;
pub use response::{FinishReason, LLMResponse, StreamChunk, Usage};
