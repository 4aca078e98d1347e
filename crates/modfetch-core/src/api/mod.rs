//! Typed client for the mod.io v1 REST API.
//!
//! Every response is mapped into the strongly-typed models here at the
//! boundary; untyped JSON never travels deeper into the pipeline. The API
//! key is an explicit value owned by the client, not ambient state, so
//! concurrent batch workers can share one client without cross-talk.

mod client;
mod error;
mod models;

pub use client::{parse_retry_after, ApiClient, API_BASE, USER_AGENT};
pub use error::ApiError;
pub use models::{DownloadInfo, GameInfo, ModFileInfo, ModInfo, Paged};
