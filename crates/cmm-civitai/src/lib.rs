//! Civitai API client.
//!
//! Production entry point is [`DefaultCivitaiClient`], a [`CivitaiClient`]
//! over a pooled reqwest backend. The client implements
//! `cmm_core::RemoteClientPort`, which is what the download worker
//! consumes; tests swap the HTTP backend for a canned fake.

mod client;
mod error;
mod http;
mod models;

pub use client::{CivitaiClient, DefaultCivitaiClient, SearchFilters};
pub use error::{CivitaiError, CivitaiResult};
pub use http::{HttpBackend, RemoteFile, ReqwestBackend};
pub use models::CivitaiConfig;
