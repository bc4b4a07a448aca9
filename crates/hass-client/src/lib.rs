//! HASS API client
//!
//! Typed wrapper over the `/api/v1` REST surface. Attaches the bearer
//! token from client storage, retries idempotent reads, and normalizes
//! error bodies into [`ApiError`]. Also consumes the SSE alert stream and
//! drives reception's discharge workflow.

pub mod client;
pub mod config;
pub mod discharge;
pub mod error;
pub mod sse;
pub mod storage;
pub mod types;

pub use client::{ApiClient, Upload};
pub use config::{resolve_base_url, ClientConfig};
pub use discharge::{DischargeDecision, DischargeOutcome};
pub use error::{ApiError, ClientError, ClientResult};
pub use storage::{ClientStorage, DoseLog, FileStorage, MemoryStorage, Session};
pub use types::*;
