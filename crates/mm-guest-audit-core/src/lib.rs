//! mm-guest-audit-core library.
//!
//! Enumerates guest accounts through a [`port::RemoteAccess`] implementation,
//! enriches each guest with team, channel and activity data, and tabulates
//! the result into an [`model::AuditResult`].
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums; per-guest failures are data, not errors.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod audit;
pub mod classify;
pub mod error;
pub mod model;
pub mod port;
pub mod time;

pub use audit::{AuditOptions, AuditReport, GUEST_PAGE_SIZE, run_audit};
pub use error::{AuditError, GuestError, Outcome, PortError};
