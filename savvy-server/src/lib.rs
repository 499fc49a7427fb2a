//! Unix-socket servers behind a savvy session.
//!
//! A recording session runs a [`CaptureServer`] that collects the commands
//! reported by the shell hook. A replay session runs a [`ReplayServer`] that
//! hook invocations query for the step to run next. Both are one request per
//! connection, so hooks can be plain short-lived processes.

mod capture;
mod cleanup;
mod client;
mod error;
pub mod protocol;
mod replay;
mod socket;

pub use capture::{CaptureServer, normalize_command};
pub use cleanup::{ConfirmTakeover, prepare_socket};
pub use client::{CaptureClient, ReplayClient};
pub use error::{ClientError, ServerError};
pub use protocol::{CaptureMessage, CurrentStep, Request, Response, new_step_id};
pub use replay::{ReplayServer, ReplayState};
