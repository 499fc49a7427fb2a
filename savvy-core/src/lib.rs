//! Core types shared by the savvy crates.
//!
//! This crate holds the pieces that both the shell launcher and the IPC
//! servers need: session configuration, recorded/replayed data types,
//! placeholder handling, and the reverse tail reader used for history.

pub mod config;
pub mod param;
pub mod runbook;
pub mod tail;

pub use config::{
    CONTEXT_ENV, EXIT_GRACE_PERIOD, ReplayConfig, SAVVY_BIN_ENV, SOCKET_PATH_ENV, SessionConfig,
    SessionContext, default_record_socket, default_run_socket, resolve_socket,
};
pub use param::{Bindings, extract, substitute};
pub use runbook::{
    AttachmentError, FileAttachment, MAX_ATTACHMENT_SIZE, RecordedCommand, ReplayStep, Runbook,
    RunbookError,
};
pub use tail::{TailError, tail};
