//! Server, client and UI-surface services of the script editor.
//!
//! Each context owns one [`Bridge`](scriptbridge_rpc::Bridge) and installs
//! its host on it:
//!
//! - [`ServerHost`]: access decisions, connection info, evaluation on the
//!   server and fan-out to every client
//! - [`ClientHost`]: the script library, local evaluation, the relay from
//!   the UI to the server, editor visibility
//! - [`UiHost`]: tabs, status line, and execution requests checked against
//!   the grant the client pushed
//!
//! Access is decided by an [`AccessGate`] on the server and re-checked by
//! whoever receives an execution request.

mod access;
mod client;
mod config;
mod editor;
mod error;
mod eval;
mod server;
mod ui;

pub use access::{check_grant, AccessGate, AccessPolicy, AddressPolicy, AllowAllPolicy};
pub use client::ClientHost;
pub use config::{ServerConfig, DEFAULT_ACTIVATION_KEY, DEFAULT_PORT};
pub use editor::{EditorTabs, Tab, UNTITLED};
pub use error::{HostError, HostResult};
pub use server::{ConnectionInfo, ServerHost};
pub use ui::{
    SaveOutcome, UiHost, NOTICE_ALREADY_EXISTS, NOTICE_DELETE_FAILED, NOTICE_OPEN_FAILED,
    NOTICE_SAVE_FAILED, STATUS_RUNNING_ALL_CLIENTS, STATUS_RUNNING_LOCAL, STATUS_RUNNING_SERVER,
    STATUS_SAVING,
};
