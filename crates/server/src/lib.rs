//! # Ratline Server Library
//!
//! Server half of the Ratline remote-administration channel. Agents connect
//! in over TCP, complete a Noise handshake, and wait for commands; a single
//! operator drives them from an interactive console.
//!
//! ```text
//! ┌───────────────┐   insert    ┌──────────────┐
//! │   Listener    ├────────────▶│   Registry   │
//! │ (accept loop) │             │  id → session │
//! └───────────────┘             └──────┬───────┘
//!                                      │ select / list / remove
//!                               ┌──────┴───────┐
//!                               │   Console    │
//!                               │ (dispatcher) │
//!                               └──────┬───────┘
//!                                      │ send command
//!                               ┌──────┴───────┐
//!                               │   Session    │──▶ SecureChannel ──▶ agent
//!                               └──────────────┘
//! ```
//!
//! The listener and the console are the only two tasks for the process
//! lifetime; the registry is the only state they share.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration and validation
//! - [`channel`]: the [`Channel`] capability and its Noise-over-TCP
//!   implementation
//! - [`session`]: per-agent state and the command protocol
//! - [`registry`]: id assignment and the session map
//! - [`listener`]: bind and the accept loop
//! - [`console`]: the operator dispatch loop
//! - [`error`]: the operator-facing error taxonomy

pub mod channel;
pub mod config;
pub mod console;
pub mod error;
pub mod listener;
pub mod registry;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use channel::{Channel, SecureChannel};
pub use config::Config;
pub use console::{Console, Directive};
pub use error::{Result, ServerError};
pub use registry::{Registry, SessionHandle, SessionId};
pub use session::Session;
