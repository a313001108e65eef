//! NeonTerm session core
//!
//! Multiplexes SSH sessions keyed by caller-chosen ids. Each session pairs an
//! interactive shell with an SFTP file channel and a remote health poller.

pub mod config;
pub mod error;
pub mod facade;
pub mod logging;
pub mod session;
pub mod sftp;
pub mod ssh;

pub(crate) mod security_log;

pub use facade::{Notification, Request, SessionFacade};
pub use session::SessionRegistry;
