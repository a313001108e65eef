//! Session core: registry, lifecycle state and health polling

pub mod health;
pub mod poller;
pub mod registry;
pub mod state;

pub use health::{HealthSnapshot, STATS_COMMAND};
pub use registry::{FilesOf, NotificationSender, SessionRegistry};
pub use state::{SessionPhase, SessionSnapshot, SessionToken};
