//! Herald - chat bot process
//!
//! Process plumbing for a long-running bot: the cooperative event loop,
//! the boot/shutdown/restart state machine, logging setup and the periodic
//! status report. The chat client, handler subsystems and services plug in
//! through the traits in [`collaborators`].

pub mod collaborators;
pub mod event_loop;
pub mod lifecycle;
pub mod logging;
pub mod signals;
pub mod status;

pub use collaborators::{
    ChatClient, Collaborators, EmbeddedServer, HandlerCounts, HandlerRegistry, Hook, Hooks,
    OfflineClient, Service,
};
pub use event_loop::LocalLoop;
pub use lifecycle::{Lifecycle, LifecycleBuilder, LifecycleState};
pub use status::StatusSummary;
