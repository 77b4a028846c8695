//! External collaborators of the process lifecycle
//!
//! The chat protocol client, the handler subsystems, background services
//! and the embedded HTTP server live outside this crate. The lifecycle only
//! needs the narrow surfaces below.

use std::cell::Cell;
use std::fmt;

use anyhow::Result;

/// Connection to the chat network
pub trait ChatClient {
    /// Start connecting; `on_ready` runs once the session is usable
    ///
    /// Implementations may call `on_ready` synchronously. The lifecycle
    /// defers the follow-up work to the next loop turn either way.
    fn connect(&self, on_ready: Box<dyn FnOnce()>) -> Result<()>;

    /// Close the session; safe when not connected
    fn close(&self);

    fn is_connected(&self) -> bool;
}

/// Number of registered handlers per subsystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerCounts {
    pub commands: usize,
    pub events: usize,
    pub routes: usize,
}

impl fmt::Display for HandlerCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "commands={} events={} routes={}",
            self.commands, self.events, self.routes
        )
    }
}

/// Commands, event handlers and HTTP routes
pub trait HandlerRegistry {
    /// Register every handler subsystem
    fn register_all(&self) -> Result<HandlerCounts>;

    /// Handlers currently registered
    fn counts(&self) -> HandlerCounts;
}

/// Long-running background task (scheduler, cache warmer, ...)
pub trait Service {
    fn name(&self) -> &str;

    fn start(&self) -> Result<()>;

    fn stop(&self);
}

/// HTTP server embedded in the bot process
pub trait EmbeddedServer {
    fn stop(&self);
}

/// User-supplied lifecycle hook
pub type Hook = Box<dyn Fn() -> Result<()>>;

/// Hooks run around shutdown and restart
#[derive(Default)]
pub struct Hooks {
    pub pre_shutdown: Vec<Hook>,
    pub pre_restart: Vec<Hook>,
    pub post_restart: Vec<Hook>,
}

impl Hooks {
    #[must_use]
    pub fn on_pre_shutdown(mut self, hook: impl Fn() -> Result<()> + 'static) -> Self {
        self.pre_shutdown.push(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_pre_restart(mut self, hook: impl Fn() -> Result<()> + 'static) -> Self {
        self.pre_restart.push(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_post_restart(mut self, hook: impl Fn() -> Result<()> + 'static) -> Self {
        self.post_restart.push(Box::new(hook));
        self
    }
}

/// Everything the lifecycle drives besides the log sink
pub struct Collaborators {
    pub client: Box<dyn ChatClient>,
    pub registry: Box<dyn HandlerRegistry>,
    pub services: Vec<Box<dyn Service>>,
    pub server: Option<Box<dyn EmbeddedServer>>,
    pub hooks: Hooks,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            client: Box::new(OfflineClient::default()),
            registry: Box::new(EmptyRegistry),
            services: Vec::new(),
            server: None,
            hooks: Hooks::default(),
        }
    }
}

/// Client that is ready immediately and never talks to a network
#[derive(Debug, Default)]
pub struct OfflineClient {
    connected: Cell<bool>,
}

impl ChatClient for OfflineClient {
    fn connect(&self, on_ready: Box<dyn FnOnce()>) -> Result<()> {
        self.connected.set(true);
        on_ready();
        Ok(())
    }

    fn close(&self) {
        self.connected.set(false);
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }
}

/// Registry without handlers
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegistry;

impl HandlerRegistry for EmptyRegistry {
    fn register_all(&self) -> Result<HandlerCounts> {
        Ok(HandlerCounts::default())
    }

    fn counts(&self) -> HandlerCounts {
        HandlerCounts::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_offline_client_ready_immediately() {
        let client = OfflineClient::default();
        let ready = Rc::new(Cell::new(false));
        let r = Rc::clone(&ready);

        client.connect(Box::new(move || r.set(true))).unwrap();
        assert!(ready.get());
        assert!(client.is_connected());

        client.close();
        assert!(!client.is_connected());
    }

    #[test]
    fn test_handler_counts_display() {
        let counts = HandlerCounts {
            commands: 3,
            events: 2,
            routes: 1,
        };
        assert_eq!(counts.to_string(), "commands=3 events=2 routes=1");
    }

    #[test]
    fn test_hooks_builder() {
        let hooks = Hooks::default()
            .on_pre_shutdown(|| Ok(()))
            .on_pre_restart(|| Ok(()))
            .on_post_restart(|| anyhow::bail!("nope"));

        assert_eq!(hooks.pre_shutdown.len(), 1);
        assert_eq!(hooks.pre_restart.len(), 1);
        assert!((hooks.post_restart[0])().is_err());
    }
}
