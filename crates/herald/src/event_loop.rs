//! Cooperative event loop backed by a tokio current-thread runtime
//!
//! Every timer is a task on one `LocalSet`, so callbacks run on the main
//! thread one at a time and may hold `Rc`/`RefCell` state. [`LocalLoop::run`]
//! drives the set until [`EventLoop::stop`] is called.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use herald_sinks::{EventLoop, TimerHandle};
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest timer period; tokio rejects a zero interval
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Default)]
struct Timers {
    next_id: u64,
    active: HashMap<u64, CancellationToken>,
}

impl Timers {
    fn register(&mut self) -> (TimerHandle, CancellationToken) {
        let id = self.next_id;
        self.next_id += 1;
        let token = CancellationToken::new();
        self.active.insert(id, token.clone());
        (TimerHandle::new(id), token)
    }
}

/// Single-threaded loop implementing [`EventLoop`]
pub struct LocalLoop {
    // Dropped before the runtime so pending timers unwind inside it
    local: LocalSet,
    runtime: Runtime,
    timers: Rc<RefCell<Timers>>,
    stop: CancellationToken,
}

impl LocalLoop {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build event loop runtime")?;
        Ok(Self::with_runtime(runtime))
    }

    fn with_runtime(runtime: Runtime) -> Self {
        Self {
            local: LocalSet::new(),
            runtime,
            timers: Rc::new(RefCell::new(Timers::default())),
            stop: CancellationToken::new(),
        }
    }

    /// Run the loop until stopped
    pub fn run(&self) {
        let stop = self.stop.clone();
        self.runtime
            .block_on(self.local.run_until(async move { stop.cancelled().await }));
    }

    /// Spawn a task on the loop thread
    pub fn spawn_local<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.local.spawn_local(future);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.borrow().active.len()
    }
}

impl EventLoop for LocalLoop {
    fn add_periodic_timer(&self, interval: Duration, mut callback: Box<dyn FnMut()>) -> TimerHandle {
        let (handle, token) = self.timers.borrow_mut().register();
        let period = interval.max(MIN_INTERVAL);

        self.local.spawn_local(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => callback(),
                }
            }
        });

        handle
    }

    fn add_timer(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let (handle, token) = self.timers.borrow_mut().register();
        let timers = Rc::downgrade(&self.timers);

        self.local.spawn_local(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = time::sleep(delay) => {
                    if let Some(timers) = timers.upgrade() {
                        timers.borrow_mut().active.remove(&handle.id());
                    }
                    callback();
                }
            }
        });

        handle
    }

    fn cancel_timer(&self, handle: TimerHandle) {
        if let Some(token) = self.timers.borrow_mut().active.remove(&handle.id()) {
            token.cancel();
        }
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn paused() -> LocalLoop {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        LocalLoop::with_runtime(runtime)
    }

    #[test]
    fn test_one_shot_then_stop() {
        let lp = Rc::new(paused());
        let fired = Rc::new(Cell::new(false));

        let (l, f) = (Rc::clone(&lp), Rc::clone(&fired));
        lp.add_timer(
            Duration::from_millis(50),
            Box::new(move || {
                f.set(true);
                l.stop();
            }),
        );
        lp.run();

        assert!(fired.get());
        assert!(lp.is_stopped());
        assert_eq!(lp.active_timers(), 0);
    }

    #[test]
    fn test_periodic_ticks_until_cancelled() {
        let lp = Rc::new(paused());
        let ticks = Rc::new(Cell::new(0));

        let t = Rc::clone(&ticks);
        let handle = lp.add_periodic_timer(
            Duration::from_millis(10),
            Box::new(move || t.set(t.get() + 1)),
        );

        let l = Rc::clone(&lp);
        lp.add_timer(
            Duration::from_millis(55),
            Box::new(move || {
                l.cancel_timer(handle);
                l.stop();
            }),
        );
        lp.run();

        assert_eq!(ticks.get(), 5);
        assert_eq!(lp.active_timers(), 0);
    }

    #[test]
    fn test_cancelled_one_shot_never_fires() {
        let lp = Rc::new(paused());
        let fired = Rc::new(Cell::new(false));

        let f = Rc::clone(&fired);
        let handle = lp.add_timer(Duration::from_millis(10), Box::new(move || f.set(true)));
        lp.cancel_timer(handle);
        lp.cancel_timer(handle);

        let l = Rc::clone(&lp);
        lp.add_timer(Duration::from_millis(50), Box::new(move || l.stop()));
        lp.run();

        assert!(!fired.get());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let lp = Rc::new(paused());
        let ticks = Rc::new(Cell::new(0));

        let t = Rc::clone(&ticks);
        lp.add_periodic_timer(Duration::ZERO, Box::new(move || t.set(t.get() + 1)));
        let l = Rc::clone(&lp);
        lp.add_timer(Duration::from_millis(5), Box::new(move || l.stop()));
        lp.run();

        assert!(ticks.get() >= 4);
    }
}
