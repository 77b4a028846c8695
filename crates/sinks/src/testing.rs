//! Deterministic [`EventLoop`] for tests
//!
//! `ManualLoop` keeps a virtual clock that only moves when the test calls
//! [`ManualLoop::advance`]. Due timers fire in deadline order (ties in
//! registration order) and callbacks may freely register, cancel or stop.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::scheduler::{EventLoop, TimerHandle};

enum Callback {
    Once(Box<dyn FnOnce()>),
    Periodic {
        interval: Duration,
        callback: Box<dyn FnMut()>,
    },
}

struct Timer {
    due: Duration,
    callback: Callback,
}

#[derive(Default)]
struct State {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<u64, Timer>,
    /// Timers cancelled while their own callback was running
    cancelled: HashSet<u64>,
    stopped: bool,
}

/// Event loop driven by hand from test code
#[derive(Default)]
pub struct ManualLoop {
    state: RefCell<State>,
}

impl ManualLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.borrow().stopped
    }

    /// Move the clock forward, firing every timer that falls due
    ///
    /// Returns the number of callbacks run. Nothing fires once the loop
    /// has been stopped.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.borrow().now + by;
        let mut fired = 0;

        while let Some((id, timer)) = self.next_due(target) {
            match timer.callback {
                Callback::Once(callback) => callback(),
                Callback::Periodic {
                    interval,
                    mut callback,
                } => {
                    callback();
                    let mut state = self.state.borrow_mut();
                    if !state.cancelled.remove(&id) && !state.stopped {
                        state.timers.insert(
                            id,
                            Timer {
                                due: timer.due + interval.max(Duration::from_nanos(1)),
                                callback: Callback::Periodic { interval, callback },
                            },
                        );
                    }
                }
            }
            fired += 1;
        }

        let mut state = self.state.borrow_mut();
        state.cancelled.clear();
        if !state.stopped {
            state.now = target;
        }
        fired
    }

    /// Run timers that are already due without moving the clock
    pub fn run_due(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Pop the earliest timer due at or before `target`
    fn next_due(&self, target: Duration) -> Option<(u64, Timer)> {
        let mut state = self.state.borrow_mut();
        if state.stopped {
            return None;
        }

        let id = state
            .timers
            .iter()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(id, t)| (t.due, **id))
            .map(|(id, _)| *id)?;

        let timer = state.timers.remove(&id)?;
        state.now = timer.due;
        Some((id, timer))
    }

    fn insert(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now + delay;
        state.timers.insert(id, Timer { due, callback });
        TimerHandle::new(id)
    }
}

impl EventLoop for ManualLoop {
    fn add_periodic_timer(&self, interval: Duration, callback: Box<dyn FnMut()>) -> TimerHandle {
        self.insert(interval, Callback::Periodic { interval, callback })
    }

    fn add_timer(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
        self.insert(delay, Callback::Once(callback))
    }

    fn cancel_timer(&self, handle: TimerHandle) {
        let mut state = self.state.borrow_mut();
        if state.timers.remove(&handle.id()).is_none() {
            state.cancelled.insert(handle.id());
        }
    }

    fn stop(&self) {
        self.state.borrow_mut().stopped = true;
    }
}
