//! Event queue and wake signal shared by every engine loop.
//!
//! Each engine owns its state and runs on its own thread. Other threads
//! (transport receive loops, the station, other engines) only ever touch
//! the [`Mailbox`]: they post an event or raise the terminate flag, and the
//! condition variable wakes the loop.
//!
//! ```text
//! transport callback ──post()──┐
//! station ──────terminate()────┤──> Mailbox ──recv_timeout()──> engine loop
//! other engine ────post()──────┘
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Bounded wait used as the periodic tick of every engine loop.
pub const TICK: Duration = Duration::from_secs(1);

/// What woke an engine loop.
#[derive(Debug, PartialEq, Eq)]
pub enum Next<E> {
    Event(E),
    Timeout,
    Terminate,
}

struct State<E> {
    queue: VecDeque<E>,
    terminate: bool,
}

pub struct Mailbox<E> {
    state: Mutex<State<E>>,
    wake: Condvar,
}

impl<E> Mailbox<E> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                terminate: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Enqueue an event and wake the loop.
    pub fn post(&self, event: E) {
        self.state.lock().queue.push_back(event);
        self.wake.notify_one();
    }

    /// Ask the loop to exit after its current iteration.
    pub fn terminate(&self) {
        self.state.lock().terminate = true;
        self.wake.notify_all();
    }

    pub fn is_terminating(&self) -> bool {
        self.state.lock().terminate
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop the next event without waiting.
    pub fn try_recv(&self) -> Option<E> {
        self.state.lock().queue.pop_front()
    }

    /// Wait for the next event, a terminate request, or `timeout`.
    ///
    /// Terminate takes precedence over queued events.
    pub fn recv_timeout(&self, timeout: Duration) -> Next<E> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.terminate {
                return Next::Terminate;
            }
            if let Some(event) = state.queue.pop_front() {
                return Next::Event(event);
            }
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                if state.terminate {
                    return Next::Terminate;
                }
                return match state.queue.pop_front() {
                    Some(event) => Next::Event(event),
                    None => Next::Timeout,
                };
            }
        }
    }
}

impl<E> Default for Mailbox<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic millisecond clock, zeroed when the engine starts.
#[derive(Debug, Clone, Copy)]
pub struct EngineClock {
    start: Instant,
}

impl EngineClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
