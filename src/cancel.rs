//! Cooperative cancellation for worker threads.
//!
//! A `CancelToken` is a cheap clonable handle. Cancelling it is sticky and
//! cascades to every child token; cancelling a child leaves the parent alone.
//! The engine gives each track a child of the playlist token, so an early
//! exit or an elapsed budget stops one track while a global cancel stops all.
//!
//! Blocked threads observe cancellation through [`CancelToken::signal`],
//! a receiver that becomes ready (disconnected) the moment the token is
//! cancelled, so it composes with `crossbeam_channel::select!`.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct TokenState {
    cancelled: bool,
    /// Never sent on; dropped on cancel to disconnect every receiver
    wake: Option<Sender<()>>,
    children: Vec<CancelToken>,
}

#[derive(Clone)]
pub struct CancelToken {
    state: Arc<Mutex<TokenState>>,
    flag: Arc<AtomicBool>,
    signal: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (wake, signal) = bounded(0);
        Self {
            state: Arc::new(Mutex::new(TokenState {
                cancelled: false,
                wake: Some(wake),
                children: Vec::new(),
            })),
            flag: Arc::new(AtomicBool::new(false)),
            signal,
        }
    }

    /// Cancel this token and every child. Idempotent.
    pub fn cancel(&self) {
        let children = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            self.flag.store(true, Ordering::Release);
            state.wake = None;
            std::mem::take(&mut state.children)
        };
        for child in children {
            child.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// A token cancelled together with this one, but cancellable on its own.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let parent_cancelled = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.cancelled {
                state.children.retain(|c| !c.is_cancelled());
                state.children.push(child.clone());
            }
            state.cancelled
        };
        if parent_cancelled {
            child.cancel();
        }
        child
    }

    /// Receiver that is ready once the token is cancelled. Never yields a value.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Sleep for `duration` unless cancelled first.
    /// Returns `true` if the full duration elapsed without cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        select! {
            recv(self.signal) -> _ => false,
            default(duration) => !self.is_cancelled(),
        }
    }
}
