//! Task-scoped storage for the current request's environment.
//!
//! # Responsibilities
//! - Hold at most one [`EnvironmentContext`] per unit of work
//! - Bridge the inbound decode to every outbound call made while handling
//! - Guarantee teardown on every exit path
//!
//! A unit of work is either a future run through [`scope`] or a closure run
//! through [`sync_scope`]. Both start with an empty slot and drop it when they
//! finish, fail, panic or are cancelled. Reads outside any scope return `None`.

use std::cell::RefCell;
use std::future::Future;

use crate::context::environment::EnvironmentContext;

tokio::task_local! {
    static CURRENT_ENVIRONMENT: RefCell<Option<EnvironmentContext>>;
}

/// Run `future` as a unit of work with a fresh, empty slot.
pub fn scope<F: Future>(future: F) -> impl Future<Output = F::Output> {
    CURRENT_ENVIRONMENT.scope(RefCell::new(None), future)
}

/// Run `f` synchronously as a unit of work with a fresh, empty slot.
pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
    CURRENT_ENVIRONMENT.sync_scope(RefCell::new(None), f)
}

/// Run `future` in a new unit of work that starts with the caller's current
/// environment.
///
/// The context is captured when this function is called, so the returned
/// future can be handed to `tokio::spawn`.
pub fn propagate<F: Future>(future: F) -> impl Future<Output = F::Output> {
    let inherited = get();
    CURRENT_ENVIRONMENT.scope(RefCell::new(inherited), future)
}

/// Store `ctx` for the current unit of work, replacing any previous value.
///
/// `None` leaves the slot untouched.
pub fn set(ctx: Option<EnvironmentContext>) {
    let Some(ctx) = ctx else {
        return;
    };
    tracing::debug!(environment = %ctx, "Caching environment for request");
    let stored = CURRENT_ENVIRONMENT.try_with(|slot| {
        *slot.borrow_mut() = Some(ctx);
    });
    if stored.is_err() {
        tracing::debug!("No request scope active, environment discarded");
    }
}

/// The environment stored for the current unit of work, if any.
pub fn get() -> Option<EnvironmentContext> {
    CURRENT_ENVIRONMENT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Remove the current unit of work's environment. Safe to call repeatedly.
pub fn clear() {
    let _ = CURRENT_ENVIRONMENT.try_with(|slot| match slot.borrow_mut().take() {
        Some(previous) => tracing::debug!(environment = %previous, "Cleared request environment"),
        None => tracing::trace!("Cleared request environment (none present)"),
    });
}

/// Clears the slot when dropped, including during unwinding.
#[derive(Debug)]
#[must_use = "the slot is cleared as soon as the guard is dropped"]
pub struct ClearGuard {
    _private: (),
}

impl ClearGuard {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for ClearGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClearGuard {
    fn drop(&mut self) {
        clear();
    }
}
