//! Hooks - ordered async callbacks
//!
//! A hook is something callers attach callbacks to; running it invokes the
//! callbacks in attachment order, each one waiting for the previous to
//! finish and receiving the value it produced.

use crate::error::panic_message;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

type Callback<T> = Rc<dyn Fn(T) -> LocalBoxFuture<'static, anyhow::Result<T>>>;

/// The four lifecycle hooks a suite owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    BeforeEach,
    AfterAll,
    AfterEach,
}

impl HookKind {
    pub fn name(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterAll => "afterAll",
            HookKind::AfterEach => "afterEach",
        }
    }

    /// Teardown hooks only run once their matching setup has completed
    pub fn is_teardown(&self) -> bool {
        matches!(self, HookKind::AfterAll | HookKind::AfterEach)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered sequence of async callbacks
///
/// Cloning a hook is cheap and snapshots the current callbacks; callbacks
/// attached to the original afterwards are not seen by the clone.
pub struct Hook<T = ()> {
    callbacks: Vec<Callback<T>>,
}

impl<T: 'static> Hook<T> {
    /// Create an empty hook
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Append a callback
    pub fn attach<F, Fut>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(T) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
    {
        self.callbacks
            .push(Rc::new(move |value| callback(value).boxed_local()));
        self
    }

    /// Number of attached callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run every callback in order, threading the value through
    ///
    /// Resolves with `value` unchanged when nothing is attached. The first
    /// callback that fails (or panics) aborts the rest.
    pub fn run(&self, value: T) -> LocalBoxFuture<'static, anyhow::Result<T>> {
        let callbacks = self.callbacks.clone();
        async move {
            let mut value = value;
            for callback in callbacks {
                // The call itself happens on first poll so a synchronous panic is caught too
                let step = async { callback(value).await };
                value = match AssertUnwindSafe(step).catch_unwind().await {
                    Ok(result) => result?,
                    Err(payload) => {
                        anyhow::bail!("hook callback panicked: {}", panic_message(&*payload))
                    }
                };
            }
            Ok(value)
        }
        .boxed_local()
    }
}

impl<T: 'static> Default for Hook<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Hook<T> {
    fn clone(&self) -> Self {
        Self {
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<T> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
