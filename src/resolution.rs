//! The resolution procedure.
//!
//! Settling a promise with a plain value is easy; the interesting cases are
//! settling it with *another* deferred computation. A continuation may hand
//! back one of three things, captured by [`Resolution`]:
//!
//! - a plain value, which settles the target directly;
//! - another [`Promise`] from this engine, whose outcome the target adopts;
//! - a foreign [`Thenable`], which is assimilated by calling its `then`
//!   implementation with a pair of callbacks.
//!
//! Foreign thenables cannot be trusted. An implementation may call both
//! callbacks, call one of them several times, signal asynchronously long
//! after `then` returned, or fail after having already signalled. The
//! procedure guards every assimilation with a single-use latch shared
//! between the callbacks and the error path, so that exactly one signal
//! wins and the target still settles exactly once.
//!
//! # Example
//!
//! ```
//! use pact::promise::Promise;
//! use pact::resolution::{OnReject, OnResolve, Resolution, Thenable};
//! use pact::scheduler::Executor;
//!
//! struct Eager(u32);
//!
//! impl Thenable<u32, String> for Eager {
//!     fn then(
//!         self: Box<Self>,
//!         resolve: OnResolve<u32, String>,
//!         _reject: OnReject<String>,
//!     ) -> Result<(), String> {
//!         resolve(Resolution::Value(self.0));
//!         Ok(())
//!     }
//! }
//!
//! let p: Promise<u32, String> = Promise::resolve(Resolution::thenable(Eager(7)));
//! assert_eq!(Executor::block_on(&p), Ok(7));
//! ```

use std::{cell::Cell, rc::Rc};

use log::{debug, warn};
use thiserror::Error;

use crate::promise::Promise;

/// The reason a promise is rejected with when a continuation resolves its
/// own downstream promise.
///
/// This is terminal for the chain, not retryable. Reason types opt into
/// carrying it via `From<Cycle>`; the crate provides the conversion for
/// `String` and for [`Reasons`](crate::combinator::any::Reasons).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("chaining cycle detected")]
pub struct Cycle;

impl From<Cycle> for String {
    fn from(cycle: Cycle) -> Self {
        cycle.to_string()
    }
}

/// Success callback handed to a thenable: feeds the next operand back into
/// the resolution procedure, so thenables may resolve to further thenables.
pub type OnResolve<T, E> = Box<dyn Fn(Resolution<T, E>)>;

/// Failure callback handed to a thenable.
pub type OnReject<E> = Box<dyn Fn(E)>;

/// A foreign deferred computation, adaptable into this engine regardless of
/// its own implementation.
pub trait Thenable<T, E> {
    /// Start the computation, reporting its outcome through `resolve` or
    /// `reject`.
    ///
    /// Returning `Err` counts as the invocation failing outright. Whatever
    /// combination of signals an implementation produces, only the first
    /// one has any effect on the promise being resolved.
    fn then(self: Box<Self>, resolve: OnResolve<T, E>, reject: OnReject<E>) -> Result<(), E>;
}

/// What a promise gets settled with: the operand of the resolution
/// procedure.
pub enum Resolution<T, E> {
    /// A plain value.
    Value(T),
    /// Another promise; the target adopts its outcome.
    Chain(Promise<T, E>),
    /// A foreign thenable to assimilate.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Wrap a [`Thenable`] implementation as a resolution operand.
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Resolution::Thenable(Box::new(thenable))
    }
}

impl<T, E> From<T> for Resolution<T, E> {
    fn from(value: T) -> Self {
        Resolution::Value(value)
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Chain(promise)
    }
}

/// Resolve `target` with `operand`.
pub(crate) fn resolve<T, E>(target: &Promise<T, E>, operand: Resolution<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Cycle> + 'static,
{
    match operand {
        Resolution::Value(value) => target.settle(Ok(value)),
        Resolution::Chain(source) => {
            if source.ptr_eq(target) {
                warn!("promise resolved with itself; rejecting");
                target.settle(Err(Cycle.into()));
                return;
            }

            let fulfilled = target.clone();
            let rejected = target.clone();
            source.subscribe(
                move |value| fulfilled.settle(Ok(value)),
                move |reason| rejected.settle(Err(reason)),
            );
        }
        Resolution::Thenable(thenable) => assimilate(target, thenable),
    }
}

/// Adopt the outcome of a foreign thenable, tolerating any amount of
/// misbehaviour from its `then` implementation.
fn assimilate<T, E>(target: &Promise<T, E>, thenable: Box<dyn Thenable<T, E>>)
where
    T: Clone + 'static,
    E: Clone + From<Cycle> + 'static,
{
    let claimed = Rc::new(Cell::new(false));

    let on_resolve: OnResolve<T, E> = {
        let claimed = claimed.clone();
        let target = target.clone();
        Box::new(move |next| {
            if claimed.replace(true) {
                debug!("extra thenable signal discarded");
                return;
            }
            resolve(&target, next);
        })
    };

    let on_reject: OnReject<E> = {
        let claimed = claimed.clone();
        let target = target.clone();
        Box::new(move |reason| {
            if claimed.replace(true) {
                debug!("extra thenable signal discarded");
                return;
            }
            target.settle(Err(reason));
        })
    };

    if let Err(reason) = thenable.then(on_resolve, on_reject) {
        if !claimed.replace(true) {
            target.settle(Err(reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::{OnReject, OnResolve, Resolution, Thenable};
    use crate::{promise::Promise, scheduler::Executor};

    struct Eventually(u32);

    impl Thenable<u32, String> for Eventually {
        fn then(
            self: Box<Self>,
            resolve: OnResolve<u32, String>,
            _reject: OnReject<String>,
        ) -> Result<(), String> {
            resolve(Resolution::Value(self.0));
            Ok(())
        }
    }

    #[test]
    fn thenable_assimilates() {
        let p: Promise<u32, String> = Promise::resolve(Resolution::thenable(Eventually(3)));
        assert_eq!(Executor::block_on(&p), Ok(3));
    }

    struct Unruly;

    impl Thenable<u32, String> for Unruly {
        fn then(
            self: Box<Self>,
            resolve: OnResolve<u32, String>,
            reject: OnReject<String>,
        ) -> Result<(), String> {
            resolve(Resolution::Value(1));
            resolve(Resolution::Value(2));
            reject("already claimed".to_string());
            Err("also already claimed".to_string())
        }
    }

    #[test]
    fn misbehaving_thenable_settles_the_target_once() {
        let p: Promise<u32, String> = Promise::resolve(Resolution::thenable(Unruly));
        assert_eq!(Executor::block_on(&p), Ok(1));
    }

    struct Hostile;

    impl Thenable<u32, String> for Hostile {
        fn then(
            self: Box<Self>,
            _resolve: OnResolve<u32, String>,
            _reject: OnReject<String>,
        ) -> Result<(), String> {
            Err("no then for you".to_string())
        }
    }

    #[test]
    fn failing_then_rejects_the_target() {
        let p: Promise<u32, String> = Promise::resolve(Resolution::thenable(Hostile));
        assert_eq!(Executor::block_on(&p), Err("no then for you".to_string()));
    }

    struct Nested(u32);

    impl Thenable<u32, String> for Nested {
        fn then(
            self: Box<Self>,
            resolve: OnResolve<u32, String>,
            _reject: OnReject<String>,
        ) -> Result<(), String> {
            if self.0 == 0 {
                resolve(Resolution::Value(0));
            } else {
                resolve(Resolution::thenable(Nested(self.0 - 1)));
            }
            Ok(())
        }
    }

    #[test]
    fn thenables_resolving_to_thenables_assimilate_to_any_depth() {
        let p: Promise<u32, String> = Promise::resolve(Resolution::thenable(Nested(4)));
        assert_eq!(Executor::block_on(&p), Ok(0));
    }

    type Parked = Rc<RefCell<Option<(OnResolve<u32, String>, OnReject<String>)>>>;

    struct Lazy(Parked);

    impl Thenable<u32, String> for Lazy {
        fn then(
            self: Box<Self>,
            resolve: OnResolve<u32, String>,
            reject: OnReject<String>,
        ) -> Result<(), String> {
            self.0.borrow_mut().replace((resolve, reject));
            Ok(())
        }
    }

    #[test]
    fn thenable_may_signal_long_after_then_returned() {
        let parked: Parked = Rc::new(RefCell::new(None));
        let p: Promise<u32, String> = Promise::resolve(Resolution::thenable(Lazy(parked.clone())));

        Executor::run();
        assert!(p.is_pending());

        let (resolve, reject) = parked.borrow_mut().take().unwrap();
        resolve(Resolution::Value(11));
        reject("too late".to_string());

        assert_eq!(Executor::block_on(&p), Ok(11));
    }

    #[test]
    fn chain_resolution_adopts_the_other_promise() {
        let upstream = Promise::<u32, String>::deferred();
        let p: Promise<u32, String> = Promise::resolve(upstream.promise.clone());

        Executor::run();
        assert!(p.is_pending());

        upstream.resolve(6);
        assert_eq!(Executor::block_on(&p), Ok(6));
    }

    #[test]
    fn chain_resolution_adopts_rejections_too() {
        let p: Promise<u32, String> =
            Promise::resolve(Promise::<u32, String>::reject("bad".to_string()));
        assert_eq!(Executor::block_on(&p), Err("bad".to_string()));
    }
}
