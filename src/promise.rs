//! The promise primitive.
//!
//! A [`Promise`] is a container for a value that is not available yet. It
//! starts out *pending* and settles exactly once, either *fulfilled* with a
//! value or *rejected* with a reason; all later settlement attempts are
//! silently ignored. Continuations are attached with [`Promise::then`],
//! [`Promise::catch`] and [`Promise::finally`], each of which returns a new
//! promise settled by the continuation's outcome, so computations chain.
//!
//! Continuations never run inline. Whether the promise is still pending or
//! settled long ago, every callback is dispatched through the scheduler and
//! runs only after the current synchronous execution unwinds; see the
//! [`scheduler`](crate::scheduler) module for how to drive them.
//!
//! Once constructed, a promise cannot be cancelled and its eventual
//! settlement cannot be aborted from the outside; callers that need to give
//! up on a result simply stop observing it.
//!
//! # Example
//!
//! ```
//! use pact::promise::Promise;
//! use pact::scheduler::Executor;
//!
//! let deferred = Promise::<u32, String>::deferred();
//! let total = deferred.promise.then(|n| Ok((n + 2).into()));
//!
//! deferred.resolve(40);
//! assert_eq!(Executor::block_on(&total), Ok(42));
//! ```
//!
//! Rejections flow down a chain until something handles them:
//!
//! ```
//! use pact::promise::Promise;
//! use pact::scheduler::Executor;
//!
//! let p: Promise<u32, String> = Promise::reject("unreachable host".into());
//! let recovered = p
//!     .then(|n| Ok((n * 2).into()))
//!     .catch(|_| Ok(0.into()));
//! assert_eq!(Executor::block_on(&recovered), Ok(0));
//! ```

use std::{cell::RefCell, fmt, mem, rc::Rc};

use log::{debug, trace, warn};

use crate::{
    resolution::{self, Cycle, Resolution},
    scheduler::{self, Schedule},
};

/// Outcome of a user callback: the operand the derived promise is resolved
/// with, or the reason it rejects.
pub type Completion<T, E> = Result<Resolution<T, E>, E>;

enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    fn tag(&self) -> &'static str {
        match self {
            State::Pending => "pending",
            State::Fulfilled(_) => "fulfilled",
            State::Rejected(_) => "rejected",
        }
    }
}

struct Inner<T, E> {
    state: State<T, E>,
    /// External-settlement latch: the first `Resolver`/`Rejector` call (or
    /// executor failure) claims the promise; the rest are ignored.
    lock: bool,
    /// Whether the rejection, if any, was ever observed.
    handled: bool,
    on_fulfilled: Vec<Box<dyn FnOnce(T)>>,
    on_rejected: Vec<Box<dyn FnOnce(E)>>,
    sched: Rc<dyn Schedule>,
}

impl<T, E> Drop for Inner<T, E> {
    fn drop(&mut self) {
        if matches!(self.state, State::Rejected(_)) && !self.handled {
            warn!("promise dropped with an unobserved rejection");
        }
    }
}

/// A settleable value container.
///
/// `Promise` is a cheap handle; clones refer to the same underlying state.
/// Handles are single-threaded (`!Send`) and continuations registered on
/// one fire in registration order, each exactly once.
pub struct Promise<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.inner.borrow().state.tag())
            .finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub(crate) fn pending() -> Self {
        Self::pending_with(scheduler::current())
    }

    fn pending_with(sched: Rc<dyn Schedule>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                lock: false,
                handled: false,
                on_fulfilled: Vec::new(),
                on_rejected: Vec::new(),
                sched,
            })),
        }
    }

    /// Construct a pending promise and synchronously invoke `executor` with
    /// its settlement capabilities.
    ///
    /// The capabilities are idempotent: the first call to either wins and
    /// every later call is silently ignored. An `Err` from the executor
    /// rejects the promise (unless a capability was already used) rather
    /// than escaping the constructor.
    pub fn new<X>(executor: X) -> Self
    where
        X: FnOnce(Resolver<T, E>, Rejector<T, E>) -> Result<(), E>,
    {
        let promise = Self::pending();
        let resolver = Resolver {
            promise: promise.clone(),
        };
        let rejector = Rejector {
            promise: promise.clone(),
        };

        if let Err(reason) = executor(resolver, rejector) {
            if promise.claim() {
                promise.settle(Err(reason));
            }
        }

        promise
    }

    /// Construct a promise rejected with `reason`.
    pub fn reject(reason: E) -> Self {
        let promise = Self::pending();
        promise.settle(Err(reason));
        promise
    }

    /// Construct a pending promise together with its settlement
    /// capabilities, for settlement from outside the constructing scope.
    pub fn deferred() -> Deferred<T, E> {
        let promise = Self::pending();
        Deferred {
            resolver: Resolver {
                promise: promise.clone(),
            },
            rejector: Rejector {
                promise: promise.clone(),
            },
            promise,
        }
    }

    /// The settled outcome, or `None` while pending.
    pub fn result(&self) -> Option<Result<T, E>> {
        let mut inner = self.inner.borrow_mut();
        inner.handled = true;
        match &inner.state {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Whether the promise has not settled yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.borrow().state, State::Pending)
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Transition to a settled state, dispatching the matching continuation
    /// queue in registration order and discarding the other. A no-op if the
    /// promise already settled.
    pub(crate) fn settle(&self, outcome: Result<T, E>) {
        let mut inner = self.inner.borrow_mut();
        if !matches!(inner.state, State::Pending) {
            debug!(
                "settlement attempt on a {} promise ignored",
                inner.state.tag()
            );
            return;
        }

        match outcome {
            Ok(value) => {
                trace!("promise fulfilled");
                inner.state = State::Fulfilled(value.clone());
                let queue = mem::take(&mut inner.on_fulfilled);
                inner.on_rejected.clear();
                let sched = inner.sched.clone();
                drop(inner);

                for continuation in queue {
                    let value = value.clone();
                    sched.schedule(Box::new(move || continuation(value)));
                }
            }
            Err(reason) => {
                trace!("promise rejected");
                inner.state = State::Rejected(reason.clone());
                let queue = mem::take(&mut inner.on_rejected);
                inner.on_fulfilled.clear();
                let sched = inner.sched.clone();
                drop(inner);

                for continuation in queue {
                    let reason = reason.clone();
                    sched.schedule(Box::new(move || continuation(reason)));
                }
            }
        }
    }

    /// Register a continuation pair. Fires through the scheduler once the
    /// promise settles, or immediately (still deferred) if it already has.
    pub(crate) fn subscribe(
        &self,
        on_value: impl FnOnce(T) + 'static,
        on_reason: impl FnOnce(E) + 'static,
    ) {
        let mut inner = self.inner.borrow_mut();
        inner.handled = true;
        match &inner.state {
            State::Pending => {
                inner.on_fulfilled.push(Box::new(on_value));
                inner.on_rejected.push(Box::new(on_reason));
            }
            State::Fulfilled(value) => {
                let value = value.clone();
                inner.sched.schedule(Box::new(move || on_value(value)));
            }
            State::Rejected(reason) => {
                let reason = reason.clone();
                inner.sched.schedule(Box::new(move || on_reason(reason)));
            }
        }
    }

    /// Claim the external-settlement latch. `false` means some capability
    /// already claimed it.
    fn claim(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.lock {
            debug!("settlement capability used after the first call; ignoring");
            false
        } else {
            inner.lock = true;
            true
        }
    }

    fn sched(&self) -> Rc<dyn Schedule> {
        self.inner.borrow().sched.clone()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Cycle> + 'static,
{
    /// Construct a promise resolved with `operand`: fulfilled directly for
    /// a plain value, or adopting the outcome of a chained promise or
    /// thenable.
    pub fn resolve(operand: impl Into<Resolution<T, E>>) -> Self {
        let promise = Self::pending();
        resolution::resolve(&promise, operand.into());
        promise
    }

    /// Chain a continuation on fulfillment; rejections pass through to the
    /// derived promise untouched.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Completion<U, E> + 'static,
    {
        self.then_catch(on_fulfilled, Err)
    }

    /// Chain a continuation pair: `on_fulfilled` maps the value,
    /// `on_rejected` may recover from (or re-raise) the reason. Exactly one
    /// of the two runs, and its completion settles the derived promise.
    pub fn then_catch<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Completion<U, E> + 'static,
        R: FnOnce(E) -> Completion<U, E> + 'static,
    {
        let derived = Promise::pending_with(self.sched());
        let fulfilled = derived.clone();
        let rejected = derived.clone();

        self.subscribe(
            move |value| fulfilled.complete(on_fulfilled(value)),
            move |reason| rejected.complete(on_rejected(reason)),
        );

        derived
    }

    /// Chain a continuation on rejection; fulfillments pass through.
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> Completion<T, E> + 'static,
    {
        self.then_catch(|value| Ok(Resolution::Value(value)), on_rejected)
    }

    /// Run `on_finally` once the promise settles, preserving the original
    /// outcome through it.
    ///
    /// The callback takes no argument and its value does not replace the
    /// original one; a returned chain or thenable is awaited first. If the
    /// callback itself fails, or its returned chain rejects, that new
    /// failure supersedes the original outcome.
    pub fn finally<F>(&self, on_finally: F) -> Promise<T, E>
    where
        F: FnOnce() -> Completion<(), E> + 'static,
    {
        let side = Rc::new(RefCell::new(Some(on_finally)));
        let other = side.clone();

        self.then_catch(
            move |value| {
                let on_finally = side.borrow_mut().take().expect("promise settled twice");
                match on_finally() {
                    Err(reason) => Err(reason),
                    Ok(gate) => {
                        let gate = Promise::<(), E>::resolve(gate);
                        Ok(Resolution::Chain(
                            gate.then(move |()| Ok(Resolution::Value(value))),
                        ))
                    }
                }
            },
            move |reason| {
                let on_finally = other.borrow_mut().take().expect("promise settled twice");
                match on_finally() {
                    Err(new_reason) => Err(new_reason),
                    Ok(gate) => {
                        let gate = Promise::<(), E>::resolve(gate);
                        Ok(Resolution::Chain(gate.then(move |()| Err(reason))))
                    }
                }
            },
        )
    }

    /// Resolve with a completion: `Ok` runs the resolution procedure, `Err`
    /// rejects.
    pub(crate) fn complete(&self, completion: Completion<T, E>) {
        match completion {
            Ok(operand) => resolution::resolve(self, operand),
            Err(reason) => self.settle(Err(reason)),
        }
    }
}

/// The capability to resolve a promise from outside its executor.
pub struct Resolver<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Cycle> + 'static,
{
    /// Resolve the promise. Idempotent: only the first capability call on a
    /// given promise has any effect.
    pub fn resolve(&self, operand: impl Into<Resolution<T, E>>) {
        if self.promise.claim() {
            resolution::resolve(&self.promise, operand.into());
        }
    }
}

/// The capability to reject a promise from outside its executor.
pub struct Rejector<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Clone for Rejector<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E> Rejector<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Reject the promise. Idempotent: only the first capability call on a
    /// given promise has any effect.
    pub fn reject(&self, reason: E) {
        if self.promise.claim() {
            self.promise.settle(Err(reason));
        }
    }
}

/// A promise bundled with its settlement capabilities.
///
/// Produced by [`Promise::deferred`]; used where settlement must be
/// triggered from outside the constructing scope, such as adapters to
/// callback-based interfaces.
pub struct Deferred<T, E> {
    /// The promise to hand out to consumers.
    pub promise: Promise<T, E>,
    resolver: Resolver<T, E>,
    rejector: Rejector<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Reject the promise, if no capability call beat this one.
    pub fn reject(&self, reason: E) {
        self.rejector.reject(reason);
    }

    /// A standalone clone of the rejection capability.
    pub fn rejector(&self) -> Rejector<T, E> {
        self.rejector.clone()
    }

    /// Split into the promise and its two capabilities.
    pub fn into_parts(self) -> (Promise<T, E>, Resolver<T, E>, Rejector<T, E>) {
        (self.promise, self.resolver, self.rejector)
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Cycle> + 'static,
{
    /// Resolve the promise, if no capability call beat this one.
    pub fn resolve(&self, operand: impl Into<Resolution<T, E>>) {
        self.resolver.resolve(operand);
    }

    /// A standalone clone of the resolution capability.
    pub fn resolver(&self) -> Resolver<T, E> {
        self.resolver.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::{Completion, Promise};
    use crate::{resolution::Cycle, scheduler::Executor};

    #[test]
    fn resolve_fulfills_with_the_value() {
        let p: Promise<u32, String> = Promise::resolve(42);
        assert_eq!(Executor::block_on(&p), Ok(42));
    }

    #[test]
    fn reject_rejects_with_the_reason() {
        let p: Promise<u32, String> = Promise::reject("nope".to_string());
        assert_eq!(Executor::block_on(&p), Err("nope".to_string()));
    }

    #[test]
    fn executor_failure_rejects() {
        let p: Promise<u32, String> = Promise::new(|_resolve, _reject| Err("boom".to_string()));
        assert_eq!(Executor::block_on(&p), Err("boom".to_string()));
    }

    #[test]
    fn executor_failure_after_resolve_is_ignored() {
        let p: Promise<u32, String> = Promise::new(|resolve, _reject| {
            resolve.resolve(1);
            Err("late".to_string())
        });
        assert_eq!(Executor::block_on(&p), Ok(1));
    }

    #[test]
    fn first_settlement_wins() {
        let deferred = Promise::<u32, String>::deferred();
        deferred.resolve(1);
        deferred.resolve(2);
        deferred.reject("no".to_string());
        assert_eq!(Executor::block_on(&deferred.promise), Ok(1));
    }

    #[test]
    fn continuations_fire_in_registration_order_exactly_once() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let deferred = Promise::<u32, String>::deferred();

        for tag in 0..4 {
            let order = order.clone();
            deferred.promise.then(move |n| {
                order.borrow_mut().push((tag, n));
                Ok(n.into())
            });
        }

        deferred.resolve(7);
        deferred.resolve(9);
        Executor::run();
        assert_eq!(*order.borrow(), vec![(0, 7), (1, 7), (2, 7), (3, 7)]);
    }

    #[test]
    fn continuations_never_run_inline() {
        let hit = Rc::new(Cell::new(false));
        let p: Promise<u32, String> = Promise::resolve(1);

        let flag = hit.clone();
        p.then(move |n| {
            flag.set(true);
            Ok(n.into())
        });

        assert!(!hit.get());
        Executor::run();
        assert!(hit.get());
    }

    #[test]
    fn settlement_does_not_run_registered_callbacks_inline() {
        let hit = Rc::new(Cell::new(false));
        let deferred = Promise::<u32, String>::deferred();

        let flag = hit.clone();
        deferred.promise.then(move |n| {
            flag.set(true);
            Ok(n.into())
        });

        deferred.resolve(1);
        assert!(!hit.get());
        Executor::run();
        assert!(hit.get());
    }

    #[test]
    fn late_registration_still_sees_the_value() {
        let p: Promise<u32, String> = Promise::resolve(5);
        Executor::run();

        let bumped = p.then(|n| Ok((n + 1).into()));
        assert!(bumped.is_pending());
        assert_eq!(Executor::block_on(&bumped), Ok(6));
    }

    #[test]
    fn default_rejection_handler_propagates_down_the_chain() {
        let p: Promise<u32, String> = Promise::reject("down".to_string());
        let tail = p.then(|n| Ok(n.into())).then(|n| Ok(n.into()));
        assert_eq!(Executor::block_on(&tail), Err("down".to_string()));
    }

    #[test]
    fn catch_recovers() {
        let p: Promise<u32, String> = Promise::reject("down".to_string());
        let tail = p.catch(|_| Ok(3.into()));
        assert_eq!(Executor::block_on(&tail), Ok(3));
    }

    #[test]
    fn callback_failure_rejects_the_derived_promise() {
        let p: Promise<u32, String> = Promise::resolve(1);
        let tail = p.then(|_| -> Completion<u32, String> { Err("threw".to_string()) });
        assert_eq!(Executor::block_on(&tail), Err("threw".to_string()));
    }

    #[test]
    fn continuation_returning_a_promise_adopts_it() {
        let inner = Promise::<u32, String>::deferred();
        let p: Promise<u32, String> = Promise::resolve(1);

        let chained = inner.promise.clone();
        let tail = p.then(move |_| Ok(chained.into()));

        Executor::run();
        assert!(tail.is_pending());

        inner.resolve(8);
        assert_eq!(Executor::block_on(&tail), Ok(8));
    }

    #[test]
    fn resolving_a_promise_with_itself_rejects_with_a_cycle() {
        let deferred = Promise::<u32, String>::deferred();
        deferred.resolve(deferred.promise.clone());
        assert_eq!(
            Executor::block_on(&deferred.promise),
            Err(String::from(Cycle))
        );
    }

    #[test]
    fn continuation_returning_its_own_promise_rejects_with_a_cycle() {
        let stash: Rc<RefCell<Option<Promise<u32, String>>>> = Rc::new(RefCell::new(None));
        let p: Promise<u32, String> = Promise::resolve(1);

        let own = stash.clone();
        let derived = p.then(move |_| {
            let own = own.borrow().clone().expect("derived promise stashed");
            Ok(own.into())
        });
        stash.borrow_mut().replace(derived.clone());

        assert_eq!(
            Executor::block_on(&derived),
            Err("chaining cycle detected".to_string())
        );
    }

    #[test]
    fn finally_preserves_the_value() {
        let ran = Rc::new(Cell::new(false));
        let p: Promise<u32, String> = Promise::resolve(9);

        let flag = ran.clone();
        let tail = p.finally(move || {
            flag.set(true);
            Ok(().into())
        });

        assert_eq!(Executor::block_on(&tail), Ok(9));
        assert!(ran.get());
    }

    #[test]
    fn finally_preserves_the_reason() {
        let p: Promise<u32, String> = Promise::reject("why".to_string());
        let tail = p.finally(|| Ok(().into()));
        assert_eq!(Executor::block_on(&tail), Err("why".to_string()));
    }

    #[test]
    fn finally_failure_supersedes_the_original_reason() {
        let p: Promise<u32, String> = Promise::reject("original".to_string());
        let tail = p.finally(|| Err("superseded".to_string()));
        assert_eq!(Executor::block_on(&tail), Err("superseded".to_string()));
    }

    #[test]
    fn finally_awaits_a_returned_promise() {
        let gate = Promise::<(), String>::deferred();
        let p: Promise<u32, String> = Promise::resolve(2);

        let hold = gate.promise.clone();
        let tail = p.finally(move || Ok(hold.into()));

        Executor::run();
        assert!(tail.is_pending());

        gate.resolve(());
        assert_eq!(Executor::block_on(&tail), Ok(2));
    }

    #[test]
    fn capabilities_survive_the_executor_scope() {
        let parked = Rc::new(RefCell::new(None));

        let stash = parked.clone();
        let p: Promise<u32, String> = Promise::new(move |resolve, _reject| {
            stash.borrow_mut().replace(resolve);
            Ok(())
        });

        Executor::run();
        assert!(p.is_pending());

        parked.borrow_mut().take().unwrap().resolve(13);
        assert_eq!(Executor::block_on(&p), Ok(13));
    }

    #[test]
    fn into_parts_exposes_the_capability_triple() {
        let (promise, resolve, reject) = Promise::<u32, String>::deferred().into_parts();
        reject.reject("first".to_string());
        resolve.resolve(1);
        assert_eq!(Executor::block_on(&promise), Err("first".to_string()));
    }
}
