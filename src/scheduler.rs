//! Scheduling and execution management.
//!
//! Every continuation registered on a promise is dispatched through a
//! [`Schedule`] implementation, never invoked inline. This is what keeps the
//! engine's ordering guarantees honest: code that settles a promise and then
//! registers more work on it can never race with callback firing, because
//! callbacks only ever run after the current synchronous execution unwinds.
//!
//! The default scheduler is a per-thread FIFO run queue, drained by
//! [`Executor::run`]. Each OS thread has its own queue, which means promises
//! created on one thread are driven by that thread alone.
//!
//! # Example
//!
//! ```
//! use pact::promise::Promise;
//! use pact::scheduler::Executor;
//!
//! let p: Promise<u32, String> = Promise::resolve(2);
//! let doubled = p.then(|n| Ok((n * 2).into()));
//! Executor::run();
//! assert_eq!(doubled.result(), Some(Ok(4)));
//! ```
//!
//! A custom scheduler can be injected for a region of code with [`enter`];
//! promises created inside the closure capture it and dispatch through it
//! for the rest of their lives. The default queue is already deterministic
//! and manually advanced ([`Executor::step`]), so most tests simply drive
//! that.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use log::trace;

use crate::promise::Promise;

/// A zero-argument unit of deferred work.
pub type Job = Box<dyn FnOnce()>;

/// The capability to run a job after the current synchronous execution
/// completes.
///
/// Implementations must only *enqueue* the job and must preserve submission
/// order between jobs; running it inline would let continuations observe
/// half-built state in their callers.
pub trait Schedule {
    /// Enqueue `job` for later execution.
    fn schedule(&self, job: Job);
}

thread_local! {
    static RUN_Q: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
    static CURRENT: RefCell<Option<Rc<dyn Schedule>>> = const { RefCell::new(None) };
}

/// The default [`Schedule`]: push onto this thread's run queue.
struct RunQueue;

impl Schedule for RunQueue {
    fn schedule(&self, job: Job) {
        RUN_Q.with(|q| {
            let mut q = q.borrow_mut();
            q.push_back(job);
            trace!("job enqueued ({} queued)", q.len());
        });
    }
}

/// The scheduler newly-created promises will capture: the innermost
/// [`enter`] override, or this thread's run queue.
pub fn current() -> Rc<dyn Schedule> {
    CURRENT
        .with(|c| c.borrow().clone())
        .unwrap_or_else(|| Rc::new(RunQueue))
}

/// Run `f` with `sched` installed as this thread's current scheduler.
///
/// Promises created inside `f` dispatch their continuations through
/// `sched`; the previous scheduler is restored on the way out.
pub fn enter<R>(sched: Rc<dyn Schedule>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT.with(|c| c.borrow_mut().replace(sched));
    let out = f();
    CURRENT.with(|c| *c.borrow_mut() = prev);
    out
}

/// The per-thread executor for the default run queue.
///
/// A promise on its own is inert: settling it only *enqueues* its
/// continuations. One of [`Executor::run`], [`Executor::step`] or
/// [`Executor::block_on`] must be called to actually push them through.
pub struct Executor;

impl Executor {
    /// Drain this thread's run queue until it is empty.
    ///
    /// Jobs may enqueue further jobs; those are drained too. Returns once
    /// no deferred work remains.
    pub fn run() {
        while Self::step() {}
    }

    /// Run a single queued job. Returns `false` if the queue was empty.
    pub fn step() -> bool {
        let job = RUN_Q.with(|q| q.borrow_mut().pop_front());
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Drive this thread's run queue until `promise` settles, then return
    /// its outcome.
    ///
    /// # Panics
    ///
    /// Panics if the queue runs dry while `promise` is still pending: on a
    /// single-threaded engine with no work left, the promise can never
    /// settle.
    pub fn block_on<T, E>(promise: &Promise<T, E>) -> Result<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        loop {
            if let Some(outcome) = promise.result() {
                return outcome;
            }

            if !Self::step() {
                panic!("run queue is empty but the promise is still pending");
            }
        }
    }
}
