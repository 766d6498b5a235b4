//! # `pact`: a tiny promise engine
//!
//! This project implements a minimalistic deferred-settlement primitive,
//! written in as few lines as possible while staying precise about the
//! protocol's hard parts: idempotent settlement, strictly deferred and
//! ordered continuation dispatch, cycle detection, and the assimilation of
//! foreign thenables that misbehave.
//!
//! A [`Promise`](promise::Promise) starts out pending and settles exactly
//! once, fulfilled with a value or rejected with a reason. Continuations
//! chain with `then`/`catch`/`finally`, and the
//! [`combinator`] module aggregates whole collections of promises into one.
//! Everything is single-threaded and cooperatively scheduled: settling a
//! promise only *enqueues* work, and the per-thread
//! [`Executor`](scheduler::Executor) pushes it through.
//!
//! For construction and chaining, see the [`promise`] module. For how
//! results, including foreign [`Thenable`](resolution::Thenable)s, are
//! folded into a promise, see [`resolution`]. For driving and injecting
//! schedulers, see [`scheduler`].
//!
//! ## Example
//!
//! ```
//! use pact::promise::Promise;
//! use pact::scheduler::Executor;
//!
//! let greeting: Promise<String, String> = Promise::resolve("Hello".to_string());
//! let sentence = greeting
//!     .then(|g| Ok(format!("{g}, world!").into()))
//!     .finally(|| Ok(().into()));
//!
//! assert_eq!(Executor::block_on(&sentence), Ok("Hello, world!".to_string()));
//! ```
pub mod combinator;
pub mod promise;
pub mod resolution;
pub mod scheduler;
