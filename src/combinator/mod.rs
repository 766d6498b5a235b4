//! Aggregate operators over collections of promises.
//!
//! Each combinator takes a finite sequence of [`Input`]s (promises or
//! plain values) and produces a single aggregate promise:
//!
//! - [`all`](crate::promise::Promise::all): every input's value, in input
//!   order, or the first rejection.
//! - [`race`](crate::promise::Promise::race): whichever input settles
//!   first, by either means.
//! - [`all_settled`](crate::promise::Promise::all_settled): a
//!   [`Settlement`](all_settled::Settlement) record per input; never
//!   rejects.
//! - [`any`](crate::promise::Promise::any): the first fulfillment, or
//!   every rejection reason collected into a
//!   [`Reasons`](any::Reasons) list.
//!
//! A plain value behaves exactly like an input that already fulfilled with
//! it. Input order determines result order, never settlement order.
//!
//! # Example
//!
//! ```
//! use pact::combinator::Input;
//! use pact::promise::Promise;
//! use pact::scheduler::Executor;
//!
//! let fetched = Promise::<u32, String>::resolve(2);
//! let sum: Promise<Vec<u32>, String> =
//!     Promise::all([Input::Value(1), Input::Promise(fetched), Input::Value(3)]);
//! assert_eq!(Executor::block_on(&sum), Ok(vec![1, 2, 3]));
//! ```

use crate::promise::Promise;

pub mod all;
pub mod all_settled;
pub mod any;
pub mod race;

/// One element of a combinator's input sequence.
pub enum Input<T, E> {
    /// An already-available value; behaves as an already-fulfilled input.
    Value(T),
    /// A promise whose eventual settlement feeds the aggregate.
    Promise(Promise<T, E>),
}

impl<T, E> From<T> for Input<T, E> {
    fn from(value: T) -> Self {
        Input::Value(value)
    }
}

impl<T, E> From<Promise<T, E>> for Input<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Input::Promise(promise)
    }
}
