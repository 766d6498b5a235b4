//! First settlement wins.

use super::Input;
use crate::promise::Promise;

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Produce a promise that settles, by either means, with whichever
    /// input settles first.
    ///
    /// Plain values win immediately, in submission order; every later
    /// settlement is ignored. An empty sequence never settles.
    ///
    /// ```
    /// use pact::combinator::Input;
    /// use pact::promise::Promise;
    /// use pact::scheduler::Executor;
    ///
    /// let slow = Promise::<u32, String>::deferred();
    /// let race = Promise::race([Input::Promise(slow.promise.clone()), Input::Value(9)]);
    /// assert_eq!(Executor::block_on(&race), Ok(9));
    /// ```
    pub fn race<I>(inputs: I) -> Promise<T, E>
    where
        I: IntoIterator,
        I::Item: Into<Input<T, E>>,
    {
        let winner = Promise::<T, E>::pending();

        for input in inputs {
            match input.into() {
                Input::Value(value) => winner.settle(Ok(value)),
                Input::Promise(promise) => {
                    let fulfilled = winner.clone();
                    let rejected = winner.clone();
                    promise.subscribe(
                        move |value| fulfilled.settle(Ok(value)),
                        move |reason| rejected.settle(Err(reason)),
                    );
                }
            }
        }

        winner
    }
}
