//! Wait for every input to fulfill.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::Input;
use crate::promise::Promise;

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Produce a promise that fulfills with every input's value, in input
    /// order, once all of them have fulfilled.
    ///
    /// Rejects with the first rejection's reason, without waiting for the
    /// remaining inputs; their later settlements are ignored. An empty
    /// sequence fulfills immediately with an empty vector.
    ///
    /// ```
    /// use pact::promise::Promise;
    /// use pact::scheduler::Executor;
    ///
    /// let all: Promise<Vec<u32>, String> = Promise::all([1, 2, 3]);
    /// assert_eq!(Executor::block_on(&all), Ok(vec![1, 2, 3]));
    /// ```
    pub fn all<I>(inputs: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Into<Input<T, E>>,
    {
        let inputs: Vec<Input<T, E>> = inputs.into_iter().map(Into::into).collect();
        let aggregate = Promise::<Vec<T>, E>::pending();
        let total = inputs.len();

        if total == 0 {
            aggregate.settle(Ok(Vec::new()));
            return aggregate;
        }

        let slots: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; total]));
        let filled = Rc::new(Cell::new(0usize));

        for (index, input) in inputs.into_iter().enumerate() {
            let store = {
                let slots = slots.clone();
                let filled = filled.clone();
                let aggregate = aggregate.clone();
                move |value: T| {
                    slots.borrow_mut()[index] = Some(value);
                    let n = filled.get() + 1;
                    filled.set(n);
                    if n == total {
                        let values = slots.borrow_mut().drain(..).flatten().collect();
                        aggregate.settle(Ok(values));
                    }
                }
            };

            match input {
                Input::Value(value) => store(value),
                Input::Promise(promise) => {
                    let aggregate = aggregate.clone();
                    promise.subscribe(store, move |reason| aggregate.settle(Err(reason)));
                }
            }
        }

        aggregate
    }
}
