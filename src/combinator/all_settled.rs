//! Wait for every input to settle, by either means.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::Input;
use crate::promise::Promise;

/// The recorded outcome of one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    /// The input fulfilled with this value.
    Fulfilled(T),
    /// The input rejected with this reason.
    Rejected(E),
}

impl<T, E> Settlement<T, E> {
    /// Whether the input fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settlement::Fulfilled(_))
    }

    /// The fulfillment value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Settlement::Fulfilled(value) => Some(value),
            Settlement::Rejected(_) => None,
        }
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&E> {
        match self {
            Settlement::Fulfilled(_) => None,
            Settlement::Rejected(reason) => Some(reason),
        }
    }
}

type Slots<T, E> = Rc<RefCell<Vec<Option<Settlement<T, E>>>>>;

fn recorder<T, E>(
    index: usize,
    total: usize,
    slots: &Slots<T, E>,
    settled: &Rc<Cell<usize>>,
    aggregate: &Promise<Vec<Settlement<T, E>>, E>,
) -> impl FnOnce(Settlement<T, E>) + 'static
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let slots = slots.clone();
    let settled = settled.clone();
    let aggregate = aggregate.clone();

    move |outcome| {
        slots.borrow_mut()[index] = Some(outcome);
        let n = settled.get() + 1;
        settled.set(n);
        if n == total {
            let outcomes = slots.borrow_mut().drain(..).flatten().collect();
            aggregate.settle(Ok(outcomes));
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Produce a promise that fulfills with one [`Settlement`] record per
    /// input, in input order, once every input has settled by either
    /// means. Never rejects.
    ///
    /// An empty sequence fulfills immediately with an empty vector.
    ///
    /// ```
    /// use pact::combinator::{all_settled::Settlement, Input};
    /// use pact::promise::Promise;
    /// use pact::scheduler::Executor;
    ///
    /// let settled = Promise::all_settled([
    ///     Input::Promise(Promise::<u32, String>::resolve(1)),
    ///     Input::Promise(Promise::reject("e".to_string())),
    /// ]);
    /// assert_eq!(
    ///     Executor::block_on(&settled),
    ///     Ok(vec![
    ///         Settlement::Fulfilled(1),
    ///         Settlement::Rejected("e".to_string()),
    ///     ]),
    /// );
    /// ```
    pub fn all_settled<I>(inputs: I) -> Promise<Vec<Settlement<T, E>>, E>
    where
        I: IntoIterator,
        I::Item: Into<Input<T, E>>,
    {
        let inputs: Vec<Input<T, E>> = inputs.into_iter().map(Into::into).collect();
        let aggregate = Promise::<Vec<Settlement<T, E>>, E>::pending();
        let total = inputs.len();

        if total == 0 {
            aggregate.settle(Ok(Vec::new()));
            return aggregate;
        }

        let slots: Slots<T, E> = Rc::new(RefCell::new(vec![None; total]));
        let settled = Rc::new(Cell::new(0usize));

        for (index, input) in inputs.into_iter().enumerate() {
            match input {
                Input::Value(value) => {
                    recorder(index, total, &slots, &settled, &aggregate)(Settlement::Fulfilled(
                        value,
                    ));
                }
                Input::Promise(promise) => {
                    let fulfilled = recorder(index, total, &slots, &settled, &aggregate);
                    let rejected = recorder(index, total, &slots, &settled, &aggregate);
                    promise.subscribe(
                        move |value| fulfilled(Settlement::Fulfilled(value)),
                        move |reason| rejected(Settlement::Rejected(reason)),
                    );
                }
            }
        }

        aggregate
    }
}
