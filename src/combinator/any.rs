//! First fulfillment wins; rejections are collected.

use std::{
    cell::{Cell, RefCell},
    fmt,
    ops::Deref,
    rc::Rc,
};

use super::Input;
use crate::{promise::Promise, resolution::Cycle};

/// Every input's rejection reason, in input order.
///
/// The aggregate rejection of [`Promise::any`] is deliberately a plain
/// ordered list rather than an opaque error object; the reasons are
/// reachable through `Deref`, iteration, or the public field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reasons<E>(pub Vec<E>);

impl<E> Deref for Reasons<E> {
    type Target = [E];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E> IntoIterator for Reasons<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<E> fmt::Display for Reasons<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all inputs rejected ({} reasons)", self.0.len())
    }
}

impl<E: fmt::Debug> std::error::Error for Reasons<E> {}

impl<E: From<Cycle>> From<Cycle> for Reasons<E> {
    fn from(cycle: Cycle) -> Self {
        Reasons(vec![E::from(cycle)])
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Produce a promise that fulfills with the value of the first input
    /// to fulfill.
    ///
    /// If and only if every input rejects, the aggregate rejects with
    /// a [`Reasons`] list of all rejection reasons in input order. An
    /// empty sequence rejects immediately with an empty list.
    ///
    /// ```
    /// use pact::combinator::Input;
    /// use pact::promise::Promise;
    /// use pact::scheduler::Executor;
    ///
    /// let any = Promise::any([
    ///     Input::Promise(Promise::<u32, String>::reject("a".to_string())),
    ///     Input::Promise(Promise::resolve(5)),
    /// ]);
    /// assert_eq!(Executor::block_on(&any), Ok(5));
    /// ```
    pub fn any<I>(inputs: I) -> Promise<T, Reasons<E>>
    where
        I: IntoIterator,
        I::Item: Into<Input<T, E>>,
    {
        let inputs: Vec<Input<T, E>> = inputs.into_iter().map(Into::into).collect();
        let winner = Promise::<T, Reasons<E>>::pending();
        let total = inputs.len();

        if total == 0 {
            winner.settle(Err(Reasons(Vec::new())));
            return winner;
        }

        let slots: Rc<RefCell<Vec<Option<E>>>> = Rc::new(RefCell::new(vec![None; total]));
        let rejected = Rc::new(Cell::new(0usize));

        for (index, input) in inputs.into_iter().enumerate() {
            match input {
                Input::Value(value) => winner.settle(Ok(value)),
                Input::Promise(promise) => {
                    let fulfilled = winner.clone();
                    let on_reason = {
                        let slots = slots.clone();
                        let rejected = rejected.clone();
                        let winner = winner.clone();
                        move |reason: E| {
                            slots.borrow_mut()[index] = Some(reason);
                            let n = rejected.get() + 1;
                            rejected.set(n);
                            if n == total {
                                let reasons = slots.borrow_mut().drain(..).flatten().collect();
                                winner.settle(Err(Reasons(reasons)));
                            }
                        }
                    };
                    promise.subscribe(move |value| fulfilled.settle(Ok(value)), on_reason);
                }
            }
        }

        winner
    }
}
