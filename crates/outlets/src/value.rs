use std::fmt::{Debug, Formatter};
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

/// How an outlet's value is produced when the outlet is first created.
///
/// Taken by [`crate::Registry::register`]; the other constructors have separate literal and
/// factory variants. A factory is only invoked when an outlet is actually constructed, which lets callers pass an
/// expensive default without first checking whether the outlet already exists.
pub enum InitialValue<T> {
    Literal(T),
    Factory(Box<dyn FnOnce() -> T + Send>),
}

impl<T> InitialValue<T> {
    pub fn factory(factory: impl FnOnce() -> T + Send + 'static) -> Self {
        Self::Factory(Box::new(factory))
    }

    pub(crate) fn resolve(self) -> T {
        match self {
            InitialValue::Literal(value) => value,
            InitialValue::Factory(factory) => factory(),
        }
    }
}

impl<T> From<T> for InitialValue<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T: Debug> Debug for InitialValue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InitialValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            InitialValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// How [`crate::Outlet::update`] computes the next value.
pub enum NextValue<T> {
    /// Replaces the stored value.
    Literal(T),
    /// Computes the next value from the current one, synchronously. Invoked again if the outlet
    /// changes while it runs.
    Reducer(Box<dyn FnMut(&T) -> T + Send>),
    /// Computes the next value from the current one; the outlet is only updated once the future
    /// resolves.
    AsyncReducer(Box<dyn FnOnce(T) -> BoxFuture<'static, T> + Send>),
}

impl<T> NextValue<T> {
    pub fn reducer(reducer: impl FnMut(&T) -> T + Send + 'static) -> Self {
        Self::Reducer(Box::new(reducer))
    }

    pub fn async_reducer<F, Fut>(reducer: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::AsyncReducer(Box::new(move |current| reducer(current).boxed()))
    }
}

impl<T> From<T> for NextValue<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T: Debug> Debug for NextValue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NextValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            NextValue::Reducer(_) => f.write_str("Reducer(..)"),
            NextValue::AsyncReducer(_) => f.write_str("AsyncReducer(..)"),
        }
    }
}
