use tracing::warn;

use crate::error::OutletError;
use crate::outlet::Outlet;
use crate::subscription::Subscription;
use crate::value::NextValue;

/// The result of a permissive lookup, see [`crate::Registry::get_or_null`].
///
/// A null outlet tolerates stale keys, e.g. after the outlet was removed during teardown: every
/// operation logs a warning and does nothing.
#[derive(Debug, Clone)]
pub enum MaybeOutlet<T> {
    Live(Outlet<T>),
    Null(NullOutlet),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullOutlet {
    reason: OutletError,
}

impl NullOutlet {
    /// Why the lookup failed.
    pub fn reason(&self) -> &OutletError {
        &self.reason
    }
}

impl<T: Clone + Send + Sync + 'static> MaybeOutlet<T> {
    pub(crate) fn null(reason: OutletError) -> Self {
        Self::Null(NullOutlet {
            reason,
        })
    }

    #[must_use = "dropping the subscription leaves the handler registered with no way to unregister it"]
    pub fn register(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        match self {
            MaybeOutlet::Live(outlet) => outlet.register(handler),
            MaybeOutlet::Null(null) => {
                warn!("Ignoring register on null outlet. reason: {}", null.reason);
                Subscription::noop()
            }
        }
    }

    pub fn update(&self, next: impl Into<NextValue<T>>) {
        match self {
            MaybeOutlet::Live(outlet) => outlet.update(next),
            MaybeOutlet::Null(null) => {
                warn!("Ignoring update on null outlet. reason: {}", null.reason);
            }
        }
    }

    /// `None` for a null outlet.
    pub fn get_value(&self) -> Option<T> {
        match self {
            MaybeOutlet::Live(outlet) => Some(outlet.get_value()),
            MaybeOutlet::Null(null) => {
                warn!("Reading value of null outlet. reason: {}", null.reason);
                None
            }
        }
    }

    pub fn ref_cnt(&self) -> usize {
        match self {
            MaybeOutlet::Live(outlet) => outlet.ref_cnt(),
            MaybeOutlet::Null(_) => 0,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MaybeOutlet::Null(_))
    }

    pub fn into_outlet(self) -> Option<Outlet<T>> {
        match self {
            MaybeOutlet::Live(outlet) => Some(outlet),
            MaybeOutlet::Null(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::{OutletOptions, Registry};

    use super::*;

    #[test]
    fn missing_key_yields_a_null_outlet() {
        // given
        let registry: Registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_handler = calls.clone();

        // when
        let outlet = registry.get_or_null::<i32, _>("missing");
        let subscription = outlet.register(move |_| {
            calls_for_handler.fetch_add(1, Ordering::SeqCst);
        });
        outlet.update(5);

        // then
        assert!(outlet.is_null());
        assert_eq!(outlet.get_value(), None);
        assert_eq!(outlet.ref_cnt(), 0);
        assert!(!subscription.is_active());
        assert!(!subscription.unregister());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!registry.has("missing"));
    }

    #[test]
    fn null_outlet_reports_the_reason() {
        let registry: Registry = Registry::new();
        registry
            .get_or_create("k".to_string(), 1u8, OutletOptions::default())
            .unwrap();

        let outlet = registry.get_or_null::<String, _>("k");

        let MaybeOutlet::Null(null) = &outlet else {
            panic!("expected a null outlet, got {:?}", outlet);
        };
        assert!(matches!(null.reason(), OutletError::TypeMismatch { .. }));
        assert!(outlet.into_outlet().is_none());
    }

    #[test]
    fn existing_key_yields_a_live_outlet() {
        let registry: Registry = Registry::new();
        registry
            .get_or_create("k".to_string(), 1, OutletOptions::default())
            .unwrap();

        let outlet = registry.get_or_null::<i32, _>("k");
        outlet.update(NextValue::reducer(|value: &i32| value * 10));

        assert!(!outlet.is_null());
        assert_eq!(outlet.get_value(), Some(10));
        assert_eq!(registry.get::<i32, _>("k").unwrap().get_value(), 10);
    }
}
