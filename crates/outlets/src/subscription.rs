use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;

type Release = Box<dyn FnOnce() + Send>;

/// The capability to undo one [`crate::Outlet::register`] call.
///
/// The caller that registered owns the subscription and is responsible for calling
/// [`Subscription::unregister`] on every exit path; nothing is released automatically unless the
/// subscription is turned into a [`SubscriptionGuard`].
///
/// Clones share the same registration. Only the first `unregister` call across all clones has an
/// effect, later calls are no-ops.
#[derive(Clone)]
pub struct Subscription {
    release: Arc<Mutex<Option<Release>>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Arc::new(Mutex::new(Some(Box::new(release)))),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self {
            release: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns `true` if this call released the registration.
    pub fn unregister(&self) -> bool {
        // take first, the release may re-enter the registry
        let release = self.release.lock().take();
        match release {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.lock().is_some()
    }

    /// Releases the registration when the returned guard is dropped.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: self,
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Debug)]
#[must_use = "dropping the guard unregisters immediately"]
pub struct SubscriptionGuard {
    subscription: Subscription,
}

impl SubscriptionGuard {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.subscription.unregister();
    }
}
