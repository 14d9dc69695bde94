use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::channel::{Event, EventChannel, Listener};
use crate::executor::{AsyncStdSpawner, Spawn};
use crate::options::OutletOptions;
use crate::subscription::Subscription;
use crate::value::{InitialValue, NextValue};

static NEXT_OUTLET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct OutletId(u64);

impl OutletId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OUTLET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The registry side of a registry-backed outlet.
pub(crate) trait Membership: Send + Sync {
    /// Runs `subscribe` while the registry is locked.
    ///
    /// An outlet deleted for being idle is put back first if its key is still vacant.
    fn join(&self, outlet: Arc<dyn ErasedOutlet>, subscribe: Box<dyn FnOnce() -> Subscription + '_>) -> Subscription;

    /// Invoked when the last subscriber of a non-persistent outlet unregisters.
    fn leave(&self);
}

/// Where an outlet stands relative to its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attachment {
    Attached,
    /// Deleted because its last subscriber left; registering on it again reinserts it.
    Idle,
    /// Removed explicitly, replaced, or never part of a registry.
    Detached,
}

struct OutletState<T> {
    value: T,
    version: u64,
    ref_cnt: usize,
    channel: EventChannel<T>,
}

pub(crate) struct OutletShared<T> {
    id: OutletId,
    key: String,
    options: OutletOptions,
    state: Mutex<OutletState<T>>,
    spawner: Arc<dyn Spawn>,
    membership: Option<Box<dyn Membership>>,
    attachment: Mutex<Attachment>,
}

/// A shared, observable value cell.
///
/// Cloning an `Outlet` creates another handle to the same cell.
///
/// # Locking
///
/// Each outlet guards its value, version, subscriber count and listeners with a single lock, which
/// is never held while user code runs. Listeners, factories and reducers may read, update and
/// subscribe to any outlet and use the registry.
///
/// A synchronous reducer is handed a copy of the current value. If the outlet changes before the
/// result is stored, the reducer runs again against the newer value, so it may be invoked more
/// than once and must not itself update the outlet it reduces.
pub struct Outlet<T> {
    shared: Arc<OutletShared<T>>,
}

impl<T> Clone for Outlet<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Debug> Debug for Outlet<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Outlet")
            .field("key", &self.shared.key)
            .field("value", &state.value)
            .field("version", &state.version)
            .field("ref_cnt", &state.ref_cnt)
            .field("persistent", &self.shared.options.is_persistent())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Outlet<T> {
    /// Creates an outlet that belongs to no registry.
    ///
    /// Asynchronous reducers run on the `async-std` global executor.
    pub fn new(initial: T, options: OutletOptions) -> Self {
        Self::with_spawner(initial, options, Arc::new(AsyncStdSpawner))
    }

    /// Like [`Outlet::new`], computing the initial value with `factory`.
    pub fn with_factory(factory: impl FnOnce() -> T + Send + 'static, options: OutletOptions) -> Self {
        Self::from_parts(
            OutletId::next(),
            "<standalone>".to_string(),
            InitialValue::factory(factory),
            options,
            Arc::new(AsyncStdSpawner),
            None,
        )
    }

    pub fn with_spawner(initial: T, options: OutletOptions, spawner: Arc<dyn Spawn>) -> Self {
        Self::from_parts(
            OutletId::next(),
            "<standalone>".to_string(),
            InitialValue::Literal(initial),
            options,
            spawner,
            None,
        )
    }

    pub(crate) fn from_parts(
        id: OutletId,
        key: String,
        initial: InitialValue<T>,
        options: OutletOptions,
        spawner: Arc<dyn Spawn>,
        membership: Option<Box<dyn Membership>>,
    ) -> Self {
        let attachment = match membership {
            Some(_) => Attachment::Attached,
            None => Attachment::Detached,
        };
        let value = initial.resolve();

        Self {
            shared: Arc::new(OutletShared {
                id,
                key,
                options,
                state: Mutex::new(OutletState {
                    value,
                    version: 0,
                    ref_cnt: 0,
                    channel: EventChannel::new(),
                }),
                spawner,
                membership,
                attachment: Mutex::new(attachment),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<OutletShared<T>>) -> Self {
        Self {
            shared,
        }
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedOutlet> {
        self.shared.clone()
    }

    /// Subscribes `handler` to every future value.
    ///
    /// The returned [`Subscription`] must be unregistered by the caller; when the last
    /// subscription of a non-persistent outlet is unregistered, the outlet is removed from its
    /// registry.
    ///
    /// Registering on an outlet that was deleted for being idle puts it back into its registry,
    /// unless the key has meanwhile been given to another outlet. In that case the subscription
    /// is on an outlet the registry no longer holds; [`crate::Registry::register`] looks up and
    /// subscribes in one step and never ends up there.
    #[must_use = "dropping the subscription leaves the handler registered with no way to unregister it"]
    pub fn register(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        match &self.shared.membership {
            Some(membership) => membership.join(self.erased(), Box::new(move || self.register_locked(handler))),
            None => self.register_locked(handler),
        }
    }

    /// Subscribes without consulting the registry; the caller holds the registry lock, if any.
    pub(crate) fn register_locked(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let listener = Listener::new(handler);

        let ref_cnt = {
            let mut state = self.shared.state.lock();
            state.ref_cnt += 1;
            state
                .channel
                .on(Event::Update, listener.clone());
            state.ref_cnt
        };
        trace!("Registered listener. key: {}, listener: {:?}, ref_cnt: {}", self.shared.key, listener.id(), ref_cnt);

        let shared = Arc::clone(&self.shared);
        Subscription::new(move || shared.unregister(&listener))
    }

    /// Replaces or recomputes the value and notifies every listener.
    ///
    /// Literals and synchronous reducers are applied, and listeners notified, before this returns.
    ///
    /// An asynchronous reducer is invoked immediately with the current value, but the outlet is
    /// only updated once the returned future resolves, on this outlet's spawner. Concurrent
    /// asynchronous updates are not serialized, whichever resolves last wins. The continuation
    /// applies to this outlet instance even if it has since been removed from its registry.
    pub fn update(&self, next: impl Into<NextValue<T>>) {
        match next.into() {
            NextValue::Literal(value) => self.shared.replace(value),
            NextValue::Reducer(reducer) => self.shared.reduce(reducer),
            NextValue::AsyncReducer(reducer) => {
                let pending = reducer(self.get_value());
                let shared = Arc::clone(&self.shared);
                trace!("Spawning asynchronous update. key: {}", shared.key);

                self.shared.spawner.spawn(
                    async move {
                        let value = pending.await;
                        if !shared.is_attached() {
                            debug!("Applying asynchronous update to detached outlet. key: {}", shared.key);
                        }
                        shared.replace(value);
                    }
                    .boxed(),
                );
            }
        }
    }

    pub fn set(&self, value: T) {
        self.update(NextValue::Literal(value));
    }

    pub fn get_value(&self) -> T {
        self.shared.state.lock().value.clone()
    }
}

impl<T> Outlet<T> {
    pub(crate) fn id(&self) -> OutletId {
        self.shared.id
    }

    /// The number of active subscriptions.
    pub fn ref_cnt(&self) -> usize {
        self.shared.state.lock().ref_cnt
    }

    /// Increments by one for every applied update, starting at 0.
    pub fn version(&self) -> u64 {
        self.shared.state.lock().version
    }

    /// Diagnostic rendering of the key this outlet was created under.
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    pub fn options(&self) -> OutletOptions {
        self.shared.options
    }

    pub fn is_persistent(&self) -> bool {
        self.shared.options.is_persistent()
    }

    /// `false` once the outlet has been removed from its registry, and always for standalone outlets.
    pub fn is_attached(&self) -> bool {
        self.shared.is_attached()
    }

    /// Whether both handles refer to the same outlet instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone> OutletShared<T> {
    fn replace(&self, value: T) {
        self.commit(self.state.lock(), value);
    }

    fn reduce(&self, mut reducer: impl FnMut(&T) -> T) {
        loop {
            let (current, version) = {
                let state = self.state.lock();
                (state.value.clone(), state.version)
            };
            let next = reducer(&current);

            let state = self.state.lock();
            if state.version == version {
                return self.commit(state, next);
            }
            trace!("Outlet changed while reducing, retrying. key: {}", self.key);
        }
    }

    fn commit(&self, mut state: MutexGuard<'_, OutletState<T>>, value: T) {
        state.value = value;
        state.version += 1;
        let value = state.value.clone();
        let dispatch = state.channel.snapshot(Event::Update);
        drop(state);
        trace!("Updated outlet. key: {}, listeners: {}", self.key, dispatch.len());

        dispatch.deliver(&value);
    }
}

impl<T> OutletShared<T> {
    fn unregister(&self, listener: &Listener<T>) {
        let ref_cnt = {
            let mut state = self.state.lock();
            if !state.channel.off(Event::Update, listener) {
                return;
            }
            state.ref_cnt = state.ref_cnt.saturating_sub(1);
            state.ref_cnt
        };
        trace!("Unregistered listener. key: {}, listener: {:?}, ref_cnt: {}", self.key, listener.id(), ref_cnt);

        if ref_cnt == 0 && !self.options.is_persistent() {
            if let Some(membership) = &self.membership {
                membership.leave();
            }
        }
    }

    fn is_attached(&self) -> bool {
        *self.attachment.lock() == Attachment::Attached
    }
}

/// The registry's type-independent view of an outlet.
pub(crate) trait ErasedOutlet: Send + Sync {
    fn id(&self) -> OutletId;
    fn ref_cnt(&self) -> usize;
    fn version(&self) -> u64;
    fn is_persistent(&self) -> bool;
    fn type_name(&self) -> &'static str;
    fn attachment(&self) -> Attachment;
    fn set_attachment(&self, attachment: Attachment);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + Sync + 'static> ErasedOutlet for OutletShared<T> {
    fn id(&self) -> OutletId {
        self.id
    }

    fn ref_cnt(&self) -> usize {
        self.state.lock().ref_cnt
    }

    fn version(&self) -> u64 {
        self.state.lock().version
    }

    fn is_persistent(&self) -> bool {
        self.options.is_persistent()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn attachment(&self) -> Attachment {
        *self.attachment.lock()
    }

    fn set_attachment(&self, attachment: Attachment) {
        *self.attachment.lock() = attachment;
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
