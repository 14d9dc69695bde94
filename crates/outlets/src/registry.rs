use std::any::type_name;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, LazyLock, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{Level, debug, trace, warn};

use crate::error::OutletError;
use crate::executor::{AsyncStdSpawner, Spawn};
use crate::null_outlet::MaybeOutlet;
use crate::options::OutletOptions;
use crate::outlet::{Attachment, ErasedOutlet, Membership, Outlet, OutletId, OutletShared};
use crate::provider::OutletProvider;
use crate::setter::OutletSetter;
use crate::subscription::Subscription;
use crate::value::InitialValue;

/// Bounds required of registry keys.
pub trait OutletKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<K> OutletKey for K where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Runs the continuations of asynchronous reducers for every outlet the registry creates.
    pub spawner: Arc<dyn Spawn>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            spawner: Arc::new(AsyncStdSpawner),
        }
    }
}

impl RegistryConfig {
    pub fn with_spawner(spawner: impl Spawn) -> Self {
        Self {
            spawner: Arc::new(spawner),
        }
    }
}

/// A point-in-time description of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutletInfo<K> {
    pub key: K,
    pub value_type: &'static str,
    pub ref_cnt: usize,
    pub persistent: bool,
    pub version: u64,
}

struct RegistryShared<K> {
    config: RegistryConfig,
    entries: Mutex<IndexMap<K, Arc<dyn ErasedOutlet>>>,
}

/// A directory of outlets, at most one per key.
///
/// Cloning a `Registry` creates another handle to the same directory. Independent registries can
/// be created with [`Registry::new`]; [`Registry::global`] is the process-wide default.
///
/// Per key, an entry is created by [`Registry::get_or_create`] and removed either when the last
/// subscriber of a non-persistent outlet unregisters or by [`Registry::remove`]. An entry is never
/// replaced by another outlet while it is present.
///
/// The registry lock is always taken before an outlet's lock.
pub struct Registry<K = String> {
    shared: Arc<RegistryShared<K>>,
}

impl<K> Clone for Registry<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: OutletKey> Debug for Registry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<K: OutletKey> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry<String> {
    /// The process-wide registry.
    pub fn global() -> &'static Registry<String> {
        static GLOBAL: LazyLock<Registry<String>> = LazyLock::new(Registry::new);
        &GLOBAL
    }
}

impl<K: OutletKey> Registry<K> {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                config,
                entries: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Returns the outlet for `key`, creating it with `initial` and `options` if absent.
    ///
    /// For an existing outlet `initial` and `options` are ignored.
    pub fn get_or_create<T>(&self, key: K, initial: T, options: OutletOptions) -> Result<Outlet<T>, OutletError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entry(key, InitialValue::Literal(initial), options, |_| ())
            .map(|(outlet, _)| outlet)
    }

    /// Like [`Registry::get_or_create`], but the initial value is only computed if the outlet is
    /// actually created.
    ///
    /// The factory runs without the registry lock held, so it may use the registry. If another
    /// caller creates the same key meanwhile, that outlet wins and the factory's value is
    /// discarded.
    pub fn get_or_create_with<T>(
        &self,
        key: K,
        factory: impl FnOnce() -> T + Send + 'static,
        options: OutletOptions,
    ) -> Result<Outlet<T>, OutletError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entry(key, InitialValue::factory(factory), options, |_| ())
            .map(|(outlet, _)| outlet)
    }

    /// Looks up or creates the outlet for `key` and subscribes `handler`, as one step.
    ///
    /// Unlike [`Registry::get_or_create`] followed by [`Outlet::register`], no other thread can
    /// delete the outlet in between, so the returned outlet is the one the registry holds.
    pub fn register<T>(
        &self,
        key: K,
        initial: InitialValue<T>,
        options: OutletOptions,
        handler: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<(Outlet<T>, Subscription), OutletError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entry(key, initial, options, |outlet| outlet.register_locked(handler))
    }

    /// Returns the outlet for `key`.
    ///
    /// Fails with [`OutletError::NotFound`] if absent, or [`OutletError::TypeMismatch`] if the
    /// outlet holds a different value type.
    pub fn get<T, Q>(&self, key: &Q) -> Result<Outlet<T>, OutletError>
    where
        T: Clone + Send + Sync + 'static,
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        match self.find(key) {
            Some(existing) => downcast(key, existing),
            None => Err(OutletError::NotFound {
                key: format!("{:?}", key),
            }),
        }
    }

    /// Like [`Registry::get`], but a failed lookup yields a null outlet whose operations are
    /// logged no-ops.
    pub fn get_or_null<T, Q>(&self, key: &Q) -> MaybeOutlet<T>
    where
        T: Clone + Send + Sync + 'static,
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        match self.get(key) {
            Ok(outlet) => MaybeOutlet::Live(outlet),
            Err(reason) => MaybeOutlet::null(reason),
        }
    }

    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared
            .entries
            .lock()
            .contains_key(key)
    }

    /// Removes the outlet for `key` if it has no subscribers and is not persistent, or
    /// unconditionally when `force` is set.
    ///
    /// Returns whether an outlet was removed; an absent key is not an error.
    #[tracing::instrument(level = Level::DEBUG, skip(self))]
    pub fn remove<Q>(&self, key: &Q, force: bool) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut entries = self.shared.entries.lock();
        let Some(existing) = entries.get(key) else {
            return false;
        };

        if !force && !is_removable(existing.as_ref()) {
            debug!(
                "Outlet not removed. ref_cnt: {}, persistent: {}",
                existing.ref_cnt(),
                existing.is_persistent()
            );
            return false;
        }

        if let Some(removed) = entries.shift_remove(key) {
            removed.set_attachment(Attachment::Detached);
            debug!("Removed outlet.");
        }
        true
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let drained: Vec<_> = self
            .shared
            .entries
            .lock()
            .drain(..)
            .collect();

        for (_, outlet) in &drained {
            outlet.set_attachment(Attachment::Detached);
        }
        debug!("Cleared registry. removed: {}", drained.len());
    }

    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared
            .entries
            .lock()
            .is_empty()
    }

    /// Keys in creation order.
    pub fn keys(&self) -> Vec<K> {
        self.shared
            .entries
            .lock()
            .keys()
            .cloned()
            .collect()
    }

    /// Describes every live entry, in creation order.
    pub fn snapshot(&self) -> Vec<OutletInfo<K>> {
        self.shared
            .entries
            .lock()
            .iter()
            .map(|(key, outlet)| OutletInfo {
                key: key.clone(),
                value_type: outlet.type_name(),
                ref_cnt: outlet.ref_cnt(),
                persistent: outlet.is_persistent(),
                version: outlet.version(),
            })
            .collect()
    }

    /// A setter bound to `key` rather than to an outlet instance; every call looks the key up again.
    pub fn setter<T>(&self, key: K) -> OutletSetter<K, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        OutletSetter::new(self.clone(), key)
    }

    /// Creates (or reuses) the outlet for `key` and returns a guard that force-removes it when dropped.
    ///
    /// `options` default to [`OutletOptions::persistent`], so the outlet outlives its subscribers
    /// for as long as the provider is held.
    pub fn provide<T>(
        &self,
        key: K,
        initial: T,
        options: Option<OutletOptions>,
    ) -> Result<OutletProvider<K, T>, OutletError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let options = options.unwrap_or_else(OutletOptions::persistent);
        let outlet = self.get_or_create(key.clone(), initial, options)?;
        Ok(OutletProvider::new(self.clone(), key, outlet))
    }

    /// Removes `key` only while it still maps to the outlet `id`.
    ///
    /// Unless `force` is set, the outlet must also have no subscribers and not be persistent.
    pub(crate) fn remove_instance(&self, key: &K, id: OutletId, force: bool) -> bool {
        self.shared.remove_instance(key, id, force)
    }

    /// Returns the outlet for `key`, creating it if absent, and runs `attach` on it before the
    /// registry lock is released.
    fn entry<T, R>(
        &self,
        key: K,
        initial: InitialValue<T>,
        options: OutletOptions,
        attach: impl FnOnce(&Outlet<T>) -> R,
    ) -> Result<(Outlet<T>, R), OutletError>
    where
        T: Clone + Send + Sync + 'static,
    {
        {
            let entries = self.shared.entries.lock();
            if let Some(existing) = entries.get(&key) {
                let outlet = downcast(&key, Arc::clone(existing))?;
                let attached = attach(&outlet);
                return Ok((outlet, attached));
            }
        }

        let id = OutletId::next();
        let membership: Box<dyn Membership> = Box::new(RegistryMembership {
            registry: Arc::downgrade(&self.shared),
            key: key.clone(),
            id,
        });
        let outlet = Outlet::from_parts(
            id,
            format!("{:?}", key),
            initial,
            options,
            Arc::clone(&self.shared.config.spawner),
            Some(membership),
        );

        let mut entries = self.shared.entries.lock();
        if let Some(existing) = entries.get(&key) {
            trace!("Outlet created concurrently, discarding ours. key: {:?}", key);
            outlet
                .erased()
                .set_attachment(Attachment::Detached);
            let existing = downcast(&key, Arc::clone(existing))?;
            let attached = attach(&existing);
            return Ok((existing, attached));
        }

        debug!(
            "Created outlet. key: {:?}, type: {}, persistent: {}",
            key,
            type_name::<T>(),
            options.is_persistent()
        );
        entries.insert(key, outlet.erased());
        let attached = attach(&outlet);

        Ok((outlet, attached))
    }

    fn find<Q>(&self, key: &Q) -> Option<Arc<dyn ErasedOutlet>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared
            .entries
            .lock()
            .get(key)
            .cloned()
    }
}

struct RegistryMembership<K> {
    registry: Weak<RegistryShared<K>>,
    key: K,
    id: OutletId,
}

impl<K: OutletKey> Membership for RegistryMembership<K> {
    fn join(&self, outlet: Arc<dyn ErasedOutlet>, subscribe: Box<dyn FnOnce() -> Subscription + '_>) -> Subscription {
        let Some(registry) = self.registry.upgrade() else {
            return subscribe();
        };

        let mut entries = registry.entries.lock();
        match entries.get(&self.key) {
            Some(current) if current.id() == self.id => {}
            None if outlet.attachment() == Attachment::Idle => {
                debug!("Reinserting idle outlet on register. key: {:?}", self.key);
                outlet.set_attachment(Attachment::Attached);
                entries.insert(self.key.clone(), outlet);
            }
            _ => {
                warn!("Registering on an outlet that is no longer in its registry. key: {:?}", self.key);
            }
        }

        let subscription = subscribe();
        drop(entries);
        subscription
    }

    fn leave(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_instance(&self.key, self.id, false);
        }
    }
}

impl<K: OutletKey> RegistryShared<K> {
    fn remove_instance(&self, key: &K, id: OutletId, force: bool) -> bool {
        let mut entries = self.entries.lock();
        let Some(existing) = entries.get(key) else {
            return false;
        };

        if existing.id() != id {
            trace!("Outlet was replaced, leaving the current one. key: {:?}", key);
            return false;
        }

        if !force && !is_removable(existing.as_ref()) {
            return false;
        }

        if let Some(removed) = entries.shift_remove(key) {
            let attachment = match force {
                true => Attachment::Detached,
                false => Attachment::Idle,
            };
            removed.set_attachment(attachment);
            debug!("Deleted outlet. key: {:?}, forced: {}", key, force);
        }
        true
    }
}

fn is_removable(outlet: &dyn ErasedOutlet) -> bool {
    !outlet.is_persistent() && outlet.ref_cnt() == 0
}

fn downcast<T, Q>(key: &Q, erased: Arc<dyn ErasedOutlet>) -> Result<Outlet<T>, OutletError>
where
    T: Clone + Send + Sync + 'static,
    Q: Debug + ?Sized,
{
    let found = erased.type_name();
    erased
        .into_any()
        .downcast::<OutletShared<T>>()
        .map(Outlet::from_shared)
        .map_err(|_| OutletError::TypeMismatch {
            key: format!("{:?}", key),
            expected: type_name::<T>(),
            found,
        })
}
