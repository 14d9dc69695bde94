use std::fmt::{Debug, Formatter};

use crate::outlet::Outlet;
use crate::registry::{OutletKey, Registry};

/// Owns a registry entry for as long as it is held, see [`Registry::provide`].
///
/// Dropping the provider force-removes the entry, unless the key has meanwhile been given to a
/// different outlet.
pub struct OutletProvider<K: OutletKey, T> {
    registry: Registry<K>,
    key: K,
    outlet: Outlet<T>,
}

impl<K: OutletKey, T> OutletProvider<K, T> {
    pub(crate) fn new(registry: Registry<K>, key: K, outlet: Outlet<T>) -> Self {
        Self {
            registry,
            key,
            outlet,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn outlet(&self) -> &Outlet<T> {
        &self.outlet
    }
}

impl<K: OutletKey, T: Debug> Debug for OutletProvider<K, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutletProvider")
            .field("key", &self.key)
            .field("outlet", &self.outlet)
            .finish()
    }
}

impl<K: OutletKey, T> Drop for OutletProvider<K, T> {
    fn drop(&mut self) {
        self.registry
            .remove_instance(&self.key, self.outlet.id(), true);
    }
}
