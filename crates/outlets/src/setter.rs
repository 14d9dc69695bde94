use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

use crate::error::OutletError;
use crate::registry::{OutletKey, Registry};
use crate::value::NextValue;

/// Updates whichever outlet is registered under a key at the time of each call.
///
/// Unlike holding an [`crate::Outlet`], a setter never writes to an outlet that has been removed
/// from the registry; it fails instead.
pub struct OutletSetter<K, T> {
    registry: Registry<K>,
    key: K,
    _value: PhantomData<fn(T)>,
}

impl<K: Clone, T> Clone for OutletSetter<K, T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            key: self.key.clone(),
            _value: PhantomData,
        }
    }
}

impl<K: Debug, T> Debug for OutletSetter<K, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutletSetter")
            .field("key", &self.key)
            .field("value_type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<K: OutletKey, T: Clone + Send + Sync + 'static> OutletSetter<K, T> {
    pub(crate) fn new(registry: Registry<K>, key: K) -> Self {
        Self {
            registry,
            key,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Fails with [`OutletError::NotFound`] when no outlet is registered under the key.
    pub fn set(&self, next: impl Into<NextValue<T>>) -> Result<(), OutletError> {
        self.registry
            .get::<T, K>(&self.key)?
            .update(next);
        Ok(())
    }
}
