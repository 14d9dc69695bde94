//! A keyed, in-memory publish/subscribe value store.
//!
//! Outlets let independent consumers share mutable state without an ownership relation between
//! them: any party that knows the key can look the outlet up, subscribe to it and update it.
//!
//! # Key Features
//!
//! - One [`Outlet`] per key in a [`Registry`], created on first use, first creator wins
//! - Subscribers are notified synchronously, in registration order, a panicking subscriber does
//!   not prevent delivery to the others
//! - Outlets are reference counted by their subscribers and removed from the registry when the
//!   last one unregisters, unless created with [`OutletOptions::persistent`]
//! - Updates from literals, synchronous reducers, or asynchronous reducers whose result is applied
//!   once it resolves
//! - [`Registry::register`] looks up or creates an outlet and subscribes to it in one step
//! - Thread-safe without holding locks across user code, with isolated registries for tests and
//!   a process-wide [`Registry::global`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use outlets::{NextValue, OutletOptions, Registry};
//!
//! let registry: Registry = Registry::new();
//!
//! // Producer creates the outlet
//! let counter = registry
//!     .get_or_create("counter".to_string(), 0, OutletOptions::default())
//!     .unwrap();
//!
//! // An unrelated consumer finds it by key and subscribes
//! let seen = Arc::new(AtomicI32::new(0));
//! let seen_for_handler = seen.clone();
//! let subscription = registry
//!     .get::<i32, _>("counter")
//!     .unwrap()
//!     .register(move |value| seen_for_handler.store(*value, Ordering::SeqCst));
//!
//! counter.update(NextValue::reducer(|value: &i32| value + 1));
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//!
//! // The last subscriber leaving removes the outlet
//! subscription.unregister();
//! assert!(!registry.has("counter"));
//! ```

pub mod channel;
pub mod executor;

mod error;
mod null_outlet;
mod options;
mod outlet;
mod provider;
mod registry;
mod setter;
mod subscription;
mod value;

pub use error::OutletError;
pub use null_outlet::{MaybeOutlet, NullOutlet};
pub use options::OutletOptions;
pub use outlet::Outlet;
pub use provider::OutletProvider;
pub use registry::{OutletInfo, OutletKey, Registry, RegistryConfig};
pub use setter::OutletSetter;
pub use subscription::{Subscription, SubscriptionGuard};
pub use value::{InitialValue, NextValue};
