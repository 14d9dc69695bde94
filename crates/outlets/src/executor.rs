//! Where asynchronous reducer continuations run.
//!
//! A continuation is spawned as an independent unit of work; there is no way to cancel it.

use std::fmt::Debug;

use futures::future::BoxFuture;

pub trait Spawn: Debug + Send + Sync + 'static {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// Spawns onto the `async-std` global executor, which needs no runtime context from the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncStdSpawner;

impl Spawn for AsyncStdSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        let _ = async_std::task::spawn(future);
    }
}

#[cfg(feature = "tokio")]
pub use self::tokio_spawner::TokioSpawner;

#[cfg(feature = "tokio")]
mod tokio_spawner {
    use futures::future::BoxFuture;
    use tokio::runtime::Handle;

    use super::Spawn;

    #[derive(Debug, Clone)]
    pub struct TokioSpawner {
        handle: Handle,
    }

    impl TokioSpawner {
        pub fn new(handle: Handle) -> Self {
            Self {
                handle,
            }
        }

        /// Uses the runtime the caller is running in.
        ///
        /// # Panics
        ///
        /// Panics if called outside of a Tokio runtime.
        pub fn current() -> Self {
            Self::new(Handle::current())
        }
    }

    impl Spawn for TokioSpawner {
        fn spawn(&self, future: BoxFuture<'static, ()>) {
            let _ = self.handle.spawn(future);
        }
    }
}
