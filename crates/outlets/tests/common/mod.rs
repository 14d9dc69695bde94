use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a test-friendly subscriber, honouring `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Collects every value delivered to the handlers it hands out, tagged with the handler's name.
#[derive(Clone)]
pub struct Recorder<T> {
    log: Arc<Mutex<Vec<(&'static str, T)>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn handler(&self, name: &'static str) -> impl Fn(&T) + Send + Sync + 'static {
        let log = self.log.clone();
        move |value: &T| log.lock().push((name, value.clone()))
    }

    pub fn take(&self) -> Vec<(&'static str, T)> {
        std::mem::take(&mut *self.log.lock())
    }
}
