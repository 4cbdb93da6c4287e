//! Periodic reload of a layer from a changing source.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::StratumError;
use crate::source::Source;

type Fetch = Box<dyn FnMut() -> Result<Source, StratumError> + Send>;
type OnLoad = Box<dyn FnMut(&Config) + Send>;
type OnError = Box<dyn FnMut(&StratumError) + Send>;

/// A refresh task that has not been started yet.
///
/// Every `delay`, the task fetches a fresh source and reloads the watched
/// layer under its lock. A failed cycle is logged, handed to `on_error`, and
/// the task carries on with the next tick.
pub struct Refresh {
    layer: Config,
    delay: Duration,
    fetch: Fetch,
    on_load: Option<OnLoad>,
    on_error: Option<OnError>,
}

impl Refresh {
    pub fn new<F>(layer: Config, delay: Duration, fetch: F) -> Self
    where
        F: FnMut() -> Result<Source, StratumError> + Send + 'static,
    {
        Refresh {
            layer,
            delay,
            fetch: Box::new(fetch),
            on_load: None,
            on_error: None,
        }
    }

    /// The layer this task reloads.
    pub fn layer(&self) -> &Config {
        &self.layer
    }

    /// Called with the layer after each successful reload.
    pub fn on_load(mut self, f: impl FnMut(&Config) + Send + 'static) -> Self {
        self.on_load = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&StratumError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Start the background thread.
    pub fn spawn(self) -> Result<RefreshHandle, StratumError> {
        let (stop, stopped) = mpsc::channel::<()>();
        let name = format!("stratum-refresh-{}", self.layer.name());
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || self.run(stopped))
            .map_err(|e| StratumError::Io {
                path: "<refresh thread>".into(),
                source: e,
            })?;
        Ok(RefreshHandle {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    fn run(mut self, stopped: mpsc::Receiver<()>) {
        loop {
            match stopped.recv_timeout(self.delay) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            let layer = self.layer.clone();
            match (self.fetch)().and_then(|source| layer.reload(&source)) {
                Ok(()) => {
                    debug!(layer = %layer.name(), "refreshed layer");
                    if let Some(on_load) = self.on_load.as_mut() {
                        on_load(&layer);
                    }
                }
                Err(e) => {
                    warn!(layer = %layer.name(), error = %e, "refresh failed, keeping previous values");
                    if let Some(on_error) = self.on_error.as_mut() {
                        on_error(&e);
                    }
                }
            }
        }
        debug!(layer = %self.layer.name(), "refresh stopped");
    }
}

/// Owns a running refresh thread. Stopping (or dropping) signals the thread
/// and waits for it; a reload in progress finishes first.
pub struct RefreshHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("refresh thread panicked");
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::server_config;
    use crate::flat::flat_source;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn reloads_on_each_tick() {
        let (config, items) = server_config();
        let layer = config.with_layer("watched");
        let ticks = Arc::new(AtomicUsize::new(0));
        let fetched = ticks.clone();
        let handle = Refresh::new(layer.clone(), Duration::from_millis(10), move || {
            let n = fetched.fetch_add(1, Ordering::SeqCst) + 1;
            flat_source([("server.port", n.to_string())], false)
        })
        .spawn()
        .unwrap();

        assert!(wait_for(Duration::from_secs(5), || ticks.load(Ordering::SeqCst) >= 3));
        handle.stop();
        let after_stop = ticks.load(Ordering::SeqCst);
        assert_eq!(usize::from(layer.get(&items.port).unwrap()), after_stop);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn failed_cycle_does_not_stop_the_task() {
        let (config, items) = server_config();
        let layer = config.with_layer("watched");
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let loads = Arc::new(AtomicUsize::new(0));
        let (c, e, l) = (calls.clone(), errors.clone(), loads.clone());

        let handle = Refresh::new(layer.clone(), Duration::from_millis(10), move || {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                flat_source([("server.port", "not a port")], false)
            } else {
                flat_source([("server.port", "7")], false)
            }
        })
        .on_error(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        })
        .on_load(move |_| {
            l.fetch_add(1, Ordering::SeqCst);
        })
        .spawn()
        .unwrap();

        assert!(wait_for(Duration::from_secs(5), || loads.load(Ordering::SeqCst) >= 1));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(layer.get(&items.port).unwrap(), 7);
        assert!(handle.is_running());
        drop(handle);
    }

    #[test]
    fn stop_releases_the_lock() {
        let (config, items) = server_config();
        let layer = config.with_layer("watched");
        let handle = Refresh::new(layer.clone(), Duration::from_secs(3600), || {
            flat_source([("server.port", "1")], false)
        })
        .spawn()
        .unwrap();
        handle.stop();
        layer.lock(|| layer.set(&items.port, 2).unwrap());
        assert_eq!(layer.get(&items.port).unwrap(), 2);
    }
}
