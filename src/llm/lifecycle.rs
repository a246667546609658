//! Lazy backend loading and idle unloading.
//!
//! The backend is created on the first query, kept while queries keep
//! arriving, and dropped after a configurable idle period so a
//! pay-per-use inference endpoint (or its client) is not held open.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::llm::client::{AnswerBackend, BackendFactoryTrait};
use crate::types::Result;

/// Shortest reaper period; tokio intervals must be non-zero
const MIN_IDLE_CHECK: Duration = Duration::from_millis(1);

struct Loaded {
    backend: Arc<dyn AnswerBackend>,
    last_access: Instant,
}

/// Owns the active backend and its load state
pub struct BackendManager {
    factory: Arc<dyn BackendFactoryTrait>,
    slot: RwLock<Option<Loaded>>,
    /// Serializes loads so concurrent first requests share one backend
    load_lock: tokio::sync::Mutex<()>,
    idle_timeout: Duration,
}

impl BackendManager {
    pub fn new(factory: Arc<dyn BackendFactoryTrait>, idle_timeout: Duration) -> Self {
        Self {
            factory,
            slot: RwLock::new(None),
            load_lock: tokio::sync::Mutex::new(()),
            idle_timeout,
        }
    }

    /// Name of the configured backend, whether or not it is loaded
    pub fn backend_name(&self) -> &str {
        self.factory.backend_name()
    }

    fn touch_loaded(&self) -> Option<Arc<dyn AnswerBackend>> {
        let mut slot = self.slot.write();
        slot.as_mut().map(|loaded| {
            loaded.last_access = Instant::now();
            Arc::clone(&loaded.backend)
        })
    }

    /// Return the backend, loading it if needed.
    ///
    /// The flag is `true` when this call performed the load.
    pub async fn acquire(&self) -> Result<(Arc<dyn AnswerBackend>, bool)> {
        if let Some(backend) = self.touch_loaded() {
            return Ok((backend, false));
        }

        let _guard = self.load_lock.lock().await;

        // Another request may have finished loading while we waited
        if let Some(backend) = self.touch_loaded() {
            return Ok((backend, false));
        }

        let started = Instant::now();
        info!(backend = %self.backend_name(), "Loading answer backend");
        let backend = self.factory.create_backend().await?;

        *self.slot.write() = Some(Loaded {
            backend: Arc::clone(&backend),
            last_access: Instant::now(),
        });
        info!(
            backend = %self.backend_name(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Answer backend loaded"
        );

        Ok((backend, true))
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Seconds since the last query, `None` when nothing is loaded
    pub fn idle_seconds(&self) -> Option<u64> {
        self.slot
            .read()
            .as_ref()
            .map(|loaded| loaded.last_access.elapsed().as_secs())
    }

    pub fn unload(&self) {
        if self.slot.write().take().is_some() {
            info!(backend = %self.backend_name(), "Answer backend unloaded");
        }
    }

    /// Unload when idle longer than the timeout; returns whether it unloaded
    pub fn unload_if_idle(&self) -> bool {
        let mut slot = self.slot.write();
        let idle = match slot.as_ref() {
            Some(loaded) => loaded.last_access.elapsed(),
            None => return false,
        };

        if idle > self.idle_timeout {
            *slot = None;
            info!(
                backend = %self.backend_name(),
                idle_secs = idle.as_secs(),
                "Answer backend unloaded after idle timeout"
            );
            true
        } else {
            false
        }
    }

    /// Check for idleness every `interval` until the handle is aborted
    pub fn spawn_idle_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = interval.max(MIN_IDLE_CHECK);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !manager.unload_if_idle() {
                    debug!(idle_seconds = ?manager.idle_seconds(), "Idle check");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoBackend;

    #[async_trait]
    impl AnswerBackend for EchoBackend {
        async fn generate(&self, _context: &str, question: &str) -> Result<String> {
            Ok(question.to_string())
        }

        fn extract_answer(&self, generated: &str) -> String {
            generated.to_string()
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct CountingFactory {
        created: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BackendFactoryTrait for CountingFactory {
        async fn create_backend(&self) -> Result<Arc<dyn AnswerBackend>> {
            if self.fail {
                return Err(AppError::LLM("load failed".into()));
            }
            // Give concurrent callers a chance to pile up
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EchoBackend))
        }

        fn backend_name(&self) -> &str {
            "echo"
        }
    }

    fn manager(idle_timeout: Duration, fail: bool) -> (Arc<BackendManager>, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory {
            created: AtomicUsize::new(0),
            fail,
        });
        (
            Arc::new(BackendManager::new(factory.clone(), idle_timeout)),
            factory,
        )
    }

    #[tokio::test]
    async fn test_first_acquire_is_fresh() {
        let (manager, factory) = manager(Duration::from_secs(300), false);
        assert!(!manager.is_loaded());
        assert_eq!(manager.idle_seconds(), None);

        let (_, fresh) = manager.acquire().await.unwrap();
        assert!(fresh);
        let (_, fresh) = manager.acquire().await.unwrap();
        assert!(!fresh);

        assert!(manager.is_loaded());
        assert_eq!(manager.idle_seconds(), Some(0));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_loads_once() {
        let (manager, factory) = manager(Duration::from_secs(300), false);

        let (a, b) = tokio::join!(manager.acquire(), manager.acquire());
        let fresh_count = [a.unwrap().1, b.unwrap().1]
            .iter()
            .filter(|fresh| **fresh)
            .count();

        assert_eq!(fresh_count, 1);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_unloaded() {
        let (manager, _) = manager(Duration::from_secs(300), true);
        assert!(manager.acquire().await.is_err());
        assert!(!manager.is_loaded());
    }

    #[tokio::test]
    async fn test_unload_if_idle() {
        let (manager, factory) = manager(Duration::from_millis(10), false);
        manager.acquire().await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(manager.unload_if_idle());
        assert!(!manager.is_loaded());

        let (_, fresh) = manager.acquire().await.unwrap();
        assert!(fresh);
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_active_backend_not_unloaded() {
        let (manager, _) = manager(Duration::from_secs(300), false);
        manager.acquire().await.unwrap();
        assert!(!manager.unload_if_idle());
        assert!(manager.is_loaded());
    }

    #[tokio::test]
    async fn test_idle_reaper_unloads() {
        let (manager, _) = manager(Duration::from_millis(5), false);
        manager.acquire().await.unwrap();

        let reaper = manager.spawn_idle_reaper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;
        reaper.abort();

        assert!(!manager.is_loaded());
    }

    #[tokio::test]
    async fn test_idle_reaper_survives_zero_interval() {
        let (manager, _) = manager(Duration::ZERO, false);
        manager.acquire().await.unwrap();

        let reaper = manager.spawn_idle_reaper(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!reaper.is_finished());
        assert!(!manager.is_loaded());
        reaper.abort();
    }
}
