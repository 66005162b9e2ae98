//! In-memory blob store for tests. Counts calls and can be told to fail.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<(String, String), Bytes>>,
    puts: AtomicUsize,
    deletes: Mutex<Vec<(String, String)>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    put_delay: Mutex<Option<Duration>>,
    delete_delay: Mutex<Option<Duration>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every put hang for `delay` before completing
    pub fn delay_puts(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    /// Make every delete hang for `delay` before completing
    pub fn delay_deletes(&self, delay: Duration) {
        *self.delete_delay.lock().unwrap() = Some(delay);
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> Vec<(String, String)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn contains(&self, container: &str, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(container.to_string(), key.to_string()))
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Place an object directly, bypassing the counters
    pub fn seed(&self, container: &str, key: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((container.to_string(), key.to_string()), Bytes::from_static(data));
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, container: &str, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(AppError::Storage("simulated put failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert((container.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn get(&self, container: &str, key: &str) -> Result<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(container.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Object not found: {}/{}", container, key)))
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((container.to_string(), key.to_string()));
        let delay = *self.delete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("simulated delete failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(container.to_string(), key.to_string()));
        Ok(())
    }

    async fn list(&self, container: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
