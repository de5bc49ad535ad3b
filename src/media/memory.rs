use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ImageStore, MediaError};
use crate::domain::value_objects::{EmbeddedImage, ImageRef};

/// Process-local image host that records every call.
///
/// Failures can be scripted with [`fail_upload_at`](Self::fail_upload_at)
/// and [`fail_deletes`](Self::fail_deletes).
#[derive(Default)]
pub struct InMemoryImageStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    upload_calls: usize,
    delete_calls: Vec<String>,
    fail_upload_at: Option<usize>,
    fail_deletes: bool,
}

impl InMemoryImageStore {
    pub fn new() -> Self { Self::default() }

    /// Makes the `n`-th upload call from now on fail (1-based).
    pub fn fail_upload_at(&self, n: usize) {
        let mut state = self.lock();
        state.fail_upload_at = Some(state.upload_calls + n);
    }

    pub fn fail_deletes(&self, fail: bool) { self.lock().fail_deletes = fail; }

    pub fn upload_calls(&self) -> usize { self.lock().upload_calls }
    pub fn delete_calls(&self) -> Vec<String> { self.lock().delete_calls.clone() }
    pub fn contains(&self, id: &str) -> bool { self.lock().objects.contains_key(id) }
    pub fn ids(&self) -> Vec<String> { self.lock().objects.keys().cloned().collect() }
    pub fn len(&self) -> usize { self.lock().objects.len() }
    pub fn is_empty(&self) -> bool { self.lock().objects.is_empty() }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn upload(&self, image: &EmbeddedImage, folder: &str) -> Result<ImageRef, MediaError> {
        let mut state = self.lock();
        state.upload_calls += 1;
        if state.fail_upload_at == Some(state.upload_calls) {
            return Err(MediaError::Rejected(format!("scripted failure on upload {}", state.upload_calls)));
        }
        let bytes = image.decode().map_err(|e| MediaError::Rejected(format!("undecodable payload: {e}")))?;
        let id = format!("{folder}/{}", Uuid::new_v4().simple());
        let url = format!("https://images.invalid/{id}.{}", image.extension());
        state.objects.insert(id.clone(), bytes);
        Ok(ImageRef::new(id, url))
    }

    async fn delete(&self, id: &str) -> Result<(), MediaError> {
        let mut state = self.lock();
        state.delete_calls.push(id.to_string());
        if state.fail_deletes {
            return Err(MediaError::Rejected(format!("scripted failure deleting {id}")));
        }
        state.objects.remove(id);
        Ok(())
    }
}
