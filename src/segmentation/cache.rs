use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use ndarray::Array4;

use super::device::{ComputeDevice, ResolvedDevice};
use super::loader;
use super::types::{Logits, ModelDescriptor, SegmentationModel};
use crate::error::{DermaError, Result};

/// Shared, read-only handle to a loaded network.
///
/// Forward passes on one handle are serialized through a mutex; the
/// device behind it is not reentrant.
pub struct ModelHandle {
    descriptor: ModelDescriptor,
    input_size: (u32, u32),
    model: Arc<Mutex<Box<dyn SegmentationModel>>>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("descriptor", &self.descriptor)
            .field("input_size", &self.input_size)
            .finish_non_exhaustive()
    }
}

impl ModelHandle {
    pub fn new(model: Box<dyn SegmentationModel>) -> Self {
        Self {
            descriptor: model.descriptor().clone(),
            input_size: model.input_size(),
            model: Arc::new(Mutex::new(model)),
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    /// Run one forward pass, waiting at most `timeout` for the result.
    ///
    /// On timeout the pass keeps running on its worker thread and still
    /// holds the model lock, so the next call queues behind it.
    pub fn forward(&self, input: Array4<f32>, timeout: Option<Duration>) -> Result<Logits> {
        let Some(timeout) = timeout else {
            return run_locked(&self.model, &input);
        };

        let (tx, rx) = mpsc::channel();
        let model = Arc::clone(&self.model);
        std::thread::Builder::new()
            .name("inference".into())
            .spawn(move || {
                let result = run_locked(&model, &input);
                // receiver is gone when the caller already timed out
                let _ = tx.send(result);
            })
            .map_err(DermaError::inference)?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("Inference exceeded {:?}", timeout);
                Err(DermaError::InferenceTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(DermaError::InferenceError(
                "inference worker exited without a result".into(),
            )),
        }
    }
}

/// Models keep no state between passes, so a pass that panicked leaves
/// nothing behind and the lock is taken over.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovering lock poisoned by a panicked thread");
        PoisonError::into_inner(poisoned)
    })
}

fn run_locked(model: &Mutex<Box<dyn SegmentationModel>>, input: &Array4<f32>) -> Result<Logits> {
    lock_recovering(model).forward(input)
}

/// Cache key: one entry per network, checkpoint and resolved device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub architecture: String,
    pub encoder: String,
    pub checkpoint: PathBuf,
    pub device: ResolvedDevice,
}

impl ModelKey {
    pub fn new<P: AsRef<Path>>(
        architecture: &str,
        encoder: &str,
        checkpoint: P,
        device: ResolvedDevice,
    ) -> Self {
        Self {
            architecture: architecture.to_string(),
            encoder: encoder.to_string(),
            checkpoint: checkpoint.as_ref().to_path_buf(),
            device,
        }
    }
}

/// Loaded models shared across analysis runs.
#[derive(Default)]
pub struct ModelCache {
    entries: Mutex<HashMap<ModelKey, Arc<ModelHandle>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache, created on first use
    pub fn global() -> &'static ModelCache {
        static GLOBAL: OnceLock<ModelCache> = OnceLock::new();
        GLOBAL.get_or_init(ModelCache::new)
    }

    /// Return the cached model for the key, loading it from disk with ONNX
    /// Runtime on a miss.
    ///
    /// The device is resolved before the lookup, so requests that land on
    /// the same device share one entry.
    pub fn load<P: AsRef<Path>>(
        &self,
        architecture: &str,
        encoder: &str,
        checkpoint: P,
        device: ComputeDevice,
    ) -> Result<Arc<ModelHandle>> {
        let checkpoint = checkpoint.as_ref();
        if !checkpoint.exists() {
            return Err(DermaError::MissingResource(checkpoint.to_path_buf()));
        }

        let key = ModelKey::new(architecture, encoder, checkpoint, device.resolve()?);
        self.get_or_load(key, |key| {
            loader::load_on(&key.architecture, &key.encoder, &key.checkpoint, key.device)
        })
    }

    /// Return the cached model for `key`, calling `load` on a miss.
    ///
    /// The cache lock is held while loading so concurrent misses for the
    /// same key load once. Failed loads are not cached.
    pub fn get_or_load<F>(&self, key: ModelKey, load: F) -> Result<Arc<ModelHandle>>
    where
        F: FnOnce(&ModelKey) -> Result<Box<dyn SegmentationModel>>,
    {
        // entries are only inserted after a load succeeds
        let mut entries = lock_recovering(&self.entries);

        if let Some(handle) = entries.get(&key) {
            tracing::debug!("Model cache hit for {}", key.checkpoint.display());
            return Ok(Arc::clone(handle));
        }

        tracing::debug!("Model cache miss for {}", key.checkpoint.display());
        let handle = Arc::new(ModelHandle::new(load(&key)?));
        entries.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        lock_recovering(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached model. Handles already given out stay valid.
    pub fn clear(&self) {
        lock_recovering(&self.entries).clear();
    }
}
