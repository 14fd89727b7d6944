//! Durable checkpointing to a named-blob store.
//!
//! A checkpoint is addressed by `(repository_id, name)` and consists of two
//! artifacts: `<name>/model.json`, the parameter-structure descriptor, and
//! `<name>/weights.bin`, the raw weight blob. Saving under the canonical root
//! name `"model"` additionally writes a human-readable `README.md` manifest.
//! Names are caller-chosen; the last write for a given name wins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::engine::{ModelParameters, NumericEngine, ParameterDescriptor};
use crate::error::{EmberError, Result};

/// File name of the parameter-structure descriptor artifact.
pub const DESCRIPTOR_FILE: &str = "model.json";
/// File name of the raw weight blob artifact.
pub const WEIGHTS_FILE: &str = "weights.bin";
/// Checkpoint name under which the manifest is written.
pub const CANONICAL_NAME: &str = "model";

/// Transport boundary for checkpoint storage: a flat named-blob protocol.
///
/// `token` is an opaque credential forwarded from the caller; stores without
/// authentication ignore it.
pub trait BlobStore {
    /// Create the repository if it does not exist. Callers tolerate failures
    /// here (an existing repository is the common case).
    fn create_repository(&self, repository: &str, token: Option<&str>) -> Result<()>;

    /// Write a blob, replacing any previous content at `path`.
    fn put(&self, repository: &str, token: Option<&str>, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read a blob.
    fn get(&self, repository: &str, path: &str) -> Result<Vec<u8>>;
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn create_repository(&self, repository: &str, token: Option<&str>) -> Result<()> {
        (**self).create_repository(repository, token)
    }

    fn put(&self, repository: &str, token: Option<&str>, path: &str, bytes: &[u8]) -> Result<()> {
        (**self).put(repository, token, path, bytes)
    }

    fn get(&self, repository: &str, path: &str) -> Result<Vec<u8>> {
        (**self).get(repository, path)
    }
}

/// Serializes and restores [`NumericEngine`] parameters through a
/// [`BlobStore`], with bounded exponential-backoff retry on load.
pub struct CheckpointStore {
    store: Box<dyn BlobStore + Send>,
    max_retries: usize,
    initial_delay: Duration,
}

impl CheckpointStore {
    /// Wrap a blob store with the default retry policy (3 attempts, 2 s
    /// initial delay).
    pub fn new<S: BlobStore + Send + 'static>(store: S) -> Self {
        CheckpointStore {
            store: Box::new(store),
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
        }
    }

    /// Override the load retry policy.
    pub fn with_retry_policy(mut self, max_retries: usize, initial_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.initial_delay = initial_delay;
        self
    }

    /// Snapshot the engine's parameters and write them under
    /// `(repository, name)`.
    ///
    /// The destination repository is created if absent; creation failures are
    /// logged and tolerated, since the upload itself surfaces a repository
    /// that is genuinely unusable.
    pub fn save<N: NumericEngine>(
        &self,
        repository: &str,
        token: Option<&str>,
        name: &str,
        engine: &N,
    ) -> Result<()> {
        let parameters = engine.parameters()?;
        parameters.validate()?;

        if let Err(err) = self.store.create_repository(repository, token) {
            warn!(
                "repository '{}' already exists or could not be created: {}",
                repository, err
            );
        }

        let descriptor = serde_json::to_vec_pretty(&parameters.descriptor)?;
        let weights = bincode::serialize(&parameters.values)?;

        self.store.put(
            repository,
            token,
            &format!("{}/{}", name, DESCRIPTOR_FILE),
            &descriptor,
        )?;
        self.store.put(
            repository,
            token,
            &format!("{}/{}", name, WEIGHTS_FILE),
            &weights,
        )?;

        if name == CANONICAL_NAME {
            let manifest = render_manifest(repository, &parameters.descriptor);
            self.store
                .put(repository, token, "README.md", manifest.as_bytes())?;
        }

        info!(
            "checkpoint '{}' saved to repository '{}' ({} values)",
            name,
            repository,
            parameters.values.len()
        );
        Ok(())
    }

    /// Fetch and deserialize the parameters stored under
    /// `(repository, name)`.
    ///
    /// Retries with exponential backoff (`initial_delay * 2^attempt`) up to
    /// the configured attempt bound and surfaces the last error if every
    /// attempt fails.
    pub fn load(&self, repository: &str, name: &str) -> Result<ModelParameters> {
        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match self.try_load(repository, name) {
                Ok(parameters) => {
                    info!(
                        "checkpoint '{}' loaded from repository '{}' on attempt {}",
                        name,
                        repository,
                        attempt + 1
                    );
                    return Ok(parameters);
                }
                Err(err) => {
                    let delay = self.initial_delay * 2u32.saturating_pow(attempt as u32);
                    warn!(
                        "failed to load checkpoint '{}' from '{}' (attempt {}/{}): {}",
                        name,
                        repository,
                        attempt + 1,
                        self.max_retries,
                        err
                    );
                    last_error = Some(err);
                    if attempt + 1 < self.max_retries {
                        debug!("retrying in {:?}", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }
        error!(
            "giving up on checkpoint '{}' in '{}' after {} attempts",
            name, repository, self.max_retries
        );
        Err(last_error.unwrap_or_else(|| {
            EmberError::NotFound(format!("{}/{}", repository, name))
        }))
    }

    fn try_load(&self, repository: &str, name: &str) -> Result<ModelParameters> {
        let descriptor_bytes = self
            .store
            .get(repository, &format!("{}/{}", name, DESCRIPTOR_FILE))?;
        let weight_bytes = self
            .store
            .get(repository, &format!("{}/{}", name, WEIGHTS_FILE))?;

        let descriptor: ParameterDescriptor = serde_json::from_slice(&descriptor_bytes)?;
        let values: Vec<f64> = bincode::deserialize(&weight_bytes)?;

        let parameters = ModelParameters { descriptor, values };
        parameters.validate()?;
        Ok(parameters)
    }
}

fn render_manifest(repository: &str, descriptor: &ParameterDescriptor) -> String {
    let mut manifest = String::from("# DQN checkpoint\n\n");
    manifest.push_str(&format!("Repository: `{}`\n\n", repository));
    manifest.push_str("## Parameter tensors\n\n");
    for tensor in &descriptor.tensors {
        manifest.push_str(&format!("- `{}`: {:?}\n", tensor.name, tensor.shape));
    }
    manifest.push_str(&format!(
        "\nArtifacts per checkpoint: `{}` (structure) and `{}` (weights).\n",
        DESCRIPTOR_FILE, WEIGHTS_FILE
    ));
    manifest
}

/// Directory-backed blob store: one directory per repository under a root.
///
/// Ignores the access token. Suitable for durable local checkpoints and
/// integration tests.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        FsBlobStore { root: root.into() }
    }

    fn blob_path(&self, repository: &str, path: &str) -> PathBuf {
        self.root.join(repository).join(path)
    }
}

impl BlobStore for FsBlobStore {
    fn create_repository(&self, repository: &str, _token: Option<&str>) -> Result<()> {
        std::fs::create_dir_all(self.root.join(repository))?;
        Ok(())
    }

    fn put(&self, repository: &str, _token: Option<&str>, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.blob_path(repository, path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)?;
        Ok(())
    }

    fn get(&self, repository: &str, path: &str) -> Result<Vec<u8>> {
        let full = self.blob_path(repository, path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(EmberError::NotFound(full.display().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process blob store backed by a shared map. Clones see the same
/// contents, so a test can keep a handle while the store itself moves into a
/// [`CheckpointStore`].
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently stored for a repository, in no particular order.
    pub fn paths(&self, repository: &str) -> Vec<String> {
        self.blobs
            .lock()
            .expect("blob map poisoned")
            .keys()
            .filter(|(repo, _)| repo == repository)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

impl BlobStore for MemoryBlobStore {
    fn create_repository(&self, _repository: &str, _token: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn put(&self, repository: &str, _token: Option<&str>, path: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .expect("blob map poisoned")
            .insert((repository.to_string(), path.to_string()), bytes.to_vec());
        Ok(())
    }

    fn get(&self, repository: &str, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .expect("blob map poisoned")
            .get(&(repository.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| EmberError::NotFound(format!("{}/{}", repository, path)))
    }
}
