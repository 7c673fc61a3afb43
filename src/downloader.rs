use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, Shared};
use futures_util::{FutureExt, StreamExt};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::models::{ModelState, ModelVariant};

/// Progress callback: (bytes received, bytes expected).
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Generic network-fetch capability. The store only needs "stream this
/// URL into that file and tell me how it's going", which keeps the
/// download logic testable without a server.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        progress: ProgressFn,
    ) -> BoxFuture<'a, Result<u64, FetchError>>;
}

/// Production fetcher: streaming HTTP download via reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

// Report progress roughly once per mebibyte; per-chunk updates would
// flood the state channel.
const PROGRESS_EMIT_THRESHOLD: u64 = 1024 * 1024;

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        progress: ProgressFn,
    ) -> BoxFuture<'a, Result<u64, FetchError>> {
        async move {
            info!(%url, "starting model download");
            let res = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Http(e.to_string()))?
                .error_for_status()
                .map_err(|e| FetchError::Http(e.to_string()))?;

            let expected = res.content_length().unwrap_or(0);
            let mut file =
                std::fs::File::create(dest).map_err(|e| FetchError::Io(e.to_string()))?;

            let mut received: u64 = 0;
            let mut last_emit: u64 = 0;
            let mut stream = res.bytes_stream();
            while let Some(item) = stream.next().await {
                let chunk = item.map_err(|e| FetchError::Interrupted(e.to_string()))?;
                file.write_all(&chunk)
                    .map_err(|e| FetchError::Io(e.to_string()))?;
                received += chunk.len() as u64;
                if received - last_emit >= PROGRESS_EMIT_THRESHOLD || received == expected {
                    last_emit = received;
                    progress(received, expected);
                }
            }
            file.flush().map_err(|e| FetchError::Io(e.to_string()))?;

            info!(%url, bytes = received, "download complete");
            Ok(received)
        }
        .boxed()
    }
}

/// On-disk presence of a variant, for settings displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDiskStatus {
    pub downloaded: bool,
    pub size_on_disk: u64,
}

type DownloadFuture = Shared<BoxFuture<'static, Result<PathBuf, FetchError>>>;

struct StoreInner {
    cache_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    state_tx: watch::Sender<ModelState>,
    inflight: Mutex<HashMap<ModelVariant, DownloadFuture>>,
}

/// Resolves model variants to local files, downloading on demand.
///
/// `ensure` is idempotent and single-flight per variant: while a
/// download is running, further callers await the same future instead
/// of fetching again. Downloads land in a `.part` file and are renamed
/// into place only on full success, so a partial file can never be
/// mistaken for a complete model. State transitions are published on a
/// watch channel; observers never mutate it.
#[derive(Clone)]
pub struct ModelStore {
    inner: Arc<StoreInner>,
}

impl ModelStore {
    pub fn new(cache_dir: PathBuf, fetcher: Arc<dyn Fetcher>) -> Self {
        let (state_tx, _) = watch::channel(ModelState::NotDownloaded);
        Self {
            inner: Arc::new(StoreInner {
                cache_dir,
                fetcher,
                state_tx,
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn with_http(cache_dir: PathBuf) -> Self {
        Self::new(cache_dir, Arc::new(HttpFetcher::new()))
    }

    /// Observe model state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.inner.state_tx.subscribe()
    }

    /// Canonical cache path for a variant, whether or not it exists.
    pub fn model_path(&self, variant: ModelVariant) -> PathBuf {
        self.inner.cache_dir.join(variant.file_name())
    }

    /// Make sure the variant's model file is present locally and
    /// return its path.
    pub async fn ensure(&self, variant: ModelVariant) -> Result<PathBuf, FetchError> {
        let path = self.model_path(variant);
        if path.exists() {
            self.inner.state_tx.send_replace(ModelState::Ready);
            return Ok(path);
        }

        let fut = {
            let mut inflight = self.inner.inflight.lock().unwrap();
            if let Some(existing) = inflight.get(&variant) {
                existing.clone()
            } else {
                let fut = StoreInner::download(self.inner.clone(), variant, path)
                    .boxed()
                    .shared();
                inflight.insert(variant, fut.clone());
                fut
            }
        };

        let result = fut.await;
        self.inner.inflight.lock().unwrap().remove(&variant);
        result
    }

    pub fn status(&self, variant: ModelVariant) -> ModelDiskStatus {
        match std::fs::metadata(self.model_path(variant)) {
            Ok(meta) => ModelDiskStatus {
                downloaded: meta.len() > 0,
                size_on_disk: meta.len(),
            },
            Err(_) => ModelDiskStatus {
                downloaded: false,
                size_on_disk: 0,
            },
        }
    }

    /// Remove a downloaded variant (and any stale partial file).
    pub fn delete(&self, variant: ModelVariant) -> std::io::Result<()> {
        let path = self.model_path(variant);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let partial = partial_path(&self.inner.cache_dir, variant);
        if partial.exists() {
            std::fs::remove_file(&partial)?;
        }
        self.inner.state_tx.send_replace(ModelState::NotDownloaded);
        info!(%variant, "model deleted");
        Ok(())
    }
}

fn partial_path(cache_dir: &Path, variant: ModelVariant) -> PathBuf {
    cache_dir.join(format!("{}.part", variant.file_name()))
}

impl StoreInner {
    async fn download(
        inner: Arc<StoreInner>,
        variant: ModelVariant,
        dest: PathBuf,
    ) -> Result<PathBuf, FetchError> {
        // A racing caller may have finished between the exists() check
        // and this flight starting.
        if dest.exists() {
            inner.state_tx.send_replace(ModelState::Ready);
            return Ok(dest);
        }

        std::fs::create_dir_all(&inner.cache_dir).map_err(|e| FetchError::Io(e.to_string()))?;
        let tmp = partial_path(&inner.cache_dir, variant);

        inner.state_tx.send_replace(ModelState::Downloading(0.0));

        // The fraction must never move backwards, whatever the byte
        // counts coming off the wire look like.
        let state_tx = inner.state_tx.clone();
        let expected_fallback = variant.expected_bytes();
        let highwater = Arc::new(Mutex::new(0.0f32));
        let progress: ProgressFn = Box::new(move |received, expected| {
            let total = if expected > 0 {
                expected
            } else {
                expected_fallback
            };
            if total == 0 {
                return;
            }
            let fraction = (received as f32 / total as f32).min(1.0);
            let mut highwater = highwater.lock().unwrap();
            if fraction > *highwater {
                *highwater = fraction;
                state_tx.send_replace(ModelState::Downloading(fraction));
            }
        });

        let url = variant.download_url();
        match inner.fetcher.fetch(&url, &tmp, progress).await {
            Ok(bytes) => {
                if let Err(e) = std::fs::rename(&tmp, &dest) {
                    let _ = std::fs::remove_file(&tmp);
                    let err = FetchError::Io(e.to_string());
                    inner
                        .state_tx
                        .send_replace(ModelState::Error(err.to_string()));
                    return Err(err);
                }
                inner.state_tx.send_replace(ModelState::Ready);
                info!(%variant, bytes, path = %dest.display(), "model ready");
                Ok(dest)
            }
            Err(e) => {
                // Never leave a partial file that could be mistaken
                // for a complete model.
                let _ = std::fs::remove_file(&tmp);
                warn!(%variant, "model download failed: {e}");
                inner
                    .state_tx
                    .send_replace(ModelState::Error(e.to_string()));
                Err(e)
            }
        }
    }
}
