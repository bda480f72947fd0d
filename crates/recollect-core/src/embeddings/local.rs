//! Local Semantic Embeddings
//!
//! Uses fastembed v5 for local ONNX inference with all-MiniLM-L6-v2
//! (384 dimensions). The model is loaded lazily on first use and kept behind a
//! mutex because the v5 `embed` API needs `&mut self`.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

use super::{Embedder, EmbeddingError};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Output dimensions of all-MiniLM-L6-v2
pub const DEFAULT_MODEL_DIMENSIONS: usize = 384;

/// Maximum text length in bytes (truncated if longer)
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Get the default cache directory for fastembed models
/// Uses FASTEMBED_CACHE_PATH env var, or falls back to platform cache directory
fn get_cache_dir() -> PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return PathBuf::from(path);
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "recollect", "recollect") {
        return proj_dirs.cache_dir().join("fastembed");
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/recollect/fastembed");
    }

    PathBuf::from(".fastembed_cache")
}

/// Truncate on a char boundary
fn truncate_text(text: &str) -> &str {
    if text.len() <= MAX_TEXT_LENGTH {
        return text;
    }
    let mut end = MAX_TEXT_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============================================================================
// FASTEMBED EMBEDDER
// ============================================================================

/// fastembed-backed [`Embedder`]
pub struct FastEmbedder {
    cache_dir: PathBuf,
    show_download_progress: bool,
    model: OnceLock<Result<Mutex<TextEmbedding>, String>>,
}

impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl FastEmbedder {
    /// Create an embedder using the default model cache location
    pub fn new() -> Self {
        Self::with_cache_dir(get_cache_dir())
    }

    /// Create an embedder with an explicit model cache directory
    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            show_download_progress: false,
            model: OnceLock::new(),
        }
    }

    /// Show a progress bar while the model downloads
    pub fn with_download_progress(mut self, show: bool) -> Self {
        self.show_download_progress = show;
        self
    }

    /// Load the model now instead of on the first encode
    pub fn init(&self) -> Result<(), EmbeddingError> {
        self.model().map(|_| ())
    }

    fn model(&self) -> Result<MutexGuard<'_, TextEmbedding>, EmbeddingError> {
        let result = self.model.get_or_init(|| {
            if let Err(e) = std::fs::create_dir_all(&self.cache_dir) {
                tracing::warn!("Failed to create cache directory {:?}: {}", self.cache_dir, e);
            }

            let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(self.show_download_progress)
                .with_cache_dir(self.cache_dir.clone());

            TextEmbedding::try_new(options).map(Mutex::new).map_err(|e| {
                format!(
                    "Failed to initialize all-MiniLM-L6-v2: {}. \
                    Ensure ONNX runtime is available and model files can be downloaded.",
                    e
                )
            })
        });

        match result {
            Ok(model) => model
                .lock()
                .map_err(|e| EmbeddingError::Unavailable(format!("Lock poisoned: {}", e))),
            Err(err) => Err(EmbeddingError::Unavailable(err.clone())),
        }
    }
}

impl Embedder for FastEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_MODEL_DIMENSIONS
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut model = self.model()?;
        let embeddings = model
            .embed(vec![truncate_text(text)], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding generated".to_string()))
    }

    fn is_ready(&self) -> bool {
        match self.model() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Embedding model not ready: {}", e);
                false
            }
        }
    }

    fn model_name(&self) -> &str {
        "sentence-transformers/all-MiniLM-L6-v2"
    }
}
