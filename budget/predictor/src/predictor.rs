use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::OnceCell;

use crate::{artifact::ModelArtifact, error::PredictionFailure, request::FeatureRecord};

/// Black-box regression model: one single-row record in, one raw log-scale score out.
///
/// Implementations must be deterministic for a given record and artifact version.
pub trait BudgetModel: Send + Sync {
    /// Scores one record.
    fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictionFailure>;
}

impl<F> BudgetModel for F
where
    F: Fn(&FeatureRecord) -> Result<f64, PredictionFailure> + Send + Sync,
{
    fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictionFailure> {
        self(record)
    }
}

/// Produces the model behind a [`CachedPredictor`]. Loading is expensive and done once.
pub trait ArtifactLoader: Send + Sync {
    /// Loads the model.
    fn load(&self) -> Result<Arc<dyn BudgetModel>, PredictionFailure>;

    /// Where the model comes from, for logs.
    fn source(&self) -> String;
}

/// Loads a [`ModelArtifact`] JSON file.
#[derive(Debug, Clone)]
pub struct FileArtifactLoader {
    path: PathBuf,
}

impl FileArtifactLoader {
    /// Loader for the artifact at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactLoader for FileArtifactLoader {
    fn load(&self) -> Result<Arc<dyn BudgetModel>, PredictionFailure> {
        let artifact = ModelArtifact::load(&self.path)?;
        Ok(Arc::new(artifact))
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }
}

/// Load-once, cache-forever wrapper around an [`ArtifactLoader`].
///
/// The first successful prediction loads the model; later calls reuse it. A failed load
/// is not cached, so the next attempt tries again.
pub struct CachedPredictor<L = FileArtifactLoader> {
    loader: L,
    model: OnceCell<Arc<dyn BudgetModel>>,
}

impl<L> fmt::Debug for CachedPredictor<L>
where
    L: ArtifactLoader,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedPredictor")
            .field("source", &self.loader.source())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<L: ArtifactLoader> CachedPredictor<L> {
    /// Wraps a loader; nothing is loaded yet.
    #[must_use]
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    /// Returns the cached model, loading it on first use.
    pub fn model(&self) -> Result<&Arc<dyn BudgetModel>, PredictionFailure> {
        self.model.get_or_try_init(|| self.loader.load())
    }

    /// Whether the model has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Underlying loader.
    #[must_use]
    pub const fn loader(&self) -> &L {
        &self.loader
    }
}

impl CachedPredictor<FileArtifactLoader> {
    /// Cached predictor over an artifact file.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(FileArtifactLoader::new(path))
    }
}

impl<L: ArtifactLoader> BudgetModel for CachedPredictor<L> {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictionFailure> {
        self.model()?.predict(record)
    }
}

static SHARED: OnceCell<CachedPredictor<FileArtifactLoader>> = OnceCell::new();

/// Process-wide predictor. The path given on the first call wins for the process lifetime.
#[must_use]
pub fn shared_predictor(path: impl Into<PathBuf>) -> &'static CachedPredictor<FileArtifactLoader> {
    SHARED.get_or_init(|| CachedPredictor::from_path(path))
}
