pub mod types;

use crate::errors::{ForecastError, ForecastResult};
use crate::forecast::{ModelId, PromptVersion, SalesCategory};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use types::{AblationRow, GroundTruth, MonthResult};

const GROUND_TRUTH_FILE: &str = "ground_truth.json";
const ABLATION_FILE: &str = "ablation.json";

#[derive(Default)]
struct Caches {
    results: HashMap<(ModelId, PromptVersion), Arc<Vec<MonthResult>>>,
    ground_truth: Option<Arc<GroundTruth>>,
    ablation: Option<Arc<Vec<AblationRow>>>,
}

/// Read-only access to the precomputed result files, memoised per store.
/// Entries are only ever added; `clear()` drops them all at once.
pub struct ResultStore {
    dir: PathBuf,
    caches: RwLock<Caches>,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            caches: RwLock::new(Caches::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Results for one model/strategy pair. A missing or unreadable file
    /// yields an empty list, which is not cached.
    pub async fn load_results(
        &self,
        model: ModelId,
        version: PromptVersion,
    ) -> ForecastResult<Arc<Vec<MonthResult>>> {
        let key = (model, version);
        let cached = self.read_caches()?.results.get(&key).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let file = format!("{}_{}.json", model.file_stem(), version);
        let rows: Vec<MonthResult> = match self.read_json(&file).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "failed to load results");
                return Ok(Arc::new(Vec::new()));
            }
        };

        tracing::debug!(file = %file, rows = rows.len(), "results loaded");
        let rows = Arc::new(rows);
        self.write_caches()?.results.insert(key, rows.clone());
        Ok(rows)
    }

    /// Every model/strategy pair, fetched concurrently and concatenated in
    /// model-then-version order.
    pub async fn load_all_results(&self) -> ForecastResult<Vec<MonthResult>> {
        let loads = ModelId::ALL.iter().flat_map(|&model| {
            PromptVersion::ALL
                .iter()
                .map(move |&version| self.load_results(model, version))
        });

        let mut all = Vec::new();
        for rows in join_all(loads).await {
            all.extend(rows?.iter().cloned());
        }
        Ok(all)
    }

    pub async fn load_ground_truth(&self) -> ForecastResult<Arc<GroundTruth>> {
        let cached = self.read_caches()?.ground_truth.clone();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let truth: Arc<GroundTruth> = Arc::new(self.read_json(GROUND_TRUTH_FILE).await?);
        for m in &truth.months {
            let by_qty = SalesCategory::from_quantity(m.true_sales_qty);
            if by_qty != m.true_class {
                tracing::warn!(
                    month = %m.month,
                    qty = m.true_sales_qty,
                    labelled = %m.true_class,
                    by_qty = %by_qty,
                    "ground truth class disagrees with cutpoints"
                );
            }
        }
        self.write_caches()?.ground_truth = Some(truth.clone());
        Ok(truth)
    }

    pub async fn load_ablation(&self) -> ForecastResult<Arc<Vec<AblationRow>>> {
        let cached = self.read_caches()?.ablation.clone();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let rows: Arc<Vec<AblationRow>> = Arc::new(self.read_json(ABLATION_FILE).await?);
        self.write_caches()?.ablation = Some(rows.clone());
        Ok(rows)
    }

    /// Drop every cached entry under a single lock.
    pub fn clear(&self) -> ForecastResult<()> {
        *self.write_caches()? = Caches::default();
        tracing::info!("result cache cleared");
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> ForecastResult<T> {
        let path = self.dir.join(file);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ForecastError::Data(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ForecastError::Data(format!("parse {}: {e}", path.display())))
    }

    fn read_caches(&self) -> ForecastResult<std::sync::RwLockReadGuard<'_, Caches>> {
        self.caches
            .read()
            .map_err(|e| ForecastError::Cache(format!("lock poisoned: {e}")))
    }

    fn write_caches(&self) -> ForecastResult<std::sync::RwLockWriteGuard<'_, Caches>> {
        self.caches
            .write()
            .map_err(|e| ForecastError::Cache(format!("lock poisoned: {e}")))
    }
}
