pub mod annex_a;

pub use annex_a::{annex_a, ANNEX_A};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted catalogue inside the data directory.
pub const CONTROLS_FILE: &str = "iso_27001_controls.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub description: String,
}

impl Control {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("control catalogue not found at {0}; run `seed-controls` to create it")]
    Missing(PathBuf),

    #[error("control catalogue at {0} is empty; run `seed-controls` to populate it")]
    Empty(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalogue file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the analysis loop reads its reference controls from.
pub trait ControlSource: Send + Sync {
    fn load(&self) -> Result<Vec<Control>, CatalogueError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub removed: usize,
    pub inserted: usize,
}

/// Catalogue persisted as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct ControlStore {
    path: PathBuf,
}

impl ControlStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CONTROLS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored catalogue with `controls`. Running it twice leaves
    /// the same single copy.
    pub fn seed(&self, controls: &[Control]) -> Result<SeedReport, CatalogueError> {
        let removed = match std::fs::read_to_string(&self.path) {
            Ok(existing) => serde_json::from_str::<Vec<Control>>(&existing)
                .map(|c| c.len())
                .unwrap_or(0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(controls)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &self.path)?;

        tracing::info!(
            path = %self.path.display(),
            removed,
            inserted = controls.len(),
            "Control catalogue seeded"
        );

        Ok(SeedReport {
            removed,
            inserted: controls.len(),
        })
    }
}

impl ControlSource for ControlStore {
    fn load(&self) -> Result<Vec<Control>, CatalogueError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogueError::Missing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let controls: Vec<Control> = serde_json::from_str(&content)?;
        if controls.is_empty() {
            return Err(CatalogueError::Empty(self.path.clone()));
        }
        Ok(controls)
    }
}

/// Fixed in-memory catalogue.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogue(pub Vec<Control>);

impl ControlSource for StaticCatalogue {
    fn load(&self) -> Result<Vec<Control>, CatalogueError> {
        if self.0.is_empty() {
            return Err(CatalogueError::Empty(PathBuf::from("<static>")));
        }
        Ok(self.0.clone())
    }
}
