//! The ordered class names the model was trained on. Position `i` names
//! output `i` of the model.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::config::LabelsConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelSet {
    labels: Vec<String>,
}

impl ClassLabelSet {
    pub fn new(labels: Vec<String>) -> anyhow::Result<Self> {
        if labels.is_empty() {
            bail!("class label set is empty");
        }
        Ok(Self { labels })
    }

    /// Every entry name in `dir`, sorted. This is how the training pipeline
    /// assigned indices, so it is only correct while the directory still has
    /// the exact contents it had at training time.
    pub fn from_directory(dir: &Path) -> anyhow::Result<Self> {
        let mut labels = fs::read_dir(dir)
            .with_context(|| format!("reading label directory {}", dir.display()))?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("listing label directory {}", dir.display()))?;
        labels.sort();
        Self::new(labels)
    }

    /// One label per line in model output order. Blank lines are skipped.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading label file {}", path.display()))?;
        let labels = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(labels)
    }

    pub fn load(config: &LabelsConfig) -> anyhow::Result<Self> {
        let set = match &config.file {
            Some(file) => Self::from_file(file)?,
            None => {
                warn!(
                    directory = %config.directory.display(),
                    "Deriving class labels from a directory listing; index alignment with the model \
                     breaks if the directory changes after training. Set labels.file to pin them."
                );
                Self::from_directory(&config.directory)?
            }
        };
        info!(count = set.len(), "Loaded class labels");
        Ok(set)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
