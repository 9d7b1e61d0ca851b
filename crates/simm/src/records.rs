//! # Training Record Inspection
//!
//! Experiments persist one JSON [`TrainingRecord`] per trained model under
//! ``model_dir/exp_id/model_id``. The inspection helper returns the stored
//! hyperparameter mapping and prints the other diagnostics best-effort:
//! optional fields that are absent are silently skipped.

use anyhow::Context;
use burn::prelude::Config;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A persisted per-model training record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingRecord {
    /// Dataset indices the model was trained on.
    pub trained_on_indices: Vec<usize>,

    /// The hyperparameter mapping used for the run.
    pub hyperparameters: BTreeMap<String, serde_json::Value>,

    /// Architecture name, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Final train accuracy, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_acc: Option<f64>,

    /// Final test accuracy, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_acc: Option<f64>,
}

impl TrainingRecord {
    /// Load a record from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening record {}", path.display()))?;
        let record = serde_json::from_reader(file)
            .with_context(|| format!("parsing record {}", path.display()))?;
        Ok(record)
    }

    /// Save a record to a JSON file.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("creating record {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

fn default_model_dir() -> String {
    dirs::home_dir()
        .expect("Should be able to get home directory")
        .join(".cache")
        .join("simm")
        .join("models")
        .to_string_lossy()
        .to_string()
}

/// Record Store layout.
#[derive(Config, Debug)]
pub struct RecordStoreConfig {
    /// Root directory holding per-experiment record directories.
    #[config(default = "default_model_dir()")]
    pub model_dir: String,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStoreConfig {
    /// The record path for an experiment id / model id pair.
    pub fn record_path(
        &self,
        exp_id: &str,
        model_id: &str,
    ) -> PathBuf {
        PathBuf::from(&self.model_dir).join(exp_id).join(model_id)
    }

    /// Load the [`TrainingRecord`] for an experiment id / model id pair.
    pub fn read_record(
        &self,
        exp_id: &str,
        model_id: &str,
    ) -> anyhow::Result<TrainingRecord> {
        TrainingRecord::load(self.record_path(exp_id, model_id))
    }

    /// Read the stored hyperparameter mapping for a model, printing the
    /// record's other diagnostics best-effort.
    ///
    /// Prints the trained-on index count, then each of architecture name,
    /// train accuracy, and test accuracy only when present; an absent field
    /// prints nothing and is not an error.
    pub fn read_hyperparameters(
        &self,
        exp_id: &str,
        model_id: &str,
    ) -> anyhow::Result<BTreeMap<String, serde_json::Value>> {
        let record = self.read_record(exp_id, model_id)?;

        println!("{}", record.trained_on_indices.len());
        if let Some(arch) = &record.arch {
            println!("{arch}");
        }
        if let Some(acc) = record.train_acc {
            println!("{acc}");
        }
        if let Some(acc) = record.test_acc {
            println!("{acc}");
        }

        Ok(record.hyperparameters)
    }
}
