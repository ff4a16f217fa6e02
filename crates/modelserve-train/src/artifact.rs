//! On-disk form of a trained model: `model.json` plus an `MLmodel` descriptor.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::forest::RandomForest;

pub const FORMAT_VERSION: u32 = 1;
pub const FLAVOR: &str = "modelserve_forest";

/// Artifact directory relative to the run's artifact root.
pub const MODEL_DIR: &str = "model";
pub const MODEL_FILE: &str = "model.json";
pub const DESCRIPTOR_FILE: &str = "MLmodel";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub flavor: String,
    pub feature_names: Vec<String>,
    pub class_names: Vec<String>,
    pub forest: RandomForest,
}

/// `MLmodel` YAML naming the flavor and the file that holds the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub artifact_path: String,
    pub run_id: String,
    pub flavors: Flavors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flavors {
    pub modelserve_forest: FlavorEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorEntry {
    pub data: String,
    pub format_version: u32,
}

impl ModelArtifact {
    pub fn new(forest: RandomForest, feature_names: Vec<String>, class_names: Vec<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            flavor: FLAVOR.to_string(),
            feature_names,
            class_names,
            forest,
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(raw)?;
        if artifact.format_version != FORMAT_VERSION || artifact.flavor != FLAVOR {
            return Err(TrainError::Model(format!(
                "unsupported artifact {} v{}",
                artifact.flavor, artifact.format_version
            )));
        }
        artifact.forest.validate()?;
        Ok(artifact)
    }

    pub fn descriptor(&self, run_id: &str) -> Descriptor {
        Descriptor {
            artifact_path: MODEL_DIR.to_string(),
            run_id: run_id.to_string(),
            flavors: Flavors {
                modelserve_forest: FlavorEntry {
                    data: MODEL_FILE.to_string(),
                    format_version: self.format_version,
                },
            },
        }
    }
}

impl Descriptor {
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_yaml::to_string(self)?))
    }
}

/// `model/<file>` path of an artifact file.
pub fn model_path(file: &str) -> String {
    format!("{MODEL_DIR}/{file}")
}
