//! Fixed training data and the seeded train/test split.

pub mod split;

use crate::error::{Result, TrainError};

pub use split::{train_test_split, Split};

const IRIS_CSV: &str = include_str!("../../data/iris.csv");

/// Dense feature matrix with integer class labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub class_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u32>,
}

impl Dataset {
    /// Fisher's iris data: 150 rows, 4 features, 3 classes in file order.
    pub fn iris() -> Result<Self> {
        Self::from_csv(IRIS_CSV)
    }

    /// Parse a CSV whose header names the features and whose last column is
    /// the class name. Classes get ids in order of first appearance.
    pub fn from_csv(src: &str) -> Result<Self> {
        let mut lines = src.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| TrainError::Dataset("empty csv".into()))?;
        let mut columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
        if columns.len() < 2 {
            return Err(TrainError::Dataset("csv needs at least one feature and a label".into()));
        }
        columns.pop();
        let n_features = columns.len();

        let mut class_names: Vec<String> = Vec::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();

        for (line_no, line) in lines.enumerate() {
            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            if cells.len() != n_features + 1 {
                return Err(TrainError::Dataset(format!(
                    "row {}: expected {} columns, got {}",
                    line_no + 1,
                    n_features + 1,
                    cells.len()
                )));
            }

            let row = cells[..n_features]
                .iter()
                .map(|c| {
                    c.parse::<f64>().map_err(|e| {
                        TrainError::Dataset(format!("row {}: bad value {c:?}: {e}", line_no + 1))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            let class = cells[n_features];
            let label = match class_names.iter().position(|c| c == class) {
                Some(idx) => idx,
                None => {
                    class_names.push(class.to_string());
                    class_names.len() - 1
                }
            };

            features.push(row);
            labels.push(label as u32);
        }

        let ds = Self {
            feature_names: columns,
            class_names,
            features,
            labels,
        };
        ds.validate()?;
        Ok(ds)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(TrainError::Dataset("dataset has no rows".into()));
        }
        if self.features.len() != self.labels.len() {
            return Err(TrainError::Dataset("features and labels differ in length".into()));
        }
        if let Some(row) = self.features.iter().find(|r| r.len() != self.n_features()) {
            return Err(TrainError::Dataset(format!(
                "row has {} features, expected {}",
                row.len(),
                self.n_features()
            )));
        }
        if self.labels.iter().any(|l| *l as usize >= self.n_classes()) {
            return Err(TrainError::Dataset("label out of range".into()));
        }
        Ok(())
    }
}
