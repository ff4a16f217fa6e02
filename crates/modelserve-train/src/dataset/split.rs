use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, TrainError};

use super::Dataset;

/// Train/test partitions of a dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<u32>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<u32>,
}

/// Shuffle row indices with a seeded RNG and hold out `ceil(n * test_size)`
/// rows for testing.
pub fn train_test_split(ds: &Dataset, test_size: f64, seed: u64) -> Result<Split> {
    let n = ds.len();
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TrainError::Dataset(format!("test_size out of range: {test_size}")));
    }
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(TrainError::Dataset(format!(
            "split of {n} rows with test_size={test_size} leaves an empty partition"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let (test_idx, train_idx) = order.split_at(n_test);
    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<u32>) {
        idx.iter()
            .map(|&i| (ds.features[i].clone(), ds.labels[i]))
            .unzip()
    };

    let (x_train, y_train) = pick(train_idx);
    let (x_test, y_test) = pick(test_idx);

    tracing::debug!(train = y_train.len(), test = y_test.len(), seed, "dataset split");

    Ok(Split { x_train, y_train, x_test, y_test })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn iris_split_sizes() {
        let ds = Dataset::iris().unwrap();
        let s = train_test_split(&ds, 0.25, 42).unwrap();
        assert_eq!(s.x_train.len(), 112);
        assert_eq!(s.y_train.len(), 112);
        assert_eq!(s.x_test.len(), 38);
        assert_eq!(s.y_test.len(), 38);
    }

    #[test]
    fn same_seed_same_split() {
        let ds = Dataset::iris().unwrap();
        let a = train_test_split(&ds, 0.25, 42).unwrap();
        let b = train_test_split(&ds, 0.25, 42).unwrap();
        assert_eq!(a.x_test, b.x_test);
        assert_eq!(a.y_train, b.y_train);

        let c = train_test_split(&ds, 0.25, 7).unwrap();
        assert_ne!(a.x_test, c.x_test);
    }

    #[test]
    fn degenerate_split_is_rejected() {
        let ds = Dataset::from_csv("a,label\n1,x\n").unwrap();
        assert!(train_test_split(&ds, 0.5, 1).is_err());
    }
}
