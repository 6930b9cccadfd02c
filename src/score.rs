//! Batch-relative credit scoring over wallet feature vectors.
//!
//! Two-stage min-max pipeline: per-column normalization of the feature
//! matrix, fixed-weight dot product, then a second min-max rescale of the
//! raw scores onto [0, 1000]. Scores are relative to the batch being
//! scored; re-running with a different wallet set changes every score.
//! That is the documented contract, not an artifact.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::features::{build_feature_schema, WalletFeatures, FEATURE_COUNT, FEATURE_SCHEMA_VERSION};

pub const SCORE_MAX: u32 = 1_000;
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Heuristic weights in [`crate::features::FEATURE_COLUMNS`] order.
pub const DEFAULT_WEIGHTS: [f64; FEATURE_COUNT] = [
    0.05,  // num_deposits
    0.10,  // total_deposited
    -0.05, // num_borrows
    -0.10, // total_borrowed
    0.15,  // num_repays
    0.15,  // total_repaid
    0.20,  // repay_ratio
    -0.25, // num_liquidations
    -0.15, // borrow_to_deposit_ratio
    -0.05, // num_actions
    0.05,  // avg_time_between_actions
    0.10,  // distinct_days_active
    0.10,  // action_entropy
];

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreConfig {
    pub weights: [f64; FEATURE_COUNT],
    pub schema_version: u32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            schema_version: FEATURE_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("schema version mismatch: weights are written for version {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub wallet: String,
    pub credit_score: u32,
}

/// Scores every wallet in the batch. Output order follows the input order
/// (one record per feature vector, wallet-unique by construction upstream).
pub fn score_wallets(
    features: &[WalletFeatures],
    cfg: &ScoreConfig,
) -> Result<Vec<ScoreRecord>, ScoreError> {
    if cfg.schema_version != FEATURE_SCHEMA_VERSION {
        return Err(ScoreError::SchemaVersionMismatch {
            expected: FEATURE_SCHEMA_VERSION,
            actual: cfg.schema_version,
        });
    }

    if features.is_empty() {
        info!(
            component = "score",
            event = "score.batch.empty"
        );
        return Ok(Vec::new());
    }

    let matrix: Vec<[f64; FEATURE_COUNT]> = features.iter().map(WalletFeatures::as_vector).collect();
    let normalized = min_max_columns(&matrix);
    let raw_scores: Vec<f64> = normalized
        .iter()
        .map(|row| dot(row, &cfg.weights))
        .collect();
    let scaled = rescale_to_scores(&raw_scores);

    let records: Vec<ScoreRecord> = features
        .iter()
        .zip(scaled)
        .map(|(vector, credit_score)| ScoreRecord {
            wallet: vector.wallet.clone(),
            credit_score,
        })
        .collect();

    let schema = build_feature_schema();
    info!(
        component = "score",
        event = "score.batch.finish",
        wallet_count = records.len(),
        schema_version = schema.version,
        schema_fingerprint = %schema.fingerprint
    );

    Ok(records)
}

/// Per-column min-max normalization. A constant column (max == min) maps to
/// all zeros so degenerate batches never divide by zero.
fn min_max_columns(matrix: &[[f64; FEATURE_COUNT]]) -> Vec<[f64; FEATURE_COUNT]> {
    let mut mins = [f64::INFINITY; FEATURE_COUNT];
    let mut maxs = [f64::NEG_INFINITY; FEATURE_COUNT];

    for row in matrix {
        for (j, value) in row.iter().enumerate() {
            mins[j] = mins[j].min(*value);
            maxs[j] = maxs[j].max(*value);
        }
    }

    matrix
        .iter()
        .map(|row| {
            let mut out = [0.0; FEATURE_COUNT];
            for (j, value) in row.iter().enumerate() {
                let span = maxs[j] - mins[j];
                out[j] = if span > 0.0 { (value - mins[j]) / span } else { 0.0 };
            }
            out
        })
        .collect()
}

fn dot(row: &[f64; FEATURE_COUNT], weights: &[f64; FEATURE_COUNT]) -> f64 {
    row.iter().zip(weights).map(|(value, weight)| value * weight).sum()
}

/// Second-stage min-max rescale of raw weighted scores onto [0, 1000],
/// rounded to the nearest integer. A degenerate batch (max == min) scores 0
/// for every wallet.
fn rescale_to_scores(raw_scores: &[f64]) -> Vec<u32> {
    let min = raw_scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    raw_scores
        .iter()
        .map(|raw| {
            if span > 0.0 {
                ((raw - min) / span * f64::from(SCORE_MAX)).round() as u32
            } else {
                0
            }
        })
        .collect()
}

/// Width-100 score distribution over [0, 1000]; 1000 lands in the top
/// bucket. Diagnostic output only.
pub fn score_histogram(records: &[ScoreRecord]) -> [u64; HISTOGRAM_BUCKETS] {
    let mut buckets = [0u64; HISTOGRAM_BUCKETS];
    for record in records {
        let idx = (record.credit_score / 100).min(HISTOGRAM_BUCKETS as u32 - 1) as usize;
        buckets[idx] += 1;
    }
    buckets
}

/// Labeled histogram rows for display, in ascending score order.
pub fn histogram_rows(buckets: &[u64; HISTOGRAM_BUCKETS]) -> Vec<(String, u64)> {
    buckets
        .iter()
        .enumerate()
        .map(|(i, count)| {
            let label = if i == HISTOGRAM_BUCKETS - 1 {
                format!("{}-{}", i * 100, SCORE_MAX)
            } else {
                format!("{}-{}", i * 100, i * 100 + 99)
            };
            (label, *count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(wallet: &str) -> WalletFeatures {
        WalletFeatures {
            wallet: wallet.to_string(),
            num_deposits: 0,
            total_deposited: 0.0,
            num_borrows: 0,
            total_borrowed: 0.0,
            num_repays: 0,
            total_repaid: 0.0,
            repay_ratio: 0.0,
            num_liquidations: 0,
            borrow_to_deposit_ratio: 0.0,
            num_actions: 0,
            avg_time_between_actions: 0.0,
            distinct_days_active: 0,
            action_entropy: 0.0,
        }
    }

    #[test]
    fn empty_batch_scores_to_empty_output() {
        let records = score_wallets(&[], &ScoreConfig::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn single_wallet_batch_scores_deterministic_zero() {
        let features = vec![WalletFeatures {
            num_deposits: 3,
            total_deposited: 120.0,
            num_repays: 2,
            total_repaid: 40.0,
            num_actions: 5,
            ..blank("0xonly")
        }];

        let records = score_wallets(&features, &ScoreConfig::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].credit_score, 0);
    }

    #[test]
    fn normalized_columns_stay_in_unit_interval() {
        let matrix = vec![
            {
                let mut row = [0.0; FEATURE_COUNT];
                row[0] = 5.0;
                row[1] = -3.0;
                row
            },
            {
                let mut row = [0.0; FEATURE_COUNT];
                row[0] = 1.0;
                row[1] = 7.0;
                row
            },
            [0.5; FEATURE_COUNT],
        ];

        let normalized = min_max_columns(&matrix);
        for row in &normalized {
            for value in row {
                assert!((0.0..=1.0).contains(value), "out of range: {value}");
            }
        }
    }

    #[test]
    fn constant_columns_normalize_to_zero() {
        let matrix = vec![[2.5; FEATURE_COUNT], [2.5; FEATURE_COUNT]];
        let normalized = min_max_columns(&matrix);
        assert!(normalized.iter().all(|row| row.iter().all(|v| *v == 0.0)));
    }

    #[test]
    fn max_raw_score_wallet_receives_full_score() {
        let strong = WalletFeatures {
            num_repays: 10,
            total_repaid: 500.0,
            repay_ratio: 1.0,
            ..blank("0xstrong")
        };
        let weak = WalletFeatures {
            num_liquidations: 4,
            borrow_to_deposit_ratio: 3.0,
            ..blank("0xweak")
        };

        let records = score_wallets(&[strong, weak], &ScoreConfig::default()).unwrap();
        assert_eq!(records[0].wallet, "0xstrong");
        assert_eq!(records[0].credit_score, SCORE_MAX);
        assert_eq!(records[1].credit_score, 0);
    }

    #[test]
    fn liquidated_wallet_scores_below_otherwise_equal_peer() {
        let base = WalletFeatures {
            num_deposits: 2,
            total_deposited: 100.0,
            num_actions: 2,
            ..blank("0xclean")
        };
        let liquidated = WalletFeatures {
            num_liquidations: 1,
            num_actions: 3,
            ..base.clone()
        };
        let liquidated = WalletFeatures {
            wallet: "0xliquidated".to_string(),
            ..liquidated
        };

        let records = score_wallets(&[base, liquidated], &ScoreConfig::default()).unwrap();
        let clean = records.iter().find(|r| r.wallet == "0xclean").unwrap();
        let hit = records.iter().find(|r| r.wallet == "0xliquidated").unwrap();
        assert!(hit.credit_score < clean.credit_score);
    }

    #[test]
    fn all_scores_stay_in_bounds() {
        let features: Vec<WalletFeatures> = (0..25)
            .map(|i| WalletFeatures {
                num_deposits: i,
                total_deposited: i as f64 * 13.0,
                num_borrows: i % 5,
                total_borrowed: (i % 5) as f64 * 7.0,
                num_actions: i + 1,
                action_entropy: (i as f64).sin().abs(),
                ..blank(&format!("0xwallet{i:02}"))
            })
            .collect();

        let records = score_wallets(&features, &ScoreConfig::default()).unwrap();
        assert_eq!(records.len(), features.len());
        assert!(records.iter().all(|r| r.credit_score <= SCORE_MAX));
        assert!(records.iter().any(|r| r.credit_score == SCORE_MAX));
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let cfg = ScoreConfig {
            schema_version: FEATURE_SCHEMA_VERSION + 1,
            ..ScoreConfig::default()
        };
        let err = score_wallets(&[blank("0xw")], &cfg).unwrap_err();
        assert!(matches!(err, ScoreError::SchemaVersionMismatch { .. }));
    }

    #[test]
    fn histogram_buckets_scores_by_hundreds() {
        let records = vec![
            ScoreRecord { wallet: "0xa".to_string(), credit_score: 0 },
            ScoreRecord { wallet: "0xb".to_string(), credit_score: 99 },
            ScoreRecord { wallet: "0xc".to_string(), credit_score: 100 },
            ScoreRecord { wallet: "0xd".to_string(), credit_score: 555 },
            ScoreRecord { wallet: "0xe".to_string(), credit_score: 1_000 },
        ];

        let buckets = score_histogram(&records);
        assert_eq!(buckets[0], 2);
        assert_eq!(buckets[1], 1);
        assert_eq!(buckets[5], 1);
        assert_eq!(buckets[9], 1);
        assert_eq!(buckets.iter().sum::<u64>(), records.len() as u64);

        let rows = histogram_rows(&buckets);
        assert_eq!(rows[0].0, "0-99");
        assert_eq!(rows[1].0, "100-199");
        assert_eq!(rows[9].0, "900-1000");
    }
}
