//! Per-wallet behavioral feature aggregation.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::classify::ActionKind;
use crate::normalize::CanonicalAction;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;
pub const FEATURE_COUNT: usize = 13;

/// Scoring column order. The weight vector in [`crate::score`] is written
/// against exactly this layout.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "num_deposits",
    "total_deposited",
    "num_borrows",
    "total_borrowed",
    "num_repays",
    "total_repaid",
    "repay_ratio",
    "num_liquidations",
    "borrow_to_deposit_ratio",
    "num_actions",
    "avg_time_between_actions",
    "distinct_days_active",
    "action_entropy",
];

const ENTROPY_EPSILON: f64 = 1e-9;

/// Behavioral statistics for one wallet, field order matching
/// [`FEATURE_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletFeatures {
    pub wallet: String,
    pub num_deposits: u64,
    pub total_deposited: f64,
    pub num_borrows: u64,
    pub total_borrowed: f64,
    pub num_repays: u64,
    pub total_repaid: f64,
    pub repay_ratio: f64,
    pub num_liquidations: u64,
    pub borrow_to_deposit_ratio: f64,
    pub num_actions: u64,
    pub avg_time_between_actions: f64,
    pub distinct_days_active: u64,
    pub action_entropy: f64,
}

impl WalletFeatures {
    /// The wallet's statistics as a dense row in [`FEATURE_COLUMNS`] order.
    pub fn as_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.num_deposits as f64,
            self.total_deposited,
            self.num_borrows as f64,
            self.total_borrowed,
            self.num_repays as f64,
            self.total_repaid,
            self.repay_ratio,
            self.num_liquidations as f64,
            self.borrow_to_deposit_ratio,
            self.num_actions as f64,
            self.avg_time_between_actions,
            self.distinct_days_active as f64,
            self.action_entropy,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<String>,
}

pub fn build_feature_schema() -> FeatureSchema {
    let columns: Vec<String> = FEATURE_COLUMNS.iter().map(|name| name.to_string()).collect();
    let fingerprint = schema_fingerprint(FEATURE_SCHEMA_VERSION, &columns);

    FeatureSchema {
        version: FEATURE_SCHEMA_VERSION,
        fingerprint,
        columns,
    }
}

fn schema_fingerprint(version: u32, columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{version};columns:"));
    for column in columns {
        hasher.update(column.as_bytes());
        hasher.update(";");
    }
    hex::encode(hasher.finalize())
}

/// Groups canonical actions by wallet and computes one feature vector per
/// distinct wallet, output sorted by wallet address. Wallets with no actions
/// emit nothing.
pub fn aggregate_features(actions: &[CanonicalAction]) -> Vec<WalletFeatures> {
    let mut groups: BTreeMap<&str, Vec<&CanonicalAction>> = BTreeMap::new();
    for action in actions {
        groups
            .entry(action.wallet_address.as_str())
            .or_default()
            .push(action);
    }

    let vectors: Vec<WalletFeatures> = groups
        .into_iter()
        .map(|(wallet, group)| wallet_features(wallet, group))
        .collect();

    info!(
        component = "features",
        event = "features.aggregate.finish",
        input_actions = actions.len(),
        wallet_count = vectors.len()
    );

    vectors
}

fn wallet_features(wallet: &str, mut group: Vec<&CanonicalAction>) -> WalletFeatures {
    group.sort_by_key(|action| action.timestamp);

    let mut num_deposits = 0u64;
    let mut num_borrows = 0u64;
    let mut num_repays = 0u64;
    let mut num_liquidations = 0u64;
    let mut total_deposited = 0.0f64;
    let mut total_borrowed = 0.0f64;
    let mut total_repaid = 0.0f64;

    for action in &group {
        match action.action {
            ActionKind::Deposit => {
                num_deposits += 1;
                total_deposited += action.amount;
            }
            ActionKind::Borrow => {
                num_borrows += 1;
                total_borrowed += action.amount;
            }
            ActionKind::Repay => {
                num_repays += 1;
                total_repaid += action.amount;
            }
            ActionKind::Liquidate => num_liquidations += 1,
            _ => {}
        }
    }

    let repay_ratio = if total_borrowed > 0.0 {
        total_repaid / total_borrowed
    } else {
        0.0
    };
    let borrow_to_deposit_ratio = if total_deposited > 0.0 {
        total_borrowed / total_deposited
    } else {
        0.0
    };

    WalletFeatures {
        wallet: wallet.to_string(),
        num_deposits,
        total_deposited,
        num_borrows,
        total_borrowed,
        num_repays,
        total_repaid,
        repay_ratio,
        num_liquidations,
        borrow_to_deposit_ratio,
        num_actions: group.len() as u64,
        avg_time_between_actions: mean_timestamp_gap(&group),
        distinct_days_active: distinct_utc_days(&group),
        action_entropy: action_entropy(&group),
    }
}

fn mean_timestamp_gap(sorted_group: &[&CanonicalAction]) -> f64 {
    if sorted_group.len() < 2 {
        return 0.0;
    }

    let delta_sum: i64 = sorted_group
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .sum();

    delta_sum as f64 / (sorted_group.len() - 1) as f64
}

fn distinct_utc_days(group: &[&CanonicalAction]) -> u64 {
    let days: HashSet<chrono::NaiveDate> = group
        .iter()
        .filter_map(|action| Utc.timestamp_opt(action.timestamp, 0).single())
        .map(|dt| dt.date_naive())
        .collect();
    days.len() as u64
}

/// Shannon entropy (base 2) of the group's action-label distribution,
/// computed as `-sum(p * log2(p + eps))` over observed labels.
fn action_entropy(group: &[&CanonicalAction]) -> f64 {
    if group.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<ActionKind, u64> = HashMap::new();
    for action in group {
        *counts.entry(action.action).or_insert(0) += 1;
    }

    let total = group.len() as f64;
    -counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            p * (p + ENTROPY_EPSILON).log2()
        })
        .sum::<f64>()
}
