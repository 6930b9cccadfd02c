//! Canonical action construction from classified raw transactions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::classify::{classify_action, ActionKind, RawTransaction};

pub const DEFAULT_NETWORK: &str = "ethereum";
pub const DEFAULT_PROTOCOL: &str = "compound";

const NATIVE_ASSET_DECIMALS: i32 = 18;
const WALLET_ADDRESS_LENGTH: usize = 42;

/// Fixed network/protocol labels stamped onto every canonical action of a
/// pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolLabels {
    pub network: String,
    pub protocol: String,
}

impl Default for ProtocolLabels {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
        }
    }
}

/// The normalized unit of work: one on-chain event relevant to scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAction {
    pub wallet_address: String,
    pub network: String,
    pub protocol: String,
    pub transaction_hash: String,
    pub log_id: String,
    pub timestamp: i64,
    pub block_number: u64,
    pub action: ActionKind,
    pub amount: f64,
    pub asset_symbol: String,
    pub pool_id: String,
    pub user_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("wallet address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("wallet address must be {WALLET_ADDRESS_LENGTH} characters, got {length}: {address}")]
    InvalidLength { address: String, length: usize },
}

/// Basic well-formedness check for a wallet address. Callers skip failing
/// addresses with a diagnostic rather than aborting the batch.
pub fn validate_wallet_address(address: &str) -> Result<(), AddressError> {
    if !address.starts_with("0x") {
        return Err(AddressError::MissingPrefix(address.to_string()));
    }
    if address.len() != WALLET_ADDRESS_LENGTH {
        return Err(AddressError::InvalidLength {
            address: address.to_string(),
            length: address.len(),
        });
    }
    Ok(())
}

/// Collapses records sharing a transaction hash across feeds, last seen
/// wins. First-seen positions are retained so batch order stays stable.
pub fn dedupe_by_hash(txs: Vec<RawTransaction>) -> Vec<RawTransaction> {
    let mut index_by_hash: HashMap<String, usize> = HashMap::with_capacity(txs.len());
    let mut out: Vec<RawTransaction> = Vec::with_capacity(txs.len());

    for tx in txs {
        match index_by_hash.get(tx.tx_hash()) {
            Some(&idx) => out[idx] = tx,
            None => {
                index_by_hash.insert(tx.tx_hash().to_string(), out.len());
                out.push(tx);
            }
        }
    }

    out
}

/// Converts a raw transaction plus its classified action into a canonical
/// record. Malformed fields degrade to documented defaults, never fail.
pub fn normalize_transaction(
    tx: &RawTransaction,
    action: ActionKind,
    queried_wallet: &str,
    labels: &ProtocolLabels,
) -> CanonicalAction {
    let wallet = queried_wallet.to_ascii_lowercase();

    let (hash, block_number, pool_source, symbol) = match tx {
        RawTransaction::TokenTransfer(record) => (
            record.tx_hash.clone(),
            record.block_number,
            record
                .contract_address
                .as_deref()
                .filter(|addr| !addr.is_empty())
                .unwrap_or(&record.to_address),
            record
                .token_symbol
                .clone()
                .filter(|symbol| !symbol.is_empty())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
        ),
        RawTransaction::ContractCall(record) => (
            record.tx_hash.clone(),
            record.block_number,
            record
                .contract_address
                .as_deref()
                .filter(|addr| !addr.is_empty())
                .unwrap_or(&record.to_address),
            "ETH".to_string(),
        ),
    };

    let pool_id = pool_source.to_ascii_lowercase();
    // Preserved from the source pipeline: when the derived pool address is the
    // queried wallet itself, the pool doubles as the user identity.
    let user_id = if pool_id == wallet {
        pool_id.clone()
    } else {
        wallet.clone()
    };

    CanonicalAction {
        wallet_address: wallet,
        network: labels.network.clone(),
        protocol: labels.protocol.clone(),
        log_id: format!("{hash}_{}", action.as_str()),
        transaction_hash: hash,
        timestamp: tx.timestamp().max(0),
        block_number,
        action,
        amount: scaled_amount(tx),
        asset_symbol: symbol,
        pool_id,
        user_id,
    }
}

/// Dedupes a multi-feed batch, classifies each record, and normalizes it.
/// One canonical action per surviving raw transaction.
pub fn build_canonical_batch(
    raw: Vec<RawTransaction>,
    queried_wallet: &str,
    labels: &ProtocolLabels,
) -> Vec<CanonicalAction> {
    let input_count = raw.len();
    let deduped = dedupe_by_hash(raw);

    let actions: Vec<CanonicalAction> = deduped
        .iter()
        .map(|tx| {
            let action = classify_action(tx, queried_wallet);
            normalize_transaction(tx, action, queried_wallet, labels)
        })
        .collect();

    info!(
        component = "normalize",
        event = "normalize.batch.finish",
        wallet = %queried_wallet.to_ascii_lowercase(),
        raw_records = input_count,
        deduped_records = actions.len()
    );

    actions
}

fn scaled_amount(tx: &RawTransaction) -> f64 {
    match tx {
        RawTransaction::TokenTransfer(record) => {
            let raw = parse_raw_value(&record.value);
            match record.token_decimal {
                Some(decimals) if decimals > 0 => raw / 10f64.powi(decimals as i32),
                // No declared precision and not a native-asset transaction:
                // the raw integer value passes through unscaled. Known
                // limitation, kept as-is.
                _ => raw,
            }
        }
        RawTransaction::ContractCall(record) => {
            parse_raw_value(&record.value) / 10f64.powi(NATIVE_ASSET_DECIMALS)
        }
    }
}

fn parse_raw_value(raw: &str) -> f64 {
    let value = raw.trim().parse::<f64>().unwrap_or(0.0);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
