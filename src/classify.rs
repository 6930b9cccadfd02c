//! Raw transaction feeds and action classification.
//!
//! Rules implemented:
//! - token-transfer feed: direction against the queried wallet decides
//!   deposit/withdraw vs plain transfer, using the function-name hint
//! - general-transaction feed: function-name hint keywords in priority order
//!   borrow > repay > liquidate > mint > redeem
//! - a token transfer touching neither side of the queried wallet is `other`

use serde::{Deserialize, Serialize};

/// Semantic label assigned to one raw transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidate,
    TransferIn,
    TransferOut,
    ContractInteraction,
    Other,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Borrow => "borrow",
            Self::Repay => "repay",
            Self::Liquidate => "liquidate",
            Self::TransferIn => "transfer_in",
            Self::TransferOut => "transfer_out",
            Self::ContractInteraction => "contract_interaction",
            Self::Other => "other",
        }
    }
}

/// One record from the token-transfer history of an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferRecord {
    pub tx_hash: String,
    pub from_address: String,
    pub to_address: String,
    /// Raw integer value as reported by the explorer, pre decimal shift.
    pub value: String,
    pub token_symbol: Option<String>,
    pub token_decimal: Option<u32>,
    pub contract_address: Option<String>,
    /// Function-name hint of the surrounding transaction; empty when the
    /// feed does not report one.
    pub function_name: String,
    pub timestamp: i64,
    pub block_number: u64,
}

/// One record from the general-transaction history of an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCallRecord {
    pub tx_hash: String,
    pub from_address: String,
    pub to_address: String,
    /// Raw native-asset value in smallest units.
    pub value: String,
    pub contract_address: Option<String>,
    pub function_name: String,
    pub timestamp: i64,
    pub block_number: u64,
}

/// A raw transaction tagged with its feed provenance. Classification rules
/// branch on the variant, never on key presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "feed", rename_all = "snake_case")]
pub enum RawTransaction {
    TokenTransfer(TokenTransferRecord),
    ContractCall(ContractCallRecord),
}

impl RawTransaction {
    pub fn tx_hash(&self) -> &str {
        match self {
            Self::TokenTransfer(record) => &record.tx_hash,
            Self::ContractCall(record) => &record.tx_hash,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::TokenTransfer(record) => record.timestamp,
            Self::ContractCall(record) => record.timestamp,
        }
    }
}

/// Maps a raw transaction plus the wallet under query to its action label.
///
/// Pure and total: unmatched inputs fall through to
/// [`ActionKind::ContractInteraction`] or [`ActionKind::Other`], never fail.
pub fn classify_action(tx: &RawTransaction, queried_wallet: &str) -> ActionKind {
    match tx {
        RawTransaction::TokenTransfer(record) => {
            let hint = record.function_name.to_ascii_lowercase();
            if record.to_address.eq_ignore_ascii_case(queried_wallet) {
                if hint.contains("mint") || hint.contains("supply") {
                    ActionKind::Deposit
                } else {
                    ActionKind::TransferIn
                }
            } else if record.from_address.eq_ignore_ascii_case(queried_wallet) {
                if hint.contains("redeem") || hint.contains("withdraw") {
                    ActionKind::Withdraw
                } else {
                    ActionKind::TransferOut
                }
            } else {
                ActionKind::Other
            }
        }
        RawTransaction::ContractCall(record) => {
            let hint = record.function_name.to_ascii_lowercase();
            if hint.contains("borrow") {
                ActionKind::Borrow
            } else if hint.contains("repay") {
                ActionKind::Repay
            } else if hint.contains("liquidate") {
                ActionKind::Liquidate
            } else if hint.contains("mint") {
                ActionKind::Deposit
            } else if hint.contains("redeem") {
                ActionKind::Withdraw
            } else {
                ActionKind::ContractInteraction
            }
        }
    }
}
