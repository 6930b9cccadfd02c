//! Wallet credit scoring core crate.
//!
//! Pipeline stages, in dependency order:
//! - raw transaction classification (token-transfer vs general-transaction
//!   feed rules)
//! - canonical action normalization (amount scaling, identifier derivation,
//!   cross-feed dedupe)
//! - per-wallet behavioral feature aggregation
//! - batch-relative two-stage min-max scoring onto [0, 1000]

mod classify;
mod etherscan;
mod export;
mod features;
mod normalize;
mod observability;
mod score;

pub use classify::{
    classify_action, ActionKind, ContractCallRecord, RawTransaction, TokenTransferRecord,
};
pub use etherscan::{
    fetch_wallet_transactions, fetch_wallet_transactions_with_fetcher, EtherscanConfig, FetchError,
    HttpFetcher, ReqwestBlockingFetcher, CTOKEN_SYMBOLS, DEFAULT_API_URL,
};
pub use export::{
    load_canonical_actions, load_wallet_list, write_canonical_actions, write_score_csv,
    ExportError,
};
pub use features::{
    aggregate_features, build_feature_schema, FeatureSchema, WalletFeatures, FEATURE_COLUMNS,
    FEATURE_COUNT, FEATURE_SCHEMA_VERSION,
};
pub use normalize::{
    build_canonical_batch, dedupe_by_hash, normalize_transaction, validate_wallet_address,
    AddressError, CanonicalAction, ProtocolLabels, DEFAULT_NETWORK, DEFAULT_PROTOCOL,
};
pub use observability::{
    init_logging, log_app_start, log_wallet_skipped, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError,
};
pub use score::{
    histogram_rows, score_histogram, score_wallets, ScoreConfig, ScoreError, ScoreRecord,
    DEFAULT_WEIGHTS, HISTOGRAM_BUCKETS, SCORE_MAX,
};
