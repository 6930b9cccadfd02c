//! Block-explorer account-feed collection for lending-protocol wallets.
//!
//! Two feeds per wallet: the ERC-20 token-transfer history filtered to the
//! cToken receipt symbols, and the general transaction history filtered to
//! records carrying a function-name hint. Records are tagged with their feed
//! provenance before classification.

use std::thread::sleep;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::classify::{ContractCallRecord, RawTransaction, TokenTransferRecord};

pub const DEFAULT_API_URL: &str = "https://api.etherscan.io/api";

/// cToken receipt symbols considered deposit/withdraw evidence.
pub const CTOKEN_SYMBOLS: [&str; 15] = [
    "cUSDC", "cDAI", "cWBTC", "cUNI", "cCOMP", "cUSDT", "cSAI", "cZRX", "cETH", "cAAVE", "cBAT",
    "cLINK", "cMKR", "cSUSHI", "cYFI",
];

const NO_TRANSACTIONS_MESSAGE: &str = "No transactions found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtherscanConfig {
    pub api_key: String,
    pub base_url: String,
    pub http_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Pause between the two per-wallet feed queries, rate-limit workaround.
    pub feed_throttle_ms: u64,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_API_URL.to_string(),
            http_timeout_ms: 15_000,
            max_retries: 2,
            retry_backoff_ms: 200,
            feed_throttle_ms: 250,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed: {0}")]
    HttpRequest(String),
    #[error("malformed {feed} response: {message}")]
    MalformedResponse { feed: &'static str, message: String },
    #[error("{feed} query rejected: {message}")]
    Api { feed: &'static str, message: String },
}

/// Explorer responses wrap every result in a status envelope; `result` stays
/// untyped until the status is known because error payloads put a plain
/// string there.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenTransferRow {
    hash: String,
    from: String,
    to: String,
    value: String,
    #[serde(default)]
    token_symbol: String,
    #[serde(default)]
    token_decimal: String,
    #[serde(default)]
    contract_address: String,
    #[serde(default)]
    function_name: String,
    time_stamp: String,
    block_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormalTxRow {
    hash: String,
    from: String,
    to: String,
    value: String,
    #[serde(default)]
    contract_address: String,
    #[serde(default)]
    function_name: String,
    time_stamp: String,
    block_number: String,
}

pub trait HttpFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingFetcher {
    pub fn new(timeout_ms: u64) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| FetchError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestBlockingFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError::HttpRequest(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpRequest(format!(
                "unexpected HTTP status {status}"
            )));
        }

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| FetchError::HttpRequest(err.to_string()))
    }
}

/// Fetches both account feeds for one wallet with the default HTTP client.
pub fn fetch_wallet_transactions(
    wallet: &str,
    cfg: &EtherscanConfig,
) -> Result<Vec<RawTransaction>, FetchError> {
    let fetcher = ReqwestBlockingFetcher::new(cfg.http_timeout_ms)?;
    fetch_wallet_transactions_with_fetcher(wallet, cfg, &fetcher)
}

/// Fetcher-injected variant used by tests and alternative transports.
/// Returned records keep feed order (token transfers first) and are not yet
/// deduplicated; the canonical batch builder collapses shared hashes.
pub fn fetch_wallet_transactions_with_fetcher(
    wallet: &str,
    cfg: &EtherscanConfig,
    fetcher: &dyn HttpFetcher,
) -> Result<Vec<RawTransaction>, FetchError> {
    info!(
        component = "etherscan",
        event = "etherscan.fetch.start",
        wallet = %wallet.to_ascii_lowercase()
    );

    let mut raw = Vec::new();

    let token_rows: Vec<TokenTransferRow> = fetch_feed(fetcher, cfg, "tokentx", wallet)?;
    let token_row_count = token_rows.len();
    for row in token_rows {
        if is_ctoken_symbol(&row.token_symbol) {
            raw.push(token_transfer_from_row(row));
        }
    }

    if cfg.feed_throttle_ms > 0 {
        sleep(Duration::from_millis(cfg.feed_throttle_ms));
    }

    let call_rows: Vec<NormalTxRow> = fetch_feed(fetcher, cfg, "txlist", wallet)?;
    let call_row_count = call_rows.len();
    for row in call_rows {
        if !row.function_name.trim().is_empty() {
            raw.push(contract_call_from_row(row));
        }
    }

    info!(
        component = "etherscan",
        event = "etherscan.fetch.finish",
        wallet = %wallet.to_ascii_lowercase(),
        token_rows = token_row_count,
        call_rows = call_row_count,
        kept_records = raw.len()
    );

    Ok(raw)
}

fn fetch_feed<T: DeserializeOwned>(
    fetcher: &dyn HttpFetcher,
    cfg: &EtherscanConfig,
    feed: &'static str,
    wallet: &str,
) -> Result<Vec<T>, FetchError> {
    let url = account_url(cfg, feed, wallet);
    let bytes = retry(cfg, || fetcher.get_bytes(&url))?;

    let envelope: ApiEnvelope =
        serde_json::from_slice(&bytes).map_err(|err| FetchError::MalformedResponse {
            feed,
            message: err.to_string(),
        })?;

    if envelope.status != "1" {
        if envelope.message == NO_TRANSACTIONS_MESSAGE {
            debug!(
                component = "etherscan",
                event = "etherscan.fetch.feed_empty",
                feed,
                wallet = %wallet.to_ascii_lowercase()
            );
            return Ok(Vec::new());
        }
        return Err(FetchError::Api {
            feed,
            message: envelope.message,
        });
    }

    serde_json::from_value(envelope.result).map_err(|err| FetchError::MalformedResponse {
        feed,
        message: err.to_string(),
    })
}

fn account_url(cfg: &EtherscanConfig, action: &str, wallet: &str) -> String {
    format!(
        "{}?module=account&action={}&address={}&startblock=0&endblock=99999999&sort=asc&apikey={}",
        cfg.base_url, action, wallet, cfg.api_key
    )
}

fn is_ctoken_symbol(symbol: &str) -> bool {
    CTOKEN_SYMBOLS.iter().any(|known| *known == symbol)
}

fn token_transfer_from_row(row: TokenTransferRow) -> RawTransaction {
    RawTransaction::TokenTransfer(TokenTransferRecord {
        tx_hash: row.hash,
        from_address: row.from,
        to_address: row.to,
        value: row.value,
        token_symbol: non_empty(row.token_symbol),
        token_decimal: row
            .token_decimal
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|decimals| *decimals > 0),
        contract_address: non_empty(row.contract_address),
        function_name: row.function_name,
        timestamp: parse_numeric(&row.time_stamp),
        block_number: parse_numeric(&row.block_number) as u64,
    })
}

fn contract_call_from_row(row: NormalTxRow) -> RawTransaction {
    RawTransaction::ContractCall(ContractCallRecord {
        tx_hash: row.hash,
        from_address: row.from,
        to_address: row.to,
        value: row.value,
        contract_address: non_empty(row.contract_address),
        function_name: row.function_name,
        timestamp: parse_numeric(&row.time_stamp),
        block_number: parse_numeric(&row.block_number) as u64,
    })
}

fn non_empty(raw: String) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw)
    }
}

fn parse_numeric(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0).max(0)
}

fn retry<T>(
    cfg: &EtherscanConfig,
    mut f: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let mut attempt: u32 = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= cfg.max_retries => return Err(err),
            Err(_) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let factor = 1u64 << shift;
                sleep(Duration::from_millis(
                    cfg.retry_backoff_ms.saturating_mul(factor),
                ));
            }
        }
    }
}
