use std::io;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;
use walletscore::{
    aggregate_features, build_canonical_batch, log_app_start, log_wallet_skipped, score_wallets,
    LoggingConfig, ProtocolLabels, RawTransaction, ScoreConfig, TokenTransferRecord,
};

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    with_default(&dispatch, f);
    writer.output_string()
}

const WALLET: &str = "0xaaaa000000000000000000000000000000000001";

fn sample_deposit(hash: &str) -> RawTransaction {
    RawTransaction::TokenTransfer(TokenTransferRecord {
        tx_hash: hash.to_string(),
        from_address: "0x00000000000000000000000000000000000c0de0".to_string(),
        to_address: WALLET.to_string(),
        value: "10000000000".to_string(),
        token_symbol: Some("cUSDC".to_string()),
        token_decimal: Some(8),
        contract_address: None,
        function_name: "mint(uint256)".to_string(),
        timestamp: 1_650_000_000,
        block_number: 14_500_000,
    })
}

#[test]
fn pipeline_stages_emit_milestone_events() {
    let logs = capture_logs(Level::INFO, || {
        let actions =
            build_canonical_batch(vec![sample_deposit("0x1")], WALLET, &ProtocolLabels::default());
        let features = aggregate_features(&actions);
        score_wallets(&features, &ScoreConfig::default()).expect("scoring succeeds");
    });

    assert!(logs.contains("\"event\":\"normalize.batch.finish\""));
    assert!(logs.contains("\"event\":\"features.aggregate.finish\""));
    assert!(logs.contains("\"event\":\"score.batch.finish\""));
    assert!(logs.contains("\"schema_fingerprint\""));
}

#[test]
fn empty_score_batch_emits_dedicated_event() {
    let logs = capture_logs(Level::INFO, || {
        score_wallets(&[], &ScoreConfig::default()).expect("empty batch scores");
    });

    assert!(logs.contains("\"event\":\"score.batch.empty\""));
}

#[test]
fn driver_helpers_emit_baseline_events() {
    let logs = capture_logs(Level::INFO, || {
        log_app_start("wallet_score", &LoggingConfig::default());
        log_wallet_skipped("wallet_score", "0x123", "wallet address must be 42 characters");
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"event\":\"wallet.skipped\""));
    assert!(logs.contains("\"component\":\"wallet_score\""));
}
