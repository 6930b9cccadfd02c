use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use walletscore::{
    aggregate_features, build_canonical_batch, fetch_wallet_transactions, histogram_rows,
    init_logging, load_wallet_list, log_app_start, log_wallet_skipped, logging_config_from_env,
    score_histogram, score_wallets, validate_wallet_address, write_canonical_actions,
    write_score_csv, CanonicalAction, EtherscanConfig, ProtocolLabels, ScoreConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("wallet_score", &logging_cfg);

    let wallets_path = env_path("WALLETSCORE_WALLETS_PATH", "data/wallet_id.csv");
    let output_dir = env_path("WALLETSCORE_OUTPUT_DIR", "output");
    let wallet_throttle_ms = env_u64("WALLETSCORE_WALLET_THROTTLE_MS", 500)?;

    let etherscan_cfg = EtherscanConfig {
        api_key: std::env::var("WALLETSCORE_API_KEY").unwrap_or_default(),
        ..EtherscanConfig::default()
    };
    if etherscan_cfg.api_key.trim().is_empty() {
        return Err("WALLETSCORE_API_KEY must be set for explorer fetches".into());
    }

    let wallets = load_wallet_list(&wallets_path)?;
    println!(
        "Wallet scoring start | wallets={} input={} output_dir={}",
        wallets.len(),
        wallets_path.display(),
        output_dir.display()
    );

    let labels = ProtocolLabels::default();
    let mut all_actions: Vec<CanonicalAction> = Vec::new();
    let mut skipped_wallets = 0usize;
    let mut fetch_failures = 0usize;

    for (idx, wallet) in wallets.iter().enumerate() {
        if let Err(err) = validate_wallet_address(wallet) {
            log_wallet_skipped("wallet_score", wallet, &err.to_string());
            skipped_wallets += 1;
            continue;
        }

        match fetch_wallet_transactions(wallet, &etherscan_cfg) {
            Ok(raw) => {
                let raw_count = raw.len();
                let actions = build_canonical_batch(raw, wallet, &labels);
                println!(
                    "  {} | raw={} actions={}",
                    wallet.to_ascii_lowercase(),
                    raw_count,
                    actions.len()
                );
                all_actions.extend(actions);
            }
            Err(err) => {
                log_wallet_skipped("wallet_score", wallet, &err.to_string());
                fetch_failures += 1;
            }
        }

        if wallet_throttle_ms > 0 && idx + 1 < wallets.len() {
            sleep(Duration::from_millis(wallet_throttle_ms));
        }
    }

    std::fs::create_dir_all(&output_dir)?;
    let actions_path = output_dir.join("canonical_actions.json");
    write_canonical_actions(&actions_path, &all_actions)?;

    let features = aggregate_features(&all_actions);
    let records = score_wallets(&features, &ScoreConfig::default())?;

    let scores_path = output_dir.join("wallet_scores.csv");
    write_score_csv(&scores_path, &records)?;

    println!(
        "\nDone | scored_wallets={} actions={} skipped_wallets={} fetch_failures={}",
        records.len(),
        all_actions.len(),
        skipped_wallets,
        fetch_failures
    );
    println!("actions -> {}", actions_path.display());
    println!("scores  -> {}", scores_path.display());

    println!("\nScore distribution:");
    for (label, count) in histogram_rows(&score_histogram(&records)) {
        println!("  {label:>9} | {count}");
    }

    Ok(())
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_u64(key: &str, default: u64) -> Result<u64, Box<dyn std::error::Error>> {
    match std::env::var(key) {
        Ok(raw) => Ok(raw
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("{key} must be a non-negative integer, got {raw:?}"))?),
        Err(_) => Ok(default),
    }
}
