use std::path::PathBuf;

use walletscore::{
    aggregate_features, histogram_rows, init_logging, load_canonical_actions, log_app_start,
    logging_config_from_env, score_histogram, score_wallets, write_score_csv, ScoreConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("score_precollected", &logging_cfg);

    let actions_path = env_path("WALLETSCORE_ACTIONS_PATH", "output/canonical_actions.json");
    let scores_path = env_path("WALLETSCORE_SCORES_PATH", "output/wallet_scores.csv");

    let actions = load_canonical_actions(&actions_path)?;
    println!(
        "Pre-collected scoring start | actions={} input={}",
        actions.len(),
        actions_path.display()
    );

    let features = aggregate_features(&actions);
    let records = score_wallets(&features, &ScoreConfig::default())?;

    if let Some(parent) = scores_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    write_score_csv(&scores_path, &records)?;

    println!(
        "\nDone | scored_wallets={} actions={}",
        records.len(),
        actions.len()
    );
    println!("scores -> {}", scores_path.display());

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
