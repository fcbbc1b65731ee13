// src/main.rs
use anyhow::Context;
use log::info;
use mbp_engine::config::AppConfig;
use mbp_engine::{metrics, replay};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let input = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: mbp-engine <mbo_input_file.csv>")?;

    // Load config before the logger to allow the JSON formatting choice
    let cfg = AppConfig::from_file(Path::new("mbp.toml"))?;

    if cfg.general.json_logs {
        let mut b = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        b.format(|buf, record| {
            use std::io::Write;
            let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            writeln!(buf, "{{\"ts\":\"{}\",\"level\":\"{}\",\"target\":\"{}\",\"msg\":\"{}\"}}",
                ts, record.level(), record.target(), record.args().to_string().replace('"', "'"))
        }).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("replaying {} -> {}", input.display(), cfg.output.path.display());
    let summary = replay::replay_file(&cfg, &input)?;

    metrics::log_summary();
    info!(
        "processed {} events, wrote {} snapshots to {}",
        summary.events,
        summary.snapshots,
        cfg.output.path.display()
    );
    info!(
        "final book: {} bid levels, {} ask levels, {} live orders",
        summary.bid_levels, summary.ask_levels, summary.live_orders
    );
    Ok(())
}
