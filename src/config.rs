// src/config.rs
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: General,
    pub output: OutputCfg,
    pub book: BookCfg,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct General {
    pub json_logs: bool, // structured JSON logs to stderr
}

impl Default for General {
    fn default() -> Self {
        Self { json_logs: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputCfg {
    pub path: PathBuf,      // e.g., "output.csv"
    pub buffer_bytes: usize, // write buffer, e.g., 64 KiB
    pub publisher_id: u32,
    pub instrument_id: u32,
    pub symbol: String,
}

impl Default for OutputCfg {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output.csv"),
            buffer_bytes: 64 * 1024,
            publisher_id: 2,
            instrument_id: 1108,
            symbol: "ARL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookCfg {
    pub order_capacity: usize, // per-order index pre-sizing
    pub emit: EmitMode,
}

impl Default for BookCfg {
    fn default() -> Self {
        Self { order_capacity: 1 << 16, emit: EmitMode::OnChange }
    }
}

/// Snapshot cadence. `OnChange` writes only when the visible ten levels
/// moved; `EveryEvent` writes for every event the book accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmitMode {
    OnChange,
    EveryEvent,
}

impl AppConfig {
    /// Loads the optional config file; every field has a default so a missing
    /// file means a default run.
    pub fn from_file(p: &Path) -> anyhow::Result<Self> {
        if !p.exists() {
            return Ok(Self::default());
        }
        let s = fs::read_to_string(p)?;
        let cfg: AppConfig = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.output.buffer_bytes < 4096 {
            anyhow::bail!("output.buffer_bytes must be at least 4096");
        }
        if self.output.symbol.is_empty() {
            anyhow::bail!("output.symbol must not be empty");
        }
        if self.book.order_capacity == 0 {
            anyhow::bail!("book.order_capacity must be > 0");
        }
        Ok(())
    }
}
