// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

use crate::process::decode::CoercePolicy;

/// Run configuration, loaded once in `main` and passed explicitly into the
/// pipeline. Nothing reads configuration behind the pipeline's back.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// First and last years to stage, inclusive.
    pub start_year: u16,
    pub end_year: u16,

    #[serde(default = "default_dictionary")]
    pub dictionary: PathBuf,

    /// Working directory for downloads, extracted raw files and output.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub sample: SampleSettings,

    /// What to do when a slice cannot be coerced to its declared type.
    #[serde(default)]
    pub on_decode_error: CoercePolicy,

    /// Delete the downloaded archive after extraction.
    #[serde(default)]
    pub remove_zip: bool,

    /// Delete the extracted raw file after a year is staged.
    #[serde(default = "default_true")]
    pub remove_raw: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Fixed number of rows to draw per year.
    #[serde(default)]
    pub rows: Option<u64>,

    /// Fraction of the year's rows to draw; used when `rows` is unset.
    #[serde(default)]
    pub fraction: Option<f64>,

    /// Seed for reproducible draws; unset means a fresh draw every run.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Whether sample ordinals count physical lines (blank lines included,
    /// the historical behavior) or data lines only. With physical counting
    /// a target that lands on a blank line is skipped, so a draw can emit
    /// slightly fewer rows than requested.
    #[serde(default = "default_true")]
    pub count_blank_lines: bool,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            rows: None,
            fraction: None,
            seed: None,
            count_blank_lines: true,
        }
    }
}

impl SampleSettings {
    /// Sample size for a file with `universe` candidate rows.
    pub fn size_for(&self, universe: u64) -> u64 {
        match (self.rows, self.fraction) {
            (Some(rows), _) => rows,
            (None, Some(fraction)) => (universe as f64 * fraction).floor() as u64,
            // Rejected by Config::load when sampling is enabled.
            (None, None) => 0,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;

        if cfg.start_year > cfg.end_year {
            bail!(
                "start_year {} is after end_year {}",
                cfg.start_year,
                cfg.end_year
            );
        }
        if cfg.sample.enabled && cfg.sample.rows.is_none() && cfg.sample.fraction.is_none() {
            bail!("sampling is enabled but neither sample.rows nor sample.fraction is set");
        }
        if let Some(fraction) = cfg.sample.fraction {
            if !(0.0..=1.0).contains(&fraction) {
                bail!("sample.fraction {} is not within [0, 1]", fraction);
            }
        }
        Ok(cfg)
    }
}

fn default_dictionary() -> PathBuf {
    PathBuf::from("data/dictionary.json")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_base_url() -> String {
    "https://ftp.cdc.gov/pub/Health_Statistics/NCHS/Datasets/DVS/natality".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(yaml: &str) -> Result<Config> {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        Config::load(f.path())
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = load("start_year: 1968\nend_year: 2014\n").unwrap();
        assert_eq!(cfg.dictionary, PathBuf::from("data/dictionary.json"));
        assert!(!cfg.sample.enabled);
        assert!(cfg.sample.count_blank_lines);
        assert_eq!(cfg.on_decode_error, CoercePolicy::Strict);
        assert!(cfg.remove_raw);
        assert!(!cfg.remove_zip);
    }

    #[test]
    fn sampling_needs_a_size() {
        let err = load("start_year: 2014\nend_year: 2014\nsample:\n  enabled: true\n")
            .unwrap_err();
        assert!(err.to_string().contains("sample.rows"));
    }

    #[test]
    fn fraction_scales_with_universe() {
        let cfg = load(
            "start_year: 2014\nend_year: 2014\nsample:\n  enabled: true\n  fraction: 0.01\n",
        )
        .unwrap();
        assert_eq!(cfg.sample.size_for(4_000_000), 40_000);
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        assert!(load("start_year: 2014\nend_year: 1968\n").is_err());
    }
}
