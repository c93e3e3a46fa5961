use crate::checks::CheckSettings;
use crate::level::CheckLevel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct ItxnCheckConfig {
    #[serde(default)]
    pub checks: ChecksConfig,

    #[serde(default)]
    pub effects: EffectsConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChecksConfig {
    /// Advisory checks to switch off entirely.
    #[serde(default)]
    pub disabled: Vec<String>,

    #[serde(flatten)]
    pub levels: HashMap<String, CheckLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EffectsConfig {
    /// Whether calls to routines defined outside the program may submit.
    #[serde(default = "default_unknown_calls_may_submit")]
    pub unknown_calls_may_submit: bool,

    /// Pinned may-submit facts, keyed by routine name.
    #[serde(default)]
    pub may_submit: BTreeMap<String, bool>,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            unknown_calls_may_submit: default_unknown_calls_may_submit(),
            may_submit: BTreeMap::new(),
        }
    }
}

fn default_unknown_calls_may_submit() -> bool {
    true
}

impl ItxnCheckConfig {
    /// Check settings described by the `[checks]` table.
    pub fn settings(&self) -> Result<CheckSettings> {
        let settings = CheckSettings::default()
            .with_config_levels(self.checks.levels.clone())
            .and_then(|s| s.disable(self.checks.disabled.clone()))
            .context("invalid [checks] configuration")?;
        Ok(settings)
    }
}

pub const DEFAULT_CONFIG_FILE_NAME: &str = "itxn-check.toml";

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut cur = Some(start_dir);
    while let Some(dir) = cur {
        let candidate = dir.join(DEFAULT_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        cur = dir.parent();
    }
    None
}

pub fn load_config_file(path: &Path) -> Result<ItxnCheckConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let cfg: ItxnCheckConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(cfg)
}

pub fn load_config(
    explicit_path: Option<&Path>,
    start_dir: &Path,
) -> Result<Option<(PathBuf, ItxnCheckConfig)>> {
    if let Some(p) = explicit_path {
        let cfg = load_config_file(p)?;
        return Ok(Some((p.to_path_buf(), cfg)));
    }

    let Some(p) = find_config_file(start_dir) else {
        return Ok(None);
    };
    let cfg = load_config_file(&p)?;
    Ok(Some((p, cfg)))
}
