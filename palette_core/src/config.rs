use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::identity::DEFAULT_TOKEN_TTL_HOURS;
use crate::picker::PickerGeometry;

pub const CONFIG_ENV: &str = "PALETTE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "palette.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `palettes.json` and `accounts.json` live.
    pub data_dir: PathBuf,
    pub bind_addr: String,
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set.
    pub log_filter: String,
    /// Lifetime of a server bearer token.
    pub session_ttl_hours: i64,
    pub rating: RatingConfig,
    pub picker: PickerGeometry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bind_addr: "127.0.0.1:3000".to_string(),
            log_filter: "info".to_string(),
            session_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            rating: RatingConfig::default(),
            picker: PickerGeometry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Usually supplied through `PALETTE_RATING_API_KEY` rather than the file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-5-sonnet-20240620".to_string(),
            max_tokens: 15,
            api_key: None,
        }
    }
}

impl Config {
    pub fn palettes_path(&self) -> PathBuf {
        self.data_dir.join("palettes.json")
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("parse config toml")
    }

    /// Load configuration:
    /// 1) `path`, else `$PALETTE_CONFIG`, else `./palette.toml` if present, else defaults
    /// 2) environment overrides on top
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut cfg = match explicit {
            Some(p) => Self::read_file(&p)?,
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::read_file(local)?
                } else {
                    Self::default()
                }
            }
        };

        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("PALETTE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("PALETTE_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = var("PALETTE_RATING_API_KEY") {
            self.rating.api_key = Some(v);
        }
    }
}
