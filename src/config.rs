use anyhow::Context;
use serde::Deserialize;
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub encoder_path: PathBuf,
    pub scaler_path: PathBuf,
    pub model_path: PathBuf,
    pub port: u16,
    pub log_predictions: bool,
}

/// JSON config file. Same settings as the environment; unset artifact paths
/// resolve against `artifact_dir`.
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    artifact_dir: Option<PathBuf>,
    encoder_path: Option<PathBuf>,
    scaler_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    port: Option<u16>,
    log_predictions: Option<bool>,
}

impl ConfigFile {
    fn read(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid config JSON in {}", path.display()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(ConfigFile::default(), |_| None)
    }
}

impl Config {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::resolve(ConfigFile::read(path)?, |_| None))
    }

    /// `CONFIG_PATH` names an optional JSON file. `ARTIFACT_DIR`,
    /// `ENCODER_PATH`, `SCALER_PATH`, `MODEL_PATH`, `PORT` and `LOG_PRED`
    /// override whatever the file sets.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let file = match get("CONFIG_PATH") {
            Some(path) => ConfigFile::read(Path::new(&path))?,
            None => ConfigFile::default(),
        };
        Ok(Self::resolve(file, get))
    }

    fn resolve(file: ConfigFile, get: impl Fn(&str) -> Option<String>) -> Self {
        let dir = get("ARTIFACT_DIR")
            .map(PathBuf::from)
            .or(file.artifact_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR));
        let path = |key: &str, from_file: Option<PathBuf>, name: &str| {
            get(key)
                .map(PathBuf::from)
                .or(from_file)
                .unwrap_or_else(|| dir.join(name))
        };

        Self {
            encoder_path: path("ENCODER_PATH", file.encoder_path, "encoder.json"),
            scaler_path: path("SCALER_PATH", file.scaler_path, "scaler.json"),
            model_path: path("MODEL_PATH", file.model_path, "classifier.json"),
            port: get("PORT")
                .and_then(|s| s.parse().ok())
                .or(file.port)
                .unwrap_or(DEFAULT_PORT),
            log_predictions: get("LOG_PRED")
                .map(|v| v == "1")
                .or(file.log_predictions)
                .unwrap_or(false),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
