use std::{collections::HashMap, path::PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = ".repofetch.toml";

pub struct RepofetchConfig {
    pub git_program: String,
    pub capture_output: bool,
}

impl RepofetchConfig {
    pub fn load() -> anyhow::Result<Self> {
        let file = home::home_dir().map(|home| home.join(CONFIG_FILE_NAME));
        let raw_config = RawConfig::load(file, None)?;

        Ok(Self {
            git_program: raw_config.git.program.unwrap_or_else(|| "git".to_owned()),
            capture_output: raw_config.fetch.capture.unwrap_or(true),
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    git: GitConfig,
    #[serde(default)]
    fetch: FetchConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GitConfig {
    program: Option<String>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct FetchConfig {
    capture: Option<bool>,
}

impl RawConfig {
    fn load(
        file: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("REPOFETCH")
                    .separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
