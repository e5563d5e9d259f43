//! Configuration module.
//!
//! The configuration is read from a TOML file and then decorated with the command line
//! arguments, which take precedence. Every key is optional:
//!
//! ```toml
//! model_path = "saved_model.json"
//! bind_address = "0.0.0.0:5000"
//! max_upload_size = 104857600
//! upload_dir = "/var/tmp/apk-checker"
//! ```

use crate::error::ErrorKind;
use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::Deserialize;
use std::{
    fs,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

/// Default port of the HTTP service.
pub const DEFAULT_PORT: u16 = 5000;
/// Default maximum size of uploaded packages, 100 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;
/// Default location of the classifier model.
pub const DEFAULT_MODEL_PATH: &str = "saved_model.json";

/// Configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    model_path: PathBuf,
    bind_address: SocketAddr,
    max_upload_size: usize,
    upload_dir: Option<PathBuf>,
    #[serde(skip)]
    loaded_files: Vec<PathBuf>,
}

impl Config {
    /// Loads the configuration from the given TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let toml = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let mut config = Self::from_toml_str(&toml)
            .with_context(|| format!("invalid configuration file {}", path.display()))?;
        config.loaded_files.push(path.to_path_buf());
        Ok(config)
    }

    /// Loads the configuration from a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml).map_err(|e| ErrorKind::config(e.to_string()))?;
        if config.max_upload_size == 0 {
            return Err(ErrorKind::config("`max_upload_size` must be greater than 0").into());
        }
        Ok(config)
    }

    /// Overrides the configuration with the command line arguments that were given.
    pub fn decorate_with_cli(&mut self, cli: &ArgMatches) -> Result<()> {
        if let Some(model) = cli
            .try_get_one::<PathBuf>("model")
            .map_err(|e| ErrorKind::config(e.to_string()))?
        {
            self.model_path = model.clone();
        }

        // Only the `serve` command has a bind address.
        if let Ok(Some(bind)) = cli.try_get_one::<SocketAddr>("bind") {
            self.bind_address = *bind;
        }

        Ok(())
    }

    /// Gets the path of the classifier model.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Gets the address the HTTP service listens on.
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Gets the maximum accepted size of an uploaded package, in bytes.
    pub fn max_upload_size(&self) -> usize {
        self.max_upload_size
    }

    /// Gets the directory uploads are stored in, if not the system one.
    pub fn upload_dir(&self) -> Option<&Path> {
        self.upload_dir.as_deref()
    }

    /// Gets the configuration files this configuration was read from.
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded_files
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            upload_dir: None,
            loaded_files: Vec::new(),
        }
    }
}
