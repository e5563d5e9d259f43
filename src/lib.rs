//! APK checker
//!
//! Static checker for Android banking applications. It reads an APK without executing it,
//! extracts the requested permissions and the signing certificates, and asks a pre-trained
//! classifier whether the package is a legitimate banking application or a fake one. The
//! result is a JSON report, served over HTTP or printed by the command line tool.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, unused_import_braces)]

pub mod apk;
pub mod classifier;
pub mod cli;
pub mod config;
mod error;
pub mod results;
pub mod server;
pub mod static_analysis;
mod utils;

use crate::{
    apk::ApkFile,
    classifier::Classifier,
    results::{AnalysisReport, FingerPrint},
    static_analysis::{certificate, features, manifest},
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use env_logger::{fmt::Formatter, Builder};
use log::{debug, warn, Level, LevelFilter, Record};
use std::{env, io::Write, path::Path};

pub use crate::{
    config::Config,
    error::ErrorKind,
    results::AnalysisOutcome,
    utils::{get_file_name, has_apk_extension, sanitize_file_name},
};

/// Source tag of packages analyzed from the command line.
pub const FILE_SOURCE: &str = "file";
/// Source tag of packages uploaded to the HTTP service.
pub const UPLOAD_SOURCE: &str = "upload";

/// Initialize the config with the config files and command line options.
///
/// The local `config.toml` file is used if it exists. Otherwise, on UNIX, the global one
/// (`/etc/apk-checker/config.toml`) is used if it exists. If no file is found, the default
/// configuration is used.
pub fn initialize_config(cli: &ArgMatches) -> Result<Config> {
    let config_path = Path::new("config.toml");
    let global_config_path = Path::new("/etc/apk-checker/config.toml");

    let mut config = if config_path.exists() {
        Config::from_file(config_path)
            .context("there was an error when reading the config.toml file")?
    } else if cfg!(target_family = "unix") && global_config_path.exists() {
        Config::from_file(global_config_path).context(
            "there was an error when reading the /etc/apk-checker/config.toml file",
        )?
    } else {
        warn!("Config file not found. Using default configuration");
        Config::default()
    };

    config
        .decorate_with_cli(cli)
        .context("there was an error reading config from CLI")?;

    for file in config.loaded_files() {
        debug!("Configuration loaded from {}", file.display());
    }

    Ok(config)
}

/// Analyzes the given package.
///
/// Only a package that cannot be parsed yields an error outcome. Failures of the classifier or
/// of the certificate decoding are recorded in their own report fields.
pub fn analyze_package<P: AsRef<Path>>(
    package: P,
    source: &str,
    classifier: Option<&dyn Classifier>,
) -> AnalysisOutcome {
    let package = package.as_ref();
    let apk_name = get_file_name(package);
    debug!("Starting analysis of {}", apk_name);

    let apk = match ApkFile::open(package) {
        Ok(apk) => apk,
        Err(e) => {
            warn!("Could not parse {}: {:#}", apk_name, e);
            return AnalysisOutcome::error(format!("Failed to parse package: {:#}", e));
        }
    };
    debug!(
        "Package {} version {} requests {} permissions",
        apk.package(),
        apk.version_name(),
        apk.permissions().len()
    );

    let vector = features::vectorize(apk.permissions());
    let (verdict, confidence, risk_score) = classifier::assess(classifier, &vector).into_parts();

    let certificates = certificate::extract(&apk);
    let failed = certificates.iter().filter(|c| !c.is_parsed()).count();
    if failed > 0 {
        warn!("{} of {} certificates could not be decoded", failed, certificates.len());
    }

    let fingerprint = match FingerPrint::new(package) {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            warn!("Could not fingerprint {}: {:#}", apk_name, e);
            return AnalysisOutcome::error(format!("Failed to read package: {:#}", e));
        }
    };

    debug!("Analysis of {} finished: {}", apk_name, verdict);
    AnalysisReport {
        source: source.to_owned(),
        apk_name,
        sha256: fingerprint.sha256_hex(),
        size_bytes: fingerprint.size(),
        package_name: apk.package().to_owned(),
        version_name: apk.version_name().to_owned(),
        version_code: apk.version_code().map(str::to_owned),
        permissions: apk.permissions().iter().cloned().collect(),
        dangerous_permissions: manifest::platform_permissions(apk.permissions()),
        certificates,
        verdict,
        confidence,
        risk_score,
    }
    .into()
}

/// Initializes the logger.
///
/// `RUST_LOG` takes precedence over the verbosity flags.
pub fn initialize_logger(verbose: bool, quiet: bool) {
    let format = |buf: &mut Formatter, record: &Record<'_>| match record.level() {
        Level::Warn => writeln!(
            buf,
            "{}{}",
            "Warning: ".bold().yellow(),
            record.args().to_string().yellow()
        ),
        Level::Error => writeln!(
            buf,
            "{}{}",
            "Error: ".bold().red(),
            record.args().to_string().red()
        ),
        Level::Debug => writeln!(buf, "{}{}", "Debug: ".bold(), record.args().to_string().bold()),
        Level::Info => writeln!(buf, "{}", record.args()),
        Level::Trace => writeln!(buf, "{}: {}", record.level(), record.args()),
    };

    let log_level = if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    let _ = builder.format(format);

    if let Ok(env_log) = env::var("RUST_LOG") {
        let _ = builder.parse_filters(&env_log);
    } else {
        let _ = builder
            .filter(Some("apk_checker_core"), log_level)
            .filter(Some("apk_checker"), log_level);
    }

    if let Err(e) = builder.try_init() {
        eprintln!("Could not initialize logger: {}", e);
    }
}
