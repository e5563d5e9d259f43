//! APK checker command line tool.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use anyhow::{bail, Context, Result};
use apk_checker_core::{
    analyze_package, classifier, cli::generate_cli, initialize_config, initialize_logger,
    results::{Generator, Json},
    server, FILE_SOURCE,
};
use log::{error, info};
use std::{io, path::PathBuf, process};

/// Exit code when the package could not be analyzed.
const EXIT_ERROR_REPORT: i32 = 1;
/// Exit code on configuration, I/O or server failures.
const EXIT_FAILURE: i32 = 2;

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_FAILURE
        }
    };
    process::exit(code);
}

fn run() -> Result<i32> {
    let cli = generate_cli().get_matches();
    let (command, matches) = cli.subcommand().context("no command given")?;

    initialize_logger(matches.get_flag("verbose"), matches.get_flag("quiet"));
    let config = initialize_config(matches)?;
    let model = classifier::load(config.model_path());

    match command {
        "analyze" => {
            let package = matches
                .get_one::<PathBuf>("package")
                .context("no package given")?;
            let outcome = analyze_package(package, FILE_SOURCE, model.as_deref());

            let mut generator = Json::new();
            if let Some(output) = matches.get_one::<PathBuf>("output") {
                generator.generate_file(&outcome, output)?;
                info!("Report written to {}", output.display());
            } else {
                let stdout = io::stdout();
                generator.generate(&outcome, &mut stdout.lock())?;
            }

            Ok(if outcome.is_error() {
                EXIT_ERROR_REPORT
            } else {
                0
            })
        }
        "serve" => {
            server::serve(&config, model)?;
            Ok(0)
        }
        other => bail!("unknown command `{}`", other),
    }
}
