use clap::{
    crate_description, crate_name, crate_version, value_parser, Arg, ArgAction, Command,
};
use std::{net::SocketAddr, path::PathBuf};

/// Generates the command line interface.
pub fn generate_cli() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .conflicts_with("quiet")
                .help("If you'd like the checker to be verbose in order to explain its steps"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("If you'd like a quiet output, only showing warnings and errors"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .global(true)
                .help("Path of the classifier model, overriding the configuration"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Analyzes an APK file and prints its JSON report")
                .arg(
                    Arg::new("package")
                        .value_name("APK")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("The APK file to analyze"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Writes the report to the given file instead of the standard output"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Runs the HTTP analysis service")
                .arg(
                    Arg::new("bind")
                        .short('b')
                        .long("bind")
                        .value_name("ADDR")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Address to listen on, overriding the configuration"),
                ),
        )
}
