use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("harrow")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("harrow")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Enable debug logging")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Crawl a target, extract its forms and fuzz them with the payload catalog. \
                For authorized testing only.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The seed URL to scan (may also come from --config)"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum crawl depth, the seed being depth 0 (default: 2)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-c --"category" <CATEGORY>)
                        .required(false)
                        .help("Payload categories to run; repeat or comma-separate (default: all, see `harrow categories`)")
                        .value_delimiter(',')
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-p --"payloads" <PATH>)
                        .required(false)
                        .help("JSON payload catalog (default: bundled catalog)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"config" <PATH>)
                        .required(false)
                        .help("TOML configuration file; command-line flags take precedence")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-t --"threads" <CONCURRENCY>)
                        .required(false)
                        .help("Maximum number of simultaneous fuzz requests (default: 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds (default: 10)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"delay" <MILLIS>)
                        .required(false)
                        .help("Pause after every fuzz request, in milliseconds (default: 200)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"progress")
                        .required(false)
                        .help("Show crawl and fuzz progress bars")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(command!("categories").about("List payload categories and bundled payload counts"))
}
