use colored::Colorize;
use harrow::command_argument_builder;
use harrow::handlers::{handle_categories, handle_scan, init_tracing, print_banner};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    init_tracing(verbose, quiet);

    let result = match chosen_command.subcommand() {
        Some(("scan", primary_command)) => handle_scan(primary_command).await,
        Some(("categories", _)) => handle_categories(),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
