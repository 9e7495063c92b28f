use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use harrow_core::config::load_config;
use harrow_core::report::{ReportFormat, render, save_report};
use harrow_core::{Category, PayloadCatalog, ScanConfig, ScanContext, ScanReport};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

pub fn print_banner() {
    println!(
        "{}",
        r#"
  _
 | |__   __ _ _ __ _ __ _____      __
 | '_ \ / _` | '__| '__/ _ \ \ /\ / /
 | | | | (_| | |  | | | (_) \ V  V /
 |_| |_|\__,_|_|  |_|  \___/ \_/\_/
"#
        .bright_red()
    );
    println!(
        "  {} {}\n",
        "crawl-and-fuzz web scanner".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

/// Logs go to stderr so a report on stdout stays clean.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse a target, trying to add http:// if needed
pub fn parse_target(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && url.host_str().is_some()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    match Url::parse(&with_scheme) {
        Ok(url) if url.host_str().is_some() => Some(with_scheme),
        _ => None,
    }
}

pub fn parse_categories<'a>(values: impl IntoIterator<Item = &'a String>) -> Result<Vec<Category>> {
    let mut categories = Vec::new();
    for value in values {
        let category: Category = value.parse()?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    Ok(categories)
}

/// Config file (if any) first, then command-line overrides.
pub fn build_config(args: &ArgMatches) -> Result<ScanConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };

    if let Some(url) = args.get_one::<String>("url") {
        config.target = match parse_target(url) {
            Some(target) => target,
            None => bail!("Invalid target URL '{}'", url),
        };
    }
    if config.target.is_empty() {
        bail!("No target given: pass --url or set [scan] target in the config file");
    }

    if let Some(depth) = args.get_one::<usize>("depth") {
        config.max_depth = *depth;
    }
    if let Some(values) = args.get_many::<String>("category") {
        config.categories = parse_categories(values)?;
    }
    if let Some(path) = args.get_one::<PathBuf>("payloads") {
        config.payloads_path = Some(path.clone());
    }
    if let Some(threads) = args.get_one::<usize>("threads") {
        config.concurrency = *threads;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.request_timeout_secs = *timeout;
    }
    if let Some(delay) = args.get_one::<u64>("delay") {
        config.request_delay_ms = *delay;
    }
    if args.get_flag("progress") {
        config.show_progress_bars = true;
    }

    Ok(config)
}

pub async fn handle_scan(args: &ArgMatches) -> Result<()> {
    let quiet = args.get_flag("quiet");
    let config = build_config(args)?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    if !quiet {
        print_scan_header(&config);
    }

    let ctx = ScanContext::new(config).context("Invalid scan configuration")?;
    let report = ctx.run().await;

    let rendered = render(&report, format).context("Failed to render report")?;
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => print!("{}", rendered),
    }

    if !quiet {
        print_summary(&report);
    }
    Ok(())
}

pub fn handle_categories() -> Result<()> {
    let catalog = PayloadCatalog::bundled()?;
    println!("{}", "PAYLOAD CATEGORIES".bright_blue().bold());
    for category in Category::ALL {
        println!(
            "  {:<20} {:<32} {}",
            category.as_str().bright_white(),
            category.display_name(),
            format!("{} payloads", catalog.payloads(category).len()).dimmed()
        );
    }
    Ok(())
}

fn print_scan_header(config: &ScanConfig) {
    eprintln!("{} Target: {}", "→".blue(), config.target.bright_white());
    eprintln!(
        "{} Max depth: {}  Workers: {}  Timeout: {}s",
        "→".blue(),
        config.max_depth,
        config.concurrency,
        config.request_timeout_secs
    );
    eprintln!(
        "{} Categories: {}",
        "→".blue(),
        config
            .categories
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!();
}

fn print_summary(report: &ScanReport) {
    eprintln!();
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
    eprintln!(
        "{} {} URLs crawled, {} forms, {} attempts",
        "✓".green().bold(),
        report.crawled_urls.len(),
        report.form_count(),
        report.attempts.len()
    );
    if let Some(ref reason) = report.fuzzing_aborted {
        eprintln!("{} Fuzzing aborted: {}", "✗".red().bold(), reason);
    }
    if report.vulnerabilities.is_empty() {
        eprintln!("{} No vulnerabilities detected", "✓".green().bold());
    } else {
        eprintln!(
            "{} {} vulnerabilities detected",
            "⚠".yellow().bold(),
            report.vulnerabilities.len().to_string().red().bold()
        );
        for (label, count) in report.vulnerability_counts() {
            eprintln!("  {} {:<36} {}", "•".yellow(), label, count);
        }
    }
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}
