use std::fs;
use std::io::{self, Write};
use std::process;
use std::str::FromStr;

use clap::Parser;
use tokio::task::LocalSet;

use linklens::core::{annotate_document, print_error_message, print_info_message, LinkLensOptions};
use linklens::env::{core::LogLevel, generate_env_docs, EnvVar};
use linklens::resolution::ConfigManager;

#[derive(Parser, Debug)]
#[command(
    name = "linklens",
    version,
    about = "Replace raw URL link text with the titles of the pages they point to"
)]
struct Cli {
    /// URL or path of the HTML document to annotate
    target: Option<String>,

    /// Write output to <FILE>, use - for STDOUT
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<String>,

    /// Link resolution API endpoint
    #[arg(short = 'a', long, value_name = "URL")]
    api_url: Option<String>,

    /// Settings file (TOML or JSON)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Treat the document as if it was served from <URL>
    #[arg(short = 'b', long, value_name = "URL")]
    base_url: Option<String>,

    /// Input encoding when the document does not declare one
    #[arg(short = 'E', long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// Timeout in seconds for fetching the document, 0 disables it
    #[arg(short = 't', long, default_value_t = 60)]
    timeout: u64,

    /// User agent for outgoing requests
    #[arg(short = 'u', long, value_name = "AGENT")]
    user_agent: Option<String>,

    /// Suppress informational output
    #[arg(short = 's', long)]
    silent: bool,

    /// Quiet window before a batch is sent, in milliseconds
    #[arg(long, value_name = "MS")]
    quiet_window: Option<u64>,

    /// Maximum wait for the host to go idle, in milliseconds
    #[arg(long, value_name = "MS")]
    idle_timeout: Option<u64>,

    /// Print environment variable documentation and exit
    #[arg(long)]
    env_docs: bool,

    /// Write a settings file with default values to <FILE> and exit
    #[arg(long, value_name = "FILE")]
    init_config: Option<String>,
}

fn init_logging(silent: bool) {
    let level = if silent {
        tracing::Level::ERROR
    } else {
        let name = LogLevel::get().unwrap_or_else(|e| {
            print_error_message(&e.to_string());
            "info".to_string()
        });
        tracing::Level::from_str(&name).unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    if cli.env_docs {
        print!("{}", generate_env_docs());
        return;
    }

    if let Some(path) = &cli.init_config {
        match ConfigManager::generate_example_settings(path) {
            Ok(()) => {
                print_info_message(&format!("Settings written to {}", path));
                return;
            }
            Err(e) => {
                print_error_message(&e.to_string());
                process::exit(1);
            }
        }
    }

    let Some(target) = cli.target.clone() else {
        print_error_message("No target specified");
        process::exit(1);
    };

    init_logging(cli.silent);

    let options = LinkLensOptions {
        api_url: cli.api_url.clone(),
        base_url: cli.base_url.clone(),
        config_path: cli.config.clone(),
        encoding: cli.encoding.clone(),
        silent: cli.silent,
        timeout: cli.timeout,
        user_agent: cli.user_agent.clone(),
        quiet_window_ms: cli.quiet_window,
        idle_timeout_ms: cli.idle_timeout,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            print_error_message(&format!("Failed to start runtime: {e}"));
            process::exit(1);
        }
    };

    let local = LocalSet::new();
    let result = local.block_on(&runtime, annotate_document(&target, &options));

    let document = match result {
        Ok(document) => document,
        Err(e) => {
            print_error_message(&format!("Error: {e}"));
            process::exit(1);
        }
    };

    let written = match cli.output.as_deref() {
        None | Some("-") => io::stdout()
            .write_all(&document.data)
            .and_then(|_| io::stdout().flush()),
        Some(path) => fs::write(path, &document.data),
    };

    if let Err(e) = written {
        print_error_message(&format!("Failed to write output: {e}"));
        process::exit(1);
    }
}
