use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser as _;
use clinote_core::{Parser, ParserConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(clap::Parser)]
#[command(name = "clinote")]
#[command(about = "Extract vitals, labs, allergies and diagnoses from a clinical note")]
struct Cli {
    /// Note file to parse; reads stdin when omitted
    file: Option<PathBuf>,

    /// JSON parser configuration overriding the built-in patterns
    #[arg(long)]
    config: Option<PathBuf>,

    /// Include the per-field strategy trace
    #[arg(long)]
    trace: bool,

    /// Print compact JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinote_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let parser = match &cli.config {
        Some(path) => {
            let config = ParserConfig::from_path(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            Parser::with_config(config)?
        }
        None => Parser::new(),
    };

    let text = match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading stdin")?;
            buffer
        }
    };

    let json = if cli.trace {
        let report = parser.parse_with_trace(&text)?;
        render(&report, cli.compact)?
    } else {
        let result = parser.parse(&text)?;
        render(&result, cli.compact)?
    };
    println!("{}", json);

    Ok(())
}

fn render<T: serde::Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}
