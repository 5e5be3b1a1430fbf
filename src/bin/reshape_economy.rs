use anyhow::{Context, Result};
use clap::Parser;
use cityenrich::store::{reshape::keyed_to_array, write_json};
use serde_json::Value;
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Turn a country-keyed JSON object into an array of records.
#[derive(Parser, Debug)]
#[command(name = "reshape_economy", version, about)]
struct Cli {
    /// JSON object keyed by country code.
    input: PathBuf,

    /// Where to write the array.
    output: PathBuf,

    /// Field each key is written to.
    #[arg(long, default_value = "country")]
    key_field: String,

    /// Field each keyed value is written to.
    #[arg(long, default_value = "gdp_per_capita")]
    series_field: String,

    #[arg(long, default_value_t = 2)]
    indent: usize,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();

    let text = fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let doc: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", cli.input.display()))?;

    let rows = keyed_to_array(doc, &cli.key_field, &cli.series_field)
        .with_context(|| format!("reshaping {}", cli.input.display()))?;
    let count = rows.as_array().map_or(0, Vec::len);

    write_json(&cli.output, &rows, cli.indent)?;

    info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        records = count,
        "reshaped"
    );
    Ok(())
}
