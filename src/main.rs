use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cityenrich::{
    config::{Config, Overrides},
    fetch::{
        build_client, openweather::AirPollutionClient, rest_countries::RestCountriesClient,
        world_bank::{Indicator, WorldBankClient},
    },
    pipeline::{self, AirQualityEnricher, CountryEnricher, Enricher, IndicatorEnricher, Outcome},
    store::{reshape::keyed_by, write_json, RecordStore},
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Enrich a JSON file of city/country records with data from public APIs.
#[derive(Parser, Debug)]
#[command(name = "cityenrich", version, about)]
struct Cli {
    /// YAML config file; flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON array of records to enrich.
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Where to write the result (defaults to the input file).
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[arg(long, global = true)]
    start_year: Option<i32>,

    #[arg(long, global = true)]
    end_year: Option<i32>,

    /// Per-request timeout in seconds.
    #[arg(long = "timeout", global = true)]
    timeout_secs: Option<u64>,

    /// Spaces per indentation level in the written JSON.
    #[arg(long, global = true)]
    indent: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monthly mean pollutant concentration into `monthly_weather`.
    AirQuality(AirQualityArgs),
    /// GDP per capita (current US$) per year.
    Gdp(GdpArgs),
    /// Total population per year.
    Population(PopulationArgs),
    /// Common country name and ISO3 code.
    Country(KeyArgs),
}

#[derive(Args, Debug)]
struct AirQualityArgs {
    /// Record field holding the country code; records without one are skipped.
    #[arg(long, default_value = "code")]
    id_field: String,

    /// Calendar year to aggregate (defaults to the end year).
    #[arg(long)]
    year: Option<i32>,

    /// Pollution component, e.g. pm2_5, pm10, no2.
    #[arg(long)]
    pollutant: Option<String>,

    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Record field holding the country code.
    #[arg(long, default_value = "code")]
    id_field: String,
}

#[derive(Args, Debug)]
struct GdpArgs {
    /// Record field holding the country code.
    #[arg(long, default_value = "code")]
    id_field: String,

    /// Also write `{code: gdp_per_capita}` here, one entry per country.
    #[arg(long)]
    economy_output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PopulationArgs {
    /// Record field holding the country code.
    #[arg(long, default_value = "country")]
    id_field: String,
}

fn overrides(cli: &Cli) -> Overrides {
    let mut overrides = Overrides {
        input_path: cli.input.clone(),
        output_path: cli.output.clone(),
        start_year: cli.start_year,
        end_year: cli.end_year,
        timeout_secs: cli.timeout_secs,
        indent: cli.indent,
        ..Overrides::default()
    };
    if let Command::AirQuality(args) = &cli.command {
        overrides.air_quality_year = args.year;
        overrides.pollutant = args.pollutant.clone();
        overrides.api_key = args.api_key.clone();
    }
    overrides
}

/// Defaults, then `--config`, then flags (and `OPENWEATHER_API_KEY`).
fn resolve_config(cli: &Cli) -> Result<Config> {
    let config = Config::load(cli.config.as_deref(), overrides(cli))?;
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) resolve config ───────────────────────────────────────────
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    // ─── 3) build the enricher and run ───────────────────────────────
    let client = build_client(config.timeout())?;
    match &cli.command {
        Command::AirQuality(args) => {
            let api_key = config.require_api_key()?;
            let provider = AirPollutionClient::new(client, &config.openweather_url, api_key)?;
            let year = config.air_quality_year();
            let enricher =
                AirQualityEnricher::new(provider, &args.id_field, year, &config.pollutant)?;
            info!(year, pollutant = %config.pollutant, "air-quality run");
            execute(&config, &enricher).map(drop)
        }
        Command::Gdp(args) => {
            let provider = WorldBankClient::new(client, &config.world_bank_url)?;
            let indicator = Indicator::GdpPerCapita;
            let enricher = IndicatorEnricher::new(
                provider,
                indicator,
                &args.id_field,
                config.start_year,
                config.end_year,
            );
            let store = execute(&config, &enricher)?;

            // ─── 4) optional keyed economy document ──────────────────
            if let Some(path) = &args.economy_output {
                write_economy(&store, &args.id_field, indicator, path, config.indent)?;
            }
            Ok(())
        }
        Command::Population(args) => {
            let provider = WorldBankClient::new(client, &config.world_bank_url)?;
            let enricher = IndicatorEnricher::new(
                provider,
                Indicator::Population,
                &args.id_field,
                config.start_year,
                config.end_year,
            );
            execute(&config, &enricher).map(drop)
        }
        Command::Country(args) => {
            let provider = RestCountriesClient::new(client, &config.rest_countries_url)?;
            execute(&config, &CountryEnricher::new(provider, &args.id_field)).map(drop)
        }
    }
}

fn write_economy(
    store: &RecordStore,
    id_field: &str,
    indicator: Indicator,
    path: &Path,
    indent: usize,
) -> Result<()> {
    let keyed = keyed_by(store.records(), id_field, indicator.record_key());
    let countries = keyed.as_object().map_or(0, |m| m.len());
    write_json(path, &keyed, indent)
        .with_context(|| format!("writing economy document {}", path.display()))?;
    info!(path = %path.display(), countries, "wrote economy document");
    Ok(())
}

fn execute<E: Enricher>(config: &Config, enricher: &E) -> Result<RecordStore> {
    let (store, report) = pipeline::run_keeping(config, enricher)
        .with_context(|| format!("{} pipeline", enricher.name()))?;

    for failure in &report.failed {
        error!(
            index = failure.index,
            key = %failure.key,
            kind = failure.kind,
            "{}",
            failure.message
        );
    }
    info!(
        enricher = enricher.name(),
        total = report.total,
        enriched = report.enriched,
        skipped = report.skipped,
        failed = report.failed.len(),
        periods_written = report.periods_written,
        periods_skipped = report.periods_skipped,
        "done"
    );

    match report.outcome() {
        Outcome::Enriched(_) => Ok(store),
        Outcome::NothingToDo => {
            warn!("input holds no records; nothing to enrich");
            Ok(store)
        }
        Outcome::NoEnrichments => bail!(
            "no record was enriched ({} skipped, {} failed)",
            report.skipped,
            report.failed.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};
    use tempfile::tempdir;

    const KEY_VAR: &str = "OPENWEATHER_API_KEY";

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    // One test owns the process environment so parallel tests cannot race on it.
    #[test]
    fn api_key_precedence() {
        let tmp = tempdir().unwrap();
        let yaml = tmp.path().join("enrich.yaml");
        fs::write(&yaml, "input_path: city.json\napi_key: from-file\n").unwrap();
        let yaml = yaml.to_str().unwrap();

        // file only
        env::remove_var(KEY_VAR);
        let cli = parse(&["cityenrich", "--config", yaml, "air-quality"]);
        assert_eq!(resolve_config(&cli).unwrap().require_api_key().unwrap(), "from-file");

        // environment beats the file
        env::set_var(KEY_VAR, "from-env");
        let cli = parse(&["cityenrich", "--config", yaml, "air-quality"]);
        assert_eq!(resolve_config(&cli).unwrap().require_api_key().unwrap(), "from-env");

        // explicit flag beats the environment
        let cli = parse(&[
            "cityenrich",
            "--config",
            yaml,
            "air-quality",
            "--api-key",
            "from-flag",
        ]);
        assert_eq!(resolve_config(&cli).unwrap().require_api_key().unwrap(), "from-flag");

        // other pipelines ignore the credential entirely
        let cli = parse(&["cityenrich", "--config", yaml, "gdp"]);
        assert_eq!(overrides(&cli).api_key, None);

        env::remove_var(KEY_VAR);
    }

    #[test]
    fn subcommand_defaults() {
        match parse(&["cityenrich", "population"]).command {
            Command::Population(args) => assert_eq!(args.id_field, "country"),
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["cityenrich", "gdp"]).command {
            Command::Gdp(args) => {
                assert_eq!(args.id_field, "code");
                assert_eq!(args.economy_output, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["cityenrich", "country"]).command {
            Command::Country(args) => assert_eq!(args.id_field, "code"),
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["cityenrich", "air-quality", "--api-key", "k"]).command {
            Command::AirQuality(args) => assert_eq!(args.id_field, "code"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_flags_override_yaml_after_subcommand() {
        let tmp = tempdir().unwrap();
        let yaml = tmp.path().join("enrich.yaml");
        fs::write(&yaml, "input_path: city.json\nstart_year: 2010\nend_year: 2020\nindent: 2\n")
            .unwrap();

        let cli = parse(&[
            "cityenrich",
            "--config",
            yaml.to_str().unwrap(),
            "gdp",
            "--start-year",
            "2015",
            "--output",
            "out.json",
            "--economy-output",
            "city_economy.json",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.start_year, 2015);
        assert_eq!(config.end_year, 2020);
        assert_eq!(config.indent, 2);
        assert_eq!(config.output().unwrap(), Path::new("out.json"));
        match cli.command {
            Command::Gdp(args) => {
                assert_eq!(args.economy_output, Some(PathBuf::from("city_economy.json")))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_input_is_rejected_before_any_fetch() {
        let cli = parse(&["cityenrich", "country"]);
        assert!(resolve_config(&cli).is_err());
    }

    #[test]
    fn economy_document_is_keyed_by_code() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("city_economy.json");
        let store = RecordStore::new(
            serde_json::from_value(serde_json::json!([
                { "code": "KR", "gdp_per_capita": { "2019": 31902.4 } },
                { "code": "KR", "gdp_per_capita": { "2019": 1.0 } },
                { "code": "AE", "gdp_per_capita": { "2019": 45376.2 } }
            ]))
            .unwrap(),
        );

        write_economy(&store, "code", Indicator::GdpPerCapita, &path, 4).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\n    \"KR\": {\n        \"2019\": 31902.4\n    },\n    \"AE\": {\n        \"2019\": 45376.2\n    }\n}\n"
        );
    }
}
