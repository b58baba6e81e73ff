use clap::{Parser, Subcommand};
use estatequery::cli::{self as prog_cli, Command, DEFAULT_COLLECTION};
use estatequery::config::{ConfigOverrides, QueryConfig};
use estatequery::engine::Engine;
use estatequery::logger;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "estatequery", version, about = "Listing search and pagination over an embedded document store", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path to a config file (TOML). Falls back to $ESTATEQUERY_CONFIG, then ./estatequery.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory for app.log / metrics.log; logging is off when neither this nor $ESTATEQUERY_LOG_DIR is set")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Upper bound for the page size")]
    max_limit: Option<u64>,
    #[arg(long, global = true, help = "Page size used when the request has none")]
    default_limit: Option<u64>,
    #[arg(long, global = true, help = "Route searchTerm to weighted full-text search")]
    text_search: Option<bool>,
    #[arg(long, global = true, help = "Field holding listing coordinates; enables lat/lng/radius")]
    geo_field: Option<String>,
    #[arg(long, global = true, help = "Append one line per query to this file")]
    query_log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Load listings from an NDJSON/JSON file and print one page of search results")]
    Search {
        #[arg(help = "Input file (NDJSON or JSON array)")]
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_COLLECTION)]
        collection: String,
        #[arg(long = "param", short = 'p', help = "Search parameter as key=value; repeatable (e.g. -p city=London -p amenities=pool)")]
        params: Vec<String>,
        #[arg(long, conflicts_with = "params", help = "Search parameters as a JSON object")]
        json: Option<String>,
    },
    #[command(about = "Print the predicate, sort and pagination a parameter set compiles to")]
    Explain {
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
        #[arg(long, conflicts_with = "params")]
        json: Option<String>,
    },
    #[command(about = "Load a file and count records matching a JSON predicate")]
    Count {
        file: PathBuf,
        #[arg(help = "Predicate as JSON, e.g. '{\"price\": {\"$lte\": 500000}}'")]
        filter: String,
        #[arg(long, default_value = DEFAULT_COLLECTION)]
        collection: String,
    },
    #[command(about = "Print query counters")]
    Metrics,
}

fn init_logging(cli: &Cli) {
    let res = match &cli.log_dir {
        Some(dir) => logger::configure_logging(Some(dir), cli.log_level.as_deref(), None),
        None if std::env::var_os("ESTATEQUERY_LOG_DIR").is_some() => logger::configure_from_env(),
        None => Ok(()),
    };
    if let Err(e) = res {
        eprintln!("warning: {e}");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let overrides = ConfigOverrides {
        max_limit: cli.max_limit,
        default_limit: cli.default_limit,
        text_search: cli.text_search,
        geo_field: cli.geo_field.clone(),
        slow_query_ms: None,
        query_log: cli.query_log.clone(),
    };
    let cfg = match QueryConfig::load(cli.config.as_deref(), &overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    cfg.install_telemetry();

    let cmd = match cli.command {
        Commands::Search { file, collection, params, json } => {
            prog_cli::params_from_args(&params, json.as_deref()).map(|params| Command::Search { file, collection, params })
        }
        Commands::Explain { params, json } => {
            prog_cli::params_from_args(&params, json.as_deref()).map(|params| Command::Explain { params })
        }
        Commands::Count { file, filter, collection } => Ok(Command::Count { file, collection, filter_json: filter }),
        Commands::Metrics => Ok(Command::Metrics),
    };
    let engine = Arc::new(Engine::new());
    let mut stdout = std::io::stdout().lock();
    let r = match cmd {
        Ok(cmd) => prog_cli::run(engine, &cfg, cmd, &mut stdout).await,
        Err(e) => Err(e),
    };
    if let Err(e) = r {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
