use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use trellis::client::{ApiClient, ClientRecord, HttpTransport, Loaded};
use trellis::config::Config;
use trellis::graph::ResourceGraph;
use trellis::routes::synthesize;

/// Declarative REST resource graphs
#[derive(Parser, Debug)]
#[command(name = "trellis", version = trellis::VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the route table synthesized from a graph
    Routes {
        /// Graph file (JSON or YAML); defaults to the embedded sample
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a graph file
    Check {
        #[arg(short, long)]
        graph: Option<PathBuf>,
    },

    /// Fetch records from a running server through the client proxy
    Fetch {
        /// Resource name, e.g. `post`
        resource: String,

        /// Member key; omit to list the collection
        id: Option<String>,

        /// Association or remote to resolve from the fetched member
        #[arg(short, long, requires = "id")]
        association: Option<String>,

        /// Scope filter as `name=value`; repeatable
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Value)>,

        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Server base URL
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("trellis started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("trellis").join("trellis.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".trellis").join("trellis.log");
    }
    PathBuf::from("trellis.log")
}

/// `name=value`; the value is read as JSON when it parses, else as a string
fn parse_filter(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    if name.is_empty() {
        return Err(format!("missing filter name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn load_graph(config: &Config, cli: Option<&Path>) -> Result<ResourceGraph> {
    match config.effective_graph(cli) {
        Some(path) => ResourceGraph::load(&path),
        None => ResourceGraph::sample().context("Embedded sample graph is invalid"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;
    let config = Config::load();

    match args.command {
        Command::Routes { graph, json } => {
            let graph = load_graph(&config, graph.as_deref())?;
            let table = synthesize(&graph)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                print!("{}", table.render());
            }
        },
        Command::Check { graph } => {
            let graph = load_graph(&config, graph.as_deref())?;
            let table = synthesize(&graph)?;
            println!("ok: {} resources, {} routes", graph.len(), table.len());
        },
        Command::Fetch {
            resource,
            id,
            association,
            filters,
            graph,
            base_url,
        } => {
            let graph = load_graph(&config, graph.as_deref())?;
            let base_url = config
                .effective_base_url(base_url.as_deref())
                .context("No server configured. Use --base-url or set base_url in the config file")?;
            let client = ApiClient::new(graph, HttpTransport::new(&base_url)?);

            let output = fetch(&client, &resource, id, association, filters).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        },
    }

    Ok(())
}

async fn fetch(
    client: &ApiClient<HttpTransport>,
    resource: &str,
    id: Option<String>,
    association: Option<String>,
    filters: Vec<(String, Value)>,
) -> Result<Value> {
    let query = filters
        .into_iter()
        .fold(client.resource(resource)?, |q, (name, value)| q.filter(&name, value));

    let Some(id) = id else {
        let collection = query.all().await?;
        tracing::info!("fetched {} of {} {}", collection.records.len(), collection.total, resource);
        return Ok(records_json(&collection.records));
    };

    let record = query.find(id).await?;
    match association {
        Some(name) => Ok(match record.association(&name).await? {
            Loaded::One(one) => one.map(|r| record_json(&r)).unwrap_or(Value::Null),
            Loaded::Many(many) => records_json(&many),
        }),
        None => Ok(record_json(&record)),
    }
}

fn record_json(record: &ClientRecord<HttpTransport>) -> Value {
    Value::Object(record.attributes().clone())
}

fn records_json(records: &[Arc<ClientRecord<HttpTransport>>]) -> Value {
    Value::Array(records.iter().map(|r| record_json(r)).collect())
}
