use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use newsagg::config::{CacheBackend, Config};
use newsagg::state::AppState;
use newsagg::storage::Stores;
use newsagg::telemetry::{self, LogFormat};
use newsagg_core::cache::KeyParams;
use newsagg_core::news::{Article, ArticleUpdate, Byline};
use newsagg_core::storage::Pagination;

/// newsagg - inspect and invalidate the news aggregator's entity cache
#[derive(Parser, Debug)]
#[command(name = "newsagg")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Cache backend: memory:// or redis://host:port
    #[arg(long, global = true, env = "CACHE_URL")]
    cache_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value cached under a key
    Show { key: String },
    /// Drop the cached values of one entity
    ///
    /// Without parameters the whole family is dropped
    /// (`{type}:{identity}` and `{type}:{identity}:*`); with parameters,
    /// only the exact key they build.
    Invalidate {
        entity_type: String,
        identity: String,
        /// Key parameter, e.g. `--param page=2 --param limit=10`
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Delete every key matching a glob pattern (only `*` is supported)
    Sweep { pattern: String },
    /// Run a read/update/read cycle against in-memory collections
    Demo,
}

impl Command {
    /// Whether the command reads or drops state written by other
    /// processes, which an in-process cache never holds.
    fn needs_shared_cache(&self) -> bool {
        !matches!(self, Self::Demo)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(LogFormat::from_env());

    let mut config = Config::from_env();
    if let Some(url) = cli.cache_url {
        config.cache_url = url;
    }
    check_backend(&cli.command, &config)?;

    let state = AppState::new(&config, Stores::in_memory()).await?;
    let outcome = run(cli.command, &state).await;
    state.shutdown().await;
    outcome
}

/// Rejects inspection commands against the memory backend: it starts
/// empty in every process, so they could only ever report misses.
fn check_backend(command: &Command, config: &Config) -> Result<()> {
    let backend = config.cache_backend()?;
    if command.needs_shared_cache() && matches!(backend, CacheBackend::Memory) {
        bail!("This command needs a shared cache, set CACHE_URL to redis://host:port");
    }
    Ok(())
}

async fn run(command: Command, state: &AppState) -> Result<()> {
    match command {
        Command::Show { key } => show(state, &key).await,
        Command::Invalidate {
            entity_type,
            identity,
            params,
        } => invalidate(state, &entity_type, &identity, params).await,
        Command::Sweep { pattern } => {
            let deleted = state
                .coordinator
                .sweep(&pattern)
                .await
                .with_context(|| format!("Failed to sweep {pattern}"))?;
            println!("{deleted} keys deleted");
            Ok(())
        }
        Command::Demo => demo(state).await,
    }
}

async fn show(state: &AppState, key: &str) -> Result<()> {
    let value = state
        .coordinator
        .cache()
        .get(key)
        .await
        .with_context(|| format!("Failed to read {key}"))?;

    match value {
        Some(bytes) => match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{}", String::from_utf8_lossy(&bytes)),
        },
        None => println!("(miss)"),
    }
    Ok(())
}

async fn invalidate(
    state: &AppState,
    entity_type: &str,
    identity: &str,
    params: Vec<(String, String)>,
) -> Result<()> {
    let params: KeyParams = params.into_iter().collect();
    let Some(descriptor) = state.descriptors.resolve(entity_type, &params) else {
        bail!("Unknown entity type `{entity_type}`");
    };

    let exact = (!params.is_empty()).then_some(&params);
    state
        .coordinator
        .invalidate(&descriptor, identity, exact)
        .await;

    match exact {
        Some(params) => println!("invalidated {}", descriptor.key(identity, params)),
        None => println!(
            "invalidated {} and {}",
            descriptor.base_key(identity),
            descriptor.base_key(identity).children_pattern()
        ),
    }
    Ok(())
}

async fn demo(state: &AppState) -> Result<()> {
    let article = state
        .articles
        .create(
            Article::new(
                "Old",
                "https://news.example/old",
                chrono::Utc::now(),
            )
            .with_source(Byline::new("Demo Wire"))
            .with_tags(["rust", "cache"]),
        )
        .await?;
    let Some(id) = article.id.clone() else {
        bail!("Store returned an article without id");
    };

    let first = state.articles.get(&id).await?;
    println!("get {id}: {:?}", first.source());
    let second = state.articles.get(&id).await?;
    println!("get {id}: {:?}", second.source());

    state.articles.update(&id, ArticleUpdate::title("New")).await?;
    let third = state.articles.get(&id).await?;
    println!(
        "get {id} after update: {:?} title={:?}",
        third.source(),
        third.into_option().map(|a| a.title)
    );

    let latest = state.articles.latest(Pagination::default()).await?;
    println!("latest page 1: {:?}", latest.source());
    let tags = state.dashboard.tags().await?;
    println!("tags: {:?}", tags.into_option().unwrap_or_default());
    Ok(())
}

/// Parses `name=value`.
fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got `{raw}`")),
    }
}
