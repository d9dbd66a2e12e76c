use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use newsdesk_api::TokenSigner;
use newsdesk_core::config::{AppConfig, DEFAULT_CONFIG_FILE};
use newsdesk_core::schema::NewArticle;
use newsdesk_core::{ReliabilityLedger, Store, VerdictPipeline, articles, oracle};
use schemars::schema_for;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(about = "Newsroom backend with fact-check verdicts and source reliability", long_about = None)]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,
    /// Export canonical JSON Schemas to the ./schemas directory
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Manage bearer tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Print the source reliability ranking
    Sources,
    /// Publish a local article
    Publish {
        #[arg(long)]
        author: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        location: Option<String>,
    },
    /// Run fact-check verification on an article
    Verify {
        article_id: String,
        /// Identity of the caller; must be the article's author
        #[arg(long = "as")]
        caller: String,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Issue a bearer token for an identity
    Issue { identity: String },
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("NEWSDESK_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
        Commands::Serve => newsdesk_api::serve(&load_config(&cli.config)?).await,
        Commands::Token { command } => match command {
            TokenCommands::Issue { identity } => token_issue(&load_config(&cli.config)?, &identity),
        },
        Commands::Sources => sources(&load_config(&cli.config)?),
        Commands::Publish {
            author,
            title,
            content,
            location,
        } => {
            let config = load_config(&cli.config)?;
            let store = Store::open(&config.database.path)?;
            let draft = NewArticle {
                title,
                body: content,
                location,
            };
            let article = articles::publish(&store, &author, draft)?;
            println!("{}", serde_json::to_string_pretty(&article)?);
            Ok(())
        }
        Commands::Verify { article_id, caller } => {
            verify(&load_config(&cli.config)?, &article_id, &caller).await
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::resolve(path).with_context(|| format!("load config {}", path.display()))
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    let article_schema = schema_for!(newsdesk_core::schema::Article);
    fs::write(
        out_dir.join("Article.schema.json"),
        serde_json::to_string_pretty(&article_schema)?,
    )?;

    let source_schema = schema_for!(newsdesk_core::schema::Source);
    fs::write(
        out_dir.join("Source.schema.json"),
        serde_json::to_string_pretty(&source_schema)?,
    )?;

    let item_schema = schema_for!(newsdesk_core::schema::NewsItem);
    fs::write(
        out_dir.join("NewsItem.schema.json"),
        serde_json::to_string_pretty(&item_schema)?,
    )?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

fn token_issue(config: &AppConfig, identity: &str) -> Result<()> {
    let Some(secret) = config.auth.token_secret.as_deref() else {
        bail!("auth.token_secret (AUTH_TOKEN_SECRET) is not set");
    };
    let token = TokenSigner::new(secret)
        .issue(identity)
        .context("could not sign token")?;
    println!("{token}");
    Ok(())
}

fn sources(config: &AppConfig) -> Result<()> {
    let ledger = ReliabilityLedger::new(Store::open(&config.database.path)?);
    for source in ledger.ranking()? {
        println!(
            "{:>3}  {:<8} {:<32} reliable={} unreliable={} misleading={}",
            source.reliability_score,
            source.source_type.as_str(),
            source.name,
            source.reliable_count,
            source.unreliable_count,
            source.misleading_count,
        );
    }
    Ok(())
}

async fn verify(config: &AppConfig, article_id: &str, caller: &str) -> Result<()> {
    let store = Store::open(&config.database.path)?;
    let checker = oracle::from_config(&config.oracle)?;
    let ledger = ReliabilityLedger::new(store.clone());
    let pipeline = VerdictPipeline::new(store, checker, ledger);
    let article = pipeline.verify(article_id, caller).await?;
    println!("{}", serde_json::to_string_pretty(&article)?);
    Ok(())
}
