use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use applyease_agent::agent::PageAgent;
use applyease_agent::backend::HttpBackend;
use applyease_agent::classifier::{classify_fields, collect_candidates};
use applyease_agent::config::Config;
use applyease_agent::dom::HtmlPage;
use applyease_agent::extractor::{HttpMarkupSource, MarkupSource};
use applyease_agent::orchestrator::run_fill;
use applyease_agent::relay::{
    Background, LoggingTabHost, MemoryTokenStore, Relay, RelayMessage, TokenStore,
};
use applyease_agent::session::{PageContext, PageSession};

/// Runs the ApplyEase page engine against a live posting.
#[derive(Debug, Parser)]
#[command(name = "applyease", version, about)]
struct Cli {
    /// Bearer token for the ApplyEase API (overrides APPLYEASE_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the job description extracted from a posting
    Extract { url: Url },
    /// Print the field roles detected on an application form
    Classify {
        url: Url,
        /// Profile link types to look for (repeatable)
        #[arg(long = "link-type")]
        link_types: Vec<String>,
    },
    /// Fill the fetched form in memory and print the fill report
    Fill { url: Url },
    /// Score the stored resume against a posting
    Match { url: Url },
}

impl Command {
    fn url(&self) -> &Url {
        match self {
            Command::Extract { url }
            | Command::Classify { url, .. }
            | Command::Fill { url }
            | Command::Match { url } => url,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "applyease_agent={0},applyease={0}",
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting ApplyEase agent v{}", env!("CARGO_PKG_VERSION"));

    let url = cli.command.url().clone();
    let dashboard_url = Url::parse(&config.dashboard_url)
        .context("APPLYEASE_DASHBOARD_URL must be an absolute URL")?;

    let tokens = Arc::new(MemoryTokenStore::default());
    if let Some(token) = cli.token.as_deref().or(config.token.as_deref()) {
        tokens.set(token);
    }
    let tabs = Arc::new(LoggingTabHost::new(Some(url.to_string()), false));
    let relay: Rc<dyn Relay> = Rc::new(Background::new(tokens.clone(), tabs).spawn());

    let markup_source = HttpMarkupSource::new(relay.clone(), config.http_timeout)?;
    let markup = markup_source
        .fetch_page(&url)
        .await
        .with_context(|| format!("failed to fetch {url}"))?;
    let page = HtmlPage::parse(url.clone(), &markup);
    let backend = HttpBackend::new(config.api_base.clone(), config.http_timeout)?;
    let session = PageSession::new(url.clone());
    info!("Session {} on {}", session.id, session.host());

    let ctx = PageContext {
        page: &page,
        backend: &backend,
        markup: &markup_source,
        session: &session,
    };

    match cli.command {
        Command::Extract { .. } => {
            let job_description = ctx.job_description().await;
            print_json(&json!({
                "url": url.as_str(),
                "chars": job_description.chars().count(),
                "job_description": job_description,
            }))?;
        }
        Command::Classify { link_types, .. } => {
            let candidates = collect_candidates(&page);
            let map = classify_fields(&candidates, &link_types);
            info!("{} candidates on the page", candidates.len());
            print_json(&map)?;
        }
        Command::Fill { .. } => {
            let token = tokens
                .get()
                .context("a token is required: pass --token or set APPLYEASE_TOKEN")?;
            let report = run_fill(&ctx, &token).await?;
            print_json(&json!({
                "report": report,
                "written": page.written_values(),
            }))?;
        }
        Command::Match { .. } => {
            let agent = PageAgent::new(ctx, relay.as_ref(), tokens.as_ref(), dashboard_url);
            let reply = agent
                .handle_message(RelayMessage::ComputeMatch { token: None })
                .await;
            print_json(&reply)?;
        }
    }

    Ok(())
}
