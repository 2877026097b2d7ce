//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use researchkit_llm::{CancelSignal, Invoker, OpenAiCompatModel, RetryPolicy, cancellation};
use researchkit_research::{
    HttpScraper, ProgressReporter, ResearchAgent, SearchTool, StaticSearch, UrlSelector,
};
use researchkit_shared::{AppConfig, ResearchOutput, init_config, load_config, load_config_from};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ResearchKit: resilient LLM calls and relevance-filtered research.
#[derive(Parser)]
#[command(
    name = "researchkit",
    version,
    about = "Query a language model with retries, and research topics from scored search results.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.researchkit/researchkit.toml).
    #[arg(long, global = true, env = "RESEARCHKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Send a prompt to the model and print the answer.
    Ask {
        /// Prompt text.
        prompt: String,

        /// Expect JSON back and print it normalized.
        #[arg(long)]
        json: bool,
    },

    /// Score candidate URLs against a topic and print the relevant ones.
    Select {
        /// Research topic.
        #[arg(long)]
        topic: String,

        /// JSON file with an array of `{url, title, summarised_content}`.
        #[arg(long)]
        candidates: PathBuf,

        /// Override `selection.relevance_threshold`.
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Select relevant candidates, scrape them, and print the results as JSON.
    Research {
        /// Research topic.
        #[arg(long)]
        topic: String,

        /// JSON file with an array of `{url, title, summarised_content}`.
        #[arg(long)]
        candidates: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "researchkit=info",
        1 => "researchkit=debug",
        _ => "researchkit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so command output on stdout stays pipeable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command routing
// ---------------------------------------------------------------------------

/// Route the parsed CLI command to its handler.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Ask { prompt, json } => cmd_ask(config_path, &prompt, json).await,
        Command::Select {
            topic,
            candidates,
            threshold,
        } => cmd_select(config_path, &topic, &candidates, threshold).await,
        Command::Research { topic, candidates } => {
            cmd_research(config_path, &topic, &candidates).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    config.validate()?;
    Ok(config)
}

/// Cancel signal that fires on Ctrl-C, interrupting any pending backoff.
fn ctrl_c_signal() -> CancelSignal {
    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    signal
}

fn build_invoker(config: &AppConfig) -> Result<Invoker> {
    let model = OpenAiCompatModel::from_config(&config.llm)?;
    debug!(base_url = model.base_url(), model = %config.llm.model, "model backend ready");
    Ok(Invoker::new(Arc::new(model), RetryPolicy::from(&config.retry))
        .with_cancellation(ctrl_c_signal()))
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_ask(config_path: Option<&Path>, prompt: &str, json: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let invoker = build_invoker(&config)?;

    if json {
        let value = invoker.call_json(prompt).await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let text = invoker.call_text(prompt).await?;
        println!("{text}");
    }
    Ok(())
}

async fn cmd_select(
    config_path: Option<&Path>,
    topic: &str,
    candidates: &Path,
    threshold: Option<f64>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(t) = threshold {
        config.selection.relevance_threshold = t;
        config.validate()?;
    }

    let search = StaticSearch::from_json_file(candidates)?;
    let selector = UrlSelector::new(build_invoker(&config)?, topic, config.selection.clone());

    let selected = selector.select(search.candidates()).await?;
    info!(
        candidates = search.candidates().len(),
        selected = selected.len(),
        "selection complete"
    );
    for url in selected {
        println!("{url}");
    }
    Ok(())
}

async fn cmd_research(config_path: Option<&Path>, topic: &str, candidates: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;

    let search: Arc<dyn SearchTool> = Arc::new(StaticSearch::from_json_file(candidates)?);
    let scraper = Arc::new(HttpScraper::new(&config.scrape)?);
    let selector = UrlSelector::new(build_invoker(&config)?, topic, config.selection.clone());
    let mut agent = ResearchAgent::new(search, scraper, selector);

    let reporter = CliProgress::new();
    let output = match agent.run_research_with(topic, &reporter).await {
        Ok(output) => output,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = match config_path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn candidates_found(&self, count: usize) {
        self.spinner
            .set_message(format!("scoring {count} candidate(s)"));
    }

    fn url_scraped(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] scraped {url}"));
    }

    fn done(&self, output: &ResearchOutput) {
        self.spinner.finish_and_clear();
        info!(
            topic = %output.topic,
            results = output.results.len(),
            "research finished"
        );
    }
}
