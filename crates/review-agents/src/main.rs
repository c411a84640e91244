use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use review_agents::{default_roster, AgentsConfig, ChatClient, OpenAiChatClient};
use review_coordination::{ConsensusMethod, ConsensusResult, ConversationOrchestrator, Verdict};
use tracing::{info, warn};

/// Output rendering for the review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    /// Consensus summary only.
    Text,
    /// Full conversation log (or the bare result with `--quick`).
    Json,
    /// Chat-style transcript with the consensus footer.
    Transcript,
}

/// Multi-agent code review: security, quality and rules-compliance reviewers
/// discuss a submission and vote on it.
#[derive(Debug, Parser)]
#[command(name = "review-agents", version)]
struct Cli {
    /// Python file to review.
    file: Option<PathBuf>,

    /// Review this code string instead of a file.
    #[arg(short, long, conflicts_with = "file")]
    code: Option<String>,

    /// Consensus method: majority, unanimous, weighted or security_veto.
    #[arg(short, long)]
    method: Option<ConsensusMethod>,

    /// Maximum discussion rounds.
    #[arg(short, long)]
    rounds: Option<u32>,

    /// Write the rendered review to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Transcript)]
    format: OutputFormat,

    /// Only log warnings.
    #[arg(short, long)]
    quiet: bool,

    /// Skip the discussion and vote on the initial analyses.
    #[arg(long)]
    quick: bool,

    /// TOML config with [review] and [llm] tables.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the initial analyses concurrently.
    #[arg(long)]
    parallel: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => AgentsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AgentsConfig::from_env(),
    };
    if let Some(method) = cli.method {
        config.review.consensus_method = method;
    }
    if let Some(rounds) = cli.rounds {
        config.review.max_rounds = rounds;
    }
    if cli.parallel {
        config.review.parallel_analysis = true;
    }

    let (code, filename) = read_input(&cli)?;

    let client: Option<Arc<dyn ChatClient>> = match &config.llm {
        Some(endpoint) => {
            let client = OpenAiChatClient::new(endpoint).context("building LLM client")?;
            info!(url = %endpoint.url, model = %client.model(), "LLM reviewers enabled");
            let client: Arc<dyn ChatClient> = Arc::new(client);
            Some(client)
        }
        None => {
            warn!("REVIEW_LLM_URL not set; reviewers run rule-based only");
            None
        }
    };

    let mut orchestrator = ConversationOrchestrator::new(default_roster(client), config.review)
        .context("invalid review configuration")?;

    let (rendered, result) = if cli.quick {
        let result = orchestrator.quick_review(&code, &filename).await?;
        let rendered = match cli.format {
            OutputFormat::Json => serde_json::to_string_pretty(&result)?,
            OutputFormat::Text | OutputFormat::Transcript => result.summary.clone(),
        };
        (rendered, result)
    } else {
        let log = orchestrator.review_code(&code, &filename).await?;
        let result = log
            .consensus_result()
            .cloned()
            .context("review finished without a consensus result")?;
        let rendered = match cli.format {
            OutputFormat::Json => log.to_json_pretty()?,
            OutputFormat::Transcript => log.render_transcript(),
            OutputFormat::Text => result.summary.clone(),
        };
        (rendered, result)
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Review written");
        }
        None => println!("{}", rendered),
    }

    Ok(exit_code(&result))
}

/// Code and display filename from the file argument, `--code`, or stdin.
fn read_input(cli: &Cli) -> Result<(String, String)> {
    if let Some(code) = &cli.code {
        return Ok((code.clone(), "<stdin>".to_string()));
    }
    if let Some(path) = &cli.file {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        return Ok((code, path.display().to_string()));
    }
    if std::io::stdin().is_terminal() {
        bail!("no input: pass a file, --code, or pipe code on stdin");
    }
    let mut code = String::new();
    std::io::stdin()
        .read_to_string(&mut code)
        .context("reading stdin")?;
    Ok((code, "<stdin>".to_string()))
}

fn exit_code(result: &ConsensusResult) -> ExitCode {
    if result.final_verdict == Verdict::Approve {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
