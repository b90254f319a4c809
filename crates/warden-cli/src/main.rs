//! Warden CLI: sandboxed tool-call authorization for coding agents.

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_config::{CliOverrides, WardenConfig};
use warden_core::{ControlHandler, StdioSession, TranscriptRecord, reduce, run_prompt};
use warden_permissions::{HookRequest, ToolRequest};
use warden_types::Frame;

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Tool-call authorization relay and transcript aggregator for coding agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Authorization strategy: local, delegated or layered
    #[arg(long, global = true)]
    strategy: Option<String>,

    /// Validator command (overrides WARDEN_VALIDATOR)
    #[arg(long, global = true)]
    validator: Option<String>,

    /// Working directory for the agent and project config lookup
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Send one prompt to the agent and print the aggregated transcript
    Run {
        prompt: String,

        /// Agent executable (overrides [session] command)
        #[arg(long)]
        agent: Option<String>,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },
    /// Aggregate a captured newline-delimited frame log
    Replay {
        file: PathBuf,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer a PreToolUse hook: payload on stdin, decision on stdout
    Hook,
    /// Authorize a single tool call and print the decision
    Check {
        #[arg(long)]
        tool: String,

        /// Tool input as a JSON object
        #[arg(long, default_value = "{}")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for protocol output.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let agent = match &cli.command {
        Command::Run { agent, .. } => agent.clone(),
        _ => None,
    };
    let config = WardenConfig::load(CliOverrides {
        strategy: cli.strategy,
        validator: cli.validator,
        agent_command: agent,
        cwd: cli.cwd,
    });

    match cli.command {
        Command::Run { prompt, json, .. } => {
            let config = config.map_err(|e| anyhow::anyhow!("{e}"))?;
            run(&config, &prompt, json).await
        }
        Command::Replay { file, json } => replay(&file, json),
        Command::Hook => hook(config).await,
        Command::Check { tool, input } => {
            let config = config.map_err(|e| anyhow::anyhow!("{e}"))?;
            check(&config, &tool, &input).await
        }
    }
}

async fn run(config: &WardenConfig, prompt: &str, as_json: bool) -> Result<()> {
    let authorizer = config
        .build_authorizer()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let cwd = working_dir(config);
    let controller = ControlHandler::new(Arc::new(authorizer), cwd.display().to_string());

    let mut session = StdioSession::connect(&config.session, Some(controller))
        .await
        .with_context(|| format!("Failed to start agent '{}'", config.session.command))?;
    let result = run_prompt(&mut session, prompt).await;
    session.close().await;

    let record = result.context("Prompt exchange failed")?;
    print_record(&record, as_json)
}

fn replay(path: &Path, as_json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut frames = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame: Frame = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: undecodable frame", path.display(), idx + 1))?;
        frames.push(frame);
    }

    print_record(&reduce(frames), as_json)
}

/// Answer one PreToolUse hook. Any failure becomes a deny on stdout.
async fn hook(config: Result<WardenConfig, warden_types::ConfigError>) -> Result<()> {
    let mut payload = String::new();
    io::stdin()
        .read_to_string(&mut payload)
        .context("Failed to read hook payload")?;

    let answer = match authorize_hook(config, &payload).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "hook failed closed");
            Some(output::hook_failure(&format!("{e:#}")))
        }
    };

    if let Some(answer) = answer {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", serde_json::to_string(&answer)?)?;
        out.flush()?;
    }
    Ok(())
}

async fn authorize_hook(
    config: Result<WardenConfig, warden_types::ConfigError>,
    payload: &str,
) -> Result<Option<serde_json::Value>> {
    let config = config.map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut request: HookRequest =
        serde_json::from_str(payload).context("Malformed hook payload")?;
    if request.cwd.is_empty() {
        request.cwd = working_dir(&config).display().to_string();
    }

    let authorizer = config
        .build_authorizer()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let original = request.tool_input.clone();
    let decision = authorizer.authorize(&ToolRequest::from(request)).await?;
    Ok(output::hook_output(&decision, &original))
}

async fn check(config: &WardenConfig, tool: &str, input: &str) -> Result<()> {
    let input: serde_json::Value =
        serde_json::from_str(input).context("--input must be a JSON object")?;
    if !input.is_object() {
        anyhow::bail!("--input must be a JSON object");
    }

    let authorizer = config
        .build_authorizer()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let request = ToolRequest::new(tool, input, working_dir(config).display().to_string());
    let decision = authorizer.authorize(&request).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&output::decision_json(&decision))?
    );
    Ok(())
}

fn print_record(record: &TranscriptRecord, as_json: bool) -> Result<()> {
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::transcript_json(record))?
        );
    } else {
        println!("{}", output::transcript_text(record));
        eprintln!("{}", output::terminal_summary(record));
    }
    Ok(())
}

fn working_dir(config: &WardenConfig) -> PathBuf {
    config
        .session
        .cwd
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
