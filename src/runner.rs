//! One client run from configuration to teardown.
//!
//! The tool server is connected once, lent to the agent for the lifetime of
//! the loop, and released exactly once however the loop ends.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::{AgentDefinition, AgentSession, DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS};
use crate::config::{self, Cli, ProcessEnv};
use crate::diagnostics::{self, EXIT_NOTICE};
use crate::llm::LlmDriver;
use crate::llm::responses::ResponsesDriver;
use crate::mcp::{McpConnector, McpServerEntry, RmcpConnector, SERVER_NAME, Transport};
use crate::repl::{self, BANNER, LoopExit, ReplError};

/// How the interactive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    EndOfInput,
    Interrupted,
    Quit,
    /// An agent or console error ended the loop.
    Failed,
}

/// Result of a completed run, after teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit: ExitKind,
    /// Final line shown to the user, if any.
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The tool server could not be reached; nothing was acquired.
    #[error("{0:#}")]
    Connect(anyhow::Error),
}

fn outcome(result: Result<LoopExit, ReplError>, transport: Transport) -> RunOutcome {
    match result {
        Ok(LoopExit::Quit) => RunOutcome {
            exit: ExitKind::Quit,
            message: None,
        },
        Ok(LoopExit::EndOfInput) => RunOutcome {
            exit: ExitKind::EndOfInput,
            message: Some(EXIT_NOTICE.to_string()),
        },
        Ok(LoopExit::Interrupted) => RunOutcome {
            exit: ExitKind::Interrupted,
            message: Some(EXIT_NOTICE.to_string()),
        },
        Err(ReplError::Agent(e)) => RunOutcome {
            exit: ExitKind::Failed,
            message: Some(diagnostics::translate(&e, transport)),
        },
        Err(ReplError::Io(e)) => RunOutcome {
            exit: ExitKind::Failed,
            message: Some(format!("Console error: {e}")),
        },
    }
}

/// Connect to the tool server, run the loop against it, then release it.
///
/// # Errors
///
/// Only a failed connection is an error. Everything after that is reported
/// through the returned [`RunOutcome`].
pub async fn run_client<C, L, W, I>(
    connector: &C,
    entry: &McpServerEntry,
    model: Arc<dyn LlmDriver>,
    input: L,
    output: &mut W,
    interrupt: I,
) -> Result<RunOutcome, RunError>
where
    C: McpConnector + ?Sized,
    L: Stream<Item = io::Result<String>> + Unpin,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    let transport = entry.transport();
    let server = connector
        .connect(SERVER_NAME, entry)
        .await
        .map_err(RunError::Connect)?;

    let result = {
        let agent = AgentDefinition::new(DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS, model, &*server);
        let mut session = AgentSession::new(&agent);

        match output.write_all(format!("{BANNER}\n").as_bytes()).await {
            Ok(()) => repl::run_loop(input, output, &mut session, interrupt).await,
            Err(e) => Err(ReplError::Io(e)),
        }
    };

    let outcome = outcome(result, transport);
    if let Some(message) = &outcome.message {
        // Console may already be gone; teardown still has to happen.
        let _ = output.write_all(format!("\n{message}\n").as_bytes()).await;
        let _ = output.flush().await;
    }

    if let Err(e) = server.cleanup().await {
        tracing::warn!(server = %server.name(), error = %e, "MCP server cleanup failed");
    }

    tracing::info!(exit = ?outcome.exit, %transport, "Client run finished");
    Ok(outcome)
}

/// Initialize tracing (M-LOG-STRUCTURED).
///
/// Logs go to stderr so they never interleave with the conversation on
/// stdout. `RUST_LOG` overrides the default `warn` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Resolves on Ctrl+C. If the handler cannot be installed it never resolves.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Entry point shared by both binaries.
pub async fn launch(cli: &Cli, transport: Transport) -> ExitCode {
    if let Err(e) = cli.load_dotenv() {
        eprintln!("Configuration error: {e}");
        return ExitCode::FAILURE;
    }

    let loaded = match transport {
        Transport::Stdio => config::load_stdio_config(&ProcessEnv, cli),
        Transport::StreamableHttp => config::load_http_config(&ProcessEnv, cli),
    };
    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        model = %cfg.llm.model,
        base_url = %cfg.llm.base_url,
        server = ?cfg.server,
        "Starting {transport} client"
    );

    let model: Arc<dyn LlmDriver> = Arc::new(ResponsesDriver::new(cfg.llm));

    let input = match repl::stdin_lines() {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Failed to read from the console: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = tokio::io::stdout();

    match run_client(&RmcpConnector, &cfg.server, model, input, &mut stdout, ctrl_c()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to connect to MCP server: {e}");
            ExitCode::FAILURE
        }
    }
}
