//! REPL client that spawns the Workspace MCP server as a child process.

use clap::Parser;
use mimalloc::MiMalloc;
use std::process::ExitCode;
use workspace_mcp_repl::{config::Cli, mcp::Transport, runner};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    runner::init_tracing();
    let cli = Cli::parse();
    runner::launch(&cli, Transport::Stdio).await
}
