//! Interactive read-generate-print loop.
//!
//! One prompt is in flight at a time. Each line read from the console is
//! handed to a [`TurnRunner`] and its events are printed as they arrive.
//! The loop ends on end-of-input, `exit`/`quit`, an interrupt, or the first
//! agent error.

use std::io::{self, BufRead};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_stream::wrappers::ReceiverStream;

use crate::agent::{AgentError, AgentSession};
use crate::normalized::NormalizedEvent;

/// Printed once the agent is ready.
pub const BANNER: &str = "Type a prompt (Ctrl+C to exit)";

/// Printed before each line of input.
pub const PROMPT: &str = " > ";

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    EndOfInput,
    Interrupted,
    /// The user typed `exit` or `quit`.
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("console I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Something that can answer a prompt with a stream of events.
pub trait TurnRunner: Send {
    fn run_turn(&mut self, prompt: String) -> BoxStream<'_, Result<NormalizedEvent, AgentError>>;
}

impl TurnRunner for AgentSession<'_> {
    fn run_turn(&mut self, prompt: String) -> BoxStream<'_, Result<NormalizedEvent, AgentError>> {
        self.run(prompt).boxed()
    }
}

/// Lines of standard input, read on a dedicated thread.
///
/// A blocking read on the runtime would keep it from shutting down after an
/// interrupt; a plain thread does not.
pub fn stdin_lines() -> io::Result<ReceiverStream<io::Result<String>>> {
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(ReceiverStream::new(rx))
}

/// Run the loop until an exit condition.
///
/// `interrupt` resolves when the user asks to stop; it is raced against both
/// the input read and the in-flight turn.
pub async fn run_loop<L, W, T, I>(
    input: L,
    output: &mut W,
    runner: &mut T,
    interrupt: I,
) -> Result<LoopExit, ReplError>
where
    L: Stream<Item = io::Result<String>> + Unpin,
    W: AsyncWrite + Unpin,
    T: TurnRunner + ?Sized,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut input = input;

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            biased;
            () = &mut interrupt => return Ok(LoopExit::Interrupted),
            line = input.next() => line,
        };
        let Some(line) = line.transpose()? else {
            return Ok(LoopExit::EndOfInput);
        };

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case("exit") || prompt.eq_ignore_ascii_case("quit") {
            return Ok(LoopExit::Quit);
        }

        tracing::debug!(prompt_length = prompt.len(), "Forwarding prompt to agent");

        let turn = print_turn(runner.run_turn(prompt.to_string()), output);
        tokio::select! {
            biased;
            () = &mut interrupt => return Ok(LoopExit::Interrupted),
            res = turn => res?,
        }
    }
}

async fn print_turn<W>(
    mut events: BoxStream<'_, Result<NormalizedEvent, AgentError>>,
    output: &mut W,
) -> Result<(), ReplError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.next().await {
        match event? {
            NormalizedEvent::MessageDelta { text } => {
                output.write_all(text.as_bytes()).await?;
                output.flush().await?;
            }
            NormalizedEvent::ToolCallComplete { name, .. } => {
                output
                    .write_all(format!("\n[tool called: {name}]\n").as_bytes())
                    .await?;
            }
            NormalizedEvent::ToolResult { content, .. } => {
                output
                    .write_all(format!("[tool output: {content}]\n").as_bytes())
                    .await?;
            }
            _ => {}
        }
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
