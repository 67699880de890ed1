//! Operator confirmation before any state-changing submission

use crate::error::ConsoleResult;
use crate::session::console::Console;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::info;

/// Blocks until the operator approves or rejects an action
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfirmationGate: Send {
    /// Show the preview and wait for an answer. Only "y" approves.
    async fn confirm(&mut self, preview: &str) -> ConsoleResult<bool>;

    /// Progress message shown while an action runs
    async fn announce(&mut self, message: &str) -> ConsoleResult<()>;
}

/// Case-insensitive "y" is the only approval; everything else rejects
pub fn is_approval(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

#[async_trait]
impl<R, W> ConfirmationGate for Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&mut self, preview: &str) -> ConsoleResult<bool> {
        self.writeln("").await?;
        self.writeln(preview).await?;
        let approved = match self.prompt("Proceed? [y/N]: ").await? {
            Some(answer) => is_approval(&answer),
            None => false,
        };
        info!("Operator {} the action", if approved { "approved" } else { "rejected" });
        Ok(approved)
    }

    async fn announce(&mut self, message: &str) -> ConsoleResult<()> {
        self.writeln(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn answer(input: &'static [u8]) -> bool {
        let mut console = Console::new(input, Vec::new());
        console.confirm("  Action: Withdraw").await.unwrap()
    }

    #[test]
    fn test_only_y_approves() {
        assert!(is_approval("y"));
        assert!(is_approval("Y"));
        assert!(is_approval("  y  "));
        assert!(!is_approval(""));
        assert!(!is_approval("yes"));
        assert!(!is_approval("n"));
        assert!(!is_approval("1"));
    }

    #[tokio::test]
    async fn test_console_gate() {
        assert!(answer(b"y\n").await);
        assert!(answer(b"Y\r\n").await);
        assert!(!answer(b"\n").await);
        assert!(!answer(b"yes\n").await);
        // No default-to-yes at end of input
        assert!(!answer(b"").await);
    }

    #[tokio::test]
    async fn test_preview_is_shown_before_prompt() {
        let mut console = Console::new(&b"n\n"[..], Vec::new());
        console.confirm("  Max cost:   unknown").await.unwrap();

        let output = console.output();
        let preview_at = output.find("Max cost:   unknown").unwrap();
        let prompt_at = output.find("Proceed? [y/N]").unwrap();
        assert!(preview_at < prompt_at);
    }
}
