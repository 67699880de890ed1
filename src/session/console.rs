//! Line-oriented operator terminal

use crate::error::ConsoleResult;

use tokio::io::{
    stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin,
    Stdout,
};

/// Operator terminal over any async line reader and writer
pub struct Console<R, W> {
    reader: R,
    writer: W,
}

/// Console bound to the process's stdin and stdout
pub type StdConsole = Console<BufReader<Stdin>, Stdout>;

impl StdConsole {
    pub fn stdio() -> Self {
        Console::new(BufReader::new(stdin()), stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub async fn write(&mut self, text: &str) -> ConsoleResult<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn writeln(&mut self, text: &str) -> ConsoleResult<()> {
        self.write(text).await?;
        self.write("\n").await
    }

    /// Read one line without its terminator. `None` at end of input.
    pub async fn read_line(&mut self) -> ConsoleResult<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub async fn prompt(&mut self, text: &str) -> ConsoleResult<Option<String>> {
        self.write(text).await?;
        self.read_line().await
    }

    /// Everything written so far, for test assertions
    #[cfg(test)]
    pub fn output(&self) -> String
    where
        W: AsRef<[u8]>,
    {
        String::from_utf8_lossy(self.writer.as_ref()).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_prompt_reads_one_line() {
        let reader = BufReader::new(Builder::new().read(b"2\r\n").build());
        let mut console = Console::new(reader, Vec::new());

        let answer = console.prompt("Select: ").await.unwrap();
        assert_eq!(answer.as_deref(), Some("2"));
        assert_eq!(console.output(), "Select: ");
    }

    #[tokio::test]
    async fn test_end_of_input() {
        let mut console = Console::new(&b"last\n"[..], Vec::new());
        assert_eq!(console.read_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(console.read_line().await.unwrap(), None);
    }
}
