//! Line-based I/O over worker pipes.
//!
//! One task owns each write half and drains a queue of ready-made lines, so
//! concurrent producers never interleave partial messages.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Lines};
use tokio::sync::mpsc;

/// Default buffer size for IPC (64KB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Sending side of a line queue.
pub type LineSender = mpsc::UnboundedSender<String>;

/// Wrap a read half into a line stream.
pub fn line_reader<R: AsyncRead + Unpin>(reader: R) -> Lines<BufReader<R>> {
    BufReader::with_capacity(DEFAULT_BUFFER_SIZE, reader).lines()
}

/// Spawn a task that writes every queued line to `writer`, flushing after each.
///
/// The task ends when all senders are dropped or the pipe breaks.
pub fn spawn_line_writer<W>(writer: W) -> (LineSender, tokio::task::JoinHandle<io::Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = tokio::spawn(async move {
        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, writer);
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            if !line.ends_with('\n') {
                writer.write_all(b"\n").await?;
            }
            writer.flush().await?;
        }
        writer.shutdown().await
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_writer_reader() {
        let (a, b) = tokio::io::duplex(1024);
        let (tx, writer) = spawn_line_writer(a);

        tx.send("hello\n".to_string()).unwrap();
        tx.send("world".to_string()).unwrap(); // newline appended
        drop(tx);
        writer.await.unwrap().unwrap();

        let mut lines = line_reader(b);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("world"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
