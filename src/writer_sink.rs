use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

/// Sink over any [`AsyncWrite`] byte stream: a Logstash TCP input, an
/// append-only file, stdout.
///
/// The writer sits behind a mutex only so that `flush` can reach it; during
/// normal operation the drain task is its sole user.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Take the writer back, e.g. to inspect what was written.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl WriterSink<BufWriter<TcpStream>> {
    /// Connect to a Logstash `tcp` input using the `json_lines` codec.
    pub async fn tcp<A: ToSocketAddrs>(addr: A) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(BufWriter::new(stream)))
    }
}

impl WriterSink<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub async fn append_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

#[async_trait]
impl<W> LogSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&self, payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut writer = self.writer.lock().await;
        writer.write_all(payload).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_payloads_in_order() {
        let sink = WriterSink::new(Vec::new());
        sink.write(b"one\n").await.unwrap();
        sink.write(b"two\n").await.unwrap();
        sink.flush().await.unwrap();

        assert_eq!(sink.into_inner(), b"one\ntwo\n".to_vec());
    }

    #[tokio::test]
    async fn append_file_keeps_existing_content() {
        let path = std::env::temp_dir().join(format!("tracing-logstash-{}.log", std::process::id()));
        tokio::fs::write(&path, b"existing\n").await.unwrap();

        let sink = WriterSink::append_file(&path).await.unwrap();
        sink.write(b"appended\n").await.unwrap();
        sink.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        assert_eq!(content, "existing\nappended\n");
    }
}
