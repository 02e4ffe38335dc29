//! Line-oriented scanning of proxy process output

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// How a marker wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A line containing the marker was observed
    Matched(String),
    /// The stream closed first
    Closed,
}

/// Splits a byte stream into discrete lines
///
/// `next_line` is cancel safe: a partially read line stays buffered and is
/// completed by the next call, so the scanner can sit in a `select!`.
pub struct LineScanner<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    closed: bool,
}

impl<R: AsyncRead + Unpin> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            closed: false,
        }
    }

    /// Next complete line, or `None` once the stream has closed
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }

        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            self.closed = true;
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.buf.clear();

        tracing::debug!(target: "toragent::tor", "{}", line);
        Ok(Some(line))
    }

    /// Consume lines until one contains `marker`
    ///
    /// Lines before the match are dropped; nothing after it is read.
    pub async fn wait_for(&mut self, marker: &str) -> io::Result<ScanOutcome> {
        while let Some(line) = self.next_line().await? {
            if line.contains(marker) {
                return Ok(ScanOutcome::Matched(line));
            }
        }
        Ok(ScanOutcome::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_splits_lines() {
        let mut scanner = LineScanner::new(&b"first\r\nsecond\nthird"[..]);
        assert_eq!(scanner.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(scanner.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(scanner.next_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(scanner.next_line().await.unwrap(), None);
        assert!(scanner.is_closed());
    }

    #[tokio::test]
    async fn test_wait_for_marker() {
        let output = b"Bootstrapped 50% (loading_descriptors)\nBootstrapped 100% (done): Done\nafter\n";
        let mut scanner = LineScanner::new(&output[..]);

        let outcome = scanner.wait_for("Done").await.unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::Matched("Bootstrapped 100% (done): Done".to_string())
        );
        // The line after the match is left for the next reader
        assert_eq!(scanner.next_line().await.unwrap().as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_wait_for_closed() {
        let mut scanner = LineScanner::new(&b"no marker here\n"[..]);
        assert_eq!(scanner.wait_for("Done").await.unwrap(), ScanOutcome::Closed);
    }

    #[tokio::test]
    async fn test_marker_split_across_writes() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut scanner = LineScanner::new(rx);

        let writer = tokio::spawn(async move {
            tx.write_all(b"Bootstrapped 100% (do").await.unwrap();
            tokio::task::yield_now().await;
            tx.write_all(b"ne): Done\n").await.unwrap();
        });

        let outcome = scanner.wait_for("Done").await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Matched(_)));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_lossy() {
        let mut scanner = LineScanner::new(&b"bad \xff byte\n"[..]);
        let line = scanner.next_line().await.unwrap().unwrap();
        assert!(line.starts_with("bad "));
    }
}
