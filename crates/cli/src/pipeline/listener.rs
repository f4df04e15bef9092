//! Graphite plaintext listener
//!
//! One task per connection; every connection is an independent producer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use backends::MemoryRecord;
use director::PointSender;
use ingestion::parse_line;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Longest accepted line, newline excluded
pub const MAX_LINE_LEN: usize = 4096;

/// Line counters shared by every connection
#[derive(Debug, Default)]
pub struct LineCounters {
    received: AtomicU64,
    malformed: AtomicU64,
}

impl LineCounters {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Accept connections until the task is aborted
///
/// Dropping the task drops the JoinSet, which aborts every connection.
#[instrument(name = "plaintext_accept_loop", skip_all, fields(addr = ?listener.local_addr().ok()))]
pub async fn accept_loop(
    listener: TcpListener,
    sender: PointSender<MemoryRecord>,
    counters: Arc<LineCounters>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Connection accepted");
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        sender.clone(),
                        Arc::clone(&counters),
                    ));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

/// Read lines until EOF and submit every parsable point
///
/// Lines that are not UTF-8 or longer than [`MAX_LINE_LEN`] are counted as
/// malformed and skipped; the connection stays open.
pub async fn serve_connection<S>(
    stream: S,
    peer: SocketAddr,
    sender: PointSender<MemoryRecord>,
    counters: Arc<LineCounters>,
) where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_LEN as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(%peer, error = %e, "Connection read failed");
                break;
            }
        }

        if buf.len() > MAX_LINE_LEN && buf.last() != Some(&b'\n') {
            counters.received.fetch_add(1, Ordering::Relaxed);
            counters.malformed.fetch_add(1, Ordering::Relaxed);
            warn!(%peer, max = MAX_LINE_LEN, "Skipping oversized line");
            if let Err(e) = skip_line(&mut reader).await {
                warn!(%peer, error = %e, "Connection read failed");
                break;
            }
            continue;
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            counters.received.fetch_add(1, Ordering::Relaxed);
            counters.malformed.fetch_add(1, Ordering::Relaxed);
            warn!(%peer, "Skipping line that is not UTF-8");
            continue;
        };
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }

        counters.received.fetch_add(1, Ordering::Relaxed);
        match parse_line(line) {
            Ok(point) => {
                if let Err(e) = sender.submit(point).await {
                    info!(%peer, error = %e, "Receiver closed, dropping connection");
                    break;
                }
            }
            Err(e) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(%peer, error = %e, "Skipping malformed line");
            }
        }
    }
    debug!(%peer, "Connection closed");
}

/// Discard input up to and including the next newline
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
}
