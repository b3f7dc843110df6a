//! Line-oriented TCP update listener
//!
//! Each connection carries one `<beacon_id>@<distance>` message per line.
//! Blank lines are skipped. Lines of one connection are applied in order;
//! connections are served concurrently. A line longer than
//! [`MAX_LINE_BYTES`] closes its connection.

use crate::transport::DistanceUpdateSink;
use crate::validation::StartupError;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Longest accepted update line, excluding the newline
pub const MAX_LINE_BYTES: usize = 4096;

pub struct UpdateListener {
    listener: TcpListener,
}

impl UpdateListener {
    pub async fn bind(addr: &str) -> Result<Self, StartupError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| StartupError::Listen {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves. Open connections are
    /// closed before returning.
    pub async fn serve<S, F>(self, sink: Arc<S>, shutdown: F)
    where
        S: DistanceUpdateSink + ?Sized + 'static,
        F: Future<Output = ()>,
    {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "Listening for distance updates");
        }

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "update source connected");
                        let sink = Arc::clone(&sink);
                        connections.spawn(async move {
                            if let Err(e) = read_updates(stream, sink.as_ref()).await {
                                warn!(%peer, error = %e, "update connection failed");
                            }
                            debug!(%peer, "update source disconnected");
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept update connection"),
                },
            }
        }

        connections.shutdown().await;
    }
}

/// Feed every non-blank line of `reader` to `sink`. Returns the number of
/// lines submitted, or `InvalidData` once a line exceeds
/// [`MAX_LINE_BYTES`].
pub async fn read_updates<R, S>(reader: R, sink: &S) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
    S: DistanceUpdateSink + ?Sized,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut submitted = 0;

    loop {
        buf.clear();
        let limit = (MAX_LINE_BYTES + 1) as u64;
        if (&mut reader).take(limit).read_until(b'\n', &mut buf).await? == 0 {
            return Ok(submitted);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else if buf.len() > MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("update line exceeds {MAX_LINE_BYTES} bytes"),
            ));
        }

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = sink.submit_message(&line) {
            debug!(message = %line, error = %e, "update rejected");
        }
        submitted += 1;
    }
}
