//! Stream receiver: one request, one unframed response.
//!
//! ```text
//! connect ──> write 17-byte header ──> read chunk ──> sink.write ──┐
//!                                          ▲                        │
//!                                          └────────────────────────┘
//!                                     until read returns 0 (peer closed)
//! ```
//!
//! Whatever happens, the sink is closed exactly once before returning.
//! Bytes written before a failure stay in the sink; discarding them is
//! the executor's job.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use catchup_core::{NodeAddress, RequestHeader, StreamType};
use catchup_store::Sink;

use crate::cancel::CancelToken;
use crate::config::TransferConfig;
use crate::error::{Result, TransferError};
use crate::observer::TransferObserver;

/// Summary of a fully received stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub stream_type: StreamType,
    /// Payload bytes written to the sink.
    pub bytes: u64,
    /// Number of sink writes.
    pub chunks: u64,
    /// BLAKE3 digest of the payload.
    pub digest: blake3::Hash,
}

/// Pulls a single stream from a peer into a sink.
pub struct StreamReceiver {
    config: TransferConfig,
    observer: Arc<dyn TransferObserver>,
}

impl StreamReceiver {
    pub fn new(config: TransferConfig, observer: Arc<dyn TransferObserver>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Request `header.stream_type` from `addr` and copy the response into
    /// `sink` until the peer closes the connection.
    ///
    /// Consumes the sink: it is closed on every path. A failed close is
    /// reported to the observer and does not change the result.
    pub async fn receive(
        &self,
        addr: &NodeAddress,
        header: RequestHeader,
        mut sink: Box<dyn Sink>,
        cancel: &CancelToken,
    ) -> Result<StreamReport> {
        let result = self.pump(addr, header, &mut sink, cancel).await;

        if let Err(e) = sink.close().await {
            self.observer.sink_close_failed(header.stream_type, &e);
        }

        match &result {
            Ok(report) => self.observer.stream_received(addr, report),
            Err(e) => self.observer.stream_failed(addr, header.stream_type, e),
        }
        result
    }

    async fn pump(
        &self,
        addr: &NodeAddress,
        header: RequestHeader,
        sink: &mut Box<dyn Sink>,
        cancel: &CancelToken,
    ) -> Result<StreamReport> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        self.observer.connecting(addr, &header);
        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            connected = time::timeout(
                self.config.connect_timeout,
                TcpStream::connect((addr.host.as_str(), addr.port)),
            ) => match connected {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    return Err(TransferError::Connect {
                        addr: addr.to_string(),
                        source,
                    })
                }
                Err(_) => {
                    return Err(TransferError::Timeout(format!("connecting to {addr}")))
                }
            },
        };

        stream.write_all(&header.encode()).await?;

        let mut buf = vec![0u8; self.config.buffer_size];
        let mut hasher = blake3::Hasher::new();
        let mut bytes = 0u64;
        let mut chunks = 0u64;

        loop {
            let n = tokio::select! {
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                read = time::timeout(self.config.read_idle_timeout, stream.read(&mut buf)) => match read {
                    Ok(Ok(n)) => n,
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => {
                        return Err(TransferError::Timeout(format!(
                            "{addr} sent nothing for {:?}",
                            self.config.read_idle_timeout
                        )))
                    }
                },
            };

            if n == 0 {
                break;
            }

            let chunk = &buf[..n];
            sink.write(chunk).await?;
            hasher.update(chunk);
            bytes += n as u64;
            chunks += 1;
            self.observer.chunk_received(header.stream_type, n);
        }

        Ok(StreamReport {
            stream_type: header.stream_type,
            bytes,
            chunks,
            digest: hasher.finalize(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use catchup_core::{TransactionId, ViewId, HEADER_LEN};
    use catchup_store::{MemoryFaults, MemoryStorage, SnapshotStorage, StoreError};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use crate::observer::NoopObserver;

    fn receiver(config: TransferConfig) -> StreamReceiver {
        StreamReceiver::new(config, Arc::new(NoopObserver))
    }

    fn header() -> RequestHeader {
        RequestHeader::new(ViewId(7), StreamType::Snapshot, TransactionId(42))
    }

    /// Accept one connection, read the header, then run `respond`.
    async fn serve_once<F, Fut>(respond: F) -> (NodeAddress, JoinHandle<[u8; HEADER_LEN]>)
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; HEADER_LEN];
            stream.read_exact(&mut request).await.unwrap();
            respond(stream).await;
            request
        });
        (NodeAddress::new("127.0.0.1", port), handle)
    }

    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_receives_until_peer_closes() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let sink = storage.open_snapshot_sink(&temp).await.unwrap();

        let payload: Vec<u8> = (0..200u8).collect();
        let sent = payload.clone();
        let (addr, server) = serve_once(move |mut stream| async move {
            stream.write_all(&sent).await.unwrap();
        })
        .await;

        let config = TransferConfig {
            buffer_size: 64,
            ..TransferConfig::default()
        };
        let report = receiver(config)
            .receive(&addr, header(), sink, &CancelToken::new())
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert_eq!(RequestHeader::decode(&request).unwrap(), header());
        assert_eq!(report.bytes, 200);
        assert!(report.chunks >= 4);
        assert_eq!(report.digest, blake3::hash(&payload));
        assert_eq!(storage.snapshot_contents(&temp.id).unwrap(), payload);
        assert_eq!(storage.calls().sinks_closed, 1);
    }

    #[tokio::test]
    async fn test_connect_failure_closes_sink() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let sink = storage.open_snapshot_sink(&temp).await.unwrap();
        let addr = NodeAddress::new("127.0.0.1", unused_port().await);

        let result = receiver(TransferConfig::default())
            .receive(&addr, header(), sink, &CancelToken::new())
            .await;

        assert!(matches!(result, Err(TransferError::Connect { .. })));
        assert_eq!(storage.calls().sinks_closed, 1);
    }

    #[tokio::test]
    async fn test_reset_mid_stream_fails() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let sink = storage.open_snapshot_sink(&temp).await.unwrap();

        let (addr, server) = serve_once(|mut stream| async move {
            stream.write_all(&[9u8; 10]).await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            stream.set_linger(Some(Duration::ZERO)).unwrap();
            drop(stream);
        })
        .await;

        let result = receiver(TransferConfig::default())
            .receive(&addr, header(), sink, &CancelToken::new())
            .await;
        server.await.unwrap();

        assert!(matches!(result, Err(TransferError::Io(_))));
        assert_eq!(storage.calls().sinks_closed, 1);
    }

    #[tokio::test]
    async fn test_idle_peer_times_out() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let sink = storage.open_snapshot_sink(&temp).await.unwrap();

        let (addr, _server) = serve_once(|stream| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        })
        .await;

        let config = TransferConfig {
            read_idle_timeout: Duration::from_millis(100),
            ..TransferConfig::default()
        };
        let result = receiver(config)
            .receive(&addr, header(), sink, &CancelToken::new())
            .await;

        assert!(matches!(result, Err(TransferError::Timeout(_))));
        assert_eq!(storage.calls().sinks_closed, 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_read() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let sink = storage.open_snapshot_sink(&temp).await.unwrap();

        let (addr, _server) = serve_once(|stream| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        })
        .await;

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = receiver(TransferConfig::default())
            .receive(&addr, header(), sink, &cancel)
            .await;

        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert_eq!(storage.calls().sinks_closed, 1);
    }

    #[tokio::test]
    async fn test_sink_write_failure_fails_stream() {
        let storage = MemoryStorage::new();
        let temp = storage.allocate_temp_snapshot().await.unwrap();
        let sink = storage.open_snapshot_sink(&temp).await.unwrap();
        storage.set_faults(MemoryFaults {
            fail_sink_writes: true,
            ..MemoryFaults::default()
        });

        let (addr, _server) = serve_once(|mut stream| async move {
            let _ = stream.write_all(b"data").await;
        })
        .await;

        let result = receiver(TransferConfig::default())
            .receive(&addr, header(), sink, &CancelToken::new())
            .await;

        assert!(matches!(
            result,
            Err(TransferError::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(storage.calls().sinks_closed, 1);
    }
}
