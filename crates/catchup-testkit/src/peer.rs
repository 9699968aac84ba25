//! A scriptable serving peer.
//!
//! [`FakePeer`] listens on a loopback port, decodes each request header,
//! and answers according to the [`PeerAction`] scripted for the requested
//! stream type. Streams without a script get an empty response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use catchup_core::{
    NodeAddress, NodeState, RequestHeader, StreamType, SyncMode, TransactionId, HEADER_LEN,
};

/// How the peer answers one request.
#[derive(Debug, Clone)]
pub enum PeerAction {
    /// Send the bytes, then close cleanly.
    Send(Vec<u8>),
    /// Send the bytes, then reset the connection.
    Reset(Vec<u8>),
    /// Send nothing for the given time, then close cleanly.
    Stall(Duration),
}

#[derive(Default)]
struct PeerLog {
    connections: usize,
    requests: Vec<RequestHeader>,
}

/// Loopback peer answering catch-up requests from a script.
pub struct FakePeer {
    port: u16,
    log: Arc<Mutex<PeerLog>>,
    task: JoinHandle<()>,
}

impl FakePeer {
    /// Bind to an ephemeral loopback port and start serving.
    pub async fn start(
        script: impl IntoIterator<Item = (StreamType, PeerAction)>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding fake peer")?;
        let port = listener.local_addr()?.port();
        let script: Arc<HashMap<_, _>> = Arc::new(script.into_iter().collect());
        let log = Arc::new(Mutex::new(PeerLog::default()));

        let task = tokio::spawn(accept_loop(listener, script, Arc::clone(&log)));
        Ok(Self { port, log, task })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn address(&self) -> NodeAddress {
        NodeAddress::new("127.0.0.1", self.port)
    }

    /// A peer record pointing at this listener as its sync port.
    pub fn node_state(&self, mode: SyncMode, transaction_id: TransactionId) -> NodeState {
        NodeState::new(NodeAddress::new("127.0.0.1", 1), self.port, mode, transaction_id)
    }

    /// Headers received so far, in arrival order.
    pub fn requests(&self) -> Vec<RequestHeader> {
        self.log_ref().requests.clone()
    }

    /// Number of accepted connections.
    pub fn connections(&self) -> usize {
        self.log_ref().connections
    }

    fn log_ref(&self) -> std::sync::MutexGuard<'_, PeerLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FakePeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    script: Arc<HashMap<StreamType, PeerAction>>,
    log: Arc<Mutex<PeerLog>>,
) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "fake peer accept failed");
                continue;
            }
        };
        log.lock().unwrap_or_else(PoisonError::into_inner).connections += 1;

        let script = Arc::clone(&script);
        let log = Arc::clone(&log);
        tokio::spawn(async move {
            if let Err(e) = serve(stream, &script, &log).await {
                tracing::warn!(error = %e, "fake peer connection failed");
            }
        });
    }
}

async fn serve(
    mut stream: TcpStream,
    script: &HashMap<StreamType, PeerAction>,
    log: &Mutex<PeerLog>,
) -> anyhow::Result<()> {
    let mut buf = [0u8; HEADER_LEN];
    stream
        .read_exact(&mut buf)
        .await
        .context("reading request header")?;
    let header = RequestHeader::decode(&buf)?;
    tracing::debug!(stream = %header.stream_type, header = %header.to_hex(), "fake peer request");
    log.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .requests
        .push(header);

    match script.get(&header.stream_type) {
        None => {}
        Some(PeerAction::Send(bytes)) => {
            stream.write_all(bytes).await?;
            stream.shutdown().await?;
        }
        Some(PeerAction::Reset(bytes)) => {
            stream.write_all(bytes).await?;
            stream.flush().await?;
            // Give the client time to drain the bytes before the RST.
            tokio::time::sleep(Duration::from_millis(50)).await;
            stream.set_linger(Some(Duration::ZERO))?;
        }
        Some(PeerAction::Stall(duration)) => {
            tokio::time::sleep(*duration).await;
        }
    }
    Ok(())
}
