//! Length-prefixed JSON framing over loopback TCP.
//!
//! The inbound side binds and accepts any number of producers (pull); the outbound
//! side connects to exactly one consumer (push).

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{DetokenizerError, DetokenizerResult};
use crate::io_struct::{BatchStrOut, BatchTokenIdOut, WIRE_VERSION, WireRecord};

const FRAME_HEADER_LEN: usize = 4;
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Read one frame. `Ok(None)` means the peer closed cleanly between frames.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> io::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "connection closed after {} of {} frame header bytes",
                    filled, FRAME_HEADER_LEN
                ),
            ));
        }
        filled += n;
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit of {}", len, max_frame_size),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Bytes::from(payload)))
}

/// Write one frame with a single write so a frame is never interleaved.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "frame larger than 4 GiB")
    })?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await
}

pub fn encode_record<T: Serialize>(record: &T) -> DetokenizerResult<Vec<u8>> {
    serde_json::to_vec(&WireRecord {
        version: WIRE_VERSION,
        record,
    })
    .map_err(|e| DetokenizerError::protocol(format!("failed to encode record: {}", e)))
}

pub fn decode_record<T: DeserializeOwned>(payload: &[u8]) -> DetokenizerResult<T> {
    let wire: WireRecord<T> = serde_json::from_slice(payload)
        .map_err(|e| DetokenizerError::protocol(format!("malformed record: {}", e)))?;
    if wire.version != WIRE_VERSION {
        return Err(DetokenizerError::protocol(format!(
            "unsupported wire version {} (expected {})",
            wire.version, WIRE_VERSION
        )));
    }
    Ok(wire.record)
}

/// Receives batches from the scheduler side.
pub struct InboundReceiver {
    frames: mpsc::Receiver<io::Result<Bytes>>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl InboundReceiver {
    pub async fn bind(addr: &str, capacity: usize, max_frame_size: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Detokenizer listening for batches on {}", local_addr);

        let (tx, frames) = mpsc::channel(capacity);
        let accept_task = tokio::spawn(accept_loop(listener, tx, max_frame_size));

        Ok(Self {
            frames,
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Suspend until the next batch arrives.
    pub async fn recv_batch(&mut self) -> DetokenizerResult<BatchTokenIdOut> {
        let payload = match self.frames.recv().await {
            Some(Ok(payload)) => payload,
            Some(Err(e)) => {
                return Err(DetokenizerError::protocol(format!(
                    "unreadable frame: {}",
                    e
                )));
            }
            None => return Err(DetokenizerError::ChannelClosed),
        };
        let batch: BatchTokenIdOut = decode_record(&payload)?;
        batch.validate().map_err(DetokenizerError::protocol)?;
        Ok(batch)
    }
}

impl Drop for InboundReceiver {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<io::Result<Bytes>>,
    max_frame_size: usize,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Accepted producer connection from {}", peer);
                tokio::spawn(read_connection(stream, tx.clone(), max_frame_size));
            }
            Err(e) => {
                warn!("Failed to accept producer connection: {}", e);
            }
        }
        if tx.is_closed() {
            break;
        }
    }
}

async fn read_connection(
    mut stream: TcpStream,
    tx: mpsc::Sender<io::Result<Bytes>>,
    max_frame_size: usize,
) {
    loop {
        match read_frame(&mut stream, max_frame_size).await {
            Ok(Some(payload)) => {
                // bounded send: blocks the producer when we fall behind
                if tx.send(Ok(payload)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("Producer connection closed");
                break;
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

/// Sends detokenized batches to the single downstream consumer.
pub struct OutboundSender {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl OutboundSender {
    /// Connect, retrying until `timeout` elapses since the consumer may come up after us.
    pub async fn connect(addr: &str, timeout: Duration) -> io::Result<Self> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    let peer_addr = stream.peer_addr()?;
                    info!("Detokenizer connected to consumer at {}", peer_addr);
                    return Ok(Self { stream, peer_addr });
                }
                Err(e) if tokio::time::Instant::now() + CONNECT_RETRY_INTERVAL < deadline => {
                    debug!("Consumer at {} not reachable yet: {}", addr, e);
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub async fn send_batch(&mut self, batch: &BatchStrOut) -> DetokenizerResult<()> {
        let payload = encode_record(batch)?;
        write_frame(&mut self.stream, &payload).await?;
        Ok(())
    }
}
