//! TCP transport: a 4-byte big-endian length prefix around each `codec` frame
//! (§4.2 "Wire transport"), plus the accept-loop/dial helpers built on it.

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::ReplicaError;

/// Writes one length-delimited frame and flushes it.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_u32(frame.len() as u32).await?;
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Reads one length-delimited frame.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let len = reader.read_u32().await?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Dials `addr` and sends a single frame, then closes the connection.
/// Send failures are best-effort (§5, §7): the caller logs and moves on.
pub async fn send_frame(addr: &str, frame: &[u8]) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    write_frame(&mut stream, frame).await
}

/// Binds `addr` and returns the listener, mapping a bind failure to the fatal
/// startup error of §7.
pub async fn bind(addr: &str) -> Result<TcpListener, ReplicaError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ReplicaError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accepts connections on `listener` forever, handing each accepted stream's
/// frames to `on_frame` on its own task. `on_frame` gets one frame per call and
/// is expected to return quickly (dispatch is synchronous; only I/O suspends).
pub async fn serve<F>(listener: TcpListener, on_frame: F)
where
    F: Fn(Vec<u8>) + Clone + Send + 'static,
{
    loop {
        match listener.accept().await {
            Ok((mut stream, peer)) => {
                debug!("accepted connection from {}", peer);
                let on_frame = on_frame.clone();
                tokio::spawn(async move {
                    loop {
                        match read_frame(&mut stream).await {
                            Ok(frame) => on_frame(frame),
                            Err(e) => {
                                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                                    warn!("connection from {} dropped: {}", peer, e);
                                }
                                break;
                            }
                        }
                    }
                });
            }
            Err(e) => warn!("accept failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn frame_round_trips_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream).await.unwrap()
        });

        send_frame(&addr.to_string(), b"REQUEST hello").await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, b"REQUEST hello");
    }
}
