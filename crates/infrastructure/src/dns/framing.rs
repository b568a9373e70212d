//! DNS-over-TCP message framing (RFC 1035 §4.2.2, reused by RFC 7858)
//!
//! Every message on the client stream is preceded by a 2-byte big-endian
//! length. The declared length is checked against the configured maximum
//! before any payload buffer is allocated.

use bytes::{BufMut, Bytes, BytesMut};
use dot_relay_domain::DomainError;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Prepend the length prefix, producing one contiguous frame.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, DomainError> {
    let length =
        u16::try_from(payload.len()).map_err(|_| DomainError::MessageTooLarge(payload.len()))?;

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.put_u16(length);
    frame.put_slice(payload);
    Ok(frame.freeze())
}

/// Read one complete frame and return its payload.
///
/// A clean EOF before the first length byte yields `ConnectionClosed`; any
/// other short read is an I/O error. Declared lengths above
/// `max_message_size` fail with `FrameTooLarge` without touching the payload.
pub async fn decode_frame<S>(stream: &mut S, max_message_size: usize) -> Result<Bytes, DomainError>
where
    S: AsyncRead + Unpin,
{
    let declared = read_length_prefix(stream).await?;

    if declared > max_message_size {
        return Err(DomainError::FrameTooLarge {
            declared,
            max: max_message_size,
        });
    }

    let mut payload = BytesMut::zeroed(declared);
    stream.read_exact(&mut payload).await.map_err(|e| {
        DomainError::IoError(format!(
            "Failed to read frame payload ({} bytes): {}",
            declared, e
        ))
    })?;

    Ok(payload.freeze())
}

async fn read_length_prefix<S>(stream: &mut S) -> Result<usize, DomainError>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];

    // A TLS peer that drops TCP without close_notify surfaces as
    // UnexpectedEof; between frames that is an ordinary disconnect.
    let n = match stream.read(&mut len_buf).await {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(DomainError::ConnectionClosed);
        }
        Err(e) => return Err(prefix_read_error(e)),
    };

    match n {
        0 => return Err(DomainError::ConnectionClosed),
        1 => {
            stream
                .read_exact(&mut len_buf[1..])
                .await
                .map_err(prefix_read_error)?;
        }
        _ => {}
    }

    Ok(u16::from_be_bytes(len_buf) as usize)
}

fn prefix_read_error(e: io::Error) -> DomainError {
    DomainError::IoError(format!("Failed to read length prefix: {}", e))
}
