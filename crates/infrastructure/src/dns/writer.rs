use super::framing::encode_frame;
use dot_relay_domain::DomainError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Serialized write side of one client connection.
///
/// Every dispatch for a connection holds a clone. A frame is encoded into a
/// single buffer and written while the lock is held, so two responses can
/// never interleave on the wire.
///
/// A write that fails or is cancelled partway leaves a fragment on the
/// stream. The writer is then poisoned: every later `write_frame` fails at
/// once and the only remaining operation is `shutdown`.
pub struct ResponseWriter<W> {
    shared: Arc<Shared<W>>,
}

struct Shared<W> {
    writer: Mutex<W>,
    poisoned: AtomicBool,
}

impl<W> Clone for ResponseWriter<W> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(writer),
                poisoned: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.shared.poisoned.load(Ordering::Acquire)
    }

    pub async fn write_frame(&self, payload: &[u8]) -> Result<(), DomainError> {
        let frame = encode_frame(payload)?;

        let mut writer = self.shared.writer.lock().await;
        if self.is_poisoned() {
            return Err(poisoned_error());
        }

        // Cleared only once the whole frame is flushed, so a cancelled
        // future leaves the flag set.
        self.shared.poisoned.store(true, Ordering::Release);
        writer
            .write_all(&frame)
            .await
            .map_err(|e| DomainError::IoError(format!("Failed to write response: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| DomainError::IoError(format!("Failed to flush response: {}", e)))?;
        self.shared.poisoned.store(false, Ordering::Release);

        Ok(())
    }

    /// Close the write direction (TLS close_notify, then FIN).
    pub async fn shutdown(&self) -> Result<(), DomainError> {
        let mut writer = self.shared.writer.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| DomainError::IoError(format!("Failed to shut down writer: {}", e)))
    }
}

fn poisoned_error() -> DomainError {
    DomainError::IoError("Response stream holds an incomplete frame".to_string())
}
