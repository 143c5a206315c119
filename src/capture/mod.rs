#[cfg(feature = "camera")]
mod camera;
mod file;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use file::{FileSource, MemorySource};

use crate::error::{DetectError, Result};
use image::DynamicImage;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Trait for anything that can hand the detector a decoded frame
pub trait ImageSource {
    /// Load one image
    fn load(&mut self) -> Result<DynamicImage>;

    /// Human-readable location, used in logs and errors
    fn describe(&self) -> String;
}

/// Decode an in-memory encoded image, guessing the format from its content
pub(crate) fn decode(bytes: &[u8], location: &str) -> Result<DynamicImage> {
    let image =
        image::load_from_memory(bytes).map_err(|err| DetectError::decode(location, err))?;

    tracing::debug!(
        "Decoded {} as {}x{} {:?}",
        location,
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image)
}

/// Tracks a worker reply the caller stopped waiting for, so a stuck read is
/// never joined by a second one. At most one request is outstanding.
pub(crate) struct PendingReply<T> {
    outstanding: Option<Receiver<T>>,
}

impl<T> PendingReply<T> {
    pub(crate) fn new() -> Self {
        Self { outstanding: None }
    }

    /// Fails while an earlier request has not answered yet. A late answer is
    /// discarded.
    pub(crate) fn ready(&mut self, location: &str) -> Result<()> {
        if let Some(rx) = &self.outstanding {
            match rx.try_recv() {
                Err(TryRecvError::Empty) => {
                    return Err(DetectError::not_found(
                        location,
                        "previous read still pending",
                    ))
                }
                Ok(_) => tracing::debug!("Dropping late reply from {}", location),
                Err(TryRecvError::Disconnected) => {}
            }
        }
        self.outstanding = None;
        Ok(())
    }

    /// Wait up to `timeout` for the reply on `rx`; on timeout keep `rx` around
    /// so the next call can tell whether the worker is still stuck.
    pub(crate) fn wait(
        &mut self,
        rx: Receiver<T>,
        location: &str,
        timeout: Duration,
    ) -> Result<T> {
        match rx.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => {
                self.outstanding = Some(rx);
                Err(DetectError::not_found(
                    location,
                    format!("no data after {}ms", timeout.as_millis()),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(DetectError::not_found(location, "loader thread exited"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn reason(err: DetectError) -> String {
        match err {
            DetectError::SourceNotFound { reason, .. } => reason,
            other => panic!("expected SourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn slow_reply_blocks_the_next_request_until_it_lands() {
        let mut pending = PendingReply::<u32>::new();
        let (tx, rx) = mpsc::channel();

        assert!(pending.ready("camera 0").is_ok());
        let err = pending
            .wait(rx, "camera 0", Duration::from_millis(20))
            .unwrap_err();
        assert!(reason(err).contains("no data after 20ms"));

        let err = pending.ready("camera 0").unwrap_err();
        assert_eq!(reason(err), "previous read still pending");

        // The late reply arrives and is thrown away
        tx.send(7).unwrap();
        assert!(pending.ready("camera 0").is_ok());

        let (tx, rx) = mpsc::channel();
        tx.send(8).unwrap();
        let reply = pending.wait(rx, "camera 0", Duration::from_millis(20));
        assert_eq!(reply.unwrap(), 8);
        assert!(pending.ready("camera 0").is_ok());
    }

    #[test]
    fn dead_worker_is_not_pending() {
        let mut pending = PendingReply::<u32>::new();
        let (tx, rx) = mpsc::channel();
        let held = tx.clone();
        drop(tx);

        assert!(pending.wait(rx, "frame", Duration::from_millis(10)).is_err());
        drop(held);
        assert!(pending.ready("frame").is_ok());

        let (tx, rx) = mpsc::channel::<u32>();
        drop(tx);
        let err = pending
            .wait(rx, "frame", Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(reason(err), "loader thread exited");
    }
}
