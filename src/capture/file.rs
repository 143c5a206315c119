use super::{decode, ImageSource, PendingReply};
use crate::error::{DetectError, Result};
use image::DynamicImage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_millis(5000);

/// Image stored on a filesystem (local disk, or a mount the camera writes to)
pub struct FileSource {
    path: PathBuf,
    timeout: Duration,
    pending: PendingReply<io::Result<Vec<u8>>>,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout: DEFAULT_LOAD_TIMEOUT,
            pending: PendingReply::new(),
        }
    }

    /// Give up on reads that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file on a helper thread so a stalled mount cannot hang
    /// the caller past the timeout. A read that timed out must finish before
    /// another one is started.
    fn read(&mut self, location: &str) -> Result<Vec<u8>> {
        self.pending.ready(location)?;

        let (tx, rx) = mpsc::channel();
        let path = self.path.clone();
        thread::Builder::new()
            .name("image-loader".into())
            .spawn(move || {
                // Receiver may be gone if the source was dropped
                let _ = tx.send(fs::read(path));
            })
            .map_err(|err| DetectError::not_found(location, err))?;

        self.pending
            .wait(rx, location, self.timeout)?
            .map_err(|err| DetectError::not_found(location, err))
    }
}

impl ImageSource for FileSource {
    fn load(&mut self) -> Result<DynamicImage> {
        let _span = tracing::debug_span!("load", path = %self.path.display()).entered();

        let location = self.describe();
        let bytes = self.read(&location)?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), location);

        decode(&bytes, &location)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Encoded image bytes already in memory, e.g. the body of a snapshot request
pub struct MemorySource {
    label: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }
}

impl ImageSource for MemorySource {
    fn load(&mut self) -> Result<DynamicImage> {
        decode(&self.bytes, &self.label)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
