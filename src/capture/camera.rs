use super::{ImageSource, PendingReply};
use crate::error::{DetectError, Result};
use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, ImageError, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

type FrameReply = Sender<Result<DynamicImage>>;

/// Single-frame snapshots from a local webcam.
///
/// The camera lives on its own worker thread so a wedged device can only
/// stall that thread; callers give up after the load timeout.
pub struct CameraSource {
    requests: Sender<FrameReply>,
    index: u32,
    timeout: Duration,
    pending: PendingReply<Result<DynamicImage>>,
}

impl CameraSource {
    pub fn new(index: u32, timeout: Duration) -> Result<Self> {
        tracing::info!("Opening webcam {} for snapshots", index);

        let location = format!("camera {}", index);
        let (requests, incoming) = mpsc::channel::<FrameReply>();
        let (opened_tx, opened_rx) = mpsc::channel();

        thread::Builder::new()
            .name(format!("camera-{}", index))
            .spawn(move || run_worker(index, opened_tx, incoming))
            .map_err(|err| DetectError::not_found(&location, err))?;

        // On failure `requests` is dropped here, which ends the worker once
        // it gets that far
        match opened_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(RecvTimeoutError::Timeout) => {
                return Err(DetectError::not_found(
                    location,
                    format!("not open after {}ms", timeout.as_millis()),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(DetectError::not_found(location, "camera worker exited"))
            }
        }

        Ok(Self {
            requests,
            index,
            timeout,
            pending: PendingReply::new(),
        })
    }
}

impl ImageSource for CameraSource {
    fn load(&mut self) -> Result<DynamicImage> {
        let _span = tracing::debug_span!("snapshot", camera = self.index).entered();

        let location = self.describe();
        self.pending.ready(&location)?;

        let (reply, rx) = mpsc::channel();
        self.requests
            .send(reply)
            .map_err(|_| DetectError::not_found(&location, "camera worker exited"))?;

        self.pending.wait(rx, &location, self.timeout)?
    }

    fn describe(&self) -> String {
        format!("camera {}", self.index)
    }
}

fn open(index: u32) -> Result<Camera> {
    let location = format!("camera {}", index);
    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

    let mut camera = Camera::new(CameraIndex::Index(index), requested)
        .map_err(|err| DetectError::not_found(&location, err))?;

    camera
        .open_stream()
        .map_err(|err| DetectError::not_found(&location, err))?;

    let resolution = camera.resolution();
    tracing::info!(
        "Webcam {} streaming at {}x{}",
        index,
        resolution.width(),
        resolution.height()
    );

    Ok(camera)
}

/// Owns the camera; serves one frame per request until the source is dropped
fn run_worker(index: u32, opened: Sender<Result<()>>, requests: Receiver<FrameReply>) {
    let mut camera = match open(index) {
        Ok(camera) => camera,
        Err(err) => {
            let _ = opened.send(Err(err));
            return;
        }
    };
    let _ = opened.send(Ok(()));

    for reply in requests {
        // Caller may have timed out and gone away
        let _ = reply.send(grab(&mut camera, index));
    }

    if let Err(err) = camera.stop_stream() {
        tracing::warn!("Failed to stop camera {} stream: {}", index, err);
    }
}

fn grab(camera: &mut Camera, index: u32) -> Result<DynamicImage> {
    let location = format!("camera {}", index);

    let frame = camera
        .frame()
        .map_err(|err| DetectError::not_found(&location, err))?;

    let decoded = frame
        .decode_image::<RgbFormat>()
        .map_err(|err| DetectError::decode(&location, err))?;

    // Rebuild from raw so we don't depend on nokhwa's image version
    let (width, height) = (decoded.width(), decoded.height());
    let frame = rgb_frame(width, height, decoded.into_raw(), &location)?;

    Ok(DynamicImage::ImageRgb8(frame))
}

fn rgb_frame(width: u32, height: u32, raw: Vec<u8>, location: &str) -> Result<RgbImage> {
    RgbImage::from_raw(width, height, raw).ok_or_else(|| {
        DetectError::decode(
            location,
            ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )),
        )
    })
}
