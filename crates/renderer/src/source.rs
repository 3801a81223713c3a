//! Image intake.
//!
//! [`decode_image`] is the synchronous boundary: encoded bytes in, RGBA8
//! pixels out, `ImageDecode` on anything unreadable. [`ImageLoader`] wraps
//! it in a worker thread for uploads that arrive while the viewer is
//! running; every request gets a fresh id and only the most recent
//! request's completion is ever surfaced, so a slow stale decode can never
//! clobber a newer upload.

use std::thread;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::error::EffectError;

/// Decoded pixels ready for GPU upload. Tightly packed RGBA8 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSource {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decodes encoded image bytes (JPEG/PNG/GIF/WEBP per the enabled
/// decoders). Corrupt bytes or an unsupported container fail with
/// [`EffectError::ImageDecode`]; the caller's pipeline state is untouched.
pub fn decode_image(bytes: &[u8]) -> Result<PixelSource, EffectError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(PixelSource {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Identifies one decode request; newer requests supersede older ones.
pub type RequestId = u64;

struct DecodeJob {
    id: RequestId,
    bytes: Vec<u8>,
}

struct DecodeOutcome {
    id: RequestId,
    result: Result<PixelSource, EffectError>,
}

/// Background image decoder with stale-completion cancellation.
pub struct ImageLoader {
    jobs: Sender<DecodeJob>,
    outcomes: Receiver<DecodeOutcome>,
    next_id: RequestId,
    pending: Option<RequestId>,
}

impl ImageLoader {
    /// Spawns the decode worker. The worker exits when the loader drops.
    pub fn spawn() -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<DecodeJob>();
        let (outcome_tx, outcome_rx) = unbounded();

        thread::Builder::new()
            .name("glaze-decode".into())
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let result = decode_image(&job.bytes);
                    if outcome_tx.send(DecodeOutcome { id: job.id, result }).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| anyhow!("failed to spawn decode worker: {err}"))?;

        Ok(Self {
            jobs: job_tx,
            outcomes: outcome_rx,
            next_id: 0,
            pending: None,
        })
    }

    /// Queues a decode of `bytes` and makes it the only request whose
    /// completion will be surfaced.
    pub fn request(&mut self, bytes: Vec<u8>) -> Result<RequestId> {
        self.next_id += 1;
        let id = self.next_id;
        self.pending = Some(id);
        self.jobs
            .send(DecodeJob { id, bytes })
            .map_err(|_| anyhow!("decode worker is no longer running"))?;
        Ok(id)
    }

    /// Drains finished decodes, returning the pending request's result if
    /// it has arrived. Completions for superseded requests are discarded.
    pub fn poll(&mut self) -> Option<Result<PixelSource, EffectError>> {
        while let Ok(outcome) = self.outcomes.try_recv() {
            if Some(outcome.id) == self.pending {
                self.pending = None;
                return Some(outcome.result);
            }
            debug!(request = outcome.id, "dropping stale image decode completion");
        }
        None
    }

    /// Whether a request is still waiting on the worker.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let pixels = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn poll_until(loader: &mut ImageLoader) -> Result<PixelSource, EffectError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = loader.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "decode worker never answered");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn decodes_png_bytes_with_correct_dimensions() {
        let source = decode_image(&encode_png(17, 9)).unwrap();
        assert_eq!((source.width, source.height), (17, 9));
        assert_eq!(source.pixels.len(), 17 * 9 * 4);
    }

    #[test]
    fn corrupt_bytes_fail_with_image_decode() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, EffectError::ImageDecode(_)));
    }

    #[test]
    fn truncated_image_fails_rather_than_panicking() {
        let mut bytes = encode_png(32, 32);
        bytes.truncate(bytes.len() / 2);
        assert!(decode_image(&bytes).is_err());
    }

    #[test]
    fn loader_surfaces_the_pending_request() {
        let mut loader = ImageLoader::spawn().unwrap();
        loader.request(encode_png(4, 6)).unwrap();
        let source = poll_until(&mut loader).unwrap();
        assert_eq!((source.width, source.height), (4, 6));
        assert!(!loader.is_pending());
    }

    #[test]
    fn newer_request_supersedes_an_in_flight_one() {
        let mut loader = ImageLoader::spawn().unwrap();
        loader.request(encode_png(100, 100)).unwrap();
        loader.request(encode_png(7, 3)).unwrap();

        // The worker answers in submission order; the first completion must
        // be swallowed and only the newest request may become active.
        let source = poll_until(&mut loader).unwrap();
        assert_eq!((source.width, source.height), (7, 3));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn failed_decode_is_surfaced_for_the_pending_request() {
        let mut loader = ImageLoader::spawn().unwrap();
        loader.request(b"garbage".to_vec()).unwrap();
        let result = poll_until(&mut loader);
        assert!(matches!(result, Err(EffectError::ImageDecode(_))));
    }
}
