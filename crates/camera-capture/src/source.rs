//! Frame sources

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{check_dimensions, CameraError, VideoFrame};

/// File extensions accepted by [`ImageDirSource`]
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A stream of frames. `Ok(None)` means the source is exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Replays a directory of still images, one per frame, in file name order
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    position: usize,
    interval_ns: u64,
}

impl ImageDirSource {
    /// Scan `dir` for images. `fps` sets the synthetic timestamps.
    pub fn open(dir: impl AsRef<Path>, fps: u32) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CameraError::Open(format!("{} is not a directory", dir.display())));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!("no images found in {}", dir.display())));
        }

        info!("Opened image sequence {} ({} frames)", dir.display(), files.len());
        Ok(Self {
            files,
            position: 0,
            interval_ns: 1_000_000_000 / u64::from(fps.max(1)),
        })
    }

    /// Number of frames in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };

        let img = image::open(path).map_err(|e| CameraError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let sequence = self.position as u32;
        self.position += 1;
        debug!("Decoded {} ({}x{})", path.display(), width, height);

        Ok(Some(VideoFrame::new(
            rgb.into_raw(),
            width,
            height,
            u64::from(sequence) * self.interval_ns,
            sequence,
        )))
    }
}

/// Emits `count` black frames. Used when landmarks come from a recorded trace.
pub struct BlankSource {
    width: u32,
    height: u32,
    count: u32,
    position: u32,
    interval_ns: u64,
}

impl BlankSource {
    pub fn new(width: u32, height: u32, count: u32, fps: u32) -> Result<Self, CameraError> {
        check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            count,
            position: 0,
            interval_ns: 1_000_000_000 / u64::from(fps.max(1)),
        })
    }
}

impl FrameSource for BlankSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.position >= self.count {
            return Ok(None);
        }
        let sequence = self.position;
        self.position += 1;
        Ok(Some(VideoFrame::blank(
            self.width,
            self.height,
            u64::from(sequence) * self.interval_ns,
            sequence,
        )))
    }
}
