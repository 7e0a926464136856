//! Video frame types and processing

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel data (width * height * channels)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

/// Buffer length for a frame, computed in `usize`
fn buffer_len(width: u32, height: u32, format: PixelFormat) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(format.channels())
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgb24,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a black RGB frame
    pub fn blank(width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self::new(
            vec![0; buffer_len(width, height, PixelFormat::Rgb24)],
            width,
            height,
            timestamp_ns,
            sequence,
        )
    }

    /// Get pixel at (x, y) as RGB
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        match self.format {
            PixelFormat::Rgb24 => {
                let idx = (y as usize * self.width as usize + x as usize) * 3;
                let px = self.data.get(idx..idx + 3)?;
                Some([px[0], px[1], px[2]])
            }
            PixelFormat::Gray8 => {
                let v = *self.data.get(y as usize * self.width as usize + x as usize)?;
                Some([v, v, v])
            }
        }
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        if self.format == PixelFormat::Gray8 {
            return self.data.clone();
        }
        let mut gray = Vec::with_capacity(buffer_len(self.width, self.height, PixelFormat::Gray8));
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Single-channel copy of this frame, as landmark detectors consume it
    pub fn to_gray_frame(&self) -> VideoFrame {
        VideoFrame {
            data: self.to_grayscale(),
            width: self.width,
            height: self.height,
            format: PixelFormat::Gray8,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Resize frame (nearest neighbour)
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let channels = self.format.channels();
        let mut resized = Vec::with_capacity(buffer_len(new_width, new_height, self.format));

        let x_ratio = self.width as f32 / new_width as f32;
        let y_ratio = self.height as f32 / new_height as f32;

        for y in 0..new_height {
            for x in 0..new_width {
                let x0 = ((x as f32 * x_ratio).floor() as u32).min(self.width.saturating_sub(1));
                let y0 = ((y as f32 * y_ratio).floor() as u32).min(self.height.saturating_sub(1));
                let idx = (y0 as usize * self.width as usize + x0 as usize) * channels;
                match self.data.get(idx..idx + channels) {
                    Some(px) => resized.extend_from_slice(px),
                    None => resized.extend(std::iter::repeat(0).take(channels)),
                }
            }
        }

        VideoFrame {
            data: resized,
            width: new_width,
            height: new_height,
            format: self.format,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        VideoFrame::new(data, width, height, 0, 0)
    }

    #[test]
    fn test_get_pixel_bounds() {
        let frame = gradient(4, 3);
        assert_eq!(frame.get_pixel(2, 1), Some([2, 1, 0]));
        assert_eq!(frame.get_pixel(4, 0), None);
        assert_eq!(frame.get_pixel(0, 3), None);
    }

    #[test]
    fn test_grayscale_length() {
        let frame = gradient(8, 6);
        assert_eq!(frame.to_grayscale().len(), 48);

        let white = VideoFrame::new(vec![255; 12], 2, 2, 0, 0);
        assert!(white.to_grayscale().iter().all(|&v| v >= 254));
    }

    #[test]
    fn test_gray_frame_keeps_metadata() {
        let frame = VideoFrame::new(vec![255, 255, 255, 0, 0, 0], 2, 1, 9, 4);
        let gray = frame.to_gray_frame();
        assert_eq!(gray.format, PixelFormat::Gray8);
        assert_eq!((gray.width, gray.height, gray.sequence, gray.timestamp_ns), (2, 1, 4, 9));
        assert_eq!(gray.data.len(), 2);
        assert_eq!(gray.get_pixel(1, 0), Some([0, 0, 0]));

        let half = gray.resize(1, 1);
        assert_eq!(half.data.len(), 1);
        assert_eq!(half.format, PixelFormat::Gray8);
    }

    #[test]
    fn test_buffer_len_does_not_overflow_u32() {
        let expected = usize::try_from(4_800_000_000u64).unwrap_or(usize::MAX);
        assert_eq!(buffer_len(40_000, 40_000, PixelFormat::Rgb24), expected);
        assert_eq!(buffer_len(u32::MAX, u32::MAX, PixelFormat::Rgb24), usize::MAX);
    }

    #[test]
    fn test_resize_keeps_metadata() {
        let frame = VideoFrame::blank(1280, 960, 42, 7);
        let small = frame.resize(640, 480);
        assert_eq!(small.width, 640);
        assert_eq!(small.height, 480);
        assert_eq!(small.data.len(), 640 * 480 * 3);
        assert_eq!(small.timestamp_ns, 42);
        assert_eq!(small.sequence, 7);
    }

    #[test]
    fn test_resize_samples_source() {
        let frame = gradient(4, 4);
        let half = frame.resize(2, 2);
        assert_eq!(half.get_pixel(1, 1), Some([2, 2, 0]));
    }
}
