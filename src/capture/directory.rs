//! Replays a directory of JPEG files as a looping camera feed

use super::{CaptureError, FramePacer, FrameSource, PixelFormat, RawFrame};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cycles through the `*.jpg` / `*.jpeg` files of a directory in name order
pub struct JpegDirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
    max_size: usize,
    pacer: FramePacer,
    buffer: Vec<u8>,
}

impl JpegDirectorySource {
    /// Scans `dir` for JPEG files.
    ///
    /// `width` and `height` are reported with every frame; the files are
    /// passed through without decoding.
    pub fn new<P: AsRef<Path>>(
        dir: P,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, CaptureError> {
        let dir = dir.as_ref().to_path_buf();

        let mut files = Vec::new();
        let mut max_size = 0usize;
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && is_jpeg_path(&path) {
                max_size = max_size.max(std::fs::metadata(&path)?.len() as usize);
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(CaptureError::Exhausted(dir));
        }
        files.sort();

        debug!(dir = %dir.display(), files = files.len(), "JPEG directory source ready");

        Ok(Self {
            dir,
            files,
            next: 0,
            width,
            height,
            max_size,
            pacer: FramePacer::new(fps),
            buffer: Vec::with_capacity(max_size),
        })
    }

    /// Number of frames in one loop
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

impl FrameSource for JpegDirectorySource {
    fn grab_frame(&mut self) -> Result<RawFrame<'_>, CaptureError> {
        self.pacer.wait();

        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();

        let data = std::fs::read(path)?;
        if data.is_empty() {
            return Err(CaptureError::InvalidFrame(format!(
                "{} is empty",
                path.display()
            )));
        }
        self.buffer = data;

        Ok(RawFrame {
            data: &self.buffer,
            width: self.width,
            height: self.height,
            format: PixelFormat::Jpeg,
        })
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Jpeg
    }

    fn max_frame_size(&self) -> usize {
        self.max_size
    }
}

impl std::fmt::Debug for JpegDirectorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpegDirectorySource")
            .field("dir", &self.dir)
            .field("files", &self.files.len())
            .field("next", &self.next)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), [0xFF, 0xD8, 2]).unwrap();
        fs::write(dir.path().join("a.JPEG"), [0xFF, 0xD8, 1]).unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let mut source = JpegDirectorySource::new(dir.path(), 640, 480, 120).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.max_frame_size(), 3);

        let seen: Vec<u8> = (0..4).map(|_| source.grab_frame().unwrap().data[2]).collect();
        assert_eq!(seen, vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = JpegDirectorySource::new(dir.path(), 640, 480, 5);
        assert!(matches!(result, Err(CaptureError::Exhausted(_))));
    }

    #[test]
    fn test_missing_directory() {
        let result = JpegDirectorySource::new("/nonexistent/frames", 640, 480, 5);
        assert!(matches!(result, Err(CaptureError::Io(_))));
    }
}
