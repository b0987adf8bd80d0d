//! Portable anymap (P6) writers
//!
//! The PNM observer renders the preference matrix and the dual vector as
//! color images, one frame per outer iteration. Values map onto a
//! blue-white-red ramp centered on a midpoint.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Diverging color ramp: `min` maps to blue, `mid` to white, `max` to red.
#[derive(Debug, Clone, Copy)]
pub struct Colormap {
    min: f64,
    mid: f64,
    max: f64,
}

impl Colormap {
    /// Ramp over `[min, max]` centered on `mid`.
    pub fn new(min: f64, mid: f64, max: f64) -> Self {
        debug_assert!(min < mid && mid < max);
        Colormap { min, mid, max }
    }

    /// Map a value to RGB.
    pub fn rgb(&self, value: f64) -> [u8; 3] {
        let value = value.clamp(self.min, self.max);
        if value < self.mid {
            let t = (value - self.min) / (self.mid - self.min);
            let ramp = (t * 255.0) as u8;
            [ramp, ramp, 255]
        } else {
            let t = (value - self.mid) / (self.max - self.mid);
            let ramp = (255.0 - t * 255.0) as u8;
            [255, ramp, ramp]
        }
    }
}

/// An in-memory RGB image written as one P6 file.
#[derive(Debug)]
pub struct PnmArray {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PnmArray {
    /// Black image of `height` rows by `width` columns.
    pub fn new(height: usize, width: usize) -> Self {
        PnmArray {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Mutable RGB triple at (`row`, `col`).
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> &mut [u8] {
        let at = (row * self.width + col) * 3;
        &mut self.data[at..at + 3]
    }

    /// Write the image to `path`.
    ///
    /// # Errors
    ///
    /// Propagates file creation and write failures.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        out.write_all(&self.data)?;
        out.flush()
    }
}

/// A P6 file written one row per observation, sized up front to the
/// iteration limit.
#[derive(Debug)]
pub struct PnmVector {
    out: BufWriter<File>,
    width: usize,
}

impl PnmVector {
    /// Create the file with `height` rows of `width` pixels.
    ///
    /// # Errors
    ///
    /// Propagates file creation and write failures.
    pub fn create(path: &Path, width: usize, height: usize) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", width, height.max(1))?;
        Ok(PnmVector { out, width })
    }

    /// Append one row of pixels and flush.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn push_row(&mut self, pixels: impl Iterator<Item = [u8; 3]>) -> io::Result<()> {
        let mut written = 0;
        for rgb in pixels.take(self.width) {
            self.out.write_all(&rgb)?;
            written += 1;
        }
        for _ in written..self.width {
            self.out.write_all(&[0, 0, 0])?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colormap_endpoints_and_midpoint() {
        let map = Colormap::new(-5.0, 0.0, 5.0);
        assert_eq!(map.rgb(-5.0), [0, 0, 255]);
        assert_eq!(map.rgb(0.0), [255, 255, 255]);
        assert_eq!(map.rgb(5.0), [255, 0, 0]);
        // Out-of-range values clamp.
        assert_eq!(map.rgb(-100.0), [0, 0, 255]);
    }

    #[test]
    fn pnm_array_writes_a_valid_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.pnm");

        let mut img = PnmArray::new(2, 3);
        img.pixel_mut(1, 2).copy_from_slice(&[9, 8, 7]);
        img.write(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header = b"P6\n3 2\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(bytes.len(), header.len() + 2 * 3 * 3);
        assert_eq!(&bytes[bytes.len() - 3..], &[9, 8, 7]);
    }

    #[test]
    fn pnm_vector_pads_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.pnm");

        let mut vec = PnmVector::create(&path, 3, 2).unwrap();
        vec.push_row([[1, 2, 3]].into_iter()).unwrap();
        drop(vec);

        let bytes = std::fs::read(&path).unwrap();
        let header = b"P6\n3 2\n255\n";
        assert_eq!(&bytes[header.len()..], &[1, 2, 3, 0, 0, 0, 0, 0, 0]);
    }
}
