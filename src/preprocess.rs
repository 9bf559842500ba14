//! Turns uploaded bytes into model input.

use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

use crate::errors::{Error, Result};

/// Batch of one RGB image, laid out `(1, height, width, 3)` with samples in
/// `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    pub fn into_array(self) -> Array4<f32> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageNormalizer {
    width: u32,
    height: u32,
}

impl ImageNormalizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Decode, stretch to the target size, scale to `[0, 1]`.
    ///
    /// Anything but a 3-channel image is rejected: grayscale and images with
    /// an alpha channel fail rather than being converted.
    pub fn normalize(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let img = image::load_from_memory(bytes).map_err(|e| Error::invalid_image(e.to_string()))?;

        let resized = img.resize_exact(self.width, self.height, FilterType::CatmullRom);

        let channels = resized.color().channel_count();
        if channels != 3 {
            return Err(Error::invalid_image(format!(
                "expected 3 channels, got {channels} ({:?})",
                resized.color()
            )));
        }

        Ok(ImageTensor(self.to_tensor(&resized)))
    }

    fn to_tensor(&self, img: &DynamicImage) -> Array4<f32> {
        let rgb = img.to_rgb8();
        let (w, h) = (self.width as usize, self.height as usize);

        let mut tensor = Array4::zeros((1, h, w, 3));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }
        tensor
    }
}
