// THEORY:
// The `frame` module is the bridge between a decoded raster and the analyzers. It
// replaces per-pixel accessor objects with a borrowed view over one contiguous,
// row-major RGB or RGBA buffer, plus a strided sampler that walks that buffer
// without materialising anything.
//
// Key architectural principles:
// 1.  **Borrow, never copy**: `FrameView` holds `&[u8]`. The caller owns the pixels
//     for the duration of one analysis call and the engine never mutates them.
// 2.  **Validated once**: the buffer length is checked against the dimensions when the
//     view is constructed. After that, `rgb_at` is plain index arithmetic.
// 3.  **Strided sampling**: `PixelSampler` yields every n-th pixel of a rectangular
//     region. Strides trade accuracy for throughput and are configured per stage.

use crate::core_modules::pixel::pixel::{Brightness, Rgb};
use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Channel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub const fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// Errors raised while wrapping a raw buffer. The analyzers themselves never fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer holds {actual} bytes but {width}x{height} {layout:?} needs {expected}")]
    BufferSizeMismatch {
        width: u32,
        height: u32,
        layout: PixelLayout,
        expected: usize,
        actual: usize,
    },
    #[error("frame dimensions {width}x{height} overflow the address space")]
    DimensionOverflow { width: u32, height: u32 },
}

fn expected_len(width: u32, height: u32, layout: PixelLayout) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(layout.channels()))
        .ok_or(FrameError::DimensionOverflow { width, height })
}

/// A read-only view over a row-major pixel buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl<'a> FrameView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, layout: PixelLayout) -> Result<Self, FrameError> {
        let expected = expected_len(width, height, layout)?;
        if data.len() != expected {
            return Err(FrameError::BufferSizeMismatch {
                width,
                height,
                layout,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height, layout })
    }

    pub fn from_rgb_image(image: &'a RgbImage) -> Self {
        Self {
            data: image.as_raw(),
            width: image.width(),
            height: image.height(),
            layout: PixelLayout::Rgb,
        }
    }

    pub fn from_rgba_image(image: &'a RgbaImage) -> Self {
        Self {
            data: image.as_raw(),
            width: image.width(),
            height: image.height(),
            layout: PixelLayout::Rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reads the pixel at `(x, y)`. Coordinates must lie inside the frame.
    #[inline]
    pub fn rgb_at(&self, x: u32, y: u32) -> Rgb {
        let index = (y as usize * self.width as usize + x as usize) * self.layout.channels();
        Rgb::new(self.data[index], self.data[index + 1], self.data[index + 2])
    }

    #[inline]
    pub fn brightness_at(&self, x: u32, y: u32) -> Brightness {
        self.rgb_at(x, y).brightness()
    }

    /// Every `stride`-th pixel of the given rows, across the full width.
    pub fn sample(&self, rows: Range<u32>, stride: u32) -> PixelSampler<'a> {
        self.sample_region(0..self.width, rows, stride, stride)
    }

    /// Every `stride_x`-th column and `stride_y`-th row of a rectangular region.
    /// The region is clipped to the frame; a zero stride is treated as 1.
    pub fn sample_region(&self, cols: Range<u32>, rows: Range<u32>, stride_x: u32, stride_y: u32) -> PixelSampler<'a> {
        let col_end = cols.end.min(self.width);
        let row_end = rows.end.min(self.height);
        PixelSampler {
            frame: *self,
            col_start: cols.start,
            col_end,
            row_end,
            stride_x: stride_x.max(1),
            stride_y: stride_y.max(1),
            x: cols.start,
            y: rows.start,
        }
    }
}

/// One sampled pixel with its coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub x: u32,
    pub y: u32,
    pub pixel: Rgb,
}

/// Strided, row-major iteration over a frame region.
#[derive(Debug, Clone)]
pub struct PixelSampler<'a> {
    frame: FrameView<'a>,
    col_start: u32,
    col_end: u32,
    row_end: u32,
    stride_x: u32,
    stride_y: u32,
    x: u32,
    y: u32,
}

impl Iterator for PixelSampler<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.col_start >= self.col_end {
            return None;
        }
        while self.y < self.row_end {
            if self.x < self.col_end {
                let sample = Sample {
                    x: self.x,
                    y: self.y,
                    pixel: self.frame.rgb_at(self.x, self.y),
                };
                self.x = self.x.saturating_add(self.stride_x);
                return Some(sample);
            }
            self.x = self.col_start;
            self.y = self.y.saturating_add(self.stride_y);
        }
        None
    }
}

/// An owned frame, used where analysis has to cross a thread or task boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl OwnedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout) -> Result<Self, FrameError> {
        FrameView::new(&data, width, height, layout)?;
        Ok(Self { data, width, height, layout })
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            layout: PixelLayout::Rgb,
        }
    }

    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        Self::from_rgb_image(image.to_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            data: &self.data,
            width: self.width,
            height: self.height,
            layout: self.layout,
        }
    }
}
