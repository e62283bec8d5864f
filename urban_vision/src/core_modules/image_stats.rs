// Whole-frame colour statistics, computed over every pixel. These are the numbers a
// report shows next to the scene figures: mean channels, mean luma as a percentage,
// and a coarse luma histogram.

use crate::core_modules::frame::FrameView;
use serde::{Deserialize, Serialize};

/// Luma histogram bins of width 10; the last bin also collects 250..255.
pub const HISTOGRAM_BINS: usize = 26;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicImageStats {
    pub width: u32,
    pub height: u32,
    pub avg_red: u8,
    pub avg_green: u8,
    pub avg_blue: u8,
    /// Mean Rec. 601 luma scaled to 0..100.
    pub avg_brightness_percent: f64,
    pub histogram: [u64; HISTOGRAM_BINS],
}

pub fn compute_image_stats(frame: &FrameView) -> BasicImageStats {
    let mut sums = [0u64; 3];
    let mut luma_sum = 0.0;
    let mut histogram = [0u64; HISTOGRAM_BINS];

    for sample in frame.sample(0..frame.height(), 1) {
        let pixel = sample.pixel;
        sums[0] += pixel.red as u64;
        sums[1] += pixel.green as u64;
        sums[2] += pixel.blue as u64;
        let luma = pixel.luminance();
        luma_sum += luma;
        let bin = ((luma / 10.0) as usize).min(HISTOGRAM_BINS - 1);
        histogram[bin] += 1;
    }

    let pixels = frame.width() as u64 * frame.height() as u64;
    let mean = |sum: u64| if pixels == 0 { 0 } else { (sum / pixels) as u8 };
    let avg_brightness_percent = if pixels == 0 {
        0.0
    } else {
        luma_sum / pixels as f64 * 100.0 / 255.0
    };

    BasicImageStats {
        width: frame.width(),
        height: frame.height(),
        avg_red: mean(sums[0]),
        avg_green: mean(sums[1]),
        avg_blue: mean(sums[2]),
        avg_brightness_percent,
        histogram,
    }
}
