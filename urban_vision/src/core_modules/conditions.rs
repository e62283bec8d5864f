// THEORY:
// Lighting and weather are guessed from a single stride-2 pass over the frame. The
// pass counts dark, very dark, light, gray, blue and sodium-yellow pixels; the
// estimates are then fixed rule chains over those ratios and the mean brightness.
//
// The engine never reads the clock. Rules that depend on the time of day only fire
// when the caller supplies `hour_of_day`, which keeps analysis deterministic.

use crate::config::ConditionsConfig;
use crate::core_modules::frame::FrameView;
use crate::core_modules::utils::stats::ratio;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    NightStreetLit,
    Night,
    Sunny,
    Daytime,
    Cloudy,
    DuskOrDawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Foggy,
    Overcast,
    Rainy,
    Clear,
    PartlyCloudy,
    Night,
    LightClouds,
}

/// Pixel-class ratios of the conditions pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LightingRatios {
    /// Integer mean of the per-channel averages, 0..255.
    pub brightness: i32,
    pub dark: f64,
    pub very_dark: f64,
    pub light: f64,
    pub gray: f64,
    pub blue: f64,
    pub yellow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionsResult {
    pub time_of_day: TimeOfDay,
    pub weather: Weather,
    pub ratios: LightingRatios,
}

fn is_night_hour(hour_of_day: Option<u8>) -> bool {
    hour_of_day.is_some_and(|hour| hour < 6 || hour >= 20)
}

pub fn sample_lighting(frame: &FrameView, cfg: &ConditionsConfig) -> LightingRatios {
    let mut sums = [0u64; 3];
    let mut samples = 0;
    let (mut dark, mut very_dark, mut light, mut gray, mut blue, mut yellow) = (0, 0, 0, 0, 0, 0);

    for sample in frame.sample(0..frame.height(), cfg.sample_stride) {
        let pixel = sample.pixel;
        let (r, g, b) = pixel.channels();
        sums[0] += r as u64;
        sums[1] += g as u64;
        sums[2] += b as u64;
        samples += 1;

        let brightness = pixel.brightness();
        if brightness < 30 {
            very_dark += 1;
        }
        if brightness < 60 {
            dark += 1;
        }
        if brightness > 200 {
            light += 1;
        }
        if pixel.chroma() < 30 {
            gray += 1;
        }
        if b > r + 30 && b > g + 20 && b > 100 {
            blue += 1;
        }
        if r > 150 && g > 100 && b < 100 {
            yellow += 1;
        }
    }

    let brightness = if samples == 0 {
        0
    } else {
        let mean = |sum: u64| (sum / samples as u64) as i32;
        (mean(sums[0]) + mean(sums[1]) + mean(sums[2])) / 3
    };

    LightingRatios {
        brightness,
        dark: ratio(dark, samples),
        very_dark: ratio(very_dark, samples),
        light: ratio(light, samples),
        gray: ratio(gray, samples),
        blue: ratio(blue, samples),
        yellow: ratio(yellow, samples),
    }
}

pub fn classify_conditions(ratios: LightingRatios, hour_of_day: Option<u8>) -> ConditionsResult {
    let brightness = ratios.brightness;
    let night_by_clock = is_night_hour(hour_of_day);
    let image_dark = ratios.very_dark > 0.3 || (brightness < 50 && ratios.dark > 0.5);
    let image_bright = brightness > 150 && ratios.light > 0.2;
    let street_lights = ratios.yellow > 0.05 && ratios.dark > 0.3;

    let time_of_day = if image_dark && street_lights {
        TimeOfDay::NightStreetLit
    } else if image_dark || (night_by_clock && brightness < 100) {
        TimeOfDay::Night
    } else if image_bright && ratios.blue > 0.1 {
        TimeOfDay::Sunny
    } else if brightness > 120 {
        TimeOfDay::Daytime
    } else if brightness > 80 {
        TimeOfDay::Cloudy
    } else {
        TimeOfDay::DuskOrDawn
    };

    let weather = if ratios.gray > 0.6 && brightness < 100 {
        Weather::Foggy
    } else if ratios.gray > 0.5 {
        Weather::Overcast
    } else if ratios.dark > 0.7 && !night_by_clock && !image_dark {
        Weather::Rainy
    } else if ratios.blue > 0.15 && brightness > 150 {
        Weather::Clear
    } else if ratios.blue > 0.08 {
        Weather::PartlyCloudy
    } else if image_dark {
        Weather::Night
    } else {
        Weather::LightClouds
    };

    ConditionsResult { time_of_day, weather, ratios }
}

pub fn estimate_conditions(frame: &FrameView, cfg: &ConditionsConfig, hour_of_day: Option<u8>) -> ConditionsResult {
    let result = classify_conditions(sample_lighting(frame, cfg), hour_of_day);
    debug!(time = ?result.time_of_day, weather = ?result.weather, brightness = result.ratios.brightness, "conditions estimated");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb as ImageRgb, RgbImage};

    fn conditions(pixel: [u8; 3], hour: Option<u8>) -> ConditionsResult {
        let image = RgbImage::from_pixel(40, 40, ImageRgb(pixel));
        estimate_conditions(&FrameView::from_rgb_image(&image), &ConditionsConfig::default(), hour)
    }

    #[test]
    fn black_frame_is_night() {
        let result = conditions([0, 0, 0], None);
        assert_eq!(result.time_of_day, TimeOfDay::Night);
        // Uniform black is also fully gray.
        assert_eq!(result.weather, Weather::Foggy);
    }

    #[test]
    fn bright_blue_sky_is_sunny_and_clear() {
        let image = RgbImage::from_fn(40, 40, |_, y| if y < 20 { ImageRgb([120, 190, 250]) } else { ImageRgb([240, 240, 240]) });
        let result = estimate_conditions(&FrameView::from_rgb_image(&image), &ConditionsConfig::default(), Some(12));
        assert_eq!(result.time_of_day, TimeOfDay::Sunny);
        assert_eq!(result.weather, Weather::Clear);
    }

    #[test]
    fn clock_only_matters_when_supplied() {
        let ratios = LightingRatios { brightness: 90, gray: 0.2, ..Default::default() };
        assert_eq!(classify_conditions(ratios, None).time_of_day, TimeOfDay::Cloudy);
        assert_eq!(classify_conditions(ratios, Some(12)).time_of_day, TimeOfDay::Cloudy);
        assert_eq!(classify_conditions(ratios, Some(22)).time_of_day, TimeOfDay::Night);
        assert_eq!(classify_conditions(ratios, Some(5)).time_of_day, TimeOfDay::Night);
    }

    #[test]
    fn street_lights_in_the_dark() {
        let ratios = LightingRatios { brightness: 40, very_dark: 0.6, dark: 0.8, yellow: 0.1, ..Default::default() };
        let result = classify_conditions(ratios, None);
        assert_eq!(result.time_of_day, TimeOfDay::NightStreetLit);
        assert_eq!(result.weather, Weather::Night);
    }

    #[test]
    fn dark_daytime_frames_read_as_rain() {
        let ratios = LightingRatios { brightness: 55, dark: 0.8, very_dark: 0.1, ..Default::default() };
        assert_eq!(classify_conditions(ratios, Some(14)).weather, Weather::Rainy);
        assert_eq!(classify_conditions(ratios, Some(23)).weather, Weather::LightClouds);
    }
}
