// THEORY:
// The colour classifiers are the vocabulary of the whole engine. Each one is a pure,
// O(1) predicate over a single `Rgb` sample that answers "could this pixel be X?".
// The scene classifier, blob detector and density estimators are all built by
// counting how often these predicates fire over a sampled region.
//
// Only the vehicle rule is relative: a pixel is a vehicle candidate because it stands
// out from the locally estimated road surface, not because of its absolute colour.
// Its literals come from `VehicleColorRules` so the drifted variants can be replayed.

use crate::config::{AirQualityConfig, VehicleColorRules};
use crate::core_modules::pixel::pixel::{Brightness, Rgb};

/// Blue sky, or bright low-spread cloud cover.
#[inline]
pub fn is_sky(pixel: Rgb) -> bool {
    let (r, g, b) = pixel.channels();
    let blue_sky = b > 150 && b > r + 20 && b > g - 30 && g > 100;
    let cloudy_sky = r > 180 && g > 180 && b > 180 && (r - g).abs() < 30 && (g - b).abs() < 30;
    blue_sky || cloudy_sky
}

/// Mid-dark, nearly colourless surface such as asphalt.
#[inline]
pub fn is_road(pixel: Rgb) -> bool {
    (40..=120).contains(&pixel.brightness()) && pixel.chroma() < 40
}

#[inline]
pub fn is_skin_tone(pixel: Rgb) -> bool {
    let (r, g, b) = pixel.channels();
    r > 95 && g > 40 && b > 20 && r > g && r > b && (r - g) > 15 && (r - g) < 100 && (r - b) < 100
}

/// Wooden floors and stone interiors.
#[inline]
pub fn is_brown_floor(pixel: Rgb) -> bool {
    let (r, g, b) = pixel.channels();
    r > g && r > b && (80..=200).contains(&r) && (50..=150).contains(&g) && (20..=100).contains(&pixel.chroma())
}

#[inline]
pub fn is_vegetation(pixel: Rgb) -> bool {
    let (r, g, b) = pixel.channels();
    g > r && g > b && g > 80 && pixel.chroma() > 30
}

/// Bright, washed-out pixel typical of haze in the sky region.
#[inline]
pub fn is_gray_haze(pixel: Rgb, rules: &AirQualityConfig) -> bool {
    pixel.chroma() < rules.gray_max_chroma && pixel.luminance() > rules.gray_min_luma
}

/// A gray haze pixel bright enough to count as dense haze or fog.
#[inline]
pub fn is_hazy(pixel: Rgb, rules: &AirQualityConfig) -> bool {
    is_gray_haze(pixel, rules) && pixel.luminance() > rules.hazy_min_luma
}

/// Loose blue-dominance test used for clear-sky estimation.
#[inline]
pub fn is_blue_sky_tint(pixel: Rgb, rules: &AirQualityConfig) -> bool {
    let (r, g, b) = pixel.channels();
    b > r && b > g && b > rules.blue_min
}

/// Decides whether a pixel differs from the road surface in a way a vehicle body would.
#[inline]
pub fn is_vehicle_candidate(pixel: Rgb, road_brightness: Brightness, rules: &VehicleColorRules) -> bool {
    let (r, g, b) = pixel.channels();
    let brightness = pixel.brightness();
    let chroma = pixel.chroma();
    let diff = (brightness - road_brightness).abs();

    if diff < rules.road_tolerance {
        return false;
    }

    let white = brightness > rules.white_min_brightness && chroma < rules.white_max_chroma && diff > rules.white_min_road_diff;
    let dark = brightness < rules.dark_max_brightness && chroma < rules.dark_max_chroma && diff > rules.dark_min_road_diff;
    let red = r > rules.red_min && r > g + rules.red_margin_green && r > b + rules.red_margin_blue;
    let blue = b > rules.blue_min && b > r + rules.blue_margin_red && b > g + rules.blue_margin_green;
    let silver = (rules.silver_min_brightness..=rules.silver_max_brightness).contains(&brightness)
        && chroma < rules.silver_max_chroma
        && diff > rules.silver_min_road_diff;
    let yellow = r > rules.yellow_min_red && g > rules.yellow_min_green && b < rules.yellow_max_blue && chroma > rules.yellow_min_chroma;

    white || dark || red || blue || silver || yellow
}
