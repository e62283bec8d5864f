// Synthetic frames shared by the integration tests.
#![allow(dead_code)]

use image::{Rgb, RgbImage};

pub const SKY: [u8; 3] = [135, 180, 220];
pub const ROAD: [u8; 3] = [70, 70, 70];
pub const WHITE: [u8; 3] = [255, 255, 255];

/// A rectangle in image pixels: x, y, width, height.
pub type Patch = (u32, u32, u32, u32);

/// Sky over the top third, flat road below, white patches on top.
pub fn street_scene(width: u32, height: u32, patches: &[Patch]) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let in_patch = patches
            .iter()
            .any(|&(px, py, pw, ph)| (px..px + pw).contains(&x) && (py..py + ph).contains(&y));
        if in_patch {
            Rgb(WHITE)
        } else if y < height / 3 {
            Rgb(SKY)
        } else {
            Rgb(ROAD)
        }
    })
}

/// Up to eight 30x24 patches on the road of a 640x480 frame, 110 px apart
/// horizontally and 96 px apart vertically.
pub fn vehicle_patches(count: usize) -> Vec<Patch> {
    (0..count)
        .map(|i| (60 + (i as u32 % 4) * 140, 220 + (i as u32 / 4) * 120, 30, 24))
        .collect()
}

pub fn flat(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// Deterministic pseudo-random noise (xorshift32).
pub fn noise(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    RgbImage::from_fn(width, height, |_, _| {
        let value = next();
        Rgb([value as u8, (value >> 8) as u8, (value >> 16) as u8])
    })
}

/// A spread of frames covering every scene path.
pub fn assorted_frames() -> Vec<RgbImage> {
    vec![
        street_scene(640, 480, &vehicle_patches(5)),
        street_scene(320, 240, &[]),
        flat(200, 150, SKY),
        flat(120, 90, [0, 0, 0]),
        flat(120, 90, [255, 255, 255]),
        flat(160, 120, [150, 100, 60]),
        flat(160, 120, [60, 140, 50]),
        flat(160, 120, [200, 150, 120]),
        noise(256, 192, 7),
        noise(97, 53, 11),
        flat(1, 1, ROAD),
        flat(3, 500, SKY),
    ]
}
