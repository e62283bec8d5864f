// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the analysis engine. It is a
// "dumb" value type for a single RGB sample plus the handful of single-pixel
// metrics every higher stage is built from. Nothing here looks at neighbors in
// space; gradients and region statistics live in the 2D modules.
//
// Heuristic families (all single-pixel):
// - Brightness: the integer channel mean `(r+g+b)/3`. Every colour rule in the
//   classifiers is written against this integer form, so it is kept exact.
// - Luminance: Rec. 601 luma, used where perceived brightness matters
//   (haze, contrast, occupancy).
// - Chroma: `max-min` of the channels. For three channels this is also the largest
//   pairwise channel difference, which is how the haze and occupancy rules phrase it.
// - Colour bin: a coarse 8x8x8 quantisation used to measure colour variety.
//
// Key principles:
// 1) Copy semantics: an `Rgb` is three bytes. Hot loops read them straight out of the
//    frame buffer and never allocate.
// 2) Integer arithmetic where the thresholds are integers, so results reproduce
//    exactly across platforms.

pub mod pixel {
    pub type Channel = u8;
    pub type Brightness = i32;
    pub type Chroma = i32;
    pub type Luminance = f64;

    /// Number of quantisation levels per channel for `color_bin`.
    pub const COLOR_BIN_LEVELS: usize = 8;
    /// Total number of distinct colour bins.
    pub const COLOR_BIN_COUNT: usize = COLOR_BIN_LEVELS * COLOR_BIN_LEVELS * COLOR_BIN_LEVELS;

    /// A single 8-bit RGB sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Rgb {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    impl Rgb {
        pub const BLACK: Rgb = Rgb::new(0, 0, 0);

        pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// The channels widened to `i32` for signed threshold arithmetic.
        #[inline]
        pub fn channels(self) -> (i32, i32, i32) {
            (self.red as i32, self.green as i32, self.blue as i32)
        }

        /// Integer channel mean, truncated.
        #[inline]
        pub fn brightness(self) -> Brightness {
            let (r, g, b) = self.channels();
            (r + g + b) / 3
        }

        /// Rec. 601 luma estimate on the 0..255 scale.
        #[inline]
        pub fn luminance(self) -> Luminance {
            0.299_f64 * self.red as f64 + 0.587_f64 * self.green as f64 + 0.114_f64 * self.blue as f64
        }

        /// `max - min` of the channels.
        #[inline]
        pub fn chroma(self) -> Chroma {
            let (r, g, b) = self.channels();
            r.max(g).max(b) - r.min(g).min(b)
        }

        /// Index into an 8x8x8 colour cube.
        #[inline]
        pub fn color_bin(self) -> usize {
            let r = (self.red / 32) as usize;
            let g = (self.green / 32) as usize;
            let b = (self.blue / 32) as usize;
            (r * COLOR_BIN_LEVELS + g) * COLOR_BIN_LEVELS + b
        }
    }

    impl From<[Channel; 3]> for Rgb {
        fn from(bytes: [Channel; 3]) -> Self {
            Rgb::new(bytes[0], bytes[1], bytes[2])
        }
    }

    impl From<Rgb> for [Channel; 3] {
        fn from(pixel: Rgb) -> Self {
            [pixel.red, pixel.green, pixel.blue]
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn brightness_truncates_like_integer_division() {
            assert_eq!(Rgb::new(1, 1, 2).brightness(), 1);
            assert_eq!(Rgb::new(255, 255, 255).brightness(), 255);
            assert_eq!(Rgb::BLACK.brightness(), 0);
        }

        #[test]
        fn chroma_is_largest_pairwise_difference() {
            let pixel = Rgb::new(200, 120, 90);
            assert_eq!(pixel.chroma(), 110);
            assert_eq!(Rgb::new(70, 70, 70).chroma(), 0);
        }

        #[test]
        fn luminance_weights_green_heaviest() {
            assert!(Rgb::new(0, 100, 0).luminance() > Rgb::new(100, 0, 0).luminance());
            assert!((Rgb::new(255, 255, 255).luminance() - 255.0).abs() < 1e-9);
        }

        #[test]
        fn color_bins_cover_the_cube() {
            assert_eq!(Rgb::BLACK.color_bin(), 0);
            assert_eq!(Rgb::new(255, 255, 255).color_bin(), COLOR_BIN_COUNT - 1);
            assert_ne!(Rgb::new(0, 0, 255).color_bin(), Rgb::new(255, 0, 0).color_bin());
        }
    }
}
