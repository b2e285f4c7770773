//! `ColorBrewer` sequential palettes.

use image::Rgba;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Fill for features without a value (`lightgrey`).
pub const NULL_COLOR: Rgba<u8> = Rgba([211, 211, 211, 255]);

/// Single-hue sequential palette, light to dark.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Palette {
    #[default]
    Blues,
    Greens,
    Oranges,
    Reds,
    Purples,
}

impl Palette {
    /// The five-class scheme.
    #[must_use]
    pub const fn colors(self) -> [[u8; 3]; 5] {
        match self {
            Self::Blues => [
                [0xef, 0xf3, 0xff],
                [0xbd, 0xd7, 0xe7],
                [0x6b, 0xae, 0xd6],
                [0x31, 0x82, 0xbd],
                [0x08, 0x51, 0x9c],
            ],
            Self::Greens => [
                [0xed, 0xf8, 0xe9],
                [0xba, 0xe4, 0xb3],
                [0x74, 0xc4, 0x76],
                [0x31, 0xa3, 0x54],
                [0x00, 0x6d, 0x2c],
            ],
            Self::Oranges => [
                [0xfe, 0xed, 0xde],
                [0xfd, 0xbe, 0x85],
                [0xfd, 0x8d, 0x3c],
                [0xe6, 0x55, 0x0d],
                [0xa6, 0x36, 0x03],
            ],
            Self::Reds => [
                [0xfe, 0xe5, 0xd9],
                [0xfc, 0xae, 0x91],
                [0xfb, 0x6a, 0x4a],
                [0xde, 0x2d, 0x26],
                [0xa5, 0x0f, 0x15],
            ],
            Self::Purples => [
                [0xf2, 0xf0, 0xf7],
                [0xcb, 0xc9, 0xe2],
                [0x9e, 0x9a, 0xc8],
                [0x75, 0x6b, 0xb1],
                [0x54, 0x27, 0x8f],
            ],
        }
    }

    /// Color of class `index` out of `classes`, spread evenly across the
    /// scheme so the darkest class is always the darkest color.
    #[must_use]
    pub fn color(self, index: usize, classes: usize) -> Rgba<u8> {
        let colors = self.colors();
        let last = colors.len() - 1;
        let slot = match classes {
            0 | 1 => last / 2,
            n => (index.min(n - 1) * last + (n - 1) / 2) / (n - 1),
        };
        let [r, g, b] = colors[slot.min(last)];
        Rgba([r, g, b, 255])
    }
}

/// Formats a color as `#rrggbb`.
#[must_use]
pub fn hex(color: Rgba<u8>) -> String {
    let [r, g, b, _] = color.0;
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_classes_use_every_color() {
        let palette = Palette::Blues;
        let slots: Vec<String> = (0..5).map(|i| hex(palette.color(i, 5))).collect();
        assert_eq!(
            slots,
            vec!["#eff3ff", "#bdd7e7", "#6baed6", "#3182bd", "#08519c"]
        );
    }

    #[test]
    fn fewer_classes_span_light_to_dark() {
        assert_eq!(hex(Palette::Reds.color(0, 3)), "#fee5d9");
        assert_eq!(hex(Palette::Reds.color(1, 3)), "#fb6a4a");
        assert_eq!(hex(Palette::Reds.color(2, 3)), "#a50f15");
        assert_eq!(hex(Palette::Reds.color(0, 1)), "#fb6a4a");
    }

    #[test]
    fn parses_matplotlib_names() {
        assert_eq!("Purples".parse::<Palette>().unwrap(), Palette::Purples);
        assert_eq!(Palette::Oranges.to_string(), "Oranges");
        assert!("Viridis".parse::<Palette>().is_err());
    }
}
