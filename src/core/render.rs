/// Dashboard composition
///
/// Draws the snapshot onto a copy of the background artwork: session count,
/// temperature, usage label, and a striped usage bar one pixel per percent.

use anyhow::{bail, Context, Result};
use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    text::{Baseline, Text},
};
use image::{Rgb, RgbImage};
use std::convert::Infallible;
use std::path::Path;

use crate::core::metrics::Snapshot;
use crate::utils::constants::{
    InkyColor, Palette, CELSIUS, SSH_TEXT_POSITION, TEMPERATURE_TEXT_POSITION,
    USAGE_BAR_HEIGHT, USAGE_BAR_POSITION, USAGE_BAR_STRIPE, USAGE_TEXT_POSITION,
};

/// Load the background artwork; its absence is fatal
pub fn load_background(path: &Path) -> Result<RgbImage> {
    if !path.exists() {
        bail!("Base image file not found: {}", path.display());
    }

    let image = image::open(path)
        .with_context(|| format!("Failed to decode base image {}", path.display()))?;

    Ok(image.to_rgb8())
}

/// Colour of every column of a usage bar `usage` pixels long
///
/// Stripes alternate every five columns starting with the primary colour; the
/// final column is always primary so the bar has a crisp end.
pub fn usage_bar_stripes(usage: u32, palette: &Palette) -> Vec<InkyColor> {
    (0..usage)
        .map(|i| {
            if i == usage - 1 || (i / USAGE_BAR_STRIPE) % 2 == 0 {
                palette.primary
            } else {
                palette.accent
            }
        })
        .collect()
}

/// Compose the dashboard for `snapshot` on a copy of `background`
pub fn compose(background: &RgbImage, snapshot: &Snapshot, palette: &Palette) -> RgbImage {
    let mut canvas = Canvas::new(background.clone());
    let text_color = to_rgb888(palette.primary);

    canvas.text(&snapshot.ssh_sessions.to_string(), SSH_TEXT_POSITION, text_color);
    canvas.text(
        &format!("{}{}", snapshot.temperature, CELSIUS),
        TEMPERATURE_TEXT_POSITION,
        text_color,
    );

    let (x, y) = USAGE_BAR_POSITION;
    for (offset, color) in usage_bar_stripes(snapshot.usage_percent, palette)
        .into_iter()
        .enumerate()
    {
        canvas.vertical_line(x + offset as i32, y, USAGE_BAR_HEIGHT, color);
    }
    canvas.text(
        &format!("{}%", snapshot.usage_percent),
        USAGE_TEXT_POSITION,
        text_color,
    );

    canvas.into_image()
}

fn to_rgb888(color: InkyColor) -> Rgb888 {
    let [r, g, b] = color.rgb();
    Rgb888::new(r, g, b)
}

/// embedded-graphics draw target backed by an RGB image; out of range pixels are clipped
struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new(image: RgbImage) -> Self {
        Self { image }
    }

    fn into_image(self) -> RgbImage {
        self.image
    }

    fn text(&mut self, text: &str, (x, y): (i32, i32), color: Rgb888) {
        let style = MonoTextStyle::new(&FONT_10X20, color);
        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(self)
            .unwrap_or_else(|never| match never {});
    }

    fn vertical_line(&mut self, x: i32, y: i32, height: u32, color: InkyColor) {
        let [r, g, b] = color.rgb();
        for dy in 0..height as i32 {
            self.put(x, y + dy, Rgb([r, g, b]));
        }
    }

    fn put(&mut self, x: i32, y: i32, pixel: Rgb<u8>) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, pixel);
        }
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.put(point.x, point.y, Rgb([color.r(), color.g(), color.b()]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: Rgb<u8> = Rgb([0, 0, 0]);
    const ACCENT: Rgb<u8> = Rgb([255, 215, 0]);
    const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

    fn blank() -> RgbImage {
        RgbImage::from_pixel(250, 122, PAPER)
    }

    #[test]
    fn test_usage_bar_stripes_of_twelve() {
        let palette = Palette::default();
        let stripes = usage_bar_stripes(12, &palette);

        assert_eq!(stripes.len(), 12);
        for (i, color) in stripes.iter().enumerate() {
            let expected = match i {
                0..=4 => InkyColor::Black,
                5..=9 => InkyColor::Yellow,
                _ => InkyColor::Black,
            };
            assert_eq!(*color, expected, "column {}", i);
        }
    }

    #[test]
    fn test_last_column_forced_primary() {
        let palette = Palette::new(InkyColor::Red);
        // column 9 would be accent by phase
        let stripes = usage_bar_stripes(10, &palette);
        assert_eq!(stripes[8], InkyColor::Red);
        assert_eq!(stripes[9], InkyColor::Black);
    }

    #[test]
    fn test_empty_bar() {
        assert!(usage_bar_stripes(0, &Palette::default()).is_empty());
        assert_eq!(usage_bar_stripes(1, &Palette::default()), vec![InkyColor::Black]);
    }

    #[test]
    fn test_compose_draws_usage_bar() {
        let background = blank();
        let image = compose(&background, &Snapshot::new(2, 45, 12), &Palette::default());
        let (x, y) = USAGE_BAR_POSITION;
        let (x, y) = (x as u32, y as u32);

        assert_eq!(*image.get_pixel(x, y), PRIMARY);
        assert_eq!(*image.get_pixel(x + 5, y + USAGE_BAR_HEIGHT - 1), ACCENT);
        assert_eq!(*image.get_pixel(x + 10, y), PRIMARY);
        assert_eq!(*image.get_pixel(x + 11, y), PRIMARY);
        assert_eq!(*image.get_pixel(x + 12, y), PAPER);
        assert_eq!(*image.get_pixel(x, y + USAGE_BAR_HEIGHT), PAPER);
    }

    #[test]
    fn test_compose_leaves_background_untouched() {
        let background = blank();
        let image = compose(&background, &Snapshot::new(1, 50, 50), &Palette::default());

        assert!(background.pixels().all(|p| *p == PAPER));
        assert_ne!(image, background);
        assert_eq!(image.dimensions(), background.dimensions());
    }

    #[test]
    fn test_text_is_drawn_near_anchor() {
        let image = compose(&blank(), &Snapshot::new(8, 0, 0), &Palette::default());
        let (x, y) = SSH_TEXT_POSITION;

        let inked = (x..x + 10)
            .flat_map(|px| (y..y + 20).map(move |py| (px as u32, py as u32)))
            .filter(|&(px, py)| *image.get_pixel(px, py) == PRIMARY)
            .count();
        assert!(inked > 0);
    }

    #[test]
    fn test_oversized_values_are_clipped() {
        let small = RgbImage::from_pixel(80, 40, PAPER);
        let image = compose(&small, &Snapshot::new(12345, 999, 100), &Palette::default());
        assert_eq!(image.dimensions(), (80, 40));
    }

    #[test]
    fn test_missing_background_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_background(&dir.path().join("Inky.png")).unwrap_err();
        assert!(err.to_string().contains("Base image file not found"));
    }

    #[test]
    fn test_load_background_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Inky.png");
        blank().save(&path).unwrap();

        let loaded = load_background(&path).unwrap();
        assert_eq!(loaded.dimensions(), (250, 122));
    }
}
