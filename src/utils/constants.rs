/// Dashboard layout, palette, and default locations
///
/// Coordinates are in panel pixels and match the artwork of the bundled
/// `Inky.png` background (250x122, Inky pHAT SSD1608).

use serde::{Deserialize, Serialize};

/// Name of the persisted state file, next to the executable by default
pub const STATE_FILE_NAME: &str = "persist.txt";

/// Name of the background artwork, next to the executable by default
pub const BACKGROUND_FILE_NAME: &str = "Inky.png";

/// Name of the PNG written by the preview display backend
pub const PREVIEW_FILE_NAME: &str = "inky-preview.png";

/// Framebuffer exposed by the e-paper driver on a Pi with an HDMI console on fb0
pub const DEFAULT_FRAMEBUFFER: &str = "/dev/fb1";

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_MOUNT_POINT: &str = "/otg";

pub const CELSIUS: &str = "°C";

/// Top-left corner of the SSH session count
pub const SSH_TEXT_POSITION: (i32, i32) = (63, 15);

/// Top-left corner of the temperature label
pub const TEMPERATURE_TEXT_POSITION: (i32, i32) = (166, 15);

/// Top-left corner of the usage percentage label
pub const USAGE_TEXT_POSITION: (i32, i32) = (166, 72);

/// Top-left corner of the striped usage bar
pub const USAGE_BAR_POSITION: (i32, i32) = (59, 74);
pub const USAGE_BAR_HEIGHT: u32 = 34;

/// Stripe width of the usage bar, in pixels
pub const USAGE_BAR_STRIPE: u32 = 5;

/// Width of the frame drawn around preview images
pub const PREVIEW_BORDER_PX: u32 = 4;

/// Fixed palette of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InkyColor {
    White,
    Black,
    Yellow,
    Red,
}

impl InkyColor {
    /// RGB value used when compositing
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            InkyColor::White => [255, 255, 255],
            InkyColor::Black => [0, 0, 0],
            InkyColor::Yellow => [255, 215, 0],
            InkyColor::Red => [200, 0, 0],
        }
    }
}

/// Primary (text, bar edges) and accent (alternate stripes) colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: InkyColor,
    pub accent: InkyColor,
}

impl Palette {
    pub fn new(accent: InkyColor) -> Self {
        Self {
            primary: InkyColor::Black,
            accent,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(InkyColor::Yellow)
    }
}
