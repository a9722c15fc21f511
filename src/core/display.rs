/// Display driver boundary
///
/// A panel takes a border colour and an image, then `show` pushes the frame
/// out. Calls are synchronous and either complete or fail; there is no
/// partial-update recovery.

use image::{Rgb, RgbImage};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::utils::app_config::{AppConfig, DisplayBackend};
use crate::utils::constants::{InkyColor, PREVIEW_BORDER_PX};

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("no display detected (looked for framebuffer {0})")]
    NotDetected(PathBuf),

    #[error("failed to read framebuffer geometry from {path}: {detail}")]
    Geometry { path: PathBuf, detail: String },

    #[error("unsupported framebuffer depth: {0} bits per pixel")]
    UnsupportedDepth(u32),

    #[error("invalid framebuffer layout: {0}")]
    Layout(String),

    #[error("show() called before set_image()")]
    NoImage,

    #[error("failed to write frame to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode preview {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub trait Display {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    fn set_border(&mut self, color: InkyColor);

    fn set_image(&mut self, image: &RgbImage) -> Result<(), DisplayError>;

    fn show(&mut self) -> Result<(), DisplayError>;
}

/// Open the display selected by the configuration
pub fn detect(config: &AppConfig) -> Result<Box<dyn Display>, DisplayError> {
    let device = &config.display.device;

    let panel: Box<dyn Display> = match config.display.backend {
        DisplayBackend::Preview => Box::new(PreviewDisplay::new(config.preview_path())),
        DisplayBackend::Framebuffer => Box::new(FramebufferDisplay::open(device)?),
        DisplayBackend::Auto => {
            if !device.exists() {
                return Err(DisplayError::NotDetected(device.clone()));
            }
            Box::new(FramebufferDisplay::open(device)?)
        }
    };

    info!("Using {} display", panel.name());
    Ok(panel)
}

/// Upper bound on one encoded frame; larger geometry is treated as bogus
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Pixel layout of a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    /// Bytes per line, including any padding after the last pixel
    pub stride: u32,
}

impl FrameGeometry {
    /// Geometry whose lines carry no padding
    pub fn packed(width: u32, height: u32, bits_per_pixel: u32) -> Self {
        Self {
            width,
            height,
            bits_per_pixel,
            stride: width.saturating_mul(bits_per_pixel / 8),
        }
    }

    fn bytes_per_pixel(&self) -> Result<usize, DisplayError> {
        match self.bits_per_pixel {
            16 => Ok(2),
            32 => Ok(4),
            other => Err(DisplayError::UnsupportedDepth(other)),
        }
    }

    /// Total frame size in bytes, after checking the layout is coherent
    fn frame_len(&self) -> Result<usize, DisplayError> {
        let row_bytes = (self.width as usize)
            .checked_mul(self.bytes_per_pixel()?)
            .ok_or_else(|| DisplayError::Layout(format!("width {} overflows", self.width)))?;

        if (self.stride as usize) < row_bytes {
            return Err(DisplayError::Layout(format!(
                "stride {} is shorter than a {}-pixel line",
                self.stride, self.width
            )));
        }

        (self.stride as usize)
            .checked_mul(self.height as usize)
            .filter(|len| *len <= MAX_FRAME_BYTES)
            .ok_or_else(|| {
                DisplayError::Layout(format!(
                    "{} lines of {} bytes exceed {} bytes",
                    self.height, self.stride, MAX_FRAME_BYTES
                ))
            })
    }
}

/// Linux framebuffer device, as exposed by fbtft e-paper drivers
pub struct FramebufferDisplay {
    device: PathBuf,
    geometry: FrameGeometry,
    border: InkyColor,
    image: Option<RgbImage>,
}

impl FramebufferDisplay {
    /// Open `device`, reading its geometry from sysfs
    pub fn open(device: &Path) -> Result<Self, DisplayError> {
        let name = device
            .file_name()
            .ok_or_else(|| DisplayError::NotDetected(device.to_path_buf()))?;
        let sysfs = Path::new("/sys/class/graphics").join(name);

        let (width, height) = read_virtual_size(&sysfs.join("virtual_size"))?;
        let bits_per_pixel = read_sysfs_u32(&sysfs.join("bits_per_pixel"))?;
        let mut geometry = FrameGeometry::packed(width, height, bits_per_pixel);

        match read_sysfs_u32(&sysfs.join("stride")) {
            Ok(stride) => geometry.stride = stride,
            Err(err) => debug!("Assuming unpadded lines: {}", err),
        }

        Self::with_geometry(device, geometry)
    }

    pub fn with_geometry(device: &Path, geometry: FrameGeometry) -> Result<Self, DisplayError> {
        geometry.frame_len()?;

        debug!(
            "Framebuffer {}: {}x{} @ {}bpp, stride {}",
            device.display(),
            geometry.width,
            geometry.height,
            geometry.bits_per_pixel,
            geometry.stride
        );

        Ok(Self {
            device: device.to_path_buf(),
            geometry,
            border: InkyColor::White,
            image: None,
        })
    }
}

impl Display for FramebufferDisplay {
    fn name(&self) -> &'static str {
        "framebuffer"
    }

    fn set_border(&mut self, color: InkyColor) {
        self.border = color;
    }

    fn set_image(&mut self, image: &RgbImage) -> Result<(), DisplayError> {
        self.image = Some(image.clone());
        Ok(())
    }

    fn show(&mut self) -> Result<(), DisplayError> {
        let image = self.image.as_ref().ok_or(DisplayError::NoImage)?;
        let frame = encode_frame(image, self.border, &self.geometry)?;

        let mut device = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .map_err(|source| DisplayError::Io {
                path: self.device.clone(),
                source,
            })?;

        device
            .write_all(&frame)
            .and_then(|_| device.flush())
            .map_err(|source| DisplayError::Io {
                path: self.device.clone(),
                source,
            })
    }
}

/// Encode `image` into a raw framebuffer laid out as `geometry`
///
/// The image is anchored top-left; uncovered pixels take the border colour.
/// Line padding up to the stride is zero-filled.
pub fn encode_frame(
    image: &RgbImage,
    border: InkyColor,
    geometry: &FrameGeometry,
) -> Result<Vec<u8>, DisplayError> {
    let bytes_per_pixel = geometry.bytes_per_pixel()?;
    let mut frame = Vec::with_capacity(geometry.frame_len()?);
    let border = Rgb(border.rgb());

    for y in 0..geometry.height {
        let line_start = frame.len();

        for x in 0..geometry.width {
            let Rgb([r, g, b]) = if x < image.width() && y < image.height() {
                *image.get_pixel(x, y)
            } else {
                border
            };

            if bytes_per_pixel == 2 {
                let rgb565 = ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3);
                frame.extend_from_slice(&rgb565.to_le_bytes());
            } else {
                frame.extend_from_slice(&[b, g, r, 0xFF]);
            }
        }

        frame.resize(line_start + geometry.stride as usize, 0);
    }

    Ok(frame)
}

fn read_sysfs_u32(path: &Path) -> Result<u32, DisplayError> {
    let content = fs::read_to_string(path).map_err(|err| DisplayError::Geometry {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;

    content.trim().parse::<u32>().map_err(|_| DisplayError::Geometry {
        path: path.to_path_buf(),
        detail: format!("expected an integer, got '{}'", content.trim()),
    })
}

/// Parse sysfs `virtual_size`, formatted as `<width>,<height>`
fn read_virtual_size(path: &Path) -> Result<(u32, u32), DisplayError> {
    let content = fs::read_to_string(path).map_err(|err| DisplayError::Geometry {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;

    parse_virtual_size(&content).ok_or_else(|| DisplayError::Geometry {
        path: path.to_path_buf(),
        detail: format!("expected '<width>,<height>', got '{}'", content.trim()),
    })
}

fn parse_virtual_size(content: &str) -> Option<(u32, u32)> {
    let (width, height) = content.trim().split_once(',')?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

/// Writes each shown frame to a PNG, framed in the border colour
pub struct PreviewDisplay {
    path: PathBuf,
    border: InkyColor,
    image: Option<RgbImage>,
}

impl PreviewDisplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            border: InkyColor::White,
            image: None,
        }
    }
}

impl Display for PreviewDisplay {
    fn name(&self) -> &'static str {
        "preview"
    }

    fn set_border(&mut self, color: InkyColor) {
        self.border = color;
    }

    fn set_image(&mut self, image: &RgbImage) -> Result<(), DisplayError> {
        self.image = Some(image.clone());
        Ok(())
    }

    fn show(&mut self) -> Result<(), DisplayError> {
        let image = self.image.as_ref().ok_or(DisplayError::NoImage)?;
        let framed = frame_with_border(image, self.border, PREVIEW_BORDER_PX);

        framed.save(&self.path).map_err(|source| DisplayError::Encode {
            path: self.path.clone(),
            source,
        })?;

        info!("Preview written to {}", self.path.display());
        Ok(())
    }
}

fn frame_with_border(image: &RgbImage, border: InkyColor, thickness: u32) -> RgbImage {
    let mut framed = RgbImage::from_pixel(
        image.width() + thickness * 2,
        image.height() + thickness * 2,
        Rgb(border.rgb()),
    );
    image::imageops::replace(&mut framed, image, thickness as i64, thickness as i64);
    framed
}
