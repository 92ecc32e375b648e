use crate::ingot::error::{Error, Result};
use crate::ingot::types::PixelFormat;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentMode {
    /// Drawables are synchronized with the display refresh.
    Fifo,
    Immediate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    SRGB,
    DisplayP3,
    ExtendedSRGB,
}

/// Drawable pool configuration for a `MetalLayer`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayerConfig {
    pub pixel_format: PixelFormat,
    /// Must be false to blit or sample from drawable textures.
    pub framebuffer_only: bool,
    pub max_drawables: u32,
    pub present_mode: PresentMode,
    pub colorspace: ColorSpace,
    pub wants_edr: bool,
    /// Drawable size in pixels; `None` keeps the layer's current size.
    pub drawable_size: Option<(usize, usize)>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::BGRA8Unorm,
            framebuffer_only: true,
            max_drawables: 3,
            present_mode: PresentMode::Fifo,
            colorspace: ColorSpace::SRGB,
            wants_edr: false,
            drawable_size: None,
        }
    }
}

impl LayerConfig {
    pub fn validate(&self) -> Result<()> {
        validate_pixel_format(self.pixel_format)?;
        validate_drawable_count(self.max_drawables)?;
        if let Some((w, h)) = self.drawable_size {
            if w == 0 || h == 0 {
                return Err(Error::Configuration(format!(
                    "drawable size must be non-zero, got {w}x{h}"
                )));
            }
        }
        Ok(())
    }

    pub fn display_sync_enabled(&self) -> bool {
        matches!(self.present_mode, PresentMode::Fifo)
    }
}

pub(crate) fn validate_pixel_format(pixel_format: PixelFormat) -> Result<()> {
    if pixel_format.is_layer_compatible() {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "pixel format {pixel_format:?} is not supported by CAMetalLayer"
        )))
    }
}

pub(crate) fn validate_drawable_count(count: u32) -> Result<()> {
    match count {
        2 | 3 => Ok(()),
        n => Err(Error::Configuration(format!(
            "maximum drawable count must be 2 or 3, got {n}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_triple_buffered_vsync() {
        let cfg = LayerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_drawables, 3);
        assert!(cfg.display_sync_enabled());
    }

    #[test]
    fn rejects_non_layer_pixel_format() {
        let cfg = LayerConfig { pixel_format: PixelFormat::RGBA8Unorm, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("RGBA8Unorm")));
    }

    #[test]
    fn drawable_count_is_two_or_three() {
        for (count, ok) in [(1, false), (2, true), (3, true), (4, false)] {
            let cfg = LayerConfig { max_drawables: count, ..Default::default() };
            assert_eq!(cfg.validate().is_ok(), ok, "count {count}");
        }
    }

    #[test]
    fn zero_drawable_size_rejected() {
        let cfg = LayerConfig { drawable_size: Some((640, 0)), ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = LayerConfig { drawable_size: Some((640, 480)), ..Default::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn immediate_disables_display_sync() {
        let cfg = LayerConfig { present_mode: PresentMode::Immediate, ..Default::default() };
        assert!(!cfg.display_sync_enabled());
    }
}
