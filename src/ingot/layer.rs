//! Core Animation surface: a `CAMetalLayer` drawable pool and the AppKit
//! plumbing to put it on screen.

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_core_foundation::CGSize;
use objc2_core_graphics::{
    kCGColorSpaceDisplayP3, kCGColorSpaceExtendedSRGB, kCGColorSpaceSRGB, CGColorSpace,
};
use objc2_metal::MTLDrawable;
use objc2_quartz_core::{CAMetalDrawable, CAMetalLayer};
use tracing::debug;

use crate::ingot::config::{self, ColorSpace, LayerConfig};
use crate::ingot::error::{Error, Result};
use crate::ingot::metal::{Device, Texture};
use crate::ingot::types::PixelFormat;

#[derive(Debug, Clone)]
pub struct MetalLayer {
    pub(crate) raw: Retained<CAMetalLayer>,
}

impl MetalLayer {
    pub fn new(device: &Device, config: &LayerConfig) -> Result<Self> {
        config.validate()?;
        let raw = unsafe { CAMetalLayer::layer() };
        unsafe { raw.setDevice(Some(device.raw())) };
        let layer = Self { raw };
        layer.apply(config)?;
        Ok(layer)
    }

    /// Push every field of `config` onto the layer.
    pub fn apply(&self, config: &LayerConfig) -> Result<()> {
        config.validate()?;
        unsafe {
            self.raw.setPixelFormat(config.pixel_format.into());
            self.raw.setFramebufferOnly(config.framebuffer_only);
            self.raw.setMaximumDrawableCount(config.max_drawables as usize);
            self.raw.setWantsExtendedDynamicRangeContent(config.wants_edr);
        }
        #[cfg(target_os = "macos")]
        self.set_display_sync_enabled(config.display_sync_enabled());
        self.set_colorspace(config.colorspace);
        if let Some((width, height)) = config.drawable_size {
            self.set_drawable_size(width, height);
        }
        debug!(
            format = ?config.pixel_format,
            drawables = config.max_drawables,
            present_mode = ?config.present_mode,
            "configured metal layer"
        );
        Ok(())
    }

    pub fn raw(&self) -> &CAMetalLayer {
        &self.raw
    }

    pub fn set_device(&self, device: &Device) {
        unsafe { self.raw.setDevice(Some(device.raw())) }
    }

    pub fn pixel_format(&self) -> Option<PixelFormat> {
        PixelFormat::from_raw(unsafe { self.raw.pixelFormat() }.0)
    }

    pub fn set_pixel_format(&self, pixel_format: PixelFormat) -> Result<()> {
        config::validate_pixel_format(pixel_format)?;
        unsafe { self.raw.setPixelFormat(pixel_format.into()) };
        Ok(())
    }

    pub fn set_maximum_drawable_count(&self, count: u32) -> Result<()> {
        config::validate_drawable_count(count)?;
        unsafe { self.raw.setMaximumDrawableCount(count as usize) };
        Ok(())
    }

    #[cfg(target_os = "macos")]
    pub fn set_display_sync_enabled(&self, enabled: bool) {
        unsafe { self.raw.setDisplaySyncEnabled(enabled) }
    }

    pub fn set_drawable_size(&self, width: usize, height: usize) {
        unsafe {
            self.raw.setDrawableSize(CGSize { width: width as f64, height: height as f64 })
        }
    }

    pub fn drawable_size(&self) -> (usize, usize) {
        let size = unsafe { self.raw.drawableSize() };
        (size.width as usize, size.height as usize)
    }

    pub fn set_colorspace(&self, colorspace: ColorSpace) {
        let name = unsafe {
            match colorspace {
                ColorSpace::SRGB => kCGColorSpaceSRGB,
                ColorSpace::DisplayP3 => kCGColorSpaceDisplayP3,
                ColorSpace::ExtendedSRGB => kCGColorSpaceExtendedSRGB,
            }
        };
        if let Some(cs) = unsafe { CGColorSpace::with_name(Some(name)) } {
            unsafe { self.raw.setColorspace(Some(&*cs)) }
        }
    }

    /// Blocks up to a second when every drawable is in flight.
    pub fn next_drawable(&self) -> Result<MetalDrawable> {
        unsafe { self.raw.nextDrawable() }
            .map(|raw| MetalDrawable { raw })
            .ok_or(Error::NoDrawable)
    }
}

/// A displayable texture vended by a `MetalLayer`.
#[derive(Debug, Clone)]
pub struct MetalDrawable {
    pub(crate) raw: Retained<ProtocolObject<dyn CAMetalDrawable>>,
}

impl MetalDrawable {
    pub fn texture(&self) -> Texture {
        Texture::from_raw(unsafe { self.raw.texture() })
    }

    /// Present immediately; prefer `CommandBuffer::present_drawable` after encoding.
    pub fn present(&self) {
        self.raw.present()
    }
}

#[cfg(target_os = "macos")]
pub use appkit::{View, Window};

#[cfg(target_os = "macos")]
mod appkit {
    use core::ffi::c_void;
    use core::ptr::NonNull;

    use objc2::msg_send;
    use objc2::rc::Retained;
    use objc2_app_kit::{NSView, NSWindow};
    use objc2_quartz_core::CALayer;

    #[cfg(feature = "winit")]
    use crate::ingot::error::{Error, Result};

    use super::MetalLayer;

    /// An AppKit view that can host a `MetalLayer`.
    #[derive(Debug, Clone)]
    pub struct View {
        raw: Retained<NSView>,
    }

    impl View {
        /// # Safety
        ///
        /// `ns_view` must point to a live `NSView`, and the returned value may
        /// only be used on the main thread.
        pub unsafe fn from_raw(ns_view: NonNull<c_void>) -> Option<Self> {
            unsafe { Retained::retain(ns_view.as_ptr().cast::<NSView>()) }.map(|raw| Self { raw })
        }

        /// The AppKit view behind a window handle, e.g. a winit window.
        #[cfg(feature = "winit")]
        pub fn from_window_handle(handle: &impl raw_window_handle::HasWindowHandle) -> Result<Self> {
            use raw_window_handle::RawWindowHandle;

            let wh = handle
                .window_handle()
                .map_err(|e| Error::InvalidArgument(format!("window handle unavailable: {e}")))?;
            match wh.as_raw() {
                RawWindowHandle::AppKit(h) => unsafe { Self::from_raw(h.ns_view) }
                    .ok_or_else(|| Error::InvalidArgument("null NSView".into())),
                _ => Err(Error::InvalidArgument("expected an AppKit window handle".into())),
            }
        }

        pub fn set_layer(&self, layer: &MetalLayer) {
            let ca_layer: &CALayer = &layer.raw;
            unsafe {
                let _: () = msg_send![&*self.raw, setLayer: Some(ca_layer)];
            }
        }

        pub fn set_wants_layer(&self, wants_layer: bool) {
            unsafe {
                let _: () = msg_send![&*self.raw, setWantsLayer: wants_layer];
            }
        }

        /// Make `layer` the view's backing layer.
        pub fn attach_layer(&self, layer: &MetalLayer) {
            self.set_wants_layer(true);
            self.set_layer(layer);
        }

        pub fn detach_layer(&self) {
            unsafe {
                let _: () = msg_send![&*self.raw, setLayer: Option::<&CALayer>::None];
            }
            self.set_wants_layer(false);
        }
    }

    #[derive(Debug, Clone)]
    pub struct Window {
        raw: Retained<NSWindow>,
    }

    impl Window {
        /// # Safety
        ///
        /// `ns_window` must point to a live `NSWindow`, and the returned value
        /// may only be used on the main thread.
        pub unsafe fn from_raw(ns_window: NonNull<c_void>) -> Option<Self> {
            unsafe { Retained::retain(ns_window.as_ptr().cast::<NSWindow>()) }
                .map(|raw| Self { raw })
        }

        /// Highest accessible view in the window's hierarchy.
        pub fn content_view(&self) -> Option<View> {
            self.raw.contentView().map(|raw| View { raw })
        }
    }
}
