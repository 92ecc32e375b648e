//! Safe, curated Metal facade.
//!
//! - Every wrapper owns a `Retained` handle; dropping it releases the native object.
//! - No public exposure of protocol objects except through explicit `raw()` accessors.
//! - Data crossing the FFI boundary is bounded by zerocopy traits and length checks.
//! - Organized into submodules: device, command, encoder, texture, buffer, pipeline.

use objc2_metal::{
    MTLLanguageVersion, MTLOrigin, MTLPixelFormat, MTLRegion, MTLResourceOptions, MTLSize,
    MTLStorageMode, MTLTextureUsage,
};

use crate::ingot::types::{
    LanguageVersion, Origin, PixelFormat, Region, ResourceOptions, Size, StorageMode, TextureUsage,
};

mod buffer;
mod command;
mod device;
mod encoder;
mod pipeline;
mod texture;

pub use buffer::Buffer;
pub use command::{CommandBuffer, CommandQueue};
pub use device::{is_supported, Device, DeviceInfo};
pub use encoder::{BlitEncoder, ComputeEncoder};
pub use pipeline::{ComputePipelineState, Function, Library};
pub use texture::Texture;

impl From<Origin> for MTLOrigin {
    fn from(o: Origin) -> Self {
        MTLOrigin { x: o.x, y: o.y, z: o.z }
    }
}

impl From<Size> for MTLSize {
    fn from(s: Size) -> Self {
        MTLSize { width: s.width, height: s.height, depth: s.depth }
    }
}

impl From<Region> for MTLRegion {
    fn from(r: Region) -> Self {
        MTLRegion { origin: r.origin.into(), size: r.size.into() }
    }
}

impl From<PixelFormat> for MTLPixelFormat {
    fn from(pf: PixelFormat) -> Self {
        MTLPixelFormat(pf.raw() as usize)
    }
}

impl From<StorageMode> for MTLStorageMode {
    fn from(mode: StorageMode) -> Self {
        MTLStorageMode(mode as usize)
    }
}

impl From<ResourceOptions> for MTLResourceOptions {
    fn from(opts: ResourceOptions) -> Self {
        MTLResourceOptions::from_bits_retain(opts.bits() as usize)
    }
}

impl From<TextureUsage> for MTLTextureUsage {
    fn from(usage: TextureUsage) -> Self {
        MTLTextureUsage::from_bits_retain(usage.bits() as usize)
    }
}

impl From<LanguageVersion> for MTLLanguageVersion {
    fn from(v: LanguageVersion) -> Self {
        MTLLanguageVersion(v.raw() as usize)
    }
}
