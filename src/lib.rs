#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::incompatible_msrv)]

pub mod ingot {
    pub mod config;
    pub mod error;
    pub mod types;

    #[cfg(target_vendor = "apple")]
    pub mod compute;
    #[cfg(target_vendor = "apple")]
    pub mod layer;
    #[cfg(target_vendor = "apple")]
    pub mod metal;
}

// Demo binaries live under `demos/` and are not part of the library API.

pub use crate::ingot::config::{ColorSpace, LayerConfig, PresentMode};
pub use crate::ingot::error::{Error, Result};
pub use crate::ingot::types;

#[cfg(target_vendor = "apple")]
pub use crate::ingot::{compute, layer, metal};

// Short, Metal-style alias with simplified names for discoverability.
pub mod mtl {
    // Data-only value types
    pub use crate::ingot::types::{
        CompileOptions, CpuCacheMode, LanguageVersion, Origin, PixelFormat, Region,
        ResourceOptions, Size, StorageMode, TextureDescriptor, TextureUsage,
    };
    pub use crate::ingot::config::{ColorSpace, LayerConfig, PresentMode};

    // Core objects
    #[cfg(target_vendor = "apple")]
    pub use crate::ingot::metal::{
        BlitEncoder, Buffer, CommandBuffer, CommandQueue, ComputeEncoder, ComputePipelineState,
        Device, Function, Library, Texture,
    };
    // Surface
    #[cfg(target_vendor = "apple")]
    pub use crate::ingot::layer::{MetalDrawable as Drawable, MetalLayer as Layer};
    #[cfg(target_os = "macos")]
    pub use crate::ingot::layer::{View, Window};
    #[cfg(target_vendor = "apple")]
    pub use crate::ingot::compute::ComputeProgram;
}
