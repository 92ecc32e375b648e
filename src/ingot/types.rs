//! Plain value types passed by value into Metal calls.
//!
//! Nothing here touches the native framework, so these types build and test on
//! every platform. The Apple-only wrappers convert them at the call site.

use bitflags::bitflags;

use crate::ingot::error::{Error, Result};

/// Largest width/height Metal accepts for a 2D texture on current GPU families.
pub const MAX_TEXTURE_DIMENSION: usize = 16384;

/// Location of a pixel relative to the upper-left corner at (0, 0, 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Origin {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Origin {
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

/// Dimensions of a texture region, threadgroup or grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Size {
    pub const fn new(width: usize, height: usize, depth: usize) -> Self {
        Self { width, height, depth }
    }

    pub const fn new_2d(width: usize, height: usize) -> Self {
        Self { width, height, depth: 1 }
    }

    pub const fn new_1d(width: usize) -> Self {
        Self { width, height: 1, depth: 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }

    /// Threadgroup for an element-wise kernel over `n` items: as wide as the
    /// pipeline allows, never wider than the grid, never zero.
    pub fn threadgroup_1d(max_total_threads: usize, n: usize) -> Self {
        Self::new_1d(max_total_threads.min(n).max(1))
    }

    /// Extent of mip level `level` for a resource whose base level is `self`.
    pub fn mip_level(&self, level: usize) -> Self {
        let shift = u32::try_from(level).ok();
        let shrink = |n: usize| shift.and_then(|l| n.checked_shr(l)).unwrap_or(0).max(1);
        Self::new(shrink(self.width), shrink(self.height), shrink(self.depth))
    }
}

/// Rectangular block of pixels: upper-left corner plus size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Region {
    pub origin: Origin,
    pub size: Size,
}

impl Region {
    pub const fn new(origin: Origin, size: Size) -> Self {
        Self { origin, size }
    }

    pub const fn make_2d(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { origin: Origin::new(x, y, 0), size: Size::new_2d(width, height) }
    }

    pub const fn make_3d(
        x: usize,
        y: usize,
        z: usize,
        width: usize,
        height: usize,
        depth: usize,
    ) -> Self {
        Self { origin: Origin::new(x, y, z), size: Size::new(width, height, depth) }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    pub fn fits_within(&self, extent: Size) -> bool {
        let axis = |o: usize, s: usize, e: usize| o.checked_add(s).is_some_and(|end| end <= e);
        axis(self.origin.x, self.size.width, extent.width)
            && axis(self.origin.y, self.size.height, extent.height)
            && axis(self.origin.z, self.size.depth, extent.depth)
    }

    /// Bytes a CPU-side slice must hold to back this region at `bytes_per_row`.
    pub fn required_len(&self, bytes_per_row: usize) -> Option<usize> {
        if self.is_empty() {
            return Some(0);
        }
        bytes_per_row
            .checked_mul(self.size.height)?
            .checked_mul(self.size.depth)
    }
}

/// Pixel layouts this crate knows how to size. Discriminants are Metal's raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PixelFormat {
    R8Unorm = 10,
    R32Float = 55,
    RGBA8Unorm = 70,
    RGBA8UnormSrgb = 71,
    BGRA8Unorm = 80,
    BGRA8UnormSrgb = 81,
    RGBA16Float = 115,
    RGBA32Float = 125,
    BGRA10Xr = 552,
    BGRA10XrSrgb = 553,
}

impl PixelFormat {
    pub const fn raw(self) -> u16 {
        self as u16
    }

    pub fn from_raw(raw: usize) -> Option<Self> {
        Some(match raw {
            10 => Self::R8Unorm,
            55 => Self::R32Float,
            70 => Self::RGBA8Unorm,
            71 => Self::RGBA8UnormSrgb,
            80 => Self::BGRA8Unorm,
            81 => Self::BGRA8UnormSrgb,
            115 => Self::RGBA16Float,
            125 => Self::RGBA32Float,
            552 => Self::BGRA10Xr,
            553 => Self::BGRA10XrSrgb,
            _ => return None,
        })
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::R8Unorm => 1,
            Self::R32Float
            | Self::RGBA8Unorm
            | Self::RGBA8UnormSrgb
            | Self::BGRA8Unorm
            | Self::BGRA8UnormSrgb => 4,
            Self::RGBA16Float | Self::BGRA10Xr | Self::BGRA10XrSrgb => 8,
            Self::RGBA32Float => 16,
        }
    }

    /// Formats a `CAMetalLayer` accepts for its drawables.
    pub const fn is_layer_compatible(self) -> bool {
        matches!(
            self,
            Self::BGRA8Unorm
                | Self::BGRA8UnormSrgb
                | Self::RGBA16Float
                | Self::BGRA10Xr
                | Self::BGRA10XrSrgb
        )
    }
}

/// Memory location and access permissions of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StorageMode {
    /// System memory visible to both CPU and GPU.
    Shared = 0,
    /// Mirrored pair; the CPU copy must be synchronized explicitly.
    Managed = 1,
    /// GPU only.
    Private = 2,
    /// Tile memory; only valid for transient render targets.
    Memoryless = 3,
}

impl StorageMode {
    pub fn from_raw(raw: usize) -> Option<Self> {
        Some(match raw {
            0 => Self::Shared,
            1 => Self::Managed,
            2 => Self::Private,
            3 => Self::Memoryless,
            _ => return None,
        })
    }

    pub const fn is_cpu_accessible(self) -> bool {
        matches!(self, Self::Shared | Self::Managed)
    }

    /// Intel Macs reject shared textures, so macOS defaults to managed.
    pub const fn default_for_textures() -> Self {
        if cfg!(target_os = "macos") {
            Self::Managed
        } else {
            Self::Shared
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CpuCacheMode {
    #[default]
    DefaultCache = 0,
    /// For resources the CPU writes but never reads.
    WriteCombined = 1,
}

const CPU_CACHE_MODE_SHIFT: u16 = 0;
const STORAGE_MODE_SHIFT: u16 = 4;
const HAZARD_TRACKING_MODE_SHIFT: u16 = 8;
const MODE_MASK: u16 = 0xF;

bitflags! {
    /// Creation options for buffers and textures, bit-compatible with `MTLResourceOptions`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceOptions: u16 {
        const CPU_CACHE_MODE_WRITE_COMBINED = (CpuCacheMode::WriteCombined as u16) << CPU_CACHE_MODE_SHIFT;
        const STORAGE_MODE_MANAGED = (StorageMode::Managed as u16) << STORAGE_MODE_SHIFT;
        const STORAGE_MODE_PRIVATE = (StorageMode::Private as u16) << STORAGE_MODE_SHIFT;
        const STORAGE_MODE_MEMORYLESS = (StorageMode::Memoryless as u16) << STORAGE_MODE_SHIFT;
        const HAZARD_TRACKING_MODE_UNTRACKED = 1 << HAZARD_TRACKING_MODE_SHIFT;
    }
}

impl ResourceOptions {
    pub const CPU_CACHE_MODE_DEFAULT_CACHE: Self = Self::empty();
    pub const STORAGE_MODE_SHARED: Self = Self::empty();

    pub fn new(cache: CpuCacheMode, storage: StorageMode) -> Self {
        Self::from_bits_retain(
            ((cache as u16) << CPU_CACHE_MODE_SHIFT) | ((storage as u16) << STORAGE_MODE_SHIFT),
        )
    }

    pub fn storage_mode(self) -> StorageMode {
        let raw = (self.bits() >> STORAGE_MODE_SHIFT) & MODE_MASK;
        StorageMode::from_raw(raw as usize).unwrap_or(StorageMode::Shared)
    }

    pub fn cpu_cache_mode(self) -> CpuCacheMode {
        match (self.bits() >> CPU_CACHE_MODE_SHIFT) & MODE_MASK {
            1 => CpuCacheMode::WriteCombined,
            _ => CpuCacheMode::DefaultCache,
        }
    }
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<StorageMode> for ResourceOptions {
    fn from(storage: StorageMode) -> Self {
        Self::new(CpuCacheMode::DefaultCache, storage)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u8 {
        const SHADER_READ = 0x01;
        const SHADER_WRITE = 0x02;
        const RENDER_TARGET = 0x04;
        const PIXEL_FORMAT_VIEW = 0x10;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::SHADER_READ
    }
}

/// Parameters for a new 2D texture; consumed by `Device::new_texture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub pixel_format: PixelFormat,
    pub width: usize,
    pub height: usize,
    pub storage_mode: StorageMode,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    pub fn new_2d(pixel_format: PixelFormat, width: usize, height: usize) -> Self {
        Self {
            pixel_format,
            width,
            height,
            storage_mode: StorageMode::default_for_textures(),
            usage: TextureUsage::default(),
        }
    }

    pub fn with_storage_mode(mut self, storage_mode: StorageMode) -> Self {
        self.storage_mode = storage_mode;
        self
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn size(&self) -> Size {
        Size::new_2d(self.width, self.height)
    }

    /// Tightly packed row length for this format and width.
    pub fn bytes_per_row(&self) -> usize {
        self.width * self.pixel_format.bytes_per_pixel()
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidArgument(format!(
                "texture dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_TEXTURE_DIMENSION || self.height > MAX_TEXTURE_DIMENSION {
            return Err(Error::InvalidArgument(format!(
                "texture dimensions {}x{} exceed {MAX_TEXTURE_DIMENSION}",
                self.width, self.height
            )));
        }
        if self.storage_mode == StorageMode::Memoryless
            && !self.usage.contains(TextureUsage::RENDER_TARGET)
        {
            return Err(Error::InvalidArgument(
                "memoryless textures must be render targets".into(),
            ));
        }
        Ok(())
    }
}

/// Metal Shading Language revision to compile against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LanguageVersion {
    V1_0,
    V1_1,
    V1_2,
    V2_0,
    V2_1,
    V2_2,
    V2_3,
    V2_4,
    V3_0,
    V3_1,
    V3_2,
}

impl LanguageVersion {
    pub const fn major_minor(self) -> (u32, u32) {
        match self {
            Self::V1_0 => (1, 0),
            Self::V1_1 => (1, 1),
            Self::V1_2 => (1, 2),
            Self::V2_0 => (2, 0),
            Self::V2_1 => (2, 1),
            Self::V2_2 => (2, 2),
            Self::V2_3 => (2, 3),
            Self::V2_4 => (2, 4),
            Self::V3_0 => (3, 0),
            Self::V3_1 => (3, 1),
            Self::V3_2 => (3, 2),
        }
    }

    /// Encoded as `(major << 16) + minor`, matching `MTLLanguageVersion`.
    pub const fn raw(self) -> u32 {
        let (major, minor) = self.major_minor();
        (major << 16) + minor
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// `None` leaves the framework's default (the newest supported revision).
    pub language_version: Option<LanguageVersion>,
}

impl CompileOptions {
    pub fn with_language_version(version: LanguageVersion) -> Self {
        Self { language_version: Some(version) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_2d_is_single_slice() {
        let r = Region::make_2d(3, 4, 10, 20);
        assert_eq!(r.origin, Origin::new(3, 4, 0));
        assert_eq!(r.size, Size::new(10, 20, 1));
    }

    #[test]
    fn region_fits_checks_every_axis() {
        let extent = Size::new_2d(64, 32);
        assert!(Region::make_2d(0, 0, 64, 32).fits_within(extent));
        assert!(Region::make_2d(60, 30, 4, 2).fits_within(extent));
        assert!(!Region::make_2d(61, 0, 4, 1).fits_within(extent));
        assert!(!Region::make_2d(0, 31, 1, 2).fits_within(extent));
        assert!(!Region::make_3d(0, 0, 1, 1, 1, 1).fits_within(extent));
        assert!(!Region::make_2d(usize::MAX, 0, 2, 1).fits_within(extent));
    }

    #[test]
    fn required_len_scales_with_rows_and_slices() {
        assert_eq!(Region::make_2d(0, 0, 16, 8).required_len(64), Some(512));
        assert_eq!(Region::make_3d(0, 0, 0, 16, 8, 2).required_len(64), Some(1024));
        assert_eq!(Region::make_2d(0, 0, 0, 8).required_len(64), Some(0));
        assert_eq!(Region::make_2d(0, 0, 1, usize::MAX).required_len(2), None);
    }

    #[test]
    fn threadgroup_never_exceeds_grid_or_zero() {
        assert_eq!(Size::threadgroup_1d(1024, 10), Size::new_1d(10));
        assert_eq!(Size::threadgroup_1d(256, 10_000), Size::new_1d(256));
        assert_eq!(Size::threadgroup_1d(256, 0), Size::new_1d(1));
    }

    #[test]
    fn mip_levels_bottom_out_at_one() {
        let base = Size::new_2d(64, 16);
        assert_eq!(base.mip_level(0), base);
        assert_eq!(base.mip_level(2), Size::new(16, 4, 1));
        assert_eq!(base.mip_level(6), Size::new(1, 1, 1));
        assert_eq!(base.mip_level(200), Size::new(1, 1, 1));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn mip_level_does_not_wrap_large_levels() {
        let base = Size::new_2d(64, 64);
        assert_eq!(base.mip_level(1 << 32), Size::new(1, 1, 1));
        assert!(!Region::make_2d(0, 0, 64, 64).fits_within(base.mip_level(1 << 32)));
    }

    #[test]
    fn pixel_format_raw_values_match_metal() {
        assert_eq!(PixelFormat::RGBA8Unorm.raw(), 70);
        assert_eq!(PixelFormat::BGRA8Unorm.raw(), 80);
        assert_eq!(PixelFormat::BGRA8UnormSrgb.raw(), 81);
        assert_eq!(PixelFormat::from_raw(552), Some(PixelFormat::BGRA10Xr));
        assert_eq!(PixelFormat::from_raw(0), None);
    }

    #[test]
    fn layer_formats_exclude_rgba8() {
        assert!(PixelFormat::BGRA8Unorm.is_layer_compatible());
        assert!(PixelFormat::RGBA16Float.is_layer_compatible());
        assert!(!PixelFormat::RGBA8Unorm.is_layer_compatible());
        assert!(!PixelFormat::R32Float.is_layer_compatible());
    }

    #[test]
    fn resource_options_encode_storage_in_bits_4_to_8() {
        assert_eq!(ResourceOptions::STORAGE_MODE_SHARED.bits(), 0);
        assert_eq!(ResourceOptions::STORAGE_MODE_MANAGED.bits(), 0x10);
        assert_eq!(ResourceOptions::STORAGE_MODE_PRIVATE.bits(), 0x20);
        assert_eq!(ResourceOptions::HAZARD_TRACKING_MODE_UNTRACKED.bits(), 0x100);

        let opts = ResourceOptions::new(CpuCacheMode::WriteCombined, StorageMode::Private);
        assert_eq!(opts.bits(), 0x21);
        assert_eq!(opts.storage_mode(), StorageMode::Private);
        assert_eq!(opts.cpu_cache_mode(), CpuCacheMode::WriteCombined);

        let untracked = ResourceOptions::from(StorageMode::Managed)
            | ResourceOptions::HAZARD_TRACKING_MODE_UNTRACKED;
        assert_eq!(untracked.storage_mode(), StorageMode::Managed);
        assert_eq!(untracked.cpu_cache_mode(), CpuCacheMode::DefaultCache);
    }

    #[test]
    fn only_shared_and_managed_are_cpu_visible() {
        assert!(StorageMode::Shared.is_cpu_accessible());
        assert!(StorageMode::Managed.is_cpu_accessible());
        assert!(!StorageMode::Private.is_cpu_accessible());
        assert!(!StorageMode::Memoryless.is_cpu_accessible());
    }

    #[test]
    fn texture_descriptor_validation() {
        let desc = TextureDescriptor::new_2d(PixelFormat::BGRA8Unorm, 128, 64);
        assert!(desc.validate().is_ok());
        assert_eq!(desc.bytes_per_row(), 512);
        assert_eq!(desc.usage, TextureUsage::SHADER_READ);

        let zero = TextureDescriptor::new_2d(PixelFormat::BGRA8Unorm, 0, 64);
        assert!(matches!(zero.validate(), Err(Error::InvalidArgument(_))));

        let huge = TextureDescriptor::new_2d(PixelFormat::R8Unorm, MAX_TEXTURE_DIMENSION + 1, 1);
        assert!(huge.validate().is_err());

        let memoryless = TextureDescriptor::new_2d(PixelFormat::BGRA8Unorm, 8, 8)
            .with_storage_mode(StorageMode::Memoryless);
        assert!(memoryless.validate().is_err());
        assert!(memoryless.with_usage(TextureUsage::RENDER_TARGET).validate().is_ok());
    }

    #[test]
    fn language_version_encoding() {
        assert_eq!(LanguageVersion::V1_0.raw(), 1 << 16);
        assert_eq!(LanguageVersion::V2_4.raw(), (2 << 16) + 4);
        assert_eq!(LanguageVersion::V3_1.raw(), 0x30001);
        assert!(LanguageVersion::V2_4 < LanguageVersion::V3_0);
        assert_eq!(CompileOptions::default().language_version, None);
    }
}
