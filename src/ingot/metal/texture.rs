use core::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_metal::{MTLResource, MTLTexture};
use zerocopy::{Immutable, IntoBytes};

use crate::ingot::error::{Error, Result};
use crate::ingot::types::{PixelFormat, Region, Size, StorageMode};

/// Formatted image memory accessible to the GPU.
#[derive(Debug, Clone)]
pub struct Texture {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLTexture>>,
}

impl Texture {
    /// Wrap an existing texture, e.g. one owned by a drawable.
    pub fn from_raw(raw: Retained<ProtocolObject<dyn MTLTexture>>) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLTexture> {
        &self.raw
    }

    pub fn width(&self) -> usize {
        self.raw.width()
    }

    pub fn height(&self) -> usize {
        self.raw.height()
    }

    pub fn depth(&self) -> usize {
        self.raw.depth()
    }

    /// `None` for formats this crate does not model.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        PixelFormat::from_raw(self.raw.pixelFormat().0)
    }

    pub fn storage_mode(&self) -> Option<StorageMode> {
        StorageMode::from_raw(self.raw.storageMode().0)
    }

    pub fn mipmap_level_count(&self) -> usize {
        self.raw.mipmapLevelCount()
    }

    pub fn level_size(&self, level: usize) -> Size {
        Size::new(self.width(), self.height(), self.depth()).mip_level(level)
    }

    /// Copy `pixels` into `region` of slice 0 at mip `level`.
    pub fn replace_region<T>(
        &self,
        region: Region,
        level: usize,
        pixels: &[T],
        bytes_per_row: usize,
    ) -> Result<()>
    where
        T: IntoBytes + Immutable,
    {
        let bytes = pixels.as_bytes();
        let needed = self.check_cpu_region(region, level, bytes_per_row)?;
        if bytes.len() < needed {
            return Err(Error::OutOfBounds { what: "texture upload", needed, available: bytes.len() });
        }
        if region.is_empty() {
            return Ok(());
        }
        unsafe {
            self.raw.replaceRegion_mipmapLevel_withBytes_bytesPerRow(
                region.into(),
                level,
                NonNull::from(bytes).cast(),
                bytes_per_row,
            )
        }
        Ok(())
    }

    /// Read `region` of slice 0 at mip `level` back into CPU memory.
    ///
    /// Managed textures written by the GPU must be synchronized with a blit
    /// encoder first.
    pub fn read_region(&self, region: Region, level: usize, bytes_per_row: usize) -> Result<Vec<u8>> {
        let len = self.check_cpu_region(region, level, bytes_per_row)?;
        let mut out = Vec::new();
        out.try_reserve_exact(len).map_err(|e| {
            Error::InvalidArgument(format!("cannot allocate {len} bytes for readback: {e}"))
        })?;
        out.resize(len, 0u8);
        if region.is_empty() {
            return Ok(out);
        }
        unsafe {
            self.raw.getBytes_bytesPerRow_fromRegion_mipmapLevel(
                NonNull::from(out.as_mut_slice()).cast(),
                bytes_per_row,
                region.into(),
                level,
            )
        }
        Ok(out)
    }

    /// Validate a CPU transfer and return the bytes it touches.
    fn check_cpu_region(&self, region: Region, level: usize, bytes_per_row: usize) -> Result<usize> {
        match self.storage_mode() {
            Some(mode) if mode.is_cpu_accessible() => {}
            Some(mode) => return Err(Error::NotCpuAccessible(mode)),
            None => return Err(Error::InvalidArgument("unknown texture storage mode".into())),
        }
        let levels = self.mipmap_level_count();
        if level >= levels {
            return Err(Error::InvalidArgument(format!(
                "mip level {level} out of range, texture has {levels}"
            )));
        }
        let extent = self.level_size(level);
        if !region.fits_within(extent) {
            return Err(Error::InvalidArgument(format!(
                "{region:?} does not fit level {level} of size {extent:?}"
            )));
        }
        if let Some(pf) = self.pixel_format() {
            let min_row = region.size.width.saturating_mul(pf.bytes_per_pixel());
            if bytes_per_row < min_row {
                return Err(Error::InvalidArgument(format!(
                    "bytes_per_row {bytes_per_row} is smaller than one row ({min_row})"
                )));
            }
        }
        region
            .required_len(bytes_per_row)
            .ok_or_else(|| Error::InvalidArgument("region byte size overflows".into()))
    }
}
