use core::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_metal::{MTLBlitCommandEncoder, MTLCommandEncoder, MTLComputeCommandEncoder};
use zerocopy::{Immutable, IntoBytes};

use crate::ingot::error::{Error, Result};
use crate::ingot::types::{Origin, Size};

use super::{Buffer, ComputePipelineState, Texture};

/// Resource copy and synchronization commands.
///
/// Call `end_encoding` before creating another encoder on the same command buffer.
#[derive(Debug)]
pub struct BlitEncoder {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLBlitCommandEncoder>>,
}

impl BlitEncoder {
    #[allow(clippy::too_many_arguments)]
    pub fn copy_from_texture(
        &self,
        src: &Texture,
        src_slice: usize,
        src_level: usize,
        src_origin: Origin,
        src_size: Size,
        dst: &Texture,
        dst_slice: usize,
        dst_level: usize,
        dst_origin: Origin,
    ) {
        unsafe {
            self.raw.copyFromTexture_sourceSlice_sourceLevel_sourceOrigin_sourceSize_toTexture_destinationSlice_destinationLevel_destinationOrigin(
                &src.raw,
                src_slice,
                src_level,
                src_origin.into(),
                src_size.into(),
                &dst.raw,
                dst_slice,
                dst_level,
                dst_origin.into(),
            );
        }
    }

    /// Copy the overlapping extent of level 0, slice 0.
    pub fn copy_texture(&self, src: &Texture, dst: &Texture) {
        let size = Size::new_2d(src.width().min(dst.width()), src.height().min(dst.height()));
        self.copy_from_texture(src, 0, 0, Origin::ZERO, size, dst, 0, 0, Origin::ZERO);
    }

    pub fn copy_buffer(
        &self,
        src: &Buffer,
        src_offset: usize,
        dst: &Buffer,
        dst_offset: usize,
        len: usize,
    ) -> Result<()> {
        check_range("blit source", src_offset, len, src.len())?;
        check_range("blit destination", dst_offset, len, dst.len())?;
        unsafe {
            self.raw.copyFromBuffer_sourceOffset_toBuffer_destinationOffset_size(
                &src.raw, src_offset, &dst.raw, dst_offset, len,
            );
        }
        Ok(())
    }

    /// Make GPU writes to a managed texture visible to the CPU after completion.
    #[cfg(target_os = "macos")]
    pub fn synchronize_texture(&self, texture: &Texture) {
        unsafe { self.raw.synchronizeResource(ProtocolObject::from_ref(&*texture.raw)) }
    }

    pub fn end_encoding(self) {
        self.raw.endEncoding()
    }
}

/// Commands for a compute pass.
#[derive(Debug)]
pub struct ComputeEncoder {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLComputeCommandEncoder>>,
}

impl ComputeEncoder {
    pub fn set_compute_pipeline_state(&self, pipeline: &ComputePipelineState) {
        unsafe { self.raw.setComputePipelineState(&pipeline.raw) }
    }

    /// Copy a small block of constant data into the argument table at `index`.
    pub fn set_bytes<T>(&self, value: &T, index: usize) -> Result<()>
    where
        T: IntoBytes + Immutable + ?Sized,
    {
        let bytes = value.as_bytes();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument("set_bytes needs at least one byte".into()));
        }
        unsafe {
            self.raw
                .setBytes_length_atIndex(NonNull::from(bytes).cast(), bytes.len(), index)
        }
        Ok(())
    }

    pub fn set_buffer(&self, buffer: &Buffer, offset: usize, index: usize) -> Result<()> {
        if offset >= buffer.len() {
            return Err(Error::OutOfBounds {
                what: "buffer offset",
                needed: offset.saturating_add(1),
                available: buffer.len(),
            });
        }
        unsafe { self.raw.setBuffer_offset_atIndex(Some(&buffer.raw), offset, index) }
        Ok(())
    }

    pub fn set_texture(&self, texture: &Texture, index: usize) {
        unsafe { self.raw.setTexture_atIndex(Some(&texture.raw), index) }
    }

    /// Dispatch exactly `threads_per_grid` threads; edge threadgroups may be partial.
    pub fn dispatch_threads(&self, threads_per_grid: Size, threads_per_threadgroup: Size) {
        unsafe {
            self.raw.dispatchThreads_threadsPerThreadgroup(
                threads_per_grid.into(),
                threads_per_threadgroup.into(),
            )
        }
    }

    pub fn dispatch_threadgroups(&self, threadgroups_per_grid: Size, threads_per_threadgroup: Size) {
        unsafe {
            self.raw.dispatchThreadgroups_threadsPerThreadgroup(
                threadgroups_per_grid.into(),
                threads_per_threadgroup.into(),
            )
        }
    }

    pub fn end_encoding(self) {
        self.raw.endEncoding()
    }
}

fn check_range(what: &'static str, offset: usize, len: usize, available: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= available => Ok(()),
        _ => Err(Error::OutOfBounds { what, needed: offset.saturating_add(len), available }),
    }
}
