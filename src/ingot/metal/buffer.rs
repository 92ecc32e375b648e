use core::ffi::c_void;
use core::mem;
use core::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_metal::{MTLBuffer, MTLResource};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes};

use crate::ingot::error::{Error, Result};
use crate::ingot::types::{ResourceOptions, StorageMode};

/// Unformatted memory accessible to the GPU.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLBuffer>>,
}

impl Buffer {
    /// Wrap an existing buffer; CPU access follows its native storage mode.
    pub fn from_raw(raw: Retained<ProtocolObject<dyn MTLBuffer>>) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLBuffer> {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.length()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn options(&self) -> ResourceOptions {
        ResourceOptions::from_bits_retain(self.raw.resourceOptions().bits() as u16)
    }

    /// `None` for storage modes this crate does not model.
    pub fn storage_mode(&self) -> Option<StorageMode> {
        StorageMode::from_raw(self.raw.storageMode().0)
    }

    /// CPU address of the contents. Dangling for private storage.
    pub fn contents(&self) -> NonNull<c_void> {
        self.raw.contents()
    }

    pub fn write<T>(&self, offset: usize, data: &[T]) -> Result<()>
    where
        T: IntoBytes + Immutable,
    {
        let bytes = data.as_bytes();
        self.check_cpu_range("buffer write", offset, bytes.len())?;
        let dst = self.contents().as_ptr().cast::<u8>();
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.add(offset), bytes.len()) };
        self.did_modify(offset, bytes.len());
        Ok(())
    }

    /// Write `value` as element `index` of a `[T]` view of the buffer.
    pub fn write_one<T>(&self, index: usize, value: &T) -> Result<()>
    where
        T: IntoBytes + Immutable,
    {
        let offset = index
            .checked_mul(mem::size_of::<T>())
            .ok_or_else(|| Error::InvalidArgument("element index overflows".into()))?;
        self.write(offset, core::slice::from_ref(value))
    }

    /// Copy `count` elements starting at byte `offset` out of the buffer.
    pub fn read<T>(&self, offset: usize, count: usize) -> Result<Vec<T>>
    where
        T: IntoBytes + FromBytes + Copy,
    {
        let len = count
            .checked_mul(mem::size_of::<T>())
            .ok_or_else(|| Error::InvalidArgument("element count overflows".into()))?;
        self.check_cpu_range("buffer read", offset, len)?;
        let mut out = vec![<T as FromZeros>::new_zeroed(); count];
        let src = unsafe {
            core::slice::from_raw_parts(self.contents().as_ptr().cast::<u8>().add(offset), len)
        };
        out.as_mut_bytes().copy_from_slice(src);
        Ok(out)
    }

    fn check_cpu_range(&self, what: &'static str, offset: usize, len: usize) -> Result<()> {
        match self.storage_mode() {
            Some(mode) if mode.is_cpu_accessible() => {}
            Some(mode) => return Err(Error::NotCpuAccessible(mode)),
            None => return Err(Error::InvalidArgument("unknown buffer storage mode".into())),
        }
        let available = self.len();
        match offset.checked_add(len) {
            Some(end) if end <= available => Ok(()),
            _ => Err(Error::OutOfBounds { what, needed: offset.saturating_add(len), available }),
        }
    }

    #[cfg(target_os = "macos")]
    fn did_modify(&self, offset: usize, len: usize) {
        if self.storage_mode() == Some(StorageMode::Managed) && len > 0 {
            self.raw.didModifyRange(objc2_foundation::NSRange::new(offset, len));
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn did_modify(&self, _offset: usize, _len: usize) {}
}
