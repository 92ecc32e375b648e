use core::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_foundation::NSString;
use objc2_metal::{MTLCompileOptions, MTLCreateSystemDefaultDevice, MTLDevice, MTLTextureDescriptor};
use tracing::{debug, warn};
use zerocopy::{Immutable, IntoBytes};

use crate::ingot::error::{Error, Result};
use crate::ingot::types::{CompileOptions, ResourceOptions, StorageMode, TextureDescriptor};

use super::{Buffer, CommandQueue, ComputePipelineState, Function, Library, Texture};

/// Whether the system can provide a default Metal device.
pub fn is_supported() -> bool {
    MTLCreateSystemDefaultDevice().is_some()
}

/// Properties read once when the device is wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub registry_id: u64,
    pub headless: bool,
    pub low_power: bool,
    pub removable: bool,
}

#[derive(Debug, Clone)]
pub struct Device {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLDevice>>,
    info: DeviceInfo,
}

impl Device {
    /// The preferred system default device.
    ///
    /// Command-line tools get a device only when CoreGraphics is linked, which
    /// `objc2-core-graphics` takes care of.
    pub fn system_default() -> Result<Self> {
        let raw = MTLCreateSystemDefaultDevice().ok_or(Error::Unsupported)?;
        let device = Self::from_raw(raw);
        debug!(
            name = %device.info.name,
            registry_id = device.info.registry_id,
            headless = device.info.headless,
            low_power = device.info.low_power,
            "using system default metal device"
        );
        Ok(device)
    }

    pub fn from_raw(raw: Retained<ProtocolObject<dyn MTLDevice>>) -> Self {
        let info = read_info(&raw);
        Self { raw, info }
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLDevice> {
        &self.raw
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Serial command submission queue.
    pub fn new_command_queue(&self) -> Result<CommandQueue> {
        let raw = self.raw.newCommandQueue().ok_or(Error::Creation("command queue"))?;
        Ok(CommandQueue { raw })
    }

    pub fn new_texture(&self, desc: &TextureDescriptor) -> Result<Texture> {
        desc.validate()?;
        let mtl_desc = MTLTextureDescriptor::new();
        unsafe {
            mtl_desc.setPixelFormat(desc.pixel_format.into());
            mtl_desc.setWidth(desc.width);
            mtl_desc.setHeight(desc.height);
            mtl_desc.setStorageMode(desc.storage_mode.into());
            mtl_desc.setUsage(desc.usage.into());
        }
        let raw = self
            .raw
            .newTextureWithDescriptor(&mtl_desc)
            .ok_or(Error::Creation("texture"))?;
        debug!(
            width = desc.width,
            height = desc.height,
            format = ?desc.pixel_format,
            storage = ?desc.storage_mode,
            "created texture"
        );
        Ok(Texture::from_raw(raw))
    }

    /// Uninitialized buffer of `len` bytes.
    pub fn new_buffer(&self, len: usize, options: ResourceOptions) -> Result<Buffer> {
        if len == 0 {
            return Err(Error::InvalidArgument("buffer length must be non-zero".into()));
        }
        let raw = self
            .raw
            .newBufferWithLength_options(len, options.into())
            .ok_or(Error::Creation("buffer"))?;
        Ok(Buffer::from_raw(raw))
    }

    /// Buffer initialized with a copy of `data`.
    pub fn new_buffer_with_data<T>(&self, data: &[T], options: ResourceOptions) -> Result<Buffer>
    where
        T: IntoBytes + Immutable,
    {
        let bytes = data.as_bytes();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument("buffer length must be non-zero".into()));
        }
        if options.storage_mode() == StorageMode::Private {
            return Err(Error::InvalidArgument(
                "private buffers cannot be initialized from CPU data".into(),
            ));
        }
        let ptr = NonNull::from(bytes).cast();
        let raw = unsafe { self.raw.newBufferWithBytes_length_options(ptr, bytes.len(), options.into()) }
            .ok_or(Error::Creation("buffer"))?;
        Ok(Buffer::from_raw(raw))
    }

    /// Compile Metal Shading Language source into a library.
    pub fn new_library(&self, source: &str, options: &CompileOptions) -> Result<Library> {
        let src = NSString::from_str(source);
        let opts = MTLCompileOptions::new();
        if let Some(version) = options.language_version {
            unsafe { opts.setLanguageVersion(version.into()) };
        }
        match unsafe { self.raw.newLibraryWithSource_options_error(&src, Some(&opts)) } {
            Ok(raw) => {
                debug!(bytes = source.len(), "compiled metal library");
                Ok(Library { raw })
            }
            Err(err) => {
                let msg = err.localizedDescription().to_string();
                warn!(error = %msg, "metal library compilation failed");
                Err(Error::Compile(msg))
            }
        }
    }

    pub fn new_compute_pipeline_state(&self, function: &Function) -> Result<ComputePipelineState> {
        match unsafe { self.raw.newComputePipelineStateWithFunction_error(&function.raw) } {
            Ok(raw) => Ok(ComputePipelineState { raw }),
            Err(err) => {
                let msg = err.localizedDescription().to_string();
                warn!(function = %function.name(), error = %msg, "compute pipeline creation failed");
                Err(Error::Pipeline(msg))
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn read_info(raw: &ProtocolObject<dyn MTLDevice>) -> DeviceInfo {
    DeviceInfo {
        name: raw.name().to_string(),
        registry_id: raw.registryID(),
        headless: raw.isHeadless(),
        low_power: raw.isLowPower(),
        removable: raw.isRemovable(),
    }
}

// iOS-family devices are always integrated, built in and attached to a display.
#[cfg(not(target_os = "macos"))]
fn read_info(raw: &ProtocolObject<dyn MTLDevice>) -> DeviceInfo {
    DeviceInfo {
        name: raw.name().to_string(),
        registry_id: raw.registryID(),
        headless: false,
        low_power: false,
        removable: false,
    }
}
