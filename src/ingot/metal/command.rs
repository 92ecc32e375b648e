use core::ptr::NonNull;
use std::sync::Mutex;

use block2::RcBlock;
use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_metal::{MTLCommandBuffer, MTLCommandBufferStatus, MTLCommandQueue};
use tracing::warn;

use crate::ingot::error::{Error, Result};
use crate::ingot::layer::MetalDrawable;

use super::{BlitEncoder, ComputeEncoder};

/// Orders the command buffers the GPU executes.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLCommandQueue>>,
}

impl CommandQueue {
    /// Command buffers are single use: create, encode, commit.
    pub fn command_buffer(&self) -> Result<CommandBuffer> {
        let raw = self.raw.commandBuffer().ok_or(Error::Creation("command buffer"))?;
        Ok(CommandBuffer { raw })
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLCommandQueue> {
        &self.raw
    }
}

/// Encoded commands waiting to be committed to the GPU.
#[derive(Debug)]
pub struct CommandBuffer {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLCommandBuffer>>,
}

impl CommandBuffer {
    pub fn blit_encoder(&self) -> Result<BlitEncoder> {
        let raw = self.raw.blitCommandEncoder().ok_or(Error::Creation("blit command encoder"))?;
        Ok(BlitEncoder { raw })
    }

    pub fn compute_encoder(&self) -> Result<ComputeEncoder> {
        let raw = self
            .raw
            .computeCommandEncoder()
            .ok_or(Error::Creation("compute command encoder"))?;
        Ok(ComputeEncoder { raw })
    }

    /// Present `drawable` as soon as this buffer has been scheduled.
    pub fn present_drawable(&self, drawable: &MetalDrawable) {
        self.raw.presentDrawable(ProtocolObject::from_ref(&*drawable.raw))
    }

    pub fn commit(&self) {
        self.raw.commit()
    }

    pub fn wait_until_completed(&self) {
        self.raw.waitUntilCompleted()
    }

    /// Commit, block until the GPU is done, and surface any execution error.
    pub fn commit_and_wait(self) -> Result<()> {
        self.raw.commit();
        self.raw.waitUntilCompleted();
        match self.error() {
            Some(msg) => {
                warn!(error = %msg, "command buffer failed");
                Err(Error::CommandBuffer(msg))
            }
            None => Ok(()),
        }
    }

    /// Run `handler` once, on a Metal-owned thread, after the GPU finishes
    /// this buffer. Metal only accepts handlers before `commit`.
    pub fn add_completed_handler<F>(&self, handler: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let status = self.raw.status();
        if status.0 >= MTLCommandBufferStatus::Committed.0 {
            warn!(status = status.0, "completion handler added after commit");
            return Err(Error::CommandBuffer(
                "completion handlers must be added before commit".into(),
            ));
        }
        let slot = Mutex::new(Some(handler));
        let block = RcBlock::new(move |_: NonNull<ProtocolObject<dyn MTLCommandBuffer>>| {
            let handler = slot.lock().ok().and_then(|mut h| h.take());
            if let Some(handler) = handler {
                handler();
            }
        });
        // Metal copies the block, so our reference can drop here.
        unsafe { self.raw.addCompletedHandler(RcBlock::as_ptr(&block)) }
        Ok(())
    }

    /// Native description of the failure, if execution failed.
    pub fn error(&self) -> Option<String> {
        self.raw.error().map(|e| e.localizedDescription().to_string())
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLCommandBuffer> {
        &self.raw
    }
}
