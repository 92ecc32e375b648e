//! Element-wise compute over buffers: one library, one pipeline per kernel,
//! synchronous one-dimensional dispatch.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::ingot::error::{Error, Result};
use crate::ingot::metal::{Buffer, CommandQueue, ComputePipelineState, Device, Library};
use crate::ingot::types::{CompileOptions, Size};

#[derive(Debug)]
pub struct ComputeProgram {
    queue: CommandQueue,
    library: Library,
    kernels: HashMap<String, ComputePipelineState>,
}

impl ComputeProgram {
    /// Compile `source` and build a pipeline for each of `entry_points`.
    pub fn new(
        device: &Device,
        source: &str,
        options: &CompileOptions,
        entry_points: &[&str],
    ) -> Result<Self> {
        let library = device.new_library(source, options)?;
        let mut kernels = HashMap::with_capacity(entry_points.len());
        for &name in entry_points {
            let function = library.new_function(name)?;
            let pipeline = device.new_compute_pipeline_state(&function)?;
            debug!(
                kernel = name,
                max_threads = pipeline.max_total_threads_per_threadgroup(),
                simd_width = pipeline.thread_execution_width(),
                "built compute kernel"
            );
            kernels.insert(name.to_string(), pipeline);
        }
        Ok(Self { queue: device.new_command_queue()?, library, kernels })
    }

    pub fn kernel(&self, name: &str) -> Result<&ComputePipelineState> {
        self.kernels.get(name).ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }

    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(String::as_str)
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Run `name` over `n` threads with `buffers` bound at indices `0..`,
    /// blocking until the GPU finishes.
    pub fn dispatch_1d(&self, name: &str, buffers: &[&Buffer], n: usize) -> Result<()> {
        let pipeline = self.kernel(name)?;
        if n == 0 {
            return Ok(());
        }
        // Reject before encoding; an encoder must not be dropped mid-pass.
        if let Some(index) = buffers.iter().position(|b| b.is_empty()) {
            return Err(Error::InvalidArgument(format!("buffer {index} is empty")));
        }
        let cmd = self.queue.command_buffer()?;
        let enc = cmd.compute_encoder()?;
        enc.set_compute_pipeline_state(pipeline);
        for (index, buffer) in buffers.iter().enumerate() {
            enc.set_buffer(buffer, 0, index)?;
        }
        let group = pipeline.threadgroup_1d(n);
        trace!(kernel = name, n, group = group.width, "dispatching");
        enc.dispatch_threads(Size::new_1d(n), group);
        enc.end_encoding();
        cmd.commit_and_wait()
    }
}
