use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_foundation::NSString;
use objc2_metal::{MTLComputePipelineState, MTLFunction, MTLLibrary};

use crate::ingot::error::{Error, Result};
use crate::ingot::types::Size;

/// Collection of compiled graphics or compute functions.
#[derive(Debug, Clone)]
pub struct Library {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLLibrary>>,
}

impl Library {
    pub fn new_function(&self, name: &str) -> Result<Function> {
        let ns_name = NSString::from_str(name);
        self.raw
            .newFunctionWithName(&ns_name)
            .map(|raw| Function { raw })
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }

    pub fn function_names(&self) -> Vec<String> {
        self.raw.functionNames().iter().map(|n| n.to_string()).collect()
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLLibrary> {
        &self.raw
    }
}

/// A non-specialized function from a `Library`.
#[derive(Debug, Clone)]
pub struct Function {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLFunction>>,
}

impl Function {
    pub fn name(&self) -> String {
        self.raw.name().to_string()
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLFunction> {
        &self.raw
    }
}

/// Compiled compute pipeline.
#[derive(Debug, Clone)]
pub struct ComputePipelineState {
    pub(crate) raw: Retained<ProtocolObject<dyn MTLComputePipelineState>>,
}

impl ComputePipelineState {
    pub fn thread_execution_width(&self) -> usize {
        self.raw.threadExecutionWidth()
    }

    pub fn max_total_threads_per_threadgroup(&self) -> usize {
        self.raw.maxTotalThreadsPerThreadgroup()
    }

    /// Threadgroup for a one-dimensional dispatch over `n` elements.
    pub fn threadgroup_1d(&self, n: usize) -> Size {
        Size::threadgroup_1d(self.max_total_threads_per_threadgroup(), n)
    }

    pub fn raw(&self) -> &ProtocolObject<dyn MTLComputePipelineState> {
        &self.raw
    }
}
