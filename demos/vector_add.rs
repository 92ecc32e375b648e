//! Element-wise add, subtract and square root of float vectors on the GPU.

#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(target_vendor = "apple")]
mod apple_main {
    use ingot::mtl::{CompileOptions, ComputeProgram, Device, ResourceOptions};
    use tracing::info;

    const KERNELS: &str = r#"
#include <metal_stdlib>
using namespace metal;

kernel void add(device const float *a [[buffer(0)]],
                device const float *b [[buffer(1)]],
                device float *out [[buffer(2)]],
                uint i [[thread_position_in_grid]]) {
    out[i] = a[i] + b[i];
}

kernel void sub(device const float *a [[buffer(0)]],
                device const float *b [[buffer(1)]],
                device float *out [[buffer(2)]],
                uint i [[thread_position_in_grid]]) {
    out[i] = a[i] - b[i];
}

kernel void vsqrt(device const float *a [[buffer(0)]],
                  device float *out [[buffer(1)]],
                  uint i [[thread_position_in_grid]]) {
    out[i] = sqrt(a[i]);
}
"#;

    const N: usize = 4096;

    pub fn run() -> ingot::Result<()> {
        let device = Device::system_default()?;
        info!(device = device.name(), "starting vector demo");

        let program =
            ComputeProgram::new(&device, KERNELS, &CompileOptions::default(), &["add", "sub", "vsqrt"])?;

        let a: Vec<f32> = (0..N).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..N).map(|i| (N - i) as f32 * 0.5).collect();
        let opts = ResourceOptions::STORAGE_MODE_SHARED;
        let buf_a = device.new_buffer_with_data(&a, opts)?;
        let buf_b = device.new_buffer_with_data(&b, opts)?;
        let out = device.new_buffer(N * core::mem::size_of::<f32>(), opts)?;

        program.dispatch_1d("add", &[&buf_a, &buf_b, &out], N)?;
        let sum: Vec<f32> = out.read(0, N)?;
        let bad = sum.iter().zip(a.iter().zip(&b)).filter(|(s, (x, y))| **s != *x + *y).count();
        info!(mismatches = bad, first = ?&sum[..4], "add");

        program.dispatch_1d("sub", &[&buf_a, &buf_b, &out], N)?;
        let diff: Vec<f32> = out.read(0, N)?;
        info!(first = ?&diff[..4], "sub");

        program.dispatch_1d("vsqrt", &[&buf_a, &out], N)?;
        let roots: Vec<f32> = out.read(0, N)?;
        info!(first = ?&roots[..4], last = roots[N - 1], "sqrt");

        Ok(())
    }
}

#[cfg(target_vendor = "apple")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ingot=debug".into()),
        )
        .init();
    if let Err(e) = apple_main::run() {
        eprintln!("vector_add failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(target_vendor = "apple"))]
fn main() {
    println!("vector_add requires a Metal device (Apple platforms only).");
}
