#![cfg(target_vendor = "apple")]

use std::sync::mpsc;
use std::time::Duration;

use ingot::mtl::{
    Buffer, CompileOptions, ComputeProgram, Device, LanguageVersion, Layer, LayerConfig,
    PixelFormat, Region, ResourceOptions, Size, StorageMode, TextureDescriptor,
};
use ingot::Error;
use objc2::Message;
use zerocopy::{Immutable, IntoBytes};

const ARITH: &str = r#"
#include <metal_stdlib>
using namespace metal;

struct Params {
    float scale;
    uint count;
};

kernel void add(device const float *a [[buffer(0)]],
                device const float *b [[buffer(1)]],
                device float *out [[buffer(2)]],
                uint i [[thread_position_in_grid]]) {
    out[i] = a[i] + b[i];
}

kernel void scale(device float *data [[buffer(0)]],
                  constant Params &p [[buffer(1)]],
                  uint i [[thread_position_in_grid]]) {
    if (i < p.count) {
        data[i] *= p.scale;
    }
}
"#;

#[derive(IntoBytes, Immutable)]
#[repr(C)]
struct Params {
    scale: f32,
    count: u32,
}

fn device() -> Option<Device> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    match Device::system_default() {
        Ok(d) => Some(d),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}

#[test]
fn system_default_device_has_a_name() {
    let Some(device) = device() else { return };
    assert!(!device.name().is_empty());
    assert_eq!(device.info().name, device.name());
}

#[test]
fn shared_buffer_write_then_read() {
    let Some(device) = device() else { return };
    let buf = device.new_buffer(16, ResourceOptions::STORAGE_MODE_SHARED).unwrap();
    assert_eq!(buf.len(), 16);
    buf.write(0, &[1u32, 2, 3, 4]).unwrap();
    buf.write_one(2, &30u32).unwrap();
    assert_eq!(buf.read::<u32>(0, 4).unwrap(), vec![1, 2, 30, 4]);
    assert_eq!(buf.read::<u32>(8, 2).unwrap(), vec![30, 4]);
}

#[test]
fn buffer_access_is_bounds_checked() {
    let Some(device) = device() else { return };
    let buf = device.new_buffer_with_data(&[0u8; 8], ResourceOptions::default()).unwrap();
    let err = buf.read::<u32>(4, 2).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds { needed: 12, available: 8, .. }), "{err}");
    assert!(buf.write(usize::MAX, &[1u8]).is_err());
}

#[test]
fn zero_length_buffers_are_rejected() {
    let Some(device) = device() else { return };
    assert!(matches!(
        device.new_buffer(0, ResourceOptions::default()),
        Err(Error::InvalidArgument(_))
    ));
    let empty: [f32; 0] = [];
    assert!(device.new_buffer_with_data(&empty, ResourceOptions::default()).is_err());
}

#[test]
fn private_buffers_cannot_start_from_cpu_data() {
    let Some(device) = device() else { return };
    assert!(matches!(
        device.new_buffer_with_data(&[1u32, 2], ResourceOptions::STORAGE_MODE_PRIVATE),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn wrapped_buffer_uses_native_storage_mode() {
    let Some(device) = device() else { return };
    let private = device.new_buffer(64, ResourceOptions::STORAGE_MODE_PRIVATE).unwrap();
    let wrapped = Buffer::from_raw(private.raw().retain());
    assert_eq!(wrapped.storage_mode(), Some(StorageMode::Private));
    assert_eq!(wrapped.options().storage_mode(), StorageMode::Private);
    assert!(matches!(wrapped.read::<u8>(0, 1), Err(Error::NotCpuAccessible(StorageMode::Private))));
    assert!(matches!(wrapped.write(0, &[0u8]), Err(Error::NotCpuAccessible(_))));
}

#[test]
fn private_buffer_refuses_cpu_access() {
    let Some(device) = device() else { return };
    let buf = device.new_buffer(64, ResourceOptions::STORAGE_MODE_PRIVATE).unwrap();
    assert_eq!(buf.options().storage_mode(), StorageMode::Private);
    assert!(matches!(
        buf.write(0, &[1u8]),
        Err(Error::NotCpuAccessible(StorageMode::Private))
    ));
    assert!(matches!(buf.read::<u8>(0, 1), Err(Error::NotCpuAccessible(_))));
}

#[test]
fn compute_program_adds_vectors() {
    let Some(device) = device() else { return };
    let program =
        ComputeProgram::new(&device, ARITH, &CompileOptions::default(), &["add", "scale"]).unwrap();

    let n = 1000;
    let a: Vec<f32> = (0..n).map(|i| i as f32).collect();
    let b: Vec<f32> = (0..n).map(|i| (2 * i) as f32).collect();
    let opts = ResourceOptions::STORAGE_MODE_SHARED;
    let buf_a = device.new_buffer_with_data(&a, opts).unwrap();
    let buf_b = device.new_buffer_with_data(&b, opts).unwrap();
    let out = device.new_buffer(n * 4, opts).unwrap();

    program.dispatch_1d("add", &[&buf_a, &buf_b, &out], n).unwrap();
    let sum = out.read::<f32>(0, n).unwrap();
    for (i, v) in sum.iter().enumerate() {
        assert_eq!(*v, (3 * i) as f32, "element {i}");
    }

    let group = program.kernel("add").unwrap().threadgroup_1d(n);
    assert!(group.width >= 1 && group.width <= n);
    assert_eq!((group.height, group.depth), (1, 1));
}

#[test]
fn compute_encoder_binds_constant_bytes() {
    let Some(device) = device() else { return };
    let program = ComputeProgram::new(&device, ARITH, &CompileOptions::default(), &["scale"]).unwrap();
    let data = device
        .new_buffer_with_data(&[1.0f32, 2.0, 3.0, 4.0], ResourceOptions::STORAGE_MODE_SHARED)
        .unwrap();
    let pipeline = program.kernel("scale").unwrap();

    let cmd = program.queue().command_buffer().unwrap();
    let enc = cmd.compute_encoder().unwrap();
    enc.set_compute_pipeline_state(pipeline);
    enc.set_buffer(&data, 0, 0).unwrap();
    enc.set_bytes(&Params { scale: 2.0, count: 3 }, 1).unwrap();
    enc.dispatch_threads(Size::new_1d(4), pipeline.threadgroup_1d(4));
    enc.end_encoding();
    cmd.commit_and_wait().unwrap();

    assert_eq!(data.read::<f32>(0, 4).unwrap(), vec![2.0, 4.0, 6.0, 4.0]);
}

#[test]
fn compute_encoder_rejects_bad_arguments() {
    let Some(device) = device() else { return };
    let queue = device.new_command_queue().unwrap();
    let buf = device.new_buffer(16, ResourceOptions::default()).unwrap();
    let cmd = queue.command_buffer().unwrap();
    let enc = cmd.compute_encoder().unwrap();

    let empty: &[u8] = &[];
    assert!(matches!(enc.set_bytes(empty, 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(
        enc.set_buffer(&buf, 16, 0),
        Err(Error::OutOfBounds { needed: 17, available: 16, .. })
    ));
    assert!(matches!(
        enc.set_buffer(&buf, usize::MAX, 0),
        Err(Error::OutOfBounds { needed: usize::MAX, .. })
    ));
    enc.set_buffer(&buf, 15, 0).unwrap();
    enc.end_encoding();
    cmd.commit_and_wait().unwrap();
}

#[test]
fn library_compiles_with_explicit_language_version() {
    let Some(device) = device() else { return };
    let options = CompileOptions::with_language_version(LanguageVersion::V2_0);
    let library = device.new_library(ARITH, &options).unwrap();
    assert_eq!(library.new_function("add").unwrap().name(), "add");
}

#[test]
fn dispatch_of_zero_elements_is_a_no_op() {
    let Some(device) = device() else { return };
    let program = ComputeProgram::new(&device, ARITH, &CompileOptions::default(), &["add"]).unwrap();
    let buf = device.new_buffer(4, ResourceOptions::default()).unwrap();
    program.dispatch_1d("add", &[&buf, &buf, &buf], 0).unwrap();
    assert!(format!("{program:?}").starts_with("ComputeProgram"));
    assert!(matches!(
        program.dispatch_1d("missing", &[&buf], 1),
        Err(Error::FunctionNotFound(name)) if name == "missing"
    ));
}

#[test]
fn compile_errors_carry_the_native_message() {
    let Some(device) = device() else { return };
    let err = device
        .new_library("kernel void broken(", &CompileOptions::default())
        .unwrap_err();
    match err {
        Error::Compile(msg) => assert!(!msg.is_empty()),
        other => panic!("expected compile error, got {other:?}"),
    }
}

#[test]
fn library_lists_and_looks_up_functions() {
    let Some(device) = device() else { return };
    let library = device.new_library(ARITH, &CompileOptions::default()).unwrap();
    let mut names = library.function_names();
    names.sort();
    assert_eq!(names, vec!["add".to_string(), "scale".to_string()]);
    assert_eq!(library.new_function("add").unwrap().name(), "add");
    assert!(matches!(library.new_function("nope"), Err(Error::FunctionNotFound(_))));
}

#[test]
fn texture_replace_and_read_region() {
    let Some(device) = device() else { return };
    let desc = TextureDescriptor::new_2d(PixelFormat::RGBA8Unorm, 4, 4);
    let tex = device.new_texture(&desc).unwrap();
    assert_eq!((tex.width(), tex.height(), tex.depth()), (4, 4, 1));
    assert_eq!(tex.pixel_format(), Some(PixelFormat::RGBA8Unorm));

    let pixels: Vec<[u8; 4]> = (0..16u8).map(|i| [i, i, i, 255]).collect();
    tex.replace_region(Region::make_2d(0, 0, 4, 4), 0, &pixels, desc.bytes_per_row())
        .unwrap();

    let row = tex.read_region(Region::make_2d(0, 2, 4, 1), 0, 16).unwrap();
    assert_eq!(row.len(), 16);
    assert_eq!(&row[..4], &[8, 8, 8, 255]);
    assert_eq!(&row[12..], &[11, 11, 11, 255]);
}

#[test]
fn texture_uploads_are_validated() {
    let Some(device) = device() else { return };
    let desc = TextureDescriptor::new_2d(PixelFormat::RGBA8Unorm, 4, 4);
    let tex = device.new_texture(&desc).unwrap();

    let short = [0u8; 8];
    assert!(matches!(
        tex.replace_region(Region::make_2d(0, 0, 4, 4), 0, &short, 16),
        Err(Error::OutOfBounds { needed: 64, available: 8, .. })
    ));
    assert!(matches!(
        tex.read_region(Region::make_2d(2, 2, 4, 4), 0, 16),
        Err(Error::InvalidArgument(_))
    ));
    assert!(tex.read_region(Region::make_2d(0, 0, 4, 1), 0, 8).is_err());
    assert!(device.new_texture(&TextureDescriptor::new_2d(PixelFormat::R8Unorm, 0, 4)).is_err());
}

#[test]
fn texture_transfers_reject_missing_mip_levels() {
    let Some(device) = device() else { return };
    let desc = TextureDescriptor::new_2d(PixelFormat::RGBA8Unorm, 64, 64);
    let tex = device.new_texture(&desc).unwrap();
    assert_eq!(tex.mipmap_level_count(), 1);

    assert!(matches!(
        tex.replace_region(Region::make_2d(0, 0, 2, 2), 5, &[0u8; 16], 8),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        tex.read_region(Region::make_2d(0, 0, 1, 1), 1, 4),
        Err(Error::InvalidArgument(_))
    ));
    #[cfg(target_pointer_width = "64")]
    assert!(tex.read_region(Region::make_2d(0, 0, 1, 1), 1 << 32, 4).is_err());
}

#[test]
#[cfg(target_pointer_width = "64")]
fn texture_readback_validates_before_allocating() {
    let Some(device) = device() else { return };
    let desc = TextureDescriptor::new_2d(PixelFormat::R8Unorm, 16, 16);
    let tex = device.new_texture(&desc).unwrap();
    assert!(matches!(
        tex.read_region(Region::make_2d(0, 0, 1, 1 << 20), 0, 1 << 40),
        Err(Error::InvalidArgument(_))
    ));

    let private = device.new_texture(&desc.with_storage_mode(StorageMode::Private)).unwrap();
    assert!(matches!(
        private.read_region(Region::make_2d(0, 0, 16, 16), 0, 1 << 40),
        Err(Error::NotCpuAccessible(StorageMode::Private))
    ));
}

#[test]
fn blit_copies_between_textures() {
    let Some(device) = device() else { return };
    let desc = TextureDescriptor::new_2d(PixelFormat::R8Unorm, 8, 2);
    let src = device.new_texture(&desc).unwrap();
    let dst = device.new_texture(&desc).unwrap();
    let pixels: Vec<u8> = (0..16).collect();
    src.replace_region(Region::make_2d(0, 0, 8, 2), 0, &pixels, 8).unwrap();
    dst.replace_region(Region::make_2d(0, 0, 8, 2), 0, &[0u8; 16], 8).unwrap();

    let queue = device.new_command_queue().unwrap();
    let cmd = queue.command_buffer().unwrap();
    let blit = cmd.blit_encoder().unwrap();
    blit.copy_texture(&src, &dst);
    #[cfg(target_os = "macos")]
    if dst.storage_mode() == Some(StorageMode::Managed) {
        blit.synchronize_texture(&dst);
    }
    blit.end_encoding();
    cmd.commit_and_wait().unwrap();

    assert_eq!(dst.read_region(Region::make_2d(0, 0, 8, 2), 0, 8).unwrap(), pixels);
}

#[test]
fn blit_copies_between_buffers() {
    let Some(device) = device() else { return };
    let src = device.new_buffer_with_data(&[1u32, 2, 3, 4], ResourceOptions::default()).unwrap();
    let dst = device.new_buffer(16, ResourceOptions::default()).unwrap();
    dst.write(0, &[0u32; 4]).unwrap();

    let queue = device.new_command_queue().unwrap();
    let cmd = queue.command_buffer().unwrap();
    let blit = cmd.blit_encoder().unwrap();
    assert!(blit.copy_buffer(&src, 8, &dst, 0, 16).is_err());
    blit.copy_buffer(&src, 4, &dst, 0, 8).unwrap();
    blit.end_encoding();
    cmd.commit_and_wait().unwrap();

    assert_eq!(dst.read::<u32>(0, 4).unwrap(), vec![2, 3, 0, 0]);
}

#[test]
fn completed_handler_runs_after_commit() {
    let Some(device) = device() else { return };
    let queue = device.new_command_queue().unwrap();
    let cmd = queue.command_buffer().unwrap();
    let (tx, rx) = mpsc::channel();
    cmd.add_completed_handler(move || {
        let _ = tx.send(());
    })
    .unwrap();
    cmd.commit();
    rx.recv_timeout(Duration::from_secs(5)).expect("completion handler did not run");
    assert!(cmd.error().is_none());
}

#[test]
fn completed_handler_after_commit_is_rejected() {
    let Some(device) = device() else { return };
    let queue = device.new_command_queue().unwrap();
    let cmd = queue.command_buffer().unwrap();
    cmd.commit();
    assert!(matches!(cmd.add_completed_handler(|| {}), Err(Error::CommandBuffer(_))));
    cmd.wait_until_completed();
}

#[test]
fn metal_layer_applies_and_validates_config() {
    let Some(device) = device() else { return };
    let config = LayerConfig { drawable_size: Some((64, 32)), ..LayerConfig::default() };
    let layer = Layer::new(&device, &config).unwrap();
    assert_eq!(layer.pixel_format(), Some(PixelFormat::BGRA8Unorm));
    assert_eq!(layer.drawable_size(), (64, 32));

    layer.set_pixel_format(PixelFormat::RGBA16Float).unwrap();
    assert_eq!(layer.pixel_format(), Some(PixelFormat::RGBA16Float));
    assert!(matches!(layer.set_pixel_format(PixelFormat::R32Float), Err(Error::Configuration(_))));
    assert!(matches!(layer.set_maximum_drawable_count(4), Err(Error::Configuration(_))));
    layer.set_maximum_drawable_count(2).unwrap();

    let bad = LayerConfig { max_drawables: 1, ..LayerConfig::default() };
    assert!(Layer::new(&device, &bad).is_err());
}
