//! Opens a winit window backed by a `CAMetalLayer` and presents a gradient
//! uploaded from the CPU and blitted into each drawable.

#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(target_os = "macos")]
mod winit_main {
    use std::time::Instant;

    use ingot::mtl::{
        CommandQueue, Device, Layer, LayerConfig, PixelFormat, Region, StorageMode, Texture,
        TextureDescriptor, View,
    };
    use tracing::{info, warn};
    use winit::application::ApplicationHandler;
    use winit::event::WindowEvent;
    use winit::event_loop::{ActiveEventLoop, EventLoop};
    use winit::window::{Window, WindowAttributes};

    struct Surface {
        device: Device,
        queue: CommandQueue,
        layer: Layer,
        view: View,
        source: Option<Texture>,
    }

    impl Surface {
        fn resize(&mut self, width: u32, height: u32) {
            if width == 0 || height == 0 {
                return;
            }
            self.layer.set_drawable_size(width as usize, height as usize);
            self.source = None;
        }

        /// BGRA gradient sized to the current drawables, rebuilt after resizes.
        fn source(&mut self, t: f32) -> ingot::Result<&Texture> {
            let (w, h) = self.layer.drawable_size();
            let desc = TextureDescriptor::new_2d(PixelFormat::BGRA8Unorm, w.max(1), h.max(1))
                .with_storage_mode(StorageMode::Managed);
            let tex = match self.source.take() {
                Some(tex) => tex,
                None => self.device.new_texture(&desc)?,
            };
            let pixels = gradient(desc.width, desc.height, t);
            tex.replace_region(
                Region::make_2d(0, 0, desc.width, desc.height),
                0,
                &pixels,
                desc.bytes_per_row(),
            )?;
            Ok(self.source.insert(tex))
        }

        fn draw(&mut self, t: f32) -> ingot::Result<()> {
            self.source(t)?;
            let drawable = self.layer.next_drawable()?;
            let target = drawable.texture();
            let cmd = self.queue.command_buffer()?;
            let blit = cmd.blit_encoder()?;
            if let Some(src) = self.source.as_ref() {
                blit.copy_texture(src, &target);
            }
            blit.end_encoding();
            cmd.present_drawable(&drawable);
            cmd.commit();
            Ok(())
        }
    }

    fn gradient(width: usize, height: usize, t: f32) -> Vec<[u8; 4]> {
        let phase = (t.sin() * 0.5 + 0.5) * 255.0;
        let mut out = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                out.push([phase as u8, g, r, 255]);
            }
        }
        out
    }

    #[derive(Default)]
    struct Handler {
        window: Option<Window>,
        surface: Option<Surface>,
        start: Option<Instant>,
    }

    impl Handler {
        fn init_surface(window: &Window) -> ingot::Result<Surface> {
            let device = Device::system_default()?;
            let size = window.inner_size();
            let config = LayerConfig {
                // Drawables are blit destinations here.
                framebuffer_only: false,
                drawable_size: Some((size.width.max(1) as usize, size.height.max(1) as usize)),
                ..LayerConfig::default()
            };
            let layer = Layer::new(&device, &config)?;
            let view = View::from_window_handle(window)?;
            view.attach_layer(&layer);
            let queue = device.new_command_queue()?;
            info!(device = device.name(), width = size.width, height = size.height, "surface ready");
            Ok(Surface { device, queue, layer, view, source: None })
        }
    }

    impl ApplicationHandler for Handler {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            if self.window.is_some() {
                return;
            }
            let attrs = WindowAttributes::default().with_title("ingot gradient");
            let window = match event_loop.create_window(attrs) {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, "failed to create window");
                    event_loop.exit();
                    return;
                }
            };
            match Self::init_surface(&window) {
                Ok(surface) => self.surface = Some(surface),
                Err(e) => {
                    warn!(error = %e, "failed to set up metal surface");
                    event_loop.exit();
                    return;
                }
            }
            self.start = Some(Instant::now());
            self.window = Some(window);
        }

        fn window_event(
            &mut self,
            event_loop: &ActiveEventLoop,
            window_id: winit::window::WindowId,
            event: WindowEvent,
        ) {
            let Some(window) = self.window.as_ref() else {
                return;
            };
            if window.id() != window_id {
                return;
            }
            match event {
                WindowEvent::CloseRequested => {
                    if let Some(surface) = self.surface.take() {
                        surface.view.detach_layer();
                    }
                    event_loop.exit();
                }
                WindowEvent::Resized(size) => {
                    if let Some(surface) = self.surface.as_mut() {
                        surface.resize(size.width, size.height);
                    }
                    window.request_redraw();
                }
                WindowEvent::RedrawRequested => {
                    let t = self.start.map(|s| s.elapsed().as_secs_f32()).unwrap_or(0.0);
                    if let Some(surface) = self.surface.as_mut() {
                        if let Err(e) = surface.draw(t) {
                            warn!(error = %e, "frame dropped");
                        }
                    }
                }
                _ => {}
            }
        }

        fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    pub fn run() {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
        let event_loop = match EventLoop::new() {
            Ok(el) => el,
            Err(e) => {
                eprintln!("failed to create event loop: {e}");
                return;
            }
        };
        let mut handler = Handler::default();
        if let Err(e) = event_loop.run_app(&mut handler) {
            eprintln!("event loop error: {e}");
        }
    }
}

#[cfg(target_os = "macos")]
fn main() {
    winit_main::run();
}

#[cfg(not(target_os = "macos"))]
fn main() {
    println!("present_gradient currently supported on macOS only.");
}
