use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::WindowConfig;
use crate::error::{RenderError, Result};
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::renderer::Renderer;

/// Context provided during app setup.
///
/// The renderer is handed out mutably so setup can create materials against
/// its layout and bake a [`Sky`](crate::Sky) with it as the state host.
pub struct SetupContext<'a> {
    pub gpu: &'a GpuContext,
    pub renderer: &'a mut Renderer,
}

/// Per-frame context passed to the frame closure.
pub struct Frame<'a> {
    pub gpu: &'a GpuContext,
    pub renderer: &'a mut Renderer,
    pub input: &'a Input,
    /// Seconds since the first frame.
    pub time: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
    /// New surface size if the window was resized since the last frame.
    pub resized: Option<(u32, u32)>,
    exit: bool,
}

impl Frame<'_> {
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 { 1.0 / self.dt } else { 0.0 }
    }

    pub fn width(&self) -> u32 {
        self.gpu.width()
    }

    pub fn height(&self) -> u32 {
        self.gpu.height()
    }

    /// Closes the window after this frame.
    pub fn exit(&mut self) {
        self.exit = true;
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        WindowConfig::default().into()
    }
}

impl From<WindowConfig> for AppConfig {
    fn from(window: WindowConfig) -> Self {
        Self {
            title: window.title,
            width: window.width,
            height: window.height,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Runs with the default window settings.
pub fn run<S, F>(setup: S) -> Result<()>
where
    S: FnOnce(&mut SetupContext) -> Result<F> + 'static,
    F: FnMut(&mut Frame) -> Result<()> + 'static,
{
    run_with_config(AppConfig::default(), setup)
}

/// Opens a window and drives `setup` once, then its returned closure every frame.
///
/// An error from setup or from a frame is logged and closes the window.
pub fn run_with_config<S, F>(config: AppConfig, setup: S) -> Result<()>
where
    S: FnOnce(&mut SetupContext) -> Result<F> + 'static,
    F: FnMut(&mut Frame) -> Result<()> + 'static,
{
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let setup: SetupFn = Box::new(move |ctx| {
        let frame_fn = setup(ctx)?;
        Ok(Box::new(frame_fn) as FrameFn)
    });
    let mut app = VesperApp::Pending {
        config,
        setup: Some(setup),
    };

    event_loop.run_app(&mut app)?;
    match app {
        VesperApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

type FrameFn = Box<dyn FnMut(&mut Frame) -> Result<()>>;
type SetupFn = Box<dyn FnOnce(&mut SetupContext) -> Result<FrameFn>>;

enum VesperApp {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        renderer: Renderer,
        input: Input,
        frame_fn: FrameFn,
        resized: Option<(u32, u32)>,
        start_time: Instant,
        last_frame: Instant,
    },
    Failed(RenderError),
}

impl VesperApp {
    fn start(
        event_loop: &ActiveEventLoop,
        config: &AppConfig,
        setup: SetupFn,
    ) -> Result<VesperApp> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gpu = GpuContext::new(window.clone())?;
        let mut renderer = Renderer::new(&gpu)?;

        let frame_fn = setup(&mut SetupContext {
            gpu: &gpu,
            renderer: &mut renderer,
        })?;
        log::info!("Setup finished; entering frame loop");

        Ok(VesperApp::Running {
            window,
            gpu,
            renderer,
            input: Input::new(),
            frame_fn,
            resized: None,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        })
    }
}

impl ApplicationHandler for VesperApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let VesperApp::Pending { config, setup } = self else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };

        match VesperApp::start(event_loop, config, setup) {
            Ok(running) => {
                if let VesperApp::Running { window, .. } = &running {
                    window.request_redraw();
                }
                *self = running;
            }
            Err(err) => {
                log::error!("Setup failed: {err}");
                *self = VesperApp::Failed(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let VesperApp::Running {
            window,
            gpu,
            renderer,
            input,
            frame_fn,
            resized,
            start_time,
            last_frame,
        } = self
        else {
            return;
        };

        input.handle_event(&event);

        let mut failure = None;
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    gpu.resize(size.width, size.height);
                    renderer.post_resize(gpu, size.width, size.height);
                    *resized = Some((size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(*last_frame).as_secs_f32();
                *last_frame = now;

                let mut frame = Frame {
                    gpu,
                    renderer,
                    input,
                    time,
                    dt,
                    resized: resized.take(),
                    exit: false,
                };

                let result = frame_fn(&mut frame);
                let exit = frame.exit;
                match result {
                    Err(err) => {
                        log::error!("Frame failed: {err}");
                        failure = Some(err);
                        event_loop.exit();
                    }
                    Ok(()) if exit => event_loop.exit(),
                    Ok(()) => {
                        input.begin_frame();
                        window.request_redraw();
                    }
                }
            }
            _ => {}
        }

        if let Some(err) = failure {
            *self = VesperApp::Failed(err);
        }
    }
}
