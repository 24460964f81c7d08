use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::context::{ContextLossEvent, ContextState};
use crate::coords::Size;
use crate::device::{Gpu, GpuInit};
use crate::map::{MapOptions, MapRenderer};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "cartograph".to_string(),
            initial_size: LogicalSize::new(1024.0, 768.0),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Host application driving one map.
pub trait MapApp {
    /// Called once the window and its map exist. Typically registers layers.
    fn setup(&mut self, map: &mut MapRenderer<Gpu>) -> Result<()>;

    /// Sees every window event before the runtime handles it.
    fn on_window_event(
        &mut self,
        _map: &mut MapRenderer<Gpu>,
        _event: &WindowEvent,
    ) -> AppControl {
        AppControl::Continue
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, options: MapOptions, app: A) -> Result<()>
    where
        A: MapApp + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, options, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

struct WindowEntry {
    // Dropped first: the map releases device objects while the surface's
    // window is still alive.
    map: MapRenderer<Gpu>,
    window: Arc<Window>,
    /// Set when a loss was claimed; restoration runs on the next loop turn.
    restore_pending: bool,
}

struct AppState<A: MapApp> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    options: MapOptions,
    app: A,

    entry: Option<WindowEntry>,
    exit_requested: bool,
}

impl<A: MapApp> AppState<A> {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, options: MapOptions, app: A) -> Self {
        Self {
            config,
            gpu_init,
            options,
            app,
            entry: None,
            exit_requested: false,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        self.entry = None;
        event_loop.exit();
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let gpu = pollster::block_on(Gpu::new(window.clone(), self.gpu_init.clone()))
            .context("GPU initialization failed for window")?;

        let size = Size::from(window.inner_size());
        let mut map = MapRenderer::new(gpu, size, self.options.clone());
        self.app.setup(&mut map).context("map setup failed")?;

        window.request_redraw();
        self.entry = Some(WindowEntry {
            map,
            window,
            restore_pending: false,
        });
        Ok(())
    }
}

impl<A: MapApp> ApplicationHandler for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            log::error!("failed to create initial window: {e:#}");
            self.request_exit(event_loop);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        if entry.restore_pending {
            entry.restore_pending = false;
            if let Err(e) = entry.map.device_mut().restore() {
                log::error!("failed to restore graphics context: {e:#}");
                self.request_exit(event_loop);
                return;
            }
            entry.map.handle_context_restored();
        }

        if entry.map.device_mut().poll_context_lost() {
            let mut event = ContextLossEvent::new();
            entry.map.handle_context_lost(&mut event);
            entry.restore_pending = event.default_prevented();
        }

        entry.map.pump_changes();

        let active = entry.map.context_state() == ContextState::Active;
        if active && entry.map.redraw_pending() {
            entry.window.request_redraw();
        }

        event_loop.set_control_flow(if entry.restore_pending {
            ControlFlow::Poll
        } else {
            ControlFlow::Wait
        });
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let (app, entry) = (&mut self.app, &mut self.entry);
        let Some(entry) = entry.as_mut().filter(|e| e.window.id() == window_id) else {
            return;
        };

        if app.on_window_event(&mut entry.map, &event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::Resized(new_size) => {
                entry.map.set_size(Size::from(*new_size));
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = entry.window.inner_size();
                entry.map.set_size(Size::from(new_size));
            }

            WindowEvent::RedrawRequested => {
                // The surface does not keep its contents between frames.
                entry.map.request_redraw();
                if let Err(e) = entry.map.on_refresh() {
                    log::error!("frame failed: {e}");
                    self.request_exit(event_loop);
                }
            }

            _ => {}
        }
    }
}
