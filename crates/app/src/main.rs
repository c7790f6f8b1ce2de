//! Light Field Disparity - Main Entry Point
//!
//! Loads a 3x3 light-field capture, estimates disparity on the GPU every
//! frame and shows either the disparity map or one of the raw views.
//!
//! Keys: `0` disparity, `1`-`9` raw view, `Up`/`Down` step count,
//! `Escape` quit.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use lightfield_core::{Config, Timer};
use lightfield_platform::{InputState, KeyCode, Window};
use lightfield_renderer::{Overlay, PushConstants, Renderer, StatsOverlay};

/// Step count change per arrow key press.
const STEP_DELTA: i32 = 1;

struct App {
    config: Config,
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    timer: Timer,
    overlay: StatsOverlay,
    push_constants: PushConstants,
}

impl App {
    fn new(config: Config) -> Self {
        let push_constants = PushConstants::new(config.disparity.step_count);
        Self {
            config,
            window: None,
            renderer: None,
            input: InputState::new(),
            timer: Timer::new(),
            overlay: StatsOverlay::new(Duration::from_secs(1)),
            push_constants,
        }
    }

    /// Applies this frame's key presses. Returns false when the app should exit.
    fn apply_input(&mut self) -> bool {
        if self.input.is_key_just_pressed(KeyCode::Escape) {
            return false;
        }

        if let Some(digit) = self.input.just_pressed_digit()
            && self.push_constants.set_phase(digit)
        {
            match self.push_constants.view_index() {
                Some(view) => info!("Showing light-field view {}", view),
                None => info!("Showing disparity"),
            }
        }

        let mut delta = 0;
        if self.input.is_key_just_pressed(KeyCode::ArrowUp) {
            delta += STEP_DELTA;
        }
        if self.input.is_key_just_pressed(KeyCode::ArrowDown) {
            delta -= STEP_DELTA;
        }
        if delta != 0 && self.push_constants.adjust_step_count(delta) {
            info!("Disparity step count: {}", self.push_constants.step_count);
        }

        true
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if !self.apply_input() {
            info!("Escape pressed, shutting down");
            event_loop.exit();
            return;
        }
        self.input.begin_frame();

        self.overlay.begin_frame(self.timer.tick());

        if let Some(renderer) = self.renderer.as_mut()
            && let Err(e) = renderer.render_frame(&mut self.overlay, &self.push_constants)
        {
            error!("Render error: {}", e);
            event_loop.exit();
            return;
        }

        if self.overlay.take_refreshed()
            && let (Some(window), Some(stats)) = (self.window.as_ref(), self.overlay.text())
        {
            debug!("{}", stats);
            window.set_status(Some(&stats));
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&window, &self.config) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
                self.timer = Timer::new();
            }
            Err(e) => {
                error!("Failed to create renderer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let (Some(window), Some(renderer)) = (self.window.as_ref(), self.renderer.as_mut())
                {
                    renderer.resize(window.drawable_extent());
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
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

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // The renderer must go before the window it draws to.
        self.renderer = None;
        self.window = None;
    }
}

fn main() -> Result<()> {
    lightfield_core::init_logging();
    info!("Starting Light Field Disparity");

    let config = Config::load().context("Failed to load configuration")?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
