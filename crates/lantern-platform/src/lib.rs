// SPDX-License-Identifier: CEPL-1.0
//! winit window driven through the pump-events API so the main loop stays in
//! our hands. Implements the renderer's [`SurfaceWindow`] and reports input as
//! [`PlatformEvent`]s plus the currently held movement keys.

pub use winit;

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use lantern_math::MoveIntent;
use lantern_render::{RenderSize, SurfaceWindow};
use tracing::{debug, info};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Window, WindowAttributes, WindowId},
};

// How long to wait on each pump while the first window is being created.
const STARTUP_PUMP: Duration = Duration::from_millis(10);
const STARTUP_ATTEMPTS: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    CloseRequested,
    Resized(RenderSize),
    Focused(bool),
    Occluded(bool),
    EscapePressed,
}

#[derive(Clone, Debug)]
pub struct WindowOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "lantern".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

/// Movement flag bound to `code`, if any.
pub fn intent_for_key(code: KeyCode) -> Option<MoveIntent> {
    Some(match code {
        KeyCode::KeyA => MoveIntent::MOVE_LEFT,
        KeyCode::KeyD => MoveIntent::MOVE_RIGHT,
        KeyCode::KeyW => MoveIntent::MOVE_FORWARD,
        KeyCode::KeyS => MoveIntent::MOVE_BACKWARD,
        KeyCode::KeyE => MoveIntent::MOVE_UP,
        KeyCode::KeyQ => MoveIntent::MOVE_DOWN,
        KeyCode::ArrowLeft => MoveIntent::LOOK_LEFT,
        KeyCode::ArrowRight => MoveIntent::LOOK_RIGHT,
        KeyCode::ArrowUp => MoveIntent::LOOK_UP,
        KeyCode::ArrowDown => MoveIntent::LOOK_DOWN,
        _ => return None,
    })
}

struct WindowShell {
    attributes: Option<WindowAttributes>,
    window: Option<Window>,
    create_error: Option<anyhow::Error>,

    extent: RenderSize,
    resized: bool,
    held: MoveIntent,
    events: Vec<PlatformEvent>,
}

impl ApplicationHandler for WindowShell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => {
                let size = window.inner_size();
                self.extent = RenderSize::new(size.width, size.height);
                info!("window created {}x{}", size.width, size.height);
                self.window = Some(window);
            }
            Err(e) => {
                self.create_error = Some(anyhow!("create_window: {e}"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.events.push(PlatformEvent::CloseRequested);
            }
            WindowEvent::Resized(size) => {
                self.extent = RenderSize::new(size.width, size.height);
                self.resized = true;
                debug!("Resized → {}x{}", size.width, size.height);
                self.events.push(PlatformEvent::Resized(self.extent));
            }
            WindowEvent::Focused(focused) => {
                // keys released while unfocused never reach us
                if !focused {
                    self.held = MoveIntent::empty();
                }
                self.events.push(PlatformEvent::Focused(focused));
            }
            WindowEvent::Occluded(occluded) => {
                self.events.push(PlatformEvent::Occluded(occluded));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let pressed = event.state == ElementState::Pressed;
                if code == KeyCode::Escape && pressed && !event.repeat {
                    self.events.push(PlatformEvent::EscapePressed);
                }
                if let Some(flag) = intent_for_key(code) {
                    self.held.set(flag, pressed);
                }
            }
            _ => {}
        }
    }
}

pub struct PlatformWindow {
    event_loop: EventLoop<()>,
    shell: WindowShell,
}

impl PlatformWindow {
    /// Opens the window, pumping the loop until the platform delivers it.
    pub fn new(options: &WindowOptions) -> Result<Self> {
        let event_loop = EventLoop::new().context("EventLoop::new")?;
        let attributes = Window::default_attributes()
            .with_title(options.title.clone())
            .with_inner_size(LogicalSize::new(options.width, options.height));

        let mut this = Self {
            event_loop,
            shell: WindowShell {
                attributes: Some(attributes),
                window: None,
                create_error: None,
                extent: RenderSize::default(),
                resized: false,
                held: MoveIntent::empty(),
                events: Vec::new(),
            },
        };

        for _ in 0..STARTUP_ATTEMPTS {
            let status = this
                .event_loop
                .pump_app_events(Some(STARTUP_PUMP), &mut this.shell);
            if let Some(e) = this.shell.create_error.take() {
                return Err(e);
            }
            if this.shell.window.is_some() {
                // startup resizes are not a reason to rebuild anything
                this.shell.resized = false;
                return Ok(this);
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited with {code} before the window opened");
            }
        }
        bail!("window was not created after {STARTUP_ATTEMPTS} event pumps")
    }

    /// Dispatches pending platform events without blocking.
    pub fn poll_events(&mut self) -> Vec<PlatformEvent> {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.shell);
        if let PumpStatus::Exit(_) = status {
            self.shell.events.push(PlatformEvent::CloseRequested);
        }
        std::mem::take(&mut self.shell.events)
    }

    pub fn held_keys(&self) -> MoveIntent {
        self.shell.held
    }

    pub fn window(&self) -> Option<&Window> {
        self.shell.window.as_ref()
    }
}

impl SurfaceWindow for PlatformWindow {
    fn extent(&self) -> RenderSize {
        self.shell.extent
    }

    fn was_resized(&self) -> bool {
        self.shell.resized
    }

    fn reset_resized_flag(&mut self) {
        self.shell.resized = false;
    }

    fn wait_events(&mut self) {
        // Blocks until the platform has something for us. Events are kept
        // for the next poll_events.
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(None, &mut self.shell) {
            self.shell.events.push(PlatformEvent::CloseRequested);
        }
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.shell
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.shell
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .display_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasd_qe_and_arrows_map_to_intents() {
        assert_eq!(intent_for_key(KeyCode::KeyW), Some(MoveIntent::MOVE_FORWARD));
        assert_eq!(intent_for_key(KeyCode::KeyQ), Some(MoveIntent::MOVE_DOWN));
        assert_eq!(intent_for_key(KeyCode::ArrowLeft), Some(MoveIntent::LOOK_LEFT));
        assert_eq!(intent_for_key(KeyCode::Space), None);
    }

    #[test]
    fn every_intent_has_a_key() {
        let keys = [
            KeyCode::KeyA,
            KeyCode::KeyD,
            KeyCode::KeyW,
            KeyCode::KeyS,
            KeyCode::KeyE,
            KeyCode::KeyQ,
            KeyCode::ArrowLeft,
            KeyCode::ArrowRight,
            KeyCode::ArrowUp,
            KeyCode::ArrowDown,
        ];
        let all = keys
            .into_iter()
            .filter_map(intent_for_key)
            .fold(MoveIntent::empty(), |acc, f| acc | f);
        assert_eq!(all, MoveIntent::all());
    }
}
