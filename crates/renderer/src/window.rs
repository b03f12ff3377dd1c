use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};
use crossbeam_channel::{Sender, TrySendError};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::backend::WindowControl;
use crate::error::PipelineError;
use crate::input::{Key, KeyState, RawEvent};
use crate::shutdown::Shutdown;
use crate::types::Bounds;

/// Requests applied on the platform thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowRequest {
    Resize(Bounds),
    SetTitle(String),
    Close,
}

/// The loop may be driven from any thread on platforms that allow it.
pub fn build_event_loop() -> Result<EventLoop<WindowRequest>> {
    let mut builder = EventLoopBuilder::<WindowRequest>::with_user_event();
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    }

    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    builder
        .build()
        .map_err(|err| PipelineError::Window(format!("failed to create event loop: {err}")).into())
}

pub fn build_window(
    event_loop: &EventLoop<WindowRequest>,
    title: &str,
    size: Bounds,
) -> Result<Arc<Window>> {
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(size.width.max(1), size.height.max(1)))
        .build(event_loop)
        .map_err(|err| PipelineError::Window(format!("failed to create viewer window: {err}")))?;
    Ok(Arc::new(window))
}

/// [`WindowControl`] over a winit window. Every mutation is forwarded to the
/// event loop through its proxy, so callers on other threads never block.
pub struct WinitWindow {
    window: Arc<Window>,
    proxy: Mutex<EventLoopProxy<WindowRequest>>,
}

impl WinitWindow {
    pub fn new(window: Arc<Window>, proxy: EventLoopProxy<WindowRequest>) -> Self {
        Self {
            window,
            proxy: Mutex::new(proxy),
        }
    }

    fn send(&self, request: WindowRequest) {
        let proxy = self.proxy.lock().unwrap_or_else(PoisonError::into_inner);
        if proxy.send_event(request).is_err() {
            tracing::debug!("event loop closed; dropping window request");
        }
    }
}

impl WindowControl for WinitWindow {
    fn size(&self) -> Bounds {
        let size = self.window.inner_size();
        Bounds::new(size.width, size.height)
    }

    fn request_size(&self, bounds: Bounds) -> bool {
        if self.size() == bounds {
            return false;
        }
        self.send(WindowRequest::Resize(bounds));
        true
    }

    fn set_title(&self, title: &str) {
        self.send(WindowRequest::SetTitle(title.to_string()));
    }

    fn close(&self) {
        self.send(WindowRequest::Close);
    }
}

pub fn key_from_code(code: KeyCode) -> Key {
    match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyM => Key::M,
        KeyCode::SuperLeft | KeyCode::SuperRight => Key::Super,
        _ => Key::Other,
    }
}

pub fn raw_event_from_window_event(event: &WindowEvent) -> Option<RawEvent> {
    match event {
        WindowEvent::Resized(size) => Some(RawEvent::FramebufferResized(Bounds::new(
            size.width,
            size.height,
        ))),
        WindowEvent::CloseRequested => Some(RawEvent::CloseRequested),
        WindowEvent::KeyboardInput { event, .. } => {
            let key = match event.physical_key {
                PhysicalKey::Code(code) => key_from_code(code),
                PhysicalKey::Unidentified(_) => Key::Other,
            };
            let state = match event.state {
                ElementState::Pressed => KeyState::Pressed,
                ElementState::Released => KeyState::Released,
            };
            Some(RawEvent::Key {
                key,
                state,
                repeat: event.repeat,
            })
        }
        _ => None,
    }
}

/// Runs the platform event loop on the calling thread until a
/// [`WindowRequest::Close`] arrives or the window is destroyed.
///
/// Raw events go to `events` without blocking; a close request that cannot
/// be queued fires `shutdown` directly.
pub fn run_event_loop(
    event_loop: EventLoop<WindowRequest>,
    window: Arc<Window>,
    events: Sender<RawEvent>,
    shutdown: Shutdown,
) -> Result<()> {
    let loop_shutdown = shutdown.clone();
    let result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::UserEvent(request) => match request {
                WindowRequest::Resize(bounds) => {
                    let size = PhysicalSize::new(bounds.width, bounds.height);
                    if let Some(applied) = window.request_inner_size(size) {
                        tracing::debug!(width = applied.width, height = applied.height, "window resized");
                    }
                }
                WindowRequest::SetTitle(title) => window.set_title(&title),
                WindowRequest::Close => elwt.exit(),
            },
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if matches!(event, WindowEvent::Destroyed) {
                    elwt.exit();
                    return;
                }
                let Some(raw) = raw_event_from_window_event(&event) else {
                    return;
                };
                match events.try_send(raw) {
                    Ok(()) => {}
                    Err(TrySendError::Full(RawEvent::CloseRequested))
                    | Err(TrySendError::Disconnected(RawEvent::CloseRequested)) => {
                        loop_shutdown.trigger();
                        elwt.exit();
                    }
                    Err(TrySendError::Full(dropped)) => {
                        tracing::warn!(event = ?dropped, "event queue full; dropping window event");
                    }
                    Err(TrySendError::Disconnected(_)) => elwt.exit(),
                }
            }
            Event::LoopExiting => loop_shutdown.trigger(),
            _ => {}
        }
    });
    shutdown.trigger();
    result.map_err(|err| anyhow!("window event loop error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_physical_keys() {
        assert_eq!(key_from_code(KeyCode::Escape), Key::Escape);
        assert_eq!(key_from_code(KeyCode::KeyQ), Key::Q);
        assert_eq!(key_from_code(KeyCode::KeyN), Key::N);
        assert_eq!(key_from_code(KeyCode::KeyM), Key::M);
        assert_eq!(key_from_code(KeyCode::SuperRight), Key::Super);
        assert_eq!(key_from_code(KeyCode::KeyZ), Key::Other);
    }

    #[test]
    fn maps_window_events() {
        assert_eq!(
            raw_event_from_window_event(&WindowEvent::Resized(PhysicalSize::new(640, 480))),
            Some(RawEvent::FramebufferResized(Bounds::new(640, 480)))
        );
        assert_eq!(
            raw_event_from_window_event(&WindowEvent::CloseRequested),
            Some(RawEvent::CloseRequested)
        );
        assert_eq!(raw_event_from_window_event(&WindowEvent::Focused(true)), None);
    }
}
