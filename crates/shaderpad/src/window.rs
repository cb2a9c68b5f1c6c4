//! Interactive preview window.
//!
//! The winit loop only records inputs and forwards ticks; all rendering-side
//! mutation (recompiles, exports, the draw itself) happens inside the single
//! frame callback registered with the [`AnimationDriver`]. Redraws are
//! requested from `AboutToWait` while the driver has callbacks, which keeps
//! the loop idle once the last callback unregisters.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use canvas::{FrameContext, ShaderController, UniformRegistry, WgpuCanvas};
use frameloop::{buttons, AnimationDriver, PointerSample, PointerTracker};
use scripting::RhaiUniformEngine;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::defaults;
use crate::diagnostics;
use crate::run;

pub struct WindowOptions {
    pub size: (u32, u32),
    pub project: Option<PathBuf>,
    /// When set, one frame is rendered, written to this path, and the
    /// process exits.
    pub export: Option<PathBuf>,
}

pub fn run_window(
    options: WindowOptions,
    engine: RhaiUniformEngine,
    mut registry: UniformRegistry,
    mut body: String,
) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("shaderpad")
            .with_inner_size(PhysicalSize::new(options.size.0, options.size.1))
            .build(&event_loop)
            .context("failed to create preview window")?,
    );

    let backend =
        WgpuCanvas::new(window.clone(), options.size).context("graphics backend unavailable")?;
    let mut controller = ShaderController::new(backend, defaults::VERTEX_SHADER);

    // Compile before the first frame so diagnostics appear immediately.
    recompile(&mut controller, &registry, &body);

    let tracker = Rc::new(RefCell::new(PointerTracker::new()));
    tracker
        .borrow_mut()
        .set_canvas_size(options.size.0 as f32, options.size.1 as f32);
    let canvas_size = Rc::new(Cell::new(options.size));
    let reload_requested = Rc::new(Cell::new(false));
    let export_requested = Rc::new(Cell::new(options.export.is_some()));
    let exit_requested = Rc::new(Cell::new(false));

    let mut driver = AnimationDriver::new();
    {
        let tracker = tracker.clone();
        let canvas_size = canvas_size.clone();
        let reload_requested = reload_requested.clone();
        let export_requested = export_requested.clone();
        let exit_requested = exit_requested.clone();
        let project_path = options.project.clone();
        let export_path = options.export.clone();
        let exit_after_export = options.export.is_some();
        driver.register(move |tick| {
            if reload_requested.take() {
                match run::load_session(&engine, project_path.as_deref()) {
                    Ok((new_registry, new_body)) => {
                        registry = new_registry;
                        body = new_body;
                        tracing::info!("project reloaded");
                    }
                    Err(error) => {
                        tracing::error!(?error, "project reload failed; keeping previous session");
                    }
                }
                recompile(&mut controller, &registry, &body);
            }

            let (canvas_width, canvas_height) = canvas_size.get();
            let (pointer, held) = {
                let tracker = tracker.borrow();
                (tracker.position(), tracker.buttons())
            };
            controller.draw_frame(
                &mut registry,
                &FrameContext {
                    canvas_width,
                    canvas_height,
                    time_seconds: tick.seconds,
                    pointer,
                    buttons: held,
                },
            );

            if export_requested.take() {
                let target = export_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("shader_creation.png"));
                match export_frame(&mut controller, &target) {
                    Ok(true) => tracing::info!(path = %target.display(), "canvas exported"),
                    Ok(false) => tracing::warn!("nothing to export; no program has linked yet"),
                    Err(error) => tracing::error!(?error, "canvas export failed"),
                }
                if exit_after_export {
                    exit_requested.set(true);
                }
            }
        });
    }

    let start = Instant::now();
    let mut held_buttons: u8 = 0;
    let mut cursor = (0.0_f32, 0.0_f32);

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed && !event.repeat {
                        match &event.logical_key {
                            Key::Named(NamedKey::Escape) => elwt.exit(),
                            Key::Character(text) if text.as_str().eq_ignore_ascii_case("r") => {
                                reload_requested.set(true);
                            }
                            Key::Character(text) if text.as_str().eq_ignore_ascii_case("e") => {
                                export_requested.set(true);
                            }
                            _ => {}
                        }
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = (position.x as f32, position.y as f32);
                    tracker.borrow_mut().update(PointerSample {
                        x: cursor.0,
                        y: cursor.1,
                        buttons: held_buttons,
                    });
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    let bit = match button {
                        MouseButton::Left => buttons::LEFT,
                        MouseButton::Right => buttons::RIGHT,
                        MouseButton::Middle => buttons::MIDDLE,
                        _ => 0,
                    };
                    match state {
                        ElementState::Pressed => held_buttons |= bit,
                        ElementState::Released => held_buttons &= !bit,
                    }
                    tracker.borrow_mut().update(PointerSample {
                        x: cursor.0,
                        y: cursor.1,
                        buttons: held_buttons,
                    });
                }
                WindowEvent::CursorLeft { .. } => {
                    // Out-of-bounds sample: position resets, held buttons latch.
                    tracker.borrow_mut().update(PointerSample {
                        x: -1.0,
                        y: -1.0,
                        buttons: held_buttons,
                    });
                }
                WindowEvent::Focused(false) => {
                    held_buttons = 0;
                    tracker.borrow_mut().clear();
                }
                WindowEvent::Resized(new_size) => {
                    canvas_size.set((new_size.width, new_size.height));
                    tracker
                        .borrow_mut()
                        .set_canvas_size(new_size.width as f32, new_size.height as f32);
                }
                WindowEvent::RedrawRequested => {
                    driver.tick(start.elapsed().as_secs_f64());
                    if exit_requested.get() {
                        elwt.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if !driver.is_idle() {
                    window.request_redraw();
                }
                elwt.set_control_flow(ControlFlow::Wait);
            }
            _ => {}
        })
        .context("event loop terminated abnormally")?;
    Ok(())
}

fn recompile(
    controller: &mut ShaderController<WgpuCanvas>,
    registry: &UniformRegistry,
    body: &str,
) {
    let segments = defaults::build_segments(registry, body);
    let header_lines = segments[0].line_count();
    controller.recompile(&segments);
    diagnostics::report(controller.diagnostics(), header_lines);
}

fn export_frame(controller: &mut ShaderController<WgpuCanvas>, target: &Path) -> Result<bool> {
    let program = controller.current_program();
    let Some(snapshot) = controller.backend_mut().snapshot(program)? else {
        return Ok(false);
    };
    let image = image::RgbaImage::from_raw(snapshot.width, snapshot.height, snapshot.rgba)
        .context("snapshot dimensions did not match pixel data")?;
    image
        .save(target)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(true)
}
