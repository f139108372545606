//! Windowed host for a relume scene: loads it, renders it, watches its
//! files, and rebuilds layers as they change on disk.
//!
//! Keys: Esc quits, Space pauses the clock, R forces a full rebuild, 1-9
//! toggle layers.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Instant;

use relume_core::{BuildReport, EngineError, FrameInputs, IDENTITY_VIEW};
use relume_runtime_glow::RenderSession;
use relume_scene::{load_scene, LayerId};
use relume_watch::{ChangeDetector, WatchConfig};

use winit::event::{ElementState, Event, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use glutin::display::GetGlDisplay;
use glutin::prelude::*;

// raw-window-handle 0.5 traits (matches glutin 0.30)
use raw_window_handle::HasRawWindowHandle;

struct AppConfig {
    scene: PathBuf,
    hard_reload: bool,
}

fn print_usage_and_exit() -> ! {
    eprintln!("usage: live_viewer [--hard-reload] [scene.json]");
    eprintln!();
    eprintln!("  --hard-reload   reload the whole scene on any watched change");
    eprintln!("  scene.json      scene description (default: the bundled demo scene)");
    std::process::exit(2);
}

fn parse_args() -> AppConfig {
    let mut args = std::env::args().skip(1);
    let mut scene: Option<PathBuf> = None;
    let mut hard_reload = false;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--hard-reload" => hard_reload = true,
            "--help" | "-h" => print_usage_and_exit(),
            _ if a.starts_with('-') => {
                eprintln!("Unknown arg: {a}");
                print_usage_and_exit();
            }
            _ => scene = Some(PathBuf::from(a)),
        }
    }

    AppConfig {
        scene: scene.unwrap_or_else(|| {
            PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/scene/scene.json"))
        }),
        hard_reload,
    }
}

/// Host-owned playback clock. Pausing freezes both `time` and the frame
/// counter; resuming continues from the frozen point.
struct Transport {
    epoch: Instant,
    base: f32,
    paused: bool,
    frame: u64,
}

impl Transport {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            base: 0.0,
            paused: false,
            frame: 0,
        }
    }

    fn time(&self) -> f32 {
        if self.paused {
            self.base
        } else {
            self.base + self.epoch.elapsed().as_secs_f32()
        }
    }

    fn toggle_pause(&mut self) {
        self.base = self.time();
        self.epoch = Instant::now();
        self.paused = !self.paused;
    }

    fn advance(&mut self) {
        if !self.paused {
            self.frame += 1;
        }
    }
}

fn log_reports(reports: &[BuildReport]) {
    for r in reports {
        match &r.outcome {
            Ok(ok) => {
                tracing::info!(layer = %r.layer, uniforms = ok.uniform_count, "layer built")
            }
            Err(e) => tracing::error!(layer = %r.layer, "build failed: {e}"),
        }
    }
}

fn register_layer_watches(detector: &mut ChangeDetector, session: &RenderSession) {
    for id in session.scene().layer_ids() {
        for (stage, deps) in session.stage_deps(id) {
            detector.set_stage_deps(id, *stage, deps);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(parse_args()) {
        eprintln!("[live_viewer] error: {e}");
        std::process::exit(1);
    }
}

fn run(cfg: AppConfig) -> Result<(), EngineError> {
    // Absolute paths throughout: the OS watcher reports absolute paths, and
    // cache keys must match them.
    let scene_path = cfg.scene.canonicalize().map_err(|source| EngineError::Io {
        path: cfg.scene.clone(),
        source,
    })?;
    let scene_dir = scene_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let scene = load_scene(&scene_path)?;

    let event_loop = EventLoop::new();

    let window_builder = WindowBuilder::new()
        .with_title("relume: live viewer")
        .with_inner_size(winit::dpi::LogicalSize::new(960.0, 540.0));

    let template = glutin::config::ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_depth_size(0)
        .with_stencil_size(0)
        .with_transparency(false);

    let display_builder =
        glutin_winit::DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |mut configs| configs.next().unwrap())
        .map_err(|e| EngineError::GlCreate(format!("DisplayBuilder.build: {e}")))?;

    let window = window
        .ok_or_else(|| EngineError::GlCreate("DisplayBuilder did not create a window".into()))?;
    let gl_display = gl_config.display();

    let raw_window_handle = window.raw_window_handle();

    let context_attributes = glutin::context::ContextAttributesBuilder::new()
        .with_profile(glutin::context::GlProfile::Core)
        .build(Some(raw_window_handle));

    let fallback_context_attributes = glutin::context::ContextAttributesBuilder::new()
        .with_profile(glutin::context::GlProfile::Core)
        .build(None);

    let not_current_gl_context = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .or_else(|_| gl_display.create_context(&gl_config, &fallback_context_attributes))
            .map_err(|e| EngineError::GlCreate(format!("create_context: {e}")))?
    };

    let (width, height) = {
        let s = window.inner_size();
        (s.width.max(1), s.height.max(1))
    };

    let attrs = glutin::surface::SurfaceAttributesBuilder::<glutin::surface::WindowSurface>::new()
        .build(
            raw_window_handle,
            NonZeroU32::new(width).unwrap(),
            NonZeroU32::new(height).unwrap(),
        );

    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .map_err(|e| EngineError::GlCreate(format!("create_window_surface: {e}")))?
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .map_err(|e| EngineError::GlCreate(format!("make_current: {e}")))?;

    let gl = unsafe {
        glow::Context::from_loader_function(|s| {
            gl_display.get_proc_address(std::ffi::CString::new(s).unwrap().as_c_str()) as *const _
        })
    };

    let mut session =
        unsafe { RenderSession::new(&gl, scene, &scene_dir, width as i32, height as i32)? };
    let reports = unsafe { session.rebuild_all(&gl) };
    log_reports(&reports);

    let mut detector = ChangeDetector::new(WatchConfig {
        hard_reload: cfg.hard_reload,
        ..WatchConfig::default()
    })?;
    detector.watch_scene_file(&scene_path);
    register_layer_watches(&mut detector, &session);

    let mut transport = Transport::new();
    let mut mouse = [0.0f32; 4];
    let mut click = false;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,

                WindowEvent::Resized(physical_size) => {
                    let w = physical_size.width.max(1);
                    let h = physical_size.height.max(1);

                    gl_surface.resize(
                        &gl_context,
                        NonZeroU32::new(w).unwrap(),
                        NonZeroU32::new(h).unwrap(),
                    );
                    unsafe { session.resize(&gl, w as i32, h as i32) };

                    window.request_redraw();
                }

                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } => match key {
                    VirtualKeyCode::Escape => *control_flow = ControlFlow::Exit,
                    VirtualKeyCode::Space => transport.toggle_pause(),
                    VirtualKeyCode::R => {
                        let reports = unsafe { session.rebuild_all(&gl) };
                        log_reports(&reports);
                        register_layer_watches(&mut detector, &session);
                    }
                    key => {
                        // Layer toggles (1-9)
                        let layer_index: Option<u32> = match key {
                            VirtualKeyCode::Key1 => Some(0),
                            VirtualKeyCode::Key2 => Some(1),
                            VirtualKeyCode::Key3 => Some(2),
                            VirtualKeyCode::Key4 => Some(3),
                            VirtualKeyCode::Key5 => Some(4),
                            VirtualKeyCode::Key6 => Some(5),
                            VirtualKeyCode::Key7 => Some(6),
                            VirtualKeyCode::Key8 => Some(7),
                            VirtualKeyCode::Key9 => Some(8),
                            _ => None,
                        };
                        if let Some(i) = layer_index {
                            let id = LayerId(i);
                            if let Some(on) = session.scene().layer(id).map(|l| l.enabled) {
                                session.set_layer_enabled(id, !on);
                                tracing::info!(layer = i, enabled = !on, "layer toggled");
                            }
                        }
                    }
                },

                WindowEvent::CursorMoved { position, .. } => {
                    mouse[0] = position.x as f32;
                    mouse[1] = position.y as f32;
                }

                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    click = state == ElementState::Pressed;
                    if click {
                        mouse[2] = mouse[0];
                        mouse[3] = mouse[1];
                    }
                }

                _ => {}
            },

            Event::MainEventsCleared => window.request_redraw(),

            Event::RedrawRequested(_) => {
                let out = detector.drain(Instant::now());

                for path in &out.vanished {
                    tracing::error!(
                        "{}",
                        EngineError::FileVanished { path: path.clone() }
                    );
                }
                if !out.vanished.is_empty() {
                    *control_flow = ControlFlow::Exit;
                    return;
                }

                for path in &out.changed_paths {
                    session.invalidate_source(path);
                }

                if out.scene_dirty {
                    tracing::info!("scene file changed, reloading");
                    match load_scene(&scene_path) {
                        Ok(new_scene) => {
                            let size = window.inner_size();
                            let replacement = unsafe {
                                RenderSession::new(
                                    &gl,
                                    new_scene,
                                    &scene_dir,
                                    size.width.max(1) as i32,
                                    size.height.max(1) as i32,
                                )
                            };
                            match replacement {
                                Ok(mut fresh) => {
                                    // Drop watches keyed to the old layer
                                    // list before the ids are reused.
                                    for id in session.scene().layer_ids() {
                                        detector.clear_layer(id);
                                    }
                                    std::mem::swap(&mut session, &mut fresh);
                                    unsafe { fresh.destroy(&gl) };

                                    let reports = unsafe { session.rebuild_all(&gl) };
                                    log_reports(&reports);
                                    register_layer_watches(&mut detector, &session);
                                }
                                Err(e) => tracing::error!("scene reload failed: {e}"),
                            }
                        }
                        Err(e) => tracing::error!("scene reload failed: {e}"),
                    }
                } else {
                    for id in out.dirty_layers {
                        let Some(report) = (unsafe { session.rebuild_layer(&gl, id) }) else {
                            continue;
                        };
                        let resync = match &report.outcome {
                            Ok(ok) => ok.deps_changed,
                            Err(_) => true,
                        };
                        log_reports(std::slice::from_ref(&report));
                        if resync {
                            for (stage, deps) in session.stage_deps(id) {
                                detector.set_stage_deps(id, *stage, deps);
                            }
                        }
                    }
                }

                let size = window.inner_size();
                let inputs = FrameInputs {
                    width: size.width.max(1) as i32,
                    height: size.height.max(1) as i32,
                    time: transport.time(),
                    frame: transport.frame,
                    paused: transport.paused,
                    view: IDENTITY_VIEW,
                    mouse,
                    click,
                };

                unsafe { session.render_frame(&gl, &inputs) };
                transport.advance();

                gl_surface.swap_buffers(&gl_context).unwrap();
            }

            Event::LoopDestroyed => unsafe { session.destroy(&gl) },

            _ => {}
        }
    });
}
