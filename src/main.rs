#[macro_use]
extern crate glium;
use std::time::Duration;

use device::gl::GlDevice;
use egui_glium::egui_winit::egui::ViewportId;
use input::{CanvasGeometry, PointerEvent};
use scene::{Scene, SceneOptions};
use shader::Shader;
use simplelog::TermLogger;
use winit::{
    event::{ElementState, Event, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
};

mod camera;
mod cube;
mod device;
mod input;
mod matrix;
mod scene;
mod shader;
mod utils;

const WINDOW_WIDTH: u32 = 900;
const WINDOW_HEIGHT: u32 = 600;
const SIMULATION_RESOLUTION: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    log::debug!("Creating window and event loop");
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let (window, display) = glium::backend::glutin::SimpleWindowBuilder::new()
        .with_title("Cubefall")
        .with_inner_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .build(&event_loop);

    let mut egui = egui_glium::EguiGlium::new(ViewportId::ROOT, &display, &window, &event_loop);

    let geometry = {
        let window_size = window.inner_size();
        CanvasGeometry::window(window_size.width as f32, window_size.height as f32)
    };

    let mut scene = Scene::new(
        GlDevice::new(display)?,
        geometry,
        Shader::vertex(include_str!("shaders/cube.vert")),
        Shader::fragment(include_str!("shaders/cube.frag")),
        SceneOptions::default(),
    )?;

    let mut score: u32 = 0;
    let mut cursor = (0.0f32, 0.0f32);

    event_loop.run(move |event, ewlt| match event {
        Event::WindowEvent { event, .. } => {
            let response = egui.on_event(&window, &event);

            match event {
                WindowEvent::CloseRequested => ewlt.exit(),
                WindowEvent::Resized(size) => {
                    if let Err(err) = scene.resize(size.width, size.height) {
                        log::error!("resize to {}x{} failed: {err}", size.width, size.height);
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = (position.x as f32, position.y as f32);
                }
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    button: MouseButton::Left,
                    ..
                } if !response.consumed => {
                    if let Some(hit) = scene.handle_pointer(PointerEvent::press(cursor.0, cursor.1))
                    {
                        scene.remove_item(hit.index);
                        score += 1;
                        log::debug!("cube {} popped, score is now {score}", hit.id);
                    }
                }
                WindowEvent::RedrawRequested => {
                    if let Err(err) = scene.tick(SIMULATION_RESOLUTION) {
                        log::error!("drawing the scene failed: {err}");
                        ewlt.exit();
                        return;
                    }

                    egui.run(&window, |ctx| {
                        egui::Window::new("Cubefall").show(ctx, |ui| {
                            ui.label(format!("Score: {score}"));

                            let label = if scene.is_paused() { "Start" } else { "Stop" };
                            if ui.add(egui::Button::new(label)).clicked() {
                                let enable = scene.is_paused();
                                if let Err(err) = scene.start(enable) {
                                    log::error!("failed to toggle the game: {err}");
                                }
                                if enable {
                                    score = 0;
                                }
                            }
                        });
                    });

                    let device = scene.device_mut();
                    let _ = device.with_frame(|display, frame| egui.paint(display, frame));
                    if let Err(err) = device.finish_frame() {
                        log::error!("presenting the frame failed: {err}");
                        ewlt.exit();
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
