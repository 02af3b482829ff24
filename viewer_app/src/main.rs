//! Model viewer application
//!
//! Wires a window, the Vulkan renderer, an orbit camera and a small example
//! scene together. Frame pacing (the optional fps cap) lives here as a
//! cooperative skip, not inside the renderer.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glfw::{Action, Key, WindowEvent};

use vrender_engine::assets::{Mesh, Model};
use vrender_engine::foundation::logging;
use vrender_engine::foundation::math::{Vec2, Vec3};
use vrender_engine::render::settings::RenderSettings;
use vrender_engine::render::vulkan::{RendererConfig, VulkanRenderer};
use vrender_engine::render::window::WindowHandle;
use vrender_engine::render::{Light, OrbitCamera, Renderer};
use vrender_engine::scene::SceneGraph;
use vrender_engine::config::Config;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
const SETTINGS_PATH: &str = "render_settings.toml";

/// A flat quad template standing in for an imported model
fn quad_model() -> Model {
    let mesh = Mesh::new(
        0,
        "quad",
        vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ],
        vec![Vec3::z(); 4],
        vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
    .expect("static quad data is well-formed");

    Model::new(0, "quad", "assets/quad", vec![mesh], vec![None])
        .expect("static quad data is well-formed")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let settings = Arc::new(Mutex::new(RenderSettings::load_or_default(SETTINGS_PATH)));

    let mut window = WindowHandle::new(WINDOW_WIDTH, WINDOW_HEIGHT, "vrender")?;
    let mut renderer = VulkanRenderer::init(&mut window, RendererConfig::default(), settings.clone())?;

    let mut camera = OrbitCamera::new(
        Vec3::zeros(),
        6.0,
        WINDOW_WIDTH as f32 / WINDOW_HEIGHT as f32,
    );

    let mut scene = SceneGraph::new();
    let instance_id = scene.add_instance(Arc::new(quad_model()));
    if let Some(instance) = scene.instance(instance_id) {
        renderer.add_model_instance(instance);
    }

    renderer.add_light_sources(&[
        Light::directional(0, Vec3::new(-0.5, -1.0, -0.3)),
        Light::point(1, Vec3::new(2.0, 2.0, 2.0), Vec3::new(1.0, 0.9, 0.8)),
    ]);

    let mut last_frame = Instant::now();
    while !window.should_close() {
        window.poll_events();
        let events: Vec<(f64, WindowEvent)> = window.flush_events().collect();
        for (_, event) in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                    window.set_should_close(true);
                }
                WindowEvent::Key(Key::O, _, Action::Press, _) => {
                    if let Ok(mut settings) = settings.lock() {
                        settings.outline_enabled = !settings.outline_enabled;
                    }
                }
                WindowEvent::Scroll(_, y) => camera.zoom(y as f32 * 0.5),
                _ => {}
            }
        }

        // Cooperative frame cap: skip rendering until the frame budget of
        // the previous frame has elapsed
        let (fps_limit, frame_time) = settings
            .lock()
            .map(|s| (s.fps_limit, s.target_frame_time()))
            .unwrap_or((false, 0.0));
        if fps_limit {
            let elapsed = last_frame.elapsed();
            let budget = Duration::from_secs_f32(frame_time);
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            }
        }
        last_frame = Instant::now();

        camera.orbit(0.25, 0.0);

        // Keep the renderer's transform in sync with the editable instance
        if let Some(instance) = scene.instance(instance_id) {
            renderer.update_model_transform(instance.id, instance.transform_matrix());
        }

        renderer.draw(&camera)?;
    }

    renderer.cleanup();

    if let Ok(settings) = settings.lock() {
        if let Err(e) = settings.save_to_file(SETTINGS_PATH) {
            log::warn!("could not persist render settings: {e}");
        }
    }

    Ok(())
}
