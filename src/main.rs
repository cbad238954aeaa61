use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use glam::{UVec2, Vec3};

use prism::camera::Camera;
use prism::film::Film;
use prism::options::Options;
use prism::pool::ThreadPool;
use prism::scene::{RenderParams, Scene};
use prism::texture::TextureCube;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let options = Options::parse(std::env::args().skip(1));

    let scene_path = options
        .scene
        .clone()
        .context("no scene given; use -Scene <path>")?;
    let mut scene = Scene::from_file(&scene_path)
        .with_context(|| format!("failed to load {}", scene_path.display()))?;

    if let Some(path) = &options.skybox {
        scene.set_skybox(load_skybox_override(path)?);
    }

    let mut camera = scene
        .first_camera()
        .copied()
        .unwrap_or_else(|| Camera::new(Vec3::new(0.0, 0.0, -30.0), Vec3::Z, 1.0));
    if let Some(position) = options.camera_position {
        camera.set_position(position);
    }
    if let Some(direction) = options.camera_direction {
        camera.set_direction(direction.normalize());
    }

    let resolution = options.resolution.unwrap_or(UVec2::new(512, 512));
    let output = options
        .output_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("render.jpg"));

    let params = RenderParams {
        max_depth: 10,
        samples_per_pixel: 256,
        seed: rand::random(),
        ..Default::default()
    };

    let pool = ThreadPool::with_hardware_threads();
    let mut film = Film::new(resolution.x, resolution.y);
    let should_quit = Arc::new(AtomicBool::new(false));

    let scene = Arc::new(scene);
    Scene::render_to_file(&scene, &pool, &camera, &params, &mut film, &should_quit, &output)
        .with_context(|| format!("render to {} failed", output.display()))?;

    Ok(())
}

/// A single image given on the command line stands in for all six skybox
/// faces.
fn load_skybox_override(path: &Path) -> anyhow::Result<TextureCube> {
    let face = image::open(path)
        .with_context(|| format!("failed to decode skybox {}", path.display()))?
        .into_rgba8();
    let (width, height) = face.dimensions();

    let mut data = Vec::with_capacity(face.as_raw().len() * 6);
    for _ in 0..6 {
        data.extend_from_slice(face.as_raw());
    }

    Ok(TextureCube::new(
        data,
        width,
        height,
        prism::texture::Format::Rgba8,
    ))
}
