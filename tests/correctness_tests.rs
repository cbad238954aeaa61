use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use prism::camera::Camera;
use prism::film::Film;
use prism::material::Material;
use prism::mesh::TriangleMesh;
use prism::pool::ThreadPool;
use prism::primitive::Primitive;
use prism::ray::Ray;
use prism::rng::HammersleyGenerator;
use prism::scene::{RenderParams, Scene};
use prism::texture::TextureCube;
use prism::Error;

fn render(scene: Scene, camera: &Camera, params: &RenderParams, width: u32, height: u32) -> Film {
    let pool = ThreadPool::new(4);
    let mut film = Film::new(width, height);
    let should_quit = Arc::new(AtomicBool::new(false));
    Scene::render_to_memory(
        &Arc::new(scene),
        &pool,
        camera,
        params,
        &mut film,
        &should_quit,
    )
    .unwrap();
    film
}

fn plane_mesh(half_extent: f32) -> TriangleMesh {
    TriangleMesh::new(
        vec![
            Vec3::new(-half_extent, 0.0, -half_extent),
            Vec3::new(half_extent, 0.0, -half_extent),
            Vec3::new(half_extent, 0.0, half_extent),
            Vec3::new(-half_extent, 0.0, half_extent),
        ],
        vec![Vec3::Y; 4],
        Vec::new(),
        Vec::new(),
        vec![0, 1, 2, 0, 2, 3],
    )
    .unwrap()
}

#[test]
fn emissive_sphere_silhouette() {
    let sky_colour = Vec3::new(0.1, 0.2, 0.3);

    let mut scene = Scene::empty();
    let lamp = scene
        .add_material(
            "lamp",
            Material::constant_metalness_roughness(Vec3::ONE, 0.0, 1.0, Vec3::ONE),
        )
        .unwrap();
    scene.add_instance("Sphere", Mat4::IDENTITY, lamp).unwrap();
    scene.set_skybox(TextureCube::solid(sky_colour.extend(1.0)));
    scene.build().unwrap();

    let mut camera = Camera::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 1.0);
    camera.set_far_plane(100.0);

    let params = RenderParams {
        max_depth: 1,
        samples_per_pixel: 1,
        seed: 7,
        ..Default::default()
    };
    let film = render(scene, &camera, &params, 16, 16);

    // Pixels well inside the silhouette see the emitter directly.
    for (x, y) in [(7, 7), (8, 8), (7, 8), (8, 7)] {
        let pixel = film.pixel(x, y);
        let luminance = (pixel.x + pixel.y + pixel.z) / 3.0;
        assert!(luminance > 0.9, "pixel ({x},{y}) luminance {luminance}");
    }

    // Corner pixels miss and return the environment exactly.
    for (x, y) in [(0, 0), (15, 0), (0, 15), (15, 15)] {
        let pixel = film.pixel(x, y);
        assert!(
            (pixel - sky_colour).abs().max_element() < 1.5 / 255.0,
            "pixel ({x},{y}) was {pixel}, expected {sky_colour}"
        );
    }
}

#[test]
fn diffuse_plane_under_directional_sun() {
    let albedo = 0.8;

    let mut scene = Scene::empty();
    scene.add_primitive("Plane", Primitive::Mesh(plane_mesh(100.0)));
    let white = scene
        .add_material(
            "white",
            Material::constant_metalness_roughness(Vec3::splat(albedo), 0.0, 0.0, Vec3::ZERO),
        )
        .unwrap();
    scene.add_instance("Plane", Mat4::IDENTITY, white).unwrap();
    scene.set_sun(Vec3::new(0.0, -1.0, 0.0), Vec3::ONE);
    scene.build().unwrap();

    let mut camera = Camera::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 1.0);
    camera.set_up(Vec3::Z);
    camera.set_far_plane(100.0);

    let params = RenderParams {
        max_depth: 1,
        samples_per_pixel: 256,
        seed: 11,
        ..Default::default()
    };
    let film = render(scene, &camera, &params, 16, 16);

    let mut mean = 0.0;
    for y in 0..16 {
        for x in 0..16 {
            mean += film.pixel(x, y).x;
        }
    }
    mean /= 256.0;

    // The evaluated diffuse of the material is albedo * (1 - 0.04), and the
    // roughness-0 diffuse lobe reduces to Lambert's 1/pi; the sun arrives
    // head-on so the cosine term is 1.
    let expected = albedo * 0.96 * std::f32::consts::FRAC_1_PI;
    assert!(
        (mean - expected).abs() < 0.05 * expected,
        "mean {mean}, expected {expected}"
    );
}

#[test]
fn transmission_tracks_the_refraction_stack_through_a_scene() {
    let mut scene = Scene::empty();
    let glass = scene
        .add_material(
            "glass",
            Material::constant_transparent_metalness_roughness(Vec3::ONE, 0.0, 0.0, 1.0, 1.5),
        )
        .unwrap();
    scene.add_instance("Sphere", Mat4::IDENTITY, glass).unwrap();
    scene.build().unwrap();

    let mut sampler = HammersleyGenerator::new(3);
    let mut ray = Ray::new(Vec4::new(0.0, 0.0, -3.0, 1.0), Vec3::Z, 100.0);

    // Front face: the ray enters glass and the stack grows.
    let entry = scene
        .top_level()
        .closest_intersection(scene.primitives(), &ray)
        .unwrap();
    let entry_sample = entry
        .bsdf
        .sample(scene.materials(), &mut sampler, &entry, &mut ray);
    assert_eq!(ray.ior_stack_depth(), 2);
    assert_eq!(ray.current_ior(), 1.5);

    // Continue the path the way the integrator would.
    ray.origin = entry.position + (0.01 * entry_sample.l).extend(0.0);
    ray.direction = entry_sample.l;

    let exit = scene
        .top_level()
        .closest_intersection(scene.primitives(), &ray)
        .unwrap();
    let _exit_sample = exit
        .bsdf
        .sample(scene.materials(), &mut sampler, &exit, &mut ray);
    assert_eq!(ray.ior_stack_depth(), 1);
    assert_eq!(ray.current_ior(), 1.0);
}

#[test]
fn closest_intersection_prefers_the_nearer_of_two_instances() {
    let mut scene = Scene::empty();
    scene.add_primitive(
        "Quad",
        Primitive::Mesh(
            TriangleMesh::new(
                vec![
                    Vec3::new(-2.0, -2.0, 0.0),
                    Vec3::new(2.0, -2.0, 0.0),
                    Vec3::new(2.0, 2.0, 0.0),
                    Vec3::new(-2.0, 2.0, 0.0),
                ],
                vec![Vec3::NEG_Z; 4],
                Vec::new(),
                Vec::new(),
                vec![0, 1, 2, 0, 2, 3],
            )
            .unwrap(),
        ),
    );
    let near_material = scene
        .add_material(
            "near",
            Material::constant_metalness_roughness(Vec3::X, 0.0, 1.0, Vec3::ZERO),
        )
        .unwrap();
    let far_material = scene
        .add_material(
            "far",
            Material::constant_metalness_roughness(Vec3::Z, 0.0, 1.0, Vec3::ZERO),
        )
        .unwrap();

    scene
        .add_instance(
            "Quad",
            Mat4::from_translation(Vec3::new(0.0, 0.0, 4.0)),
            near_material,
        )
        .unwrap();
    scene
        .add_instance(
            "Quad",
            Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)),
            far_material,
        )
        .unwrap();
    scene.build().unwrap();

    let ray = Ray::new(Vec4::new(0.0, 0.0, -1.0, 1.0), Vec3::Z, 100.0);
    let vertex = scene
        .top_level()
        .closest_intersection(scene.primitives(), &ray)
        .unwrap();

    assert_eq!(vertex.bsdf.material_id(), near_material);
    assert!((vertex.position.z - 4.0).abs() < 1e-4);

    assert_eq!(
        scene
            .top_level()
            .all_intersections(scene.primitives(), &ray)
            .len(),
        2
    );
}

#[test]
fn every_scene_hit_has_a_unit_normal() {
    let mut scene = Scene::empty();
    scene.add_primitive("Plane", Primitive::Mesh(plane_mesh(4.0)));
    let white = scene
        .add_material(
            "white",
            Material::constant_metalness_roughness(Vec3::ONE, 0.0, 0.5, Vec3::ZERO),
        )
        .unwrap();
    scene
        .add_instance("Sphere", Mat4::from_scale(Vec3::new(2.0, 1.0, 0.5)), white)
        .unwrap();
    scene
        .add_instance(
            "Plane",
            Mat4::from_translation(Vec3::new(0.0, -3.0, 0.0)),
            white,
        )
        .unwrap();
    scene.build().unwrap();

    let mut sampler = HammersleyGenerator::new(5);
    for _ in 0..500 {
        let jitter = sampler.next();
        let origin = Vec3::new(jitter.x * 8.0 - 4.0, jitter.y * 6.0 - 2.0, -10.0);
        let ray = Ray::new(origin.extend(1.0), Vec3::Z, 100.0);
        if let Some(vertex) = scene
            .top_level()
            .closest_intersection(scene.primitives(), &ray)
        {
            assert!((vertex.normal.length() - 1.0).abs() < 1e-4);
        }
    }
}

#[test]
fn fixed_seed_renders_are_deterministic() {
    let build_scene = || {
        let mut scene = Scene::empty();
        let lamp = scene
            .add_material(
                "lamp",
                Material::constant_metalness_roughness(Vec3::ONE, 0.0, 1.0, Vec3::splat(2.0)),
            )
            .unwrap();
        let white = scene
            .add_material(
                "white",
                Material::constant_metalness_roughness(Vec3::splat(0.7), 0.0, 0.8, Vec3::ZERO),
            )
            .unwrap();
        scene
            .add_instance(
                "Sphere",
                Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)),
                lamp,
            )
            .unwrap();
        scene.add_instance("Sphere", Mat4::IDENTITY, white).unwrap();
        scene.build().unwrap();
        scene
    };

    let camera = {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, -4.0), Vec3::Z, 1.0);
        camera.set_far_plane(50.0);
        camera
    };
    let params = RenderParams {
        max_depth: 4,
        samples_per_pixel: 4,
        seed: 1234,
        ..Default::default()
    };

    let first = render(build_scene(), &camera, &params, 24, 24);
    let second = render(build_scene(), &camera, &params, 24, 24);

    for y in 0..24 {
        for x in 0..24 {
            assert_eq!(first.pixel(x, y), second.pixel(x, y));
        }
    }
}

#[test]
fn cancellation_leaves_the_film_untouched_and_reports() {
    let mut scene = Scene::empty();
    let white = scene
        .add_material(
            "white",
            Material::constant_metalness_roughness(Vec3::ONE, 0.0, 0.5, Vec3::ZERO),
        )
        .unwrap();
    scene.add_instance("Sphere", Mat4::IDENTITY, white).unwrap();
    scene.build().unwrap();

    let camera = Camera::new(Vec3::new(0.0, 0.0, -4.0), Vec3::Z, 1.0);
    let params = RenderParams {
        seed: 1,
        ..Default::default()
    };

    let pool = ThreadPool::new(2);
    let mut film = Film::new(8, 8);
    let should_quit = Arc::new(AtomicBool::new(true));

    let result = Scene::render_to_memory(
        &Arc::new(scene),
        &pool,
        &camera,
        &params,
        &mut film,
        &should_quit,
    );
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(film.min_sample_count(), 0);
    assert!(should_quit.load(Ordering::Relaxed));
}

#[test]
fn render_to_file_writes_a_decodable_jpeg() {
    let mut scene = Scene::empty();
    let lamp = scene
        .add_material(
            "lamp",
            Material::constant_metalness_roughness(Vec3::ONE, 0.0, 1.0, Vec3::ONE),
        )
        .unwrap();
    scene.add_instance("Sphere", Mat4::IDENTITY, lamp).unwrap();
    scene.build().unwrap();

    let mut camera = Camera::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 1.0);
    camera.set_far_plane(100.0);
    let params = RenderParams {
        max_depth: 1,
        samples_per_pixel: 1,
        seed: 3,
        ..Default::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.jpg");

    let pool = ThreadPool::new(2);
    let mut film = Film::new(32, 32);
    let should_quit = Arc::new(AtomicBool::new(false));
    Scene::render_to_file(
        &Arc::new(scene),
        &pool,
        &camera,
        &params,
        &mut film,
        &should_quit,
        &output,
    )
    .unwrap();

    let decoded = image::open(&output).unwrap();
    assert_eq!(decoded.width(), 32);
    assert_eq!(decoded.height(), 32);
}

#[test]
fn accumulation_respects_the_sample_cap() {
    let mut scene = Scene::empty();
    let white = scene
        .add_material(
            "white",
            Material::constant_metalness_roughness(Vec3::ONE, 0.0, 0.5, Vec3::ZERO),
        )
        .unwrap();
    scene.add_instance("Sphere", Mat4::IDENTITY, white).unwrap();
    scene.build().unwrap();
    let scene = Arc::new(scene);

    let camera = Camera::new(Vec3::new(0.0, 0.0, -4.0), Vec3::Z, 1.0);
    let params = RenderParams {
        max_depth: 2,
        samples_per_pixel: 1,
        max_samples: 2,
        seed: 9,
        ..Default::default()
    };

    let pool = ThreadPool::new(2);
    let mut film = Film::new(8, 8);
    let should_quit = Arc::new(AtomicBool::new(false));

    for _ in 0..4 {
        Scene::render_to_memory(&scene, &pool, &camera, &params, &mut film, &should_quit)
            .unwrap();
    }

    assert_eq!(film.sample_count(4, 4), 2);
    assert_eq!(film.min_sample_count(), 2);
}

#[test]
fn direct_light_sampling_illuminates_a_plane_from_an_area_light() {
    let mut scene = Scene::empty();
    scene.add_primitive("Plane", Primitive::Mesh(plane_mesh(20.0)));
    let white = scene
        .add_material(
            "white",
            Material::constant_metalness_roughness(Vec3::splat(0.8), 0.0, 0.0, Vec3::ZERO),
        )
        .unwrap();
    let lamp = scene
        .add_material(
            "lamp",
            Material::constant_metalness_roughness(Vec3::ONE, 0.0, 1.0, Vec3::splat(10.0)),
        )
        .unwrap();

    scene.add_instance("Plane", Mat4::IDENTITY, white).unwrap();
    scene
        .add_instance(
            "Sphere",
            Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0)),
            lamp,
        )
        .unwrap();
    scene.build().unwrap();

    let mut camera = Camera::new(
        Vec3::new(0.0, 2.0, -8.0),
        Vec3::new(0.0, -0.3, 1.0).normalize(),
        1.0,
    );
    camera.set_far_plane(100.0);
    let params = RenderParams {
        max_depth: 2,
        samples_per_pixel: 64,
        seed: 21,
        ..Default::default()
    };

    let film = render(scene, &camera, &params, 16, 16);

    // Somewhere on the plane below the lamp must receive direct light.
    let mut max_value = 0.0f32;
    for y in 0..16 {
        for x in 0..16 {
            max_value = max_value.max(film.pixel(x, y).max_element());
        }
    }
    assert!(max_value > 0.01, "plane stayed dark, max {max_value}");
}
