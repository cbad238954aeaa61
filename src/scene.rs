use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};
use serde_json::Value;

use crate::accel::TopLevel;
use crate::bsdf::Bsrdf;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::film::Film;
use crate::fsmap::FileSystemMappings;
use crate::integrator::MonteCarloIntegrator;
use crate::material::{Material, MaterialId, MaterialManager};
use crate::mesh::TriangleMesh;
use crate::pool::ThreadPool;
use crate::primitive::Primitive;
use crate::rng::XorShift;
use crate::sphere::Sphere;
use crate::texture::{Texture2D, TextureCube};
use crate::tiler::Tiler;

/// An emissive instance, addressed for direct-light sampling.
pub struct Light {
    pub transform: Mat4,
    pub inverse_transform: Mat4,
    pub primitive: u32,
}

/// Optional directional source layered over the environment.
#[derive(Clone, Copy, Debug)]
pub struct Sun {
    pub direction: Vec3,
    pub colour: Vec3,
}

/// The environment: a cube map that every escaping ray samples, plus an
/// optional sun.
pub struct Sky {
    pub skybox: TextureCube,
    pub sun: Option<Sun>,
}

impl Default for Sky {
    fn default() -> Self {
        Self {
            skybox: TextureCube::solid(Vec4::new(0.0, 0.0, 0.0, 1.0)),
            sun: None,
        }
    }
}

impl Sky {
    pub fn sample(&self, direction: Vec3) -> Vec3 {
        self.skybox.sample4(direction).truncate()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RenderParams {
    pub max_depth: u32,
    pub samples_per_pixel: u32,
    /// Accumulation stops once every pixel holds this many estimates.
    pub max_samples: u32,
    pub tile_size: UVec2,
    pub seed: u64,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            samples_per_pixel: 1,
            max_samples: u32::MAX,
            tile_size: UVec2::new(32, 32),
            seed: 0,
        }
    }
}

struct TileResult {
    origin: UVec2,
    size: UVec2,
    /// Row-major within the tile; shorter than the tile area if the render
    /// was cancelled partway.
    pixels: Vec<Vec3>,
}

/// Everything a render reads: geometry, instances, materials, lights, sky
/// and cameras. Immutable once built, so workers share it by reference.
pub struct Scene {
    working_dir: PathBuf,
    file_mappings: Option<FileSystemMappings>,

    primitives: Vec<Primitive>,
    asset_ids: HashMap<String, u32>,

    materials: MaterialManager,
    material_ids: HashMap<String, MaterialId>,

    top: TopLevel,
    lights: Vec<Light>,
    sky: Sky,

    cameras: HashMap<String, Camera>,
}

const SECTIONS: [&str; 5] = ["GLOBALS", "MESH", "MATERIALS", "INSTANCE", "CAMERA"];

fn json_f32(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}

fn json_vec3(value: &Value) -> Option<Vec3> {
    let array = value.as_array()?;
    Some(Vec3::new(
        json_f32(array.first()?)?,
        json_f32(array.get(1)?)?,
        json_f32(array.get(2)?)?,
    ))
}

fn json_quat(value: &Value) -> Option<Quat> {
    let array = value.as_array()?;
    Some(
        Quat::from_xyzw(
            json_f32(array.first()?)?,
            json_f32(array.get(1)?)?,
            json_f32(array.get(2)?)?,
            json_f32(array.get(3)?)?,
        )
        .normalize(),
    )
}

impl Scene {
    /// A scene with only the built-in unit sphere asset registered.
    pub fn empty() -> Self {
        let mut scene = Self {
            working_dir: PathBuf::new(),
            file_mappings: None,
            primitives: Vec::new(),
            asset_ids: HashMap::new(),
            materials: MaterialManager::new(),
            material_ids: HashMap::new(),
            top: TopLevel::new(),
            lights: Vec::new(),
            sky: Sky::default(),
            cameras: HashMap::new(),
        };
        scene.add_primitive("Sphere", Primitive::Sphere(Sphere::new(1.0)));
        scene
    }

    /// Load a scene description file. All referenced assets are resolved
    /// case-insensitively against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|_| Error::FileMissing(path.to_path_buf()))?;
        let root: Value =
            serde_json::from_str(&text).map_err(|e| Error::MalformedScene(e.to_string()))?;

        let mut scene = Scene::empty();
        scene.working_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        scene.file_mappings = Some(FileSystemMappings::new(&scene.working_dir));

        for section in SECTIONS {
            let Some(entries) = root.get(section).and_then(Value::as_object) else {
                continue;
            };
            log::debug!("loading {} entries from {section}", entries.len());
            for (name, entry) in entries {
                match section {
                    "GLOBALS" => scene.process_globals(entry)?,
                    "MESH" => scene.load_mesh_entry(name, entry)?,
                    "MATERIALS" => scene.load_material_entry(name, entry)?,
                    "INSTANCE" => scene.load_instance_entry(name, entry)?,
                    "CAMERA" => scene.load_camera_entry(name, entry)?,
                    _ => unreachable!(),
                }
            }
        }

        scene.build()?;

        log::info!(
            "loaded scene {}: {} assets, {} instances, {} materials, {} lights, {} cameras",
            path.display(),
            scene.primitives.len(),
            scene.top.entries().len(),
            scene.materials.len(),
            scene.lights.len(),
            scene.cameras.len(),
        );
        Ok(scene)
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        match &self.file_mappings {
            Some(mappings) => mappings.resolve(Path::new(path)),
            None => self.working_dir.join(path),
        }
    }

    fn process_globals(&mut self, entry: &Value) -> Result<()> {
        if let Some(skybox) = entry.get("Skybox") {
            let paths = skybox
                .as_array()
                .filter(|faces| faces.len() == 6)
                .ok_or_else(|| {
                    Error::MalformedScene("Skybox must list 6 face images".into())
                })?;

            let mut faces: [PathBuf; 6] = Default::default();
            for (slot, path) in faces.iter_mut().zip(paths) {
                let path = path.as_str().ok_or_else(|| {
                    Error::MalformedScene("Skybox entries must be path strings".into())
                })?;
                *slot = self.resolve_path(path);
            }
            self.sky.skybox = TextureCube::from_faces(&faces)?;
        }

        if let Some(direction) = entry.get("SunDirection").and_then(json_vec3) {
            let colour = entry
                .get("SunColour")
                .and_then(json_vec3)
                .unwrap_or(Vec3::ONE);
            self.set_sun(direction, colour);
        }

        Ok(())
    }

    fn load_mesh_entry(&mut self, name: &str, entry: &Value) -> Result<()> {
        let path = entry
            .get("Path")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedScene(format!("mesh {name} is missing Path")))?;
        let resolved = self.resolve_path(path);
        if !resolved.is_file() {
            return Err(Error::FileMissing(resolved));
        }

        let start = Instant::now();
        let mesh = load_wavefront_mesh(&resolved)?;
        log::info!(
            "mesh {name}: {} triangles, built in {:?}",
            mesh.triangle_count(),
            start.elapsed()
        );

        self.add_primitive(name, Primitive::Mesh(mesh));
        Ok(())
    }

    fn load_material_entry(&mut self, name: &str, entry: &Value) -> Result<()> {
        let kind = entry
            .get("Type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedScene(format!("material {name} is missing Type")))?;

        let texture = |key: &str| -> Result<Option<Texture2D>> {
            match entry.get(key).and_then(Value::as_str) {
                Some(path) => Texture2D::open(&self.resolve_path(path)).map(Some),
                None => Ok(None),
            }
        };

        let material = match kind {
            "Metalic" => Material::MetalnessRoughness {
                albedo: texture("Albedo")?,
                metalness: texture("Metalness")?,
                roughness: texture("Roughness")?,
                emissive: texture("Emissive")?,
                combined: false,
            },
            "Gloss" => Material::SpecularGloss {
                diffuse: texture("Diffuse")?,
                specular: texture("Specular")?,
                gloss: texture("Gloss")?,
                emissive: texture("Emissive")?,
            },
            "Constant" => {
                let albedo = entry.get("Albedo").and_then(json_vec3).unwrap_or(Vec3::ZERO);
                let metalness = entry.get("Metalness").and_then(json_f32).unwrap_or(0.0);
                let roughness = entry.get("Roughness").and_then(json_f32).unwrap_or(0.0);
                let emissive = entry
                    .get("Emmissive")
                    .and_then(json_vec3)
                    .unwrap_or(Vec3::ZERO);

                match entry.get("Transparency").and_then(json_f32) {
                    Some(transparency) => {
                        let ior = entry.get("IoR").and_then(json_f32).unwrap_or(1.0);
                        Material::constant_transparent_metalness_roughness(
                            albedo,
                            metalness,
                            roughness,
                            transparency,
                            ior,
                        )
                    }
                    None => Material::constant_metalness_roughness(
                        albedo, metalness, roughness, emissive,
                    ),
                }
            }
            other => {
                return Err(Error::MalformedScene(format!(
                    "material {name} has unknown type {other}"
                )))
            }
        };

        self.add_material(name, material)?;
        Ok(())
    }

    fn load_instance_entry(&mut self, name: &str, entry: &Value) -> Result<()> {
        let asset = entry
            .get("Asset")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedScene(format!("instance {name} is missing Asset")))?;

        let position = entry
            .get("Position")
            .and_then(json_vec3)
            .unwrap_or(Vec3::ZERO);
        let scale = entry.get("Scale").and_then(json_vec3).unwrap_or(Vec3::ONE);
        let rotation = entry
            .get("Rotation")
            .and_then(json_quat)
            .unwrap_or(Quat::IDENTITY);

        let material = match entry.get("Material").and_then(Value::as_str) {
            Some(material_name) => *self.material_ids.get(material_name).ok_or_else(|| {
                Error::MalformedScene(format!(
                    "instance {name} references unknown material {material_name}"
                ))
            })?,
            None => {
                if self.materials.is_empty() {
                    return Err(Error::MalformedScene(format!(
                        "instance {name} has no material and the scene defines none"
                    )));
                }
                0
            }
        };

        let transform = Mat4::from_translation(position)
            * Mat4::from_quat(rotation)
            * Mat4::from_scale(scale);

        self.add_instance(asset, transform, material)
    }

    fn load_camera_entry(&mut self, name: &str, entry: &Value) -> Result<()> {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::X, 1.0);

        if let Some(position) = entry.get("Position").and_then(json_vec3) {
            camera.set_position(position);
        }
        if let Some(direction) = entry.get("Direction").and_then(json_vec3) {
            camera.set_direction(direction.normalize());
        }
        if let Some(aspect) = entry.get("Aspect").and_then(json_f32) {
            camera.set_aspect(aspect);
        }
        if let Some(near) = entry.get("NearPlane").and_then(json_f32) {
            camera.set_near_plane(near);
        }
        if let Some(far) = entry.get("FarPlane").and_then(json_f32) {
            camera.set_far_plane(far);
        }
        if let Some(fov) = entry.get("FOV").and_then(json_f32) {
            camera.set_fov_degrees(fov);
        }

        self.cameras.insert(name.to_string(), camera);
        Ok(())
    }

    pub fn add_primitive(&mut self, name: &str, primitive: Primitive) -> u32 {
        let id = self.primitives.len() as u32;
        self.primitives.push(primitive);
        self.asset_ids.insert(name.to_string(), id);
        id
    }

    pub fn add_material(&mut self, name: &str, material: Material) -> Result<MaterialId> {
        let id = self.materials.add(material)?;
        self.material_ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Place an instance of a registered asset. Emissive materials also
    /// register the instance as a light.
    pub fn add_instance(&mut self, asset: &str, transform: Mat4, material: MaterialId) -> Result<()> {
        let primitive = *self
            .asset_ids
            .get(asset)
            .ok_or_else(|| Error::MalformedScene(format!("unknown asset {asset}")))?;

        let definition = self.materials.get(material);
        let bsdf = if definition.is_light() {
            Bsrdf::light(material)
        } else if let Some((transparency, ior)) = definition.transparency() {
            Bsrdf::transmissive(material, transparency, ior)
        } else {
            // Route by the dominant lobe of the evaluated material.
            let evaluated = definition.evaluate(Vec2::splat(0.5));
            if evaluated.specular.length() > evaluated.diffuse.length() {
                Bsrdf::specular(material)
            } else {
                Bsrdf::diffuse(material)
            }
        };

        if definition.is_light() {
            self.primitives[primitive as usize].generate_sampling_data();
            self.lights.push(Light {
                transform,
                inverse_transform: transform.inverse(),
                primitive,
            });
        }

        self.top.add_entry(primitive, transform, bsdf);
        Ok(())
    }

    pub fn set_skybox(&mut self, skybox: TextureCube) {
        self.sky.skybox = skybox;
    }

    pub fn set_sun(&mut self, direction: Vec3, colour: Vec3) {
        self.sky.sun = Some(Sun {
            direction: direction.normalize(),
            colour,
        });
    }

    pub fn add_camera(&mut self, name: &str, camera: Camera) {
        self.cameras.insert(name.to_string(), camera);
    }

    pub fn camera(&self, name: &str) -> Option<&Camera> {
        self.cameras.get(name)
    }

    pub fn first_camera(&self) -> Option<&Camera> {
        self.cameras.values().next()
    }

    /// Finalise the scene for rendering: computes world bounds and builds
    /// the upper-level index.
    pub fn build(&mut self) -> Result<()> {
        let start = Instant::now();
        self.top.build(&self.primitives)?;
        log::info!(
            "built scene index over {} instances in {:?}",
            self.top.entries().len(),
            start.elapsed()
        );
        Ok(())
    }

    pub fn top_level(&self) -> &TopLevel {
        &self.top
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn materials(&self) -> &MaterialManager {
        &self.materials
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn sky(&self) -> &Sky {
        &self.sky
    }

    /// Render one accumulation pass into the film, tile-parallel over the
    /// pool. Deterministic for a fixed `params.seed`. Checks `should_quit`
    /// before every pixel; on cancellation the film keeps whatever was
    /// already merged and `Cancelled` is returned.
    pub fn render_to_memory(
        scene: &Arc<Scene>,
        pool: &ThreadPool,
        camera: &Camera,
        params: &RenderParams,
        film: &mut Film,
        should_quit: &Arc<AtomicBool>,
    ) -> Result<()> {
        if film.min_sample_count() >= params.max_samples {
            return Ok(());
        }

        let resolution = UVec2::new(film.width(), film.height());
        let mut camera = *camera;
        camera.set_resolution(resolution);

        let tiler = Tiler::new(pool, resolution, params.tile_size);
        let mut master_rng = XorShift::new(params.seed);

        let scene_ref = scene.clone();
        let quit = should_quit.clone();
        let params_copy = *params;
        let results = tiler.execute_over_surface(&mut master_rng, move |origin, size, seed| {
            let mut integrator = MonteCarloIntegrator::new(&scene_ref, seed);
            let mut pixels = Vec::with_capacity((size.x * size.y) as usize);

            'tile: for y in 0..size.y {
                for x in 0..size.x {
                    if quit.load(Ordering::Relaxed) {
                        break 'tile;
                    }
                    let pixel = origin + UVec2::new(x, y);
                    pixels.push(integrator.integrate(
                        &camera,
                        pixel,
                        params_copy.max_depth,
                        params_copy.samples_per_pixel,
                    ));
                }
            }

            TileResult {
                origin,
                size,
                pixels,
            }
        });

        for tile in results {
            for (index, value) in tile.pixels.iter().enumerate() {
                let x = tile.origin.x + index as u32 % tile.size.x;
                let y = tile.origin.y + index as u32 / tile.size.x;
                if film.sample_count(x, y) < params.max_samples {
                    film.accumulate(x, y, *value);
                }
            }
        }

        if should_quit.load(Ordering::Relaxed) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Render and encode the film as a quality-100 JPEG.
    pub fn render_to_file(
        scene: &Arc<Scene>,
        pool: &ThreadPool,
        camera: &Camera,
        params: &RenderParams,
        film: &mut Film,
        should_quit: &Arc<AtomicBool>,
        path: &Path,
    ) -> Result<()> {
        Scene::render_to_memory(scene, pool, camera, params, film, should_quit)?;

        let rgba = film.to_rgba8();
        let rgb: Vec<u8> = rgba
            .chunks_exact(4)
            .flat_map(|texel| [texel[0], texel[1], texel[2]])
            .collect();

        let file =
            std::fs::File::create(path).map_err(|_| Error::FileMissing(path.to_path_buf()))?;
        let mut writer = std::io::BufWriter::new(file);
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, 100);
        encoder.encode(
            &rgb,
            film.width(),
            film.height(),
            image::ColorType::Rgb8,
        )?;

        log::info!("wrote {}", path.display());
        Ok(())
    }
}

/// Import a wavefront OBJ as one triangle soup, generating smooth normals
/// when the file carries none.
fn load_wavefront_mesh(path: &Path) -> Result<TriangleMesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| Error::MalformedScene(format!("{}: {e}", path.display())))?;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut colours = Vec::new();
    let mut indices = Vec::new();

    for model in &models {
        let mesh = &model.mesh;
        let base = positions.len() as u32;

        for chunk in mesh.positions.chunks_exact(3) {
            positions.push(Vec3::new(chunk[0], chunk[1], chunk[2]));
        }
        for chunk in mesh.normals.chunks_exact(3) {
            normals.push(Vec3::new(chunk[0], chunk[1], chunk[2]));
        }
        for chunk in mesh.texcoords.chunks_exact(2) {
            uvs.push(Vec2::new(chunk[0], chunk[1]));
        }
        for chunk in mesh.vertex_color.chunks_exact(3) {
            colours.push(Vec4::new(chunk[0], chunk[1], chunk[2], 1.0));
        }
        indices.extend(mesh.indices.iter().map(|index| base + index));
    }

    if normals.len() != positions.len() {
        normals = area_weighted_normals(&positions, &indices);
    }
    if uvs.len() != positions.len() {
        uvs.clear();
    }
    if colours.len() != positions.len() {
        colours.clear();
    }

    TriangleMesh::new(positions, normals, uvs, colours, indices)
}

fn area_weighted_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let a = positions[triangle[0] as usize];
        let b = positions[triangle[1] as usize];
        let c = positions[triangle[2] as usize];
        let face = (b - a).cross(c - a);
        for &index in triangle {
            normals[index as usize] += face;
        }
    }

    normals
        .into_iter()
        .map(|n| if n == Vec3::ZERO { Vec3::Y } else { n.normalize() })
        .collect()
}
