use glam::{Mat3, UVec2, Vec3};

use crate::accel::{InterpolatedVertex, TopLevel};
use crate::bsdf::BsrdfKind;
use crate::camera::Camera;
use crate::material::MaterialManager;
use crate::primitive::Primitive;
use crate::ray::Ray;
use crate::rng::{HammersleyGenerator, XorShift};
use crate::scene::{Light, Scene, Sky};
use crate::util;

const RAY_OFFSET: f32 = 0.01;
const SHADOW_RAY_LENGTH: f32 = 10_000.0;

/// Stochastic termination. Paths die with probability 1 - q and survivors
/// are scaled by 1 / q, which keeps the estimator unbiased.
fn russian_roulette(rng: &mut XorShift, throughput: Vec3) -> Option<Vec3> {
    let survival = throughput.max_element();
    if rng.next_f32() > survival {
        None
    } else {
        Some(throughput / survival)
    }
}

/// Path-tracing estimator of the rendering equation over one scene. Each
/// worker owns its own integrator so the RNG state never crosses threads.
pub struct MonteCarloIntegrator<'a> {
    top: &'a TopLevel,
    primitives: &'a [Primitive],
    materials: &'a MaterialManager,
    lights: &'a [Light],
    sky: &'a Sky,

    rng: XorShift,
    sampler: HammersleyGenerator,
    max_depth: u32,
}

impl<'a> MonteCarloIntegrator<'a> {
    pub fn new(scene: &'a Scene, seed: u64) -> Self {
        Self {
            top: scene.top_level(),
            primitives: scene.primitives(),
            materials: scene.materials(),
            lights: scene.lights(),
            sky: scene.sky(),
            rng: XorShift::new(seed),
            sampler: HammersleyGenerator::new(seed ^ 0x9e37_79b9_7f4a_7c15),
            max_depth: 1,
        }
    }

    /// Average radiance of `samples` independent paths through one pixel.
    pub fn integrate(
        &mut self,
        camera: &Camera,
        pixel: UVec2,
        max_depth: u32,
        samples: u32,
    ) -> Vec3 {
        self.max_depth = max_depth;

        let mut result = Vec3::ZERO;
        for _ in 0..samples {
            let mut ray = camera.generate_ray(self.sampler.next(), pixel);
            match self.top.closest_intersection(self.primitives, &ray) {
                Some(vertex) => {
                    self.trace(vertex, &mut ray);
                    result += ray.payload;
                }
                None => {
                    result += ray.throughput * self.sky.sample(ray.direction);
                }
            }
        }
        result /= samples.max(1) as f32;

        util::mask_nan(result)
    }

    fn trace(&mut self, mut vertex: InterpolatedVertex, ray: &mut Ray) {
        for depth in 0..self.max_depth {
            let sample = vertex
                .bsdf
                .sample(self.materials, &mut self.sampler, &vertex, ray);

            if vertex.bsdf.kind() == BsrdfKind::Light {
                ray.payload += ray.throughput * sample.energy;
            }

            if let Some((radiance, pdf)) = self.sample_direct_lighting(&vertex) {
                ray.payload += ray.throughput * pdf * radiance * sample.energy;
            }

            // A zero-probability sample carries nothing; end the path.
            if sample.pdf == 0.0 {
                return;
            }
            ray.throughput *= sample.pdf * sample.energy;

            if depth > 2 {
                match russian_roulette(&mut self.rng, ray.throughput) {
                    Some(scaled) => ray.throughput = scaled,
                    None => return,
                }
            }

            ray.origin = vertex.position + (RAY_OFFSET * sample.l).extend(0.0);
            ray.direction = sample.l;

            match self.top.closest_intersection(self.primitives, ray) {
                Some(next) => vertex = next,
                None => {
                    ray.payload += ray.throughput * self.sky.sample(ray.direction);
                    return;
                }
            }
        }
    }

    /// Uniformly pick one light (the sun counts as one) and, if the shadow
    /// ray reaches it, return its radiance with the selection probability
    /// and surface cosine folded together.
    fn sample_direct_lighting(&mut self, frag: &InterpolatedVertex) -> Option<(Vec3, f32)> {
        let kind = frag.bsdf.kind();
        if kind == BsrdfKind::Light || kind == BsrdfKind::Transmissive {
            return None;
        }

        let sun_count = usize::from(self.sky.sun.is_some());
        let light_count = self.lights.len() + sun_count;
        if light_count == 0 {
            return None;
        }
        let light_index =
            ((self.rng.next_f32() * light_count as f32) as usize).min(light_count - 1);

        if light_index >= self.lights.len() {
            let sun = self.sky.sun.as_ref()?;
            let to_sun = -sun.direction;
            let shadow_ray = Ray::new(
                frag.position + (RAY_OFFSET * to_sun).extend(0.0),
                to_sun,
                SHADOW_RAY_LENGTH,
            );

            if self
                .top
                .closest_intersection(self.primitives, &shadow_ray)
                .is_none()
            {
                let cos_theta = util::saturate(frag.normal.dot(to_sun));
                return Some((sun.colour, cos_theta / light_count as f32));
            }
            return None;
        }

        let light = &self.lights[light_index];

        // Light geometry is sampled in its own local frame.
        let light_space_pos = light.inverse_transform * frag.position;
        let light_space_normal =
            (Mat3::from_mat4(light.inverse_transform) * frag.normal).normalize();

        let (sample_position, _solid_angle) = self.primitives[light.primitive as usize]
            .sample_geometry(
                &mut self.sampler,
                light_space_pos.truncate(),
                light_space_normal,
            )?;
        let world_position = light.transform * sample_position.extend(1.0);

        let to_light = (world_position.truncate() - frag.position.truncate()).normalize();
        if to_light.dot(frag.normal) < 0.0 {
            return None;
        }

        let shadow_ray = Ray::new(
            frag.position + (RAY_OFFSET * to_light).extend(0.0),
            to_light,
            SHADOW_RAY_LENGTH,
        );
        let hit = self.top.closest_intersection(self.primitives, &shadow_ray)?;
        if hit.bsdf.kind() != BsrdfKind::Light {
            return None;
        }

        let light_material = self.materials.evaluate(hit.bsdf.material_id(), hit.uv);
        let cos_theta = frag.normal.dot(to_light);

        Some((light_material.emissive, cos_theta / light_count as f32))
    }
}
