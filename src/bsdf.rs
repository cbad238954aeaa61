use glam::{Vec2, Vec3};

use crate::accel::InterpolatedVertex;
use crate::material::{MaterialId, MaterialManager};
use crate::ray::Ray;
use crate::rng::HammersleyGenerator;
use crate::util::{self, tangent};

/// One importance-sampled scattering event: an outgoing direction, the
/// probability it was drawn with, and the energy the lobe carries.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    pub l: Vec3,
    pub pdf: f32,
    pub energy: Vec3,
}

/// Microfacet (or hemisphere) models used to draw scattering directions.
/// All directions are in the tangent frame with the shading normal at +Z.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Distribution {
    CosineHemisphere,
    Beckmann,
}

impl Distribution {
    pub fn sample(&self, xi: Vec2, view: Vec3, roughness: f32) -> Vec3 {
        match self {
            Distribution::CosineHemisphere => {
                let r = xi.x.sqrt();
                let phi = xi.y * 2.0 * std::f32::consts::PI;
                Vec3::new(
                    r * phi.cos(),
                    r * phi.sin(),
                    (1.0 - xi.x).max(0.0).sqrt(),
                )
                .normalize()
            }
            Distribution::Beckmann => {
                let alpha = roughness * roughness;
                let mut log_sample = (1.0 - xi.x).ln();
                if log_sample.is_infinite() {
                    log_sample = 0.0;
                }
                let tan2_theta = -alpha * alpha * log_sample;
                let phi = xi.y * 2.0 * std::f32::consts::PI;

                let cos_theta = 1.0 / (1.0 + tan2_theta).sqrt();
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
                let mut h = util::spherical_direction(sin_theta, cos_theta, phi);
                if !tangent::same_hemisphere(view, h) {
                    h = -h;
                }

                h.normalize()
            }
        }
    }

    pub fn pdf(&self, h: Vec3, roughness: f32) -> f32 {
        match self {
            Distribution::CosineHemisphere => {
                (tangent::cos_theta(h) * std::f32::consts::FRAC_1_PI).max(0.0)
            }
            Distribution::Beckmann => {
                let d = Self::beckmann_d(h, roughness).clamp(0.0, 1.0);
                d * tangent::abs_cos_theta(h)
            }
        }
    }

    pub fn energy(&self, wo: Vec3, wi: Vec3, roughness: f32) -> Vec3 {
        match self {
            Distribution::CosineHemisphere => {
                let h = (wo + wi).normalize();
                let n_dot_v = tangent::cos_theta(wo);
                let n_dot_l = tangent::cos_theta(wi);
                let l_dot_h = wi.dot(h);
                Vec3::splat(util::disney_diffuse(n_dot_v, n_dot_l, l_dot_h, roughness))
            }
            Distribution::Beckmann => util::specular_ggx(wi, wo, roughness, Vec3::ONE),
        }
    }

    fn roughness_to_alpha(roughness: f32) -> f32 {
        let roughness = roughness.max(1e-3);
        let x = roughness.ln();
        1.62142
            + 0.819_955 * x
            + 0.1734 * x * x
            + 0.017_120_1 * x * x * x
            + 0.000_640_711 * x * x * x * x
    }

    fn beckmann_d(wh: Vec3, roughness: f32) -> f32 {
        let alpha_x = Self::roughness_to_alpha(roughness);
        let alpha_y = alpha_x;

        let tan2_theta = tangent::tan2_theta(wh);
        if tan2_theta.is_infinite() {
            return 0.0;
        }
        let cos4_theta = tangent::cos2_theta(wh) * tangent::cos2_theta(wh);

        (-tan2_theta
            * (tangent::cos2_phi(wh) / (alpha_x * alpha_x)
                + tangent::sin2_phi(wh) / (alpha_y * alpha_y)))
            .exp()
            / (std::f32::consts::PI * alpha_x * alpha_y * cos4_theta)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BsrdfKind {
    Diffuse,
    Specular,
    Light,
    Transmissive,
}

/// A scattering model bound to a material id. Evaluation goes through the
/// material manager, which the integrator borrows for the whole render.
#[derive(Clone, Copy, Debug)]
pub struct Bsrdf {
    kind: BsrdfKind,
    material: MaterialId,
    distribution: Distribution,
    index_of_refraction: f32,
    transparency: f32,
}

impl Bsrdf {
    pub fn diffuse(material: MaterialId) -> Self {
        Self {
            kind: BsrdfKind::Diffuse,
            material,
            distribution: Distribution::CosineHemisphere,
            index_of_refraction: 1.0,
            transparency: 0.0,
        }
    }

    pub fn specular(material: MaterialId) -> Self {
        Self {
            kind: BsrdfKind::Specular,
            material,
            distribution: Distribution::Beckmann,
            index_of_refraction: 1.0,
            transparency: 0.0,
        }
    }

    pub fn light(material: MaterialId) -> Self {
        Self {
            kind: BsrdfKind::Light,
            material,
            distribution: Distribution::CosineHemisphere,
            index_of_refraction: 1.0,
            transparency: 0.0,
        }
    }

    pub fn transmissive(material: MaterialId, transparency: f32, index_of_refraction: f32) -> Self {
        Self {
            kind: BsrdfKind::Transmissive,
            material,
            distribution: Distribution::Beckmann,
            index_of_refraction,
            transparency,
        }
    }

    pub fn kind(&self) -> BsrdfKind {
        self.kind
    }

    pub fn material_id(&self) -> MaterialId {
        self.material
    }

    pub fn sample(
        &self,
        materials: &MaterialManager,
        rng: &mut HammersleyGenerator,
        hit: &InterpolatedVertex,
        ray: &mut Ray,
    ) -> Sample {
        match self.kind {
            BsrdfKind::Diffuse => self.sample_diffuse(materials, rng, hit, ray),
            BsrdfKind::Specular => self.sample_specular(materials, rng, hit, ray),
            BsrdfKind::Light => self.sample_light(materials, hit),
            BsrdfKind::Transmissive => self.sample_transmissive(materials, rng, hit, ray),
        }
    }

    fn sample_diffuse(
        &self,
        materials: &MaterialManager,
        rng: &mut HammersleyGenerator,
        hit: &InterpolatedVertex,
        ray: &Ray,
    ) -> Sample {
        let v = -ray.direction;
        let world_to_tangent = util::world_to_tangent(v, hit.normal);
        let tangent_to_world = world_to_tangent.inverse();
        let view_t = (world_to_tangent * v).normalize();

        let material = materials.evaluate(self.material, hit.uv);

        let h = self.distribution.sample(rng.next(), view_t, material.roughness);
        let pdf = self.distribution.pdf(h, material.roughness);

        Sample {
            l: (tangent_to_world * h).normalize(),
            pdf,
            energy: self.distribution.energy(view_t, h, material.roughness) * material.diffuse,
        }
    }

    fn sample_specular(
        &self,
        materials: &MaterialManager,
        rng: &mut HammersleyGenerator,
        hit: &InterpolatedVertex,
        ray: &Ray,
    ) -> Sample {
        let v = -ray.direction;
        let world_to_tangent = util::world_to_tangent(v, hit.normal);
        let tangent_to_world = world_to_tangent.inverse();
        let view_t = (world_to_tangent * v).normalize();

        let material = materials.evaluate(self.material, hit.uv);

        let h = self.distribution.sample(rng.next(), view_t, material.roughness);
        let l = util::reflect(-view_t, h).normalize();

        // Reflection maps the half-vector density onto outgoing directions
        // with Jacobian 1 / (2 V.H). Grazing configurations can push the
        // denominator negative; treat those as failed samples.
        let pdf =
            (self.distribution.pdf(h, material.roughness) / (2.0 * view_t.dot(h))).max(0.0);

        Sample {
            l: (tangent_to_world * l).normalize(),
            pdf,
            energy: self.distribution.energy(view_t, h, material.roughness) * material.specular,
        }
    }

    fn sample_light(&self, materials: &MaterialManager, hit: &InterpolatedVertex) -> Sample {
        let material = materials.evaluate(self.material, hit.uv);
        Sample {
            l: Vec3::ZERO,
            pdf: 1.0,
            energy: material.emissive,
        }
    }

    fn sample_transmissive(
        &self,
        materials: &MaterialManager,
        rng: &mut HammersleyGenerator,
        hit: &InterpolatedVertex,
        ray: &mut Ray,
    ) -> Sample {
        let v = -ray.direction;
        let world_to_tangent = util::world_to_tangent(v, hit.normal);
        let tangent_to_world = world_to_tangent.inverse();
        let view_t = (world_to_tangent * v).normalize();

        let material = materials.evaluate(self.material, hit.uv);

        let h = self.distribution.sample(rng.next(), view_t, material.roughness);
        let pdf = self.distribution.pdf(h, material.roughness);

        let leaving = ray.inside_geometry();
        let in_ior = ray.current_ior();
        let out_ior = if leaving {
            ray.ior_below_top()
        } else {
            self.index_of_refraction
        };

        let cos_i = view_t.dot(h).abs().min(1.0);
        let fresnel = util::fresnel_schlick_scalar(in_ior, out_ior, cos_i);

        let refracted = util::refract(-view_t, h, in_ior, out_ior);
        if refracted == Vec3::ZERO {
            // Past the critical angle; reflect off the microfacet instead.
            let l = util::reflect(-view_t, h).normalize();
            return Sample {
                l: (tangent_to_world * l).normalize(),
                pdf,
                energy: self.distribution.energy(view_t, h, material.roughness)
                    * material.specular,
            };
        }

        if leaving {
            ray.pop_ior();
        } else {
            ray.push_ior(self.index_of_refraction);
        }

        Sample {
            l: (tangent_to_world * refracted.normalize()).normalize(),
            pdf,
            energy: material.diffuse * self.transparency * (1.0 - fresnel),
        }
    }
}
