use glam::{Mat3, Vec3, Vec4};

use crate::aabb::Aabb;

/// Trigonometry helpers for vectors expressed in a tangent frame where the
/// shading normal is the +Z axis.
pub mod tangent {
    use glam::Vec3;

    pub fn cos_theta(v: Vec3) -> f32 {
        v.z
    }

    pub fn cos2_theta(v: Vec3) -> f32 {
        v.z * v.z
    }

    pub fn abs_cos_theta(v: Vec3) -> f32 {
        v.z.abs()
    }

    pub fn sin2_theta(v: Vec3) -> f32 {
        (1.0 - cos2_theta(v)).max(0.0)
    }

    pub fn sin_theta(v: Vec3) -> f32 {
        sin2_theta(v).sqrt()
    }

    pub fn tan2_theta(v: Vec3) -> f32 {
        sin2_theta(v) / cos2_theta(v)
    }

    pub fn cos_phi(v: Vec3) -> f32 {
        let sin = sin_theta(v);
        if sin == 0.0 {
            1.0
        } else {
            (v.x / sin).clamp(-1.0, 1.0)
        }
    }

    pub fn sin_phi(v: Vec3) -> f32 {
        let sin = sin_theta(v);
        if sin == 0.0 {
            0.0
        } else {
            (v.y / sin).clamp(-1.0, 1.0)
        }
    }

    pub fn cos2_phi(v: Vec3) -> f32 {
        cos_phi(v) * cos_phi(v)
    }

    pub fn sin2_phi(v: Vec3) -> f32 {
        sin_phi(v) * sin_phi(v)
    }

    pub fn same_hemisphere(a: Vec3, b: Vec3) -> bool {
        a.z * b.z > 0.0
    }
}

pub fn spherical_direction(sin_theta: f32, cos_theta: f32, phi: f32) -> Vec3 {
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Orthonormal basis with N as +Z, expressed as a world-to-tangent matrix.
/// When V and N are nearly parallel the tangent is derived from a fixed axis
/// instead, picking whichever of X/Z is less aligned with N.
pub fn world_to_tangent(v: Vec3, n: Vec3) -> Mat3 {
    let tangent = if v.dot(n).abs() > 0.95 {
        let axis = if n.z.abs() > 0.99 { Vec3::X } else { Vec3::Z };
        axis.cross(n).normalize()
    } else {
        v.cross(n).normalize()
    };
    let bitangent = tangent.cross(n).normalize();

    Mat3::from_cols(tangent, bitangent, n).transpose()
}

pub fn reflect(i: Vec3, n: Vec3) -> Vec3 {
    i - n * 2.0 * i.dot(n)
}

/// Snell refraction of `i` around `n`. Returns zero on total internal
/// reflection.
pub fn refract(i: Vec3, n: Vec3, in_ior: f32, out_ior: f32) -> Vec3 {
    let eta = in_ior / out_ior;
    let n_dot_i = n.dot(i);
    let k = 1.0 - eta * eta * (1.0 - n_dot_i * n_dot_i);
    if k < 0.0 {
        Vec3::ZERO
    } else {
        eta * i - (eta * n_dot_i + k.sqrt()) * n
    }
}

pub fn fresnel_schlick(f0: Vec3, f90: f32, u: f32) -> Vec3 {
    f0 + (Vec3::splat(f90) - f0) * (1.0 - u).powi(5)
}

pub fn fresnel_schlick_scalar(in_ior: f32, out_ior: f32, cos_theta: f32) -> f32 {
    let f0 = ((in_ior - out_ior) / (in_ior + out_ior)).powi(2);
    f0 + (1.0 - f0) * (1.0 - cos_theta).powi(5)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Frostbite-normalised Disney diffuse factor, 1/pi included so a smooth
/// surface reduces to Lambert.
pub fn disney_diffuse(n_dot_v: f32, n_dot_l: f32, l_dot_h: f32, linear_roughness: f32) -> f32 {
    let energy_bias = lerp(0.0, 0.5, linear_roughness);
    let energy_factor = lerp(1.0, 1.0 / 1.51, linear_roughness);
    let fd90 = energy_bias + 2.0 * l_dot_h * l_dot_h * linear_roughness;
    let light_scatter = fresnel_schlick(Vec3::ONE, fd90, n_dot_l).x;
    let view_scatter = fresnel_schlick(Vec3::ONE, fd90, n_dot_v).x;

    light_scatter * view_scatter * energy_factor * std::f32::consts::FRAC_1_PI
}

pub fn smith_ggx_masking_shadowing(wi: Vec3, wo: Vec3, a2: f32) -> f32 {
    let dot_nl = tangent::cos_theta(wi);
    let dot_nv = tangent::cos_theta(wo);

    let denom_a = dot_nv * (a2 + (1.0 - a2) * dot_nl * dot_nl).sqrt();
    let denom_b = dot_nl * (a2 + (1.0 - a2) * dot_nv * dot_nv).sqrt();

    2.0 * dot_nl * dot_nv / (denom_a + denom_b)
}

/// GGX specular BRDF in the tangent frame, Schlick Fresnel and Smith
/// masking, weighted the way the sampling routine expects.
pub fn specular_ggx(wi: Vec3, wo: Vec3, roughness: f32, f0: Vec3) -> Vec3 {
    let h = (wi + wo).normalize();
    let a2 = roughness * roughness;

    if tangent::cos_theta(wi) > 0.0 && wi.dot(h) > 0.0 {
        let dot_wi_wm = wi.dot(h);

        let energy_bias = lerp(0.0, 0.5, roughness);
        let fd90 = energy_bias + 2.0 * dot_wi_wm * dot_wi_wm * roughness;

        let f = fresnel_schlick(f0, fd90, dot_wi_wm);
        let g = smith_ggx_masking_shadowing(wi, wo, a2);
        let weight = wo.dot(h).abs() / (tangent::cos_theta(wo) * tangent::cos_theta(h));

        f * g * weight
    } else {
        Vec3::ZERO
    }
}

/// Solid angle subtended at `pos` by a patch of `area` at `point` with
/// normal `normal`.
pub fn solid_angle(pos: Vec3, point: Vec3, normal: Vec3, area: f32) -> f32 {
    let to_point = point - pos;
    let distance_squared = to_point.length_squared();
    let wi = to_point.normalize();

    (normal.dot(-wi).abs() * area) / distance_squared
}

pub fn solid_angle_from_bounds(bounds: &Aabb, pos: Vec3) -> f32 {
    let centre = bounds.central_point().truncate();
    let size = bounds.side_lengths();
    let radius = size.max_element() / 2.0;
    let area = std::f32::consts::PI * radius * radius;

    solid_angle(pos, centre, (pos - centre).normalize(), area)
}

pub fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

pub fn pack_colour(colour: Vec4) -> u32 {
    (colour.x * 255.0) as u32
        | ((colour.y * 255.0) as u32) << 8
        | ((colour.z * 255.0) as u32) << 16
        | ((colour.w * 255.0) as u32) << 24
}

pub fn unpack_colour(colour: u32) -> Vec4 {
    Vec4::new(
        (colour & 0xff) as f32 / 255.0,
        ((colour >> 8) & 0xff) as f32 / 255.0,
        ((colour >> 16) & 0xff) as f32 / 255.0,
        ((colour >> 24) & 0xff) as f32 / 255.0,
    )
}

/// Zero out non-finite samples so one bad path cannot poison a pixel mean.
pub fn mask_nan(v: Vec3) -> Vec3 {
    if v.is_finite() {
        v
    } else {
        Vec3::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_rgba8_round_trips() {
        for colour in [
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::new(1.0, 1.0, 1.0, 1.0),
            Vec4::new(32.0 / 255.0, 64.0 / 255.0, 128.0 / 255.0, 200.0 / 255.0),
        ] {
            let packed = pack_colour(colour);
            let unpacked = unpack_colour(packed);
            assert!((unpacked - colour).abs().max_element() < 1.0 / 255.0);
        }

        assert_eq!(pack_colour(unpack_colour(0xdead_beef)), 0xdead_beef);
    }

    #[test]
    fn tangent_frame_maps_normal_to_z() {
        let n = Vec3::new(0.3, 0.9, -0.2).normalize();
        let v = Vec3::new(-0.5, 0.4, 0.7).normalize();
        let to_tangent = world_to_tangent(v, n);

        let n_t = to_tangent * n;
        assert!((n_t - Vec3::Z).length() < 1e-5);

        // Orthonormal, so the transpose is the inverse.
        let back = to_tangent.transpose() * n_t;
        assert!((back - n).length() < 1e-5);
    }

    #[test]
    fn tangent_frame_handles_parallel_view() {
        let n = Vec3::Z;
        let v = Vec3::Z;
        let to_tangent = world_to_tangent(v, n);
        let n_t = to_tangent * n;
        assert!((n_t - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn reflect_mirrors_around_normal() {
        let r = reflect(Vec3::new(1.0, -1.0, 0.0).normalize(), Vec3::Y);
        assert!((r - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-6);
    }

    #[test]
    fn refract_detects_total_internal_reflection() {
        // Shallow exit from glass into air.
        let i = Vec3::new(0.9, -0.435_889_9, 0.0).normalize();
        let refracted = refract(i, Vec3::Y, 1.5, 1.0);
        assert_eq!(refracted, Vec3::ZERO);
    }

    #[test]
    fn disney_diffuse_reduces_to_lambert_when_smooth() {
        let fd = disney_diffuse(1.0, 1.0, 1.0, 0.0);
        assert!((fd - std::f32::consts::FRAC_1_PI).abs() < 1e-6);
    }

    #[test]
    fn solid_angle_falls_off_with_distance_squared() {
        let near = solid_angle(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec3::Z, 1.0);
        let far = solid_angle(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), Vec3::Z, 1.0);
        assert!((near / far - 4.0).abs() < 1e-4);
    }

    #[test]
    fn mask_nan_zeroes_bad_samples() {
        assert_eq!(mask_nan(Vec3::new(f32::NAN, 1.0, 1.0)), Vec3::ZERO);
        assert_eq!(mask_nan(Vec3::new(0.5, 0.5, 0.5)), Vec3::new(0.5, 0.5, 0.5));
    }
}
