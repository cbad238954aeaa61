use glam::{Vec2, Vec3};

use crate::error::Result;
use crate::texture::Texture2D;

pub type MaterialId = u64;

/// What a material reduces to at one surface point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluatedMaterial {
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub roughness: f32,
    pub normal: Vec3,
    pub emissive: Vec3,
}

impl Default for EvaluatedMaterial {
    fn default() -> Self {
        Self {
            diffuse: Vec3::ZERO,
            specular: Vec3::ZERO,
            roughness: 1.0,
            normal: Vec3::Y,
            emissive: Vec3::ZERO,
        }
    }
}

const DIELECTRIC_F0: f32 = 0.04;

fn metalness_roughness_base(albedo: Vec3, metalness: f32, roughness: f32) -> EvaluatedMaterial {
    EvaluatedMaterial {
        diffuse: albedo * (1.0 - DIELECTRIC_F0) * (1.0 - metalness),
        specular: Vec3::splat(DIELECTRIC_F0).lerp(albedo, metalness),
        roughness,
        ..Default::default()
    }
}

fn diffuse_specular_base(diffuse: Vec3, specular: Vec3, gloss: f32) -> EvaluatedMaterial {
    EvaluatedMaterial {
        diffuse,
        specular,
        roughness: 1.0 - gloss * gloss,
        ..Default::default()
    }
}

/// The surface models a scene can reference. Texture-backed variants hold
/// their image slots directly; constant variants precompute their evaluated
/// form at construction.
pub enum Material {
    SmoothMetal {
        colour: Vec3,
    },
    RoughMetal {
        colour: Vec3,
    },
    MattPlastic {
        colour: Vec3,
    },
    Emissive,
    MetalnessRoughness {
        albedo: Option<Texture2D>,
        metalness: Option<Texture2D>,
        roughness: Option<Texture2D>,
        emissive: Option<Texture2D>,
        /// gltf convention: metalness in z, roughness in y of one texture.
        combined: bool,
    },
    SpecularGloss {
        diffuse: Option<Texture2D>,
        specular: Option<Texture2D>,
        gloss: Option<Texture2D>,
        emissive: Option<Texture2D>,
    },
    ConstantMetalnessRoughness {
        material: EvaluatedMaterial,
    },
    ConstantDiffuseSpecular {
        material: EvaluatedMaterial,
    },
    ConstantTransparentMetalnessRoughness {
        material: EvaluatedMaterial,
        transparency: f32,
        index_of_refraction: f32,
    },
    ConstantTransparentDiffuseSpecular {
        material: EvaluatedMaterial,
        transparency: f32,
        index_of_refraction: f32,
    },
}

impl Material {
    pub fn constant_metalness_roughness(
        albedo: Vec3,
        metalness: f32,
        roughness: f32,
        emissive: Vec3,
    ) -> Self {
        let mut material = metalness_roughness_base(albedo, metalness, roughness);
        material.emissive = emissive;
        Material::ConstantMetalnessRoughness { material }
    }

    pub fn constant_diffuse_specular(
        diffuse: Vec3,
        specular: Vec3,
        gloss: f32,
        emissive: Vec3,
    ) -> Self {
        let mut material = diffuse_specular_base(diffuse, specular, gloss);
        material.emissive = emissive;
        Material::ConstantDiffuseSpecular { material }
    }

    pub fn constant_transparent_metalness_roughness(
        albedo: Vec3,
        metalness: f32,
        roughness: f32,
        transparency: f32,
        index_of_refraction: f32,
    ) -> Self {
        Material::ConstantTransparentMetalnessRoughness {
            material: metalness_roughness_base(albedo, metalness, roughness),
            transparency,
            index_of_refraction,
        }
    }

    pub fn constant_transparent_diffuse_specular(
        diffuse: Vec3,
        specular: Vec3,
        gloss: f32,
        transparency: f32,
        index_of_refraction: f32,
    ) -> Self {
        Material::ConstantTransparentDiffuseSpecular {
            material: diffuse_specular_base(diffuse, specular, gloss),
            transparency,
            index_of_refraction,
        }
    }

    pub fn evaluate(&self, uv: Vec2) -> EvaluatedMaterial {
        match self {
            Material::SmoothMetal { colour } => EvaluatedMaterial {
                diffuse: Vec3::splat(DIELECTRIC_F0),
                specular: *colour,
                roughness: 0.05,
                ..Default::default()
            },
            Material::RoughMetal { colour } => EvaluatedMaterial {
                diffuse: Vec3::splat(DIELECTRIC_F0),
                specular: *colour,
                roughness: 0.8,
                ..Default::default()
            },
            Material::MattPlastic { colour } => EvaluatedMaterial {
                diffuse: *colour,
                specular: Vec3::splat(DIELECTRIC_F0),
                roughness: 0.8,
                ..Default::default()
            },
            Material::Emissive => EvaluatedMaterial {
                diffuse: Vec3::splat(0.8),
                specular: Vec3::ZERO,
                roughness: 0.8,
                emissive: Vec3::splat(0.5),
                ..Default::default()
            },
            Material::MetalnessRoughness {
                albedo,
                metalness,
                roughness,
                emissive,
                combined,
            } => {
                let albedo = albedo.as_ref().map_or(Vec3::ZERO, |t| t.sample3(uv));

                let (metalness, roughness) = if *combined {
                    // Combined texture travels in the metalness slot.
                    match metalness {
                        Some(texture) => {
                            let texel = texture.sample4(uv);
                            (texel.z, texel.y)
                        }
                        None => (0.0, 1.0),
                    }
                } else {
                    (
                        metalness.as_ref().map_or(0.0, |t| t.sample(uv)),
                        roughness.as_ref().map_or(1.0, |t| t.sample(uv)),
                    )
                };

                let mut material = metalness_roughness_base(albedo, metalness, roughness);
                if let Some(emissive) = emissive {
                    material.emissive = emissive.sample3(uv);
                }
                material
            }
            Material::SpecularGloss {
                diffuse,
                specular,
                gloss,
                emissive,
            } => {
                let mut material = EvaluatedMaterial::default();
                material.diffuse = diffuse.as_ref().map_or(Vec3::ZERO, |t| t.sample3(uv));
                if let Some(specular) = specular {
                    material.specular = specular.sample3(uv);
                }
                if let Some(gloss) = gloss {
                    let gloss = gloss.sample(uv);
                    material.roughness = 1.0 - gloss * gloss;
                }
                if let Some(emissive) = emissive {
                    material.emissive = emissive.sample3(uv);
                }
                material
            }
            Material::ConstantMetalnessRoughness { material }
            | Material::ConstantDiffuseSpecular { material }
            | Material::ConstantTransparentMetalnessRoughness { material, .. }
            | Material::ConstantTransparentDiffuseSpecular { material, .. } => *material,
        }
    }

    pub fn is_light(&self) -> bool {
        match self {
            Material::SmoothMetal { .. }
            | Material::RoughMetal { .. }
            | Material::MattPlastic { .. } => false,
            Material::Emissive => true,
            Material::MetalnessRoughness { emissive, .. }
            | Material::SpecularGloss { emissive, .. } => emissive.is_some(),
            Material::ConstantMetalnessRoughness { material }
            | Material::ConstantDiffuseSpecular { material } => {
                material.emissive.max_element() > 0.0
            }
            Material::ConstantTransparentMetalnessRoughness { .. }
            | Material::ConstantTransparentDiffuseSpecular { .. } => false,
        }
    }

    /// (transparency factor, index of refraction) for transparent variants.
    pub fn transparency(&self) -> Option<(f32, f32)> {
        match self {
            Material::ConstantTransparentMetalnessRoughness {
                transparency,
                index_of_refraction,
                ..
            }
            | Material::ConstantTransparentDiffuseSpecular {
                transparency,
                index_of_refraction,
                ..
            } => Some((*transparency, *index_of_refraction)),
            _ => None,
        }
    }

    fn texture_slots_mut(&mut self) -> Vec<&mut Texture2D> {
        match self {
            Material::MetalnessRoughness {
                albedo,
                metalness,
                roughness,
                emissive,
                ..
            } => [albedo, metalness, roughness, emissive]
                .into_iter()
                .flatten()
                .collect(),
            Material::SpecularGloss {
                diffuse,
                specular,
                gloss,
                emissive,
            } => [diffuse, specular, gloss, emissive]
                .into_iter()
                .flatten()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn texture_slots(&self) -> Vec<&Texture2D> {
        match self {
            Material::MetalnessRoughness {
                albedo,
                metalness,
                roughness,
                emissive,
                ..
            } => [albedo, metalness, roughness, emissive]
                .iter()
                .filter_map(|slot| slot.as_ref())
                .collect(),
            Material::SpecularGloss {
                diffuse,
                specular,
                gloss,
                emissive,
            } => [diffuse, specular, gloss, emissive]
                .iter()
                .filter_map(|slot| slot.as_ref())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn residence_size(&self) -> usize {
        self.texture_slots()
            .iter()
            .map(|texture| texture.residence_size())
            .sum()
    }

    pub fn is_resident(&self) -> bool {
        self.texture_slots()
            .iter()
            .all(|texture| texture.is_resident())
    }

    pub fn make_resident(&mut self) -> Result<()> {
        for texture in self.texture_slots_mut() {
            texture.make_resident()?;
        }
        Ok(())
    }
}

/// Owns every material in a scene and hands out ids. Texture memory is made
/// resident when a material is added and released with the manager.
#[derive(Default)]
pub struct MaterialManager {
    materials: Vec<Material>,
}

impl MaterialManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut material: Material) -> Result<MaterialId> {
        if !material.is_resident() {
            material.make_resident()?;
        }

        let id = self.materials.len() as MaterialId;
        self.materials.push(material);
        Ok(id)
    }

    pub fn evaluate(&self, id: MaterialId, uv: Vec2) -> EvaluatedMaterial {
        self.materials[id as usize].evaluate(uv)
    }

    pub fn get(&self, id: MaterialId) -> &Material {
        &self.materials[id as usize]
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
