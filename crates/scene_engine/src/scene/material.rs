//! # Material Table
//!
//! Materials are owned by the scene and addressed by a dense [`MaterialId`].
//! Every material packs into 16 floats; the table uploads the packed array
//! as one structured buffer that shaders index by id.
//!
//! ## GPU Layout (per material, 64 bytes)
//!
//! | floats | content |
//! |--------|---------|
//! | 0..4   | base color RGB, alpha |
//! | 4..8   | emission RGB, emission strength |
//! | 8..12  | metallic, roughness, ambient occlusion, normal scale |
//! | 12     | height scale |
//! | 13     | texture map bits (u32 bit pattern) |
//! | 14..16 | padding |

use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::math::Vec3;
use crate::render::{BufferHandle, BufferUsage, RenderDevice};

/// Floats per packed material
pub const MATERIAL_WORDS: usize = 16;

/// Dense material index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

/// Texture map references by role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialMaps {
    /// Diffuse (albedo)
    pub diffuse: Option<String>,
    /// Tangent-space normals
    pub normal: Option<String>,
    /// Metalness
    pub metallic: Option<String>,
    /// Roughness
    pub roughness: Option<String>,
    /// Height (parallax)
    pub height: Option<String>,
    /// Ambient occlusion
    pub occlusion: Option<String>,
    /// Emission
    pub emission: Option<String>,
}

impl MaterialMaps {
    /// One bit per bound map, in field order
    pub fn bits(&self) -> u32 {
        [
            &self.diffuse,
            &self.normal,
            &self.metallic,
            &self.roughness,
            &self.height,
            &self.occlusion,
            &self.emission,
        ]
        .iter()
        .enumerate()
        .filter(|(_, map)| map.is_some())
        .fold(0, |bits, (index, _)| bits | (1 << index))
    }
}

/// Named surface description
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Unique name inside the table
    pub name: String,
    /// Texture maps
    pub maps: MaterialMaps,
    /// Base color (albedo)
    pub base_color: Vec3,
    /// Alpha transparency
    pub alpha: f32,
    /// Metallic factor (0.0 = dielectric, 1.0 = metallic)
    pub metallic: f32,
    /// Roughness factor (0.0 = mirror, 1.0 = completely rough)
    pub roughness: f32,
    /// Ambient occlusion factor
    pub ambient_occlusion: f32,
    /// Emission color
    pub emission: Vec3,
    /// Emission strength
    pub emission_strength: f32,
    /// Normal map scale
    pub normal_scale: f32,
    /// Height map scale
    pub height_scale: f32,
}

impl Material {
    /// Material with default parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            maps: MaterialMaps::default(),
            base_color: Vec3::new(0.8, 0.8, 0.8),
            alpha: 1.0,
            metallic: 0.0,
            roughness: 0.5,
            ambient_occlusion: 1.0,
            emission: Vec3::zeros(),
            emission_strength: 0.0,
            normal_scale: 1.0,
            height_scale: 0.0,
        }
    }

    /// Set the base color (builder)
    #[must_use]
    pub fn with_base_color(mut self, color: Vec3, alpha: f32) -> Self {
        self.base_color = color;
        self.alpha = alpha;
        self
    }

    /// Set metallic and roughness (builder)
    #[must_use]
    pub fn with_metallic_roughness(mut self, metallic: f32, roughness: f32) -> Self {
        self.metallic = metallic;
        self.roughness = roughness;
        self
    }

    /// Set emission (builder)
    #[must_use]
    pub fn with_emission(mut self, color: Vec3, strength: f32) -> Self {
        self.emission = color;
        self.emission_strength = strength;
        self
    }

    /// Set texture maps (builder)
    #[must_use]
    pub fn with_maps(mut self, maps: MaterialMaps) -> Self {
        self.maps = maps;
        self
    }

    /// Whether the material needs the transparent pass
    pub fn is_transparent(&self) -> bool {
        self.alpha < 1.0
    }

    /// Packed GPU representation
    pub fn gpu_words(&self) -> [f32; MATERIAL_WORDS] {
        [
            self.base_color.x,
            self.base_color.y,
            self.base_color.z,
            self.alpha,
            self.emission.x,
            self.emission.y,
            self.emission.z,
            self.emission_strength,
            self.metallic,
            self.roughness,
            self.ambient_occlusion,
            self.normal_scale,
            self.height_scale,
            f32::from_bits(self.maps.bits()),
            0.0,
            0.0,
        ]
    }
}

/// Materials of one scene
#[derive(Debug, Default)]
pub struct MaterialTable {
    materials: Vec<Arc<Material>>,
    names: HashMap<String, MaterialId>,
    buffer: Option<(BufferHandle, usize)>,
    dirty: bool,
}

impl MaterialTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a material; a material with the same name is replaced in place
    /// and keeps its id
    pub fn add(&mut self, material: Material) -> MaterialId {
        self.dirty = true;
        if let Some(&id) = self.names.get(&material.name) {
            self.materials[id.0 as usize] = Arc::new(material);
            return id;
        }

        let id = MaterialId(u32::try_from(self.materials.len()).unwrap_or(u32::MAX));
        self.names.insert(material.name.clone(), id);
        self.materials.push(Arc::new(material));
        id
    }

    /// Material by id
    pub fn get(&self, id: MaterialId) -> Option<Arc<Material>> {
        self.materials.get(id.0 as usize).cloned()
    }

    /// Id by name
    pub fn find(&self, name: &str) -> Option<MaterialId> {
        self.names.get(name).copied()
    }

    /// Number of materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Whether the GPU copy is out of date
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// GPU buffer holding the packed table
    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer.map(|(buffer, _)| buffer)
    }

    /// Every material packed in id order
    pub fn pack(&self) -> Vec<f32> {
        self.materials.iter().flat_map(|m| m.gpu_words()).collect()
    }

    /// Upload the packed table when dirty and bind it; false (logged) on failure
    pub fn upload(&mut self, device: &dyn RenderDevice) -> bool {
        if !self.dirty || self.materials.is_empty() {
            return true;
        }

        let words = self.pack();
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        let buffer = match self.buffer {
            Some((buffer, len)) if len == bytes.len() => match device.write_buffer(buffer, bytes) {
                Ok(()) => buffer,
                Err(e) => {
                    log::error!("Failed to update material buffer: {e}");
                    return false;
                }
            },
            previous => {
                if let Some((buffer, _)) = previous {
                    device.destroy_buffer(buffer);
                    self.buffer = None;
                }
                match device.create_buffer(BufferUsage::Structured, bytes) {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        log::error!("Failed to create material buffer: {e}");
                        return false;
                    }
                }
            }
        };

        self.buffer = Some((buffer, bytes.len()));
        self.dirty = false;
        device.bind_materials(buffer);
        log::debug!("Uploaded {} materials", self.materials.len());
        true
    }

    /// Destroy the GPU buffer
    pub fn release(&mut self, device: &dyn RenderDevice) {
        if let Some((buffer, _)) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.dirty = true;
    }
}
