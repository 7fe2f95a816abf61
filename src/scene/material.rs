/// Metallic-roughness material description.
use glam::{Vec3, Vec4};

/// How a material's alpha is interpreted.
/// Ordering matters: the pipeline draws `Opaque`, then `Mask`, then `Blend`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Fragments with alpha below the cutoff are discarded.
    Mask,
    /// Source-over blended after the opaque pass, no depth writes.
    Blend,
}

/// Reference to an image in the frame's image table plus the sampler used to read it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureBinding {
    pub image: usize,
    pub sampler: Option<usize>,
    /// Normal-map scale or occlusion strength; ignored by color textures.
    pub scale: f32,
}

impl TextureBinding {
    #[inline]
    pub fn new(image: usize) -> Self {
        Self {
            image,
            sampler: None,
            scale: 1.0,
        }
    }

    #[inline]
    pub fn with_sampler(mut self, sampler: usize) -> Self {
        self.sampler = Some(sampler);
        self
    }

    #[inline]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PbrMaterial {
    /// Linear RGB albedo and alpha.
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub emissive: Vec3,
    pub double_sided: bool,

    // KHR extension parameters, carried through for consumers; the shading model ignores them.
    pub transmission: f32,
    pub specular: f32,
    pub specular_color: Vec3,
    pub ior: f32,

    pub base_color_texture: Option<TextureBinding>,
    /// Roughness in G, metallic in B.
    pub metallic_roughness_texture: Option<TextureBinding>,
    pub normal_texture: Option<TextureBinding>,
    /// Occlusion in R.
    pub occlusion_texture: Option<TextureBinding>,
    pub emissive_texture: Option<TextureBinding>,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            emissive: Vec3::ZERO,
            double_sided: false,
            transmission: 0.0,
            specular: 1.0,
            specular_color: Vec3::ONE,
            ior: 1.5,
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
        }
    }
}

impl PbrMaterial {
    pub fn new(albedo: Vec3, metallic: f32, roughness: f32) -> Self {
        Self {
            base_color: albedo.extend(1.0),
            metallic,
            roughness,
            ..Default::default()
        }
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.base_color.w
    }

    pub fn with_alpha(mut self, mode: AlphaMode, alpha: f32) -> Self {
        self.alpha_mode = mode;
        self.base_color.w = alpha;
        self
    }

    pub fn with_cutoff(mut self, cutoff: f32) -> Self {
        self.alpha_cutoff = cutoff;
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    pub fn with_base_color_texture(mut self, binding: TextureBinding) -> Self {
        self.base_color_texture = Some(binding);
        self
    }

    pub fn with_metallic_roughness_texture(mut self, binding: TextureBinding) -> Self {
        self.metallic_roughness_texture = Some(binding);
        self
    }

    pub fn with_normal_texture(mut self, binding: TextureBinding) -> Self {
        self.normal_texture = Some(binding);
        self
    }

    pub fn with_occlusion_texture(mut self, binding: TextureBinding) -> Self {
        self.occlusion_texture = Some(binding);
        self
    }

    pub fn with_emissive_texture(mut self, binding: TextureBinding) -> Self {
        self.emissive_texture = Some(binding);
        self
    }
}
