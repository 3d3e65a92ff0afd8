/// How sampled texel values are decoded before shading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Untagged data, sampled as-is.
    #[default]
    Linear,
    /// Perceptually encoded color, converted to linear on sampling.
    Srgb,
}

/// Which material input a texture feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    BaseColor,
    Emissive,
    MetallicRoughness,
    Normal,
    Occlusion,
}

impl TextureKind {
    /// Color maps are authored in sRGB; every other map carries data.
    pub fn color_space(self) -> ColorSpace {
        match self {
            TextureKind::BaseColor | TextureKind::Emissive => ColorSpace::Srgb,
            TextureKind::MetallicRoughness | TextureKind::Normal | TextureKind::Occlusion => {
                ColorSpace::Linear
            }
        }
    }
}

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureSlot {
    pub kind: TextureKind,
    /// `None` when the referenced image could not be fetched or decoded.
    pub image: Option<ImageData>,
    pub color_space: ColorSpace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub textures: Vec<TextureSlot>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            textures: Vec::new(),
        }
    }

    /// Tag every attached image with the decoding its slot requires.
    pub fn apply_color_spaces(&mut self) {
        for slot in &mut self.textures {
            if slot.image.is_some() {
                slot.color_space = slot.kind.color_space();
            }
        }
    }
}
