//! Static set dressing around the editing area. None of it is pickable.

use crate::scene::{
    Light, LightKind, Material, Mesh, NodeId, NodeKind, SceneGraph, TextureKind, TextureSlot,
    Transform,
};
use glam::Vec3;

const PEDESTAL_HEIGHT: f32 = 0.25;
const PYRAMID_SPIN: f32 = 0.4;

pub struct Scenery {
    pub ground: NodeId,
    pub pedestal: NodeId,
    pub pyramid: NodeId,
    pub sphere: NodeId,
    pub lights: Vec<NodeId>,
}

impl Scenery {
    pub fn build(scene: &mut SceneGraph) -> Option<Self> {
        let root = scene.root();

        let mut ground_material = Material::new("ground");
        ground_material.textures.push(TextureSlot {
            kind: TextureKind::BaseColor,
            image: Some(checker(8)),
            color_space: Default::default(),
        });
        ground_material.apply_color_spaces();
        let mut ground_mesh = plane(30.0).with_material(ground_material);
        ground_mesh.receive_shadow = true;
        let ground = scene.add(root, "ground", NodeKind::Drawable(ground_mesh))?;

        let pedestal = scene.add(
            root,
            "pedestal",
            NodeKind::Drawable(shadowed(Mesh::cuboid(Vec3::new(2.2, PEDESTAL_HEIGHT, 2.2)))),
        )?;
        scene.set_transform(
            pedestal,
            Transform::from_position(Vec3::new(0.0, PEDESTAL_HEIGHT / 2.0, 0.0)),
        );

        let pyramid = scene.add(root, "pyramid", NodeKind::Drawable(shadowed(pyramid(2.0, 1.6))))?;
        scene.set_transform(
            pyramid,
            Transform::from_position(Vec3::new(0.0, PEDESTAL_HEIGHT + 0.001, 0.0)),
        );

        let sphere = scene.add(root, "sphere", NodeKind::Drawable(shadowed(uv_sphere(0.8, 24, 16))))?;
        scene.set_transform(sphere, Transform::from_position(Vec3::new(3.0, 0.8, 1.5)));

        let mut lights = Vec::new();
        for (name, kind, intensity, position, cast_shadow) in [
            ("ambient", LightKind::Ambient, 0.35, Vec3::ZERO, false),
            ("sun", LightKind::Directional, 1.2, Vec3::new(6.0, 10.0, 4.0), true),
            ("point", LightKind::Point, 0.9, Vec3::new(-4.0, 4.0, -2.0), true),
        ] {
            let light = scene.add(
                root,
                name,
                NodeKind::Light(Light {
                    kind,
                    color: [1.0, 1.0, 1.0],
                    intensity,
                    cast_shadow,
                }),
            )?;
            scene.set_transform(light, Transform::from_position(position));
            lights.push(light);
        }

        Some(Self {
            ground,
            pedestal,
            pyramid,
            sphere,
            lights,
        })
    }

    /// Idle motion, driven by elapsed seconds.
    pub fn animate(&self, scene: &mut SceneGraph, elapsed: f32) {
        if let Some(node) = scene.node_mut(self.pyramid) {
            node.transform.rotation.y = elapsed * PYRAMID_SPIN;
        }
    }
}

fn shadowed(mut mesh: Mesh) -> Mesh {
    mesh.cast_shadow = true;
    mesh.receive_shadow = true;
    mesh
}

/// Square in the XZ plane facing +Y.
fn plane(size: f32) -> Mesh {
    let h = size / 2.0;
    Mesh::new(
        vec![
            Vec3::new(-h, 0.0, -h),
            Vec3::new(h, 0.0, -h),
            Vec3::new(h, 0.0, h),
            Vec3::new(-h, 0.0, h),
        ],
        vec![0, 2, 1, 0, 3, 2],
    )
}

/// Square base on y = 0 with the apex above its centre.
fn pyramid(width: f32, height: f32) -> Mesh {
    let h = width / 2.0;
    Mesh::new(
        vec![
            Vec3::new(-h, 0.0, -h),
            Vec3::new(h, 0.0, -h),
            Vec3::new(h, 0.0, h),
            Vec3::new(-h, 0.0, h),
            Vec3::new(0.0, height, 0.0),
        ],
        vec![3, 2, 4, 2, 1, 4, 1, 0, 4, 0, 3, 4, 0, 1, 2, 0, 2, 3],
    )
}

fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Mesh {
    let mut positions = Vec::new();
    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        for segment in 0..=segments {
            let theta = std::f32::consts::TAU * segment as f32 / segments as f32;
            positions.push(Vec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.cos(),
                radius * phi.sin() * theta.sin(),
            ));
        }
    }
    let stride = segments + 1;
    let mut indices = Vec::new();
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * stride + segment;
            let b = a + stride;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    Mesh::new(positions, indices)
}

fn checker(cells: u32) -> crate::scene::ImageData {
    let size = cells * 8;
    let image = image::RgbaImage::from_fn(size, size, |x, y| {
        let value = if (x / 8 + y / 8) % 2 == 0 { 200 } else { 60 };
        image::Rgba([value, value, value, 255])
    });
    crate::scene::ImageData {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Ray;

    #[test]
    fn scenery_is_built_unpickable() {
        let mut scene = SceneGraph::new();
        let scenery = Scenery::build(&mut scene).unwrap();
        assert_eq!(scenery.lights.len(), 3);
        assert!(scene
            .descendants(scene.root())
            .into_iter()
            .all(|node| !scene.node(node).unwrap().pickable));
    }

    #[test]
    fn pyramid_sits_on_pedestal() {
        let mut scene = SceneGraph::new();
        let scenery = Scenery::build(&mut scene).unwrap();
        let pedestal = scene.bounding_box(scenery.pedestal);
        let pyramid = scene.bounding_box(scenery.pyramid);
        assert!((pedestal.max.y - PEDESTAL_HEIGHT).abs() < 1e-5);
        assert!(pyramid.min.y >= pedestal.max.y);
    }

    #[test]
    fn sphere_is_hit_from_above() {
        let mut scene = SceneGraph::new();
        let scenery = Scenery::build(&mut scene).unwrap();
        let ray = Ray::new(Vec3::new(3.05, 10.0, 1.52), Vec3::NEG_Y);
        let hits = scene.intersect_ray(scenery.sphere, &ray);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].point.y - 1.6).abs() < 0.05);
    }

    #[test]
    fn animation_spins_pyramid() {
        let mut scene = SceneGraph::new();
        let scenery = Scenery::build(&mut scene).unwrap();
        scenery.animate(&mut scene, 2.0);
        let rotation = scene.transform(scenery.pyramid).unwrap().rotation;
        assert!((rotation.y - 0.8).abs() < 1e-6);
    }
}
