//! Post-processing applied to every imported model before it is placed.

use crate::scene::{Aabb, NodeId, SceneGraph, Subtree};
use glam::{Mat4, Vec3};

/// Turn on shadows for every mesh and tag texture images with their decoding.
pub fn prepare_surfaces(model: &mut Subtree) -> usize {
    let mut meshes = 0;
    model.visit_mut(&mut |node| {
        if let Some(mesh) = node.kind.mesh_mut() {
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
            if let Some(material) = mesh.material.as_mut() {
                material.apply_color_spaces();
            }
            meshes += 1;
        }
    });
    meshes
}

/// Bounds of every mesh in `model`, in the space `model` is placed into.
pub fn subtree_bounds(model: &Subtree) -> Aabb {
    fn walk(node: &Subtree, parent: Mat4, acc: &mut Aabb) {
        let world = parent * node.transform.matrix();
        if let Some(mesh) = node.kind.mesh() {
            *acc = acc.union(&mesh.bounds_under(&world));
        }
        for child in &node.children {
            walk(child, world, acc);
        }
    }
    let mut bounds = Aabb::EMPTY;
    walk(model, Mat4::IDENTITY, &mut bounds);
    bounds
}

/// Scale `model` so its largest dimension is `target_size`, centre it, rest
/// it on y = 0 and move it horizontally by `offset`. Returns the final bounds,
/// or `None` when the model has no geometry.
pub fn normalize(model: &mut Subtree, target_size: f32, offset: Vec3) -> Option<Aabb> {
    model.transform = Default::default();
    let bounds = subtree_bounds(model);
    if bounds.is_empty() {
        return None;
    }

    let largest = bounds.max_dimension();
    let scale = if largest > f32::EPSILON {
        target_size / largest
    } else {
        1.0
    };
    model.transform.scale = Vec3::splat(scale);
    model.transform.position = -bounds.center() * scale;

    let scaled = subtree_bounds(model);
    model.transform.position.y -= scaled.min.y;
    model.transform.position.x += offset.x;
    model.transform.position.z += offset.z;

    let placed = subtree_bounds(model);
    log::debug!(
        "normalized model: scale {scale:.4}, bounds {:?}..{:?}",
        placed.min,
        placed.max
    );
    Some(placed)
}

/// `UserModel_<stamp>`, with `_<n>` appended if a sibling already uses it.
pub fn unique_name(scene: &SceneGraph, container: NodeId, stamp: u128) -> String {
    let base = format!("UserModel_{stamp}");
    if scene.child_named(container, &base).is_none() {
        return base;
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|name| scene.child_named(container, name).is_none())
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ColorSpace, Material, Mesh, NodeKind, TextureKind, TextureSlot, Transform};

    fn off_centre_model() -> Subtree {
        let mut model = Subtree::group("model");
        let mut part = Subtree::drawable("part", Mesh::cuboid(Vec3::new(4.0, 1.0, 2.0)));
        part.transform = Transform::from_position(Vec3::new(10.0, -3.0, 5.0));
        model.children.push(part);
        model
    }

    #[test]
    fn normalized_model_rests_on_ground_at_target_size() {
        let mut model = off_centre_model();
        let offset = Vec3::new(0.0, 0.0, -4.0);
        let bounds = normalize(&mut model, 2.0, offset).unwrap();
        assert!((bounds.max_dimension() - 2.0).abs() < 1e-4);
        assert!(bounds.min.y.abs() < 1e-4);
        assert!((bounds.center().x - offset.x).abs() < 1e-4);
        assert!((bounds.center().z - offset.z).abs() < 1e-4);
    }

    #[test]
    fn placement_matches_scene_bounds() {
        let mut model = off_centre_model();
        normalize(&mut model, 2.0, Vec3::ZERO).unwrap();
        let mut scene = SceneGraph::new();
        let id = scene.insert(scene.root(), model).unwrap();
        let bounds = scene.bounding_box(id);
        assert!((bounds.max_dimension() - 2.0).abs() < 1e-4);
        assert!(bounds.min.y.abs() < 1e-4);
    }

    #[test]
    fn model_without_geometry_is_rejected() {
        let mut model = Subtree::group("empty");
        model.children.push(Subtree::group("child"));
        assert!(normalize(&mut model, 2.0, Vec3::ZERO).is_none());
    }

    #[test]
    fn flat_model_is_not_scaled_to_infinity() {
        let mut model = Subtree::drawable("point", Mesh::new(vec![Vec3::new(1.0, 1.0, 1.0)], vec![]));
        let bounds = normalize(&mut model, 2.0, Vec3::ZERO).unwrap();
        assert_eq!(model.transform.scale, Vec3::ONE);
        assert!(bounds.min.y.abs() < 1e-6);
    }

    #[test]
    fn surfaces_get_shadows_and_color_spaces() {
        let mut material = Material::new("m");
        for kind in [TextureKind::BaseColor, TextureKind::Normal] {
            material.textures.push(TextureSlot {
                kind,
                image: Some(crate::scene::ImageData {
                    width: 1,
                    height: 1,
                    rgba: vec![255; 4],
                }),
                color_space: ColorSpace::Linear,
            });
        }
        let mut model = Subtree::group("model");
        model
            .children
            .push(Subtree::drawable("a", Mesh::cuboid(Vec3::ONE).with_material(material)));
        model.children.push(Subtree::drawable("b", Mesh::cuboid(Vec3::ONE)));

        assert_eq!(prepare_surfaces(&mut model), 2);
        for child in &model.children {
            let NodeKind::Drawable(mesh) = &child.kind else { panic!("drawable expected") };
            assert!(mesh.cast_shadow && mesh.receive_shadow);
        }
        let mesh = model.children[0].kind.mesh().unwrap();
        let spaces: Vec<_> = mesh
            .material
            .as_ref()
            .unwrap()
            .textures
            .iter()
            .map(|slot| slot.color_space)
            .collect();
        assert_eq!(spaces, vec![ColorSpace::Srgb, ColorSpace::Linear]);
    }

    #[test]
    fn unique_name_suffixes_collisions() {
        let mut scene = SceneGraph::new();
        let container = scene.add(scene.root(), "UserModels", NodeKind::Group).unwrap();
        assert_eq!(unique_name(&scene, container, 42), "UserModel_42");
        scene.add(container, "UserModel_42", NodeKind::Group);
        assert_eq!(unique_name(&scene, container, 42), "UserModel_42_1");
        scene.add(container, "UserModel_42_1", NodeKind::Group);
        assert_eq!(unique_name(&scene, container, 42), "UserModel_42_2");
    }
}
