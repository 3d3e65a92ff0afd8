pub mod geometry;
pub mod material;

pub use geometry::{Aabb, Mesh, Ray};
pub use material::{ColorSpace, ImageData, Material, TextureKind, TextureSlot};

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Handle to a node in a [`SceneGraph`]. Stale handles resolve to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local transform. Rotation is XYZ Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn set_quat(&mut self, rotation: Quat) {
        let (x, y, z) = rotation.normalize().to_euler(EulerRot::XYZ);
        self.rotation = Vec3::new(x, y, z);
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }

    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        let mut transform = Self {
            position,
            rotation: Vec3::ZERO,
            scale,
        };
        transform.set_quat(rotation);
        transform
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub cast_shadow: bool,
}

/// What a node is. Only drawables take part in bounds and hit-testing.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Drawable(Mesh),
    Light(Light),
    Camera,
}

impl NodeKind {
    pub fn is_drawable(&self) -> bool {
        matches!(self, NodeKind::Drawable(_))
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match self {
            NodeKind::Drawable(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match self {
            NodeKind::Drawable(mesh) => Some(mesh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    /// Eligible for pointer selection. Set only on imported models.
    pub pickable: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A detached node tree, built off the scene (e.g. by the model loader) and
/// inserted in one step.
#[derive(Debug, Clone)]
pub struct Subtree {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn drawable(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Drawable(mesh),
            children: Vec::new(),
        }
    }

    /// Visit this node and all descendants, parents first.
    pub fn visit_mut(&mut self, visit: &mut dyn FnMut(&mut Subtree)) {
        visit(self);
        for child in &mut self.children {
            child.visit_mut(visit);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Subtree::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

/// Arena-backed hierarchy of nodes under a single root.
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                name: "Scene".to_string(),
                transform: Transform::IDENTITY,
                kind: NodeKind::Group,
                pickable: false,
                parent: None,
                children: Vec::new(),
            })],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children()).unwrap_or(&[])
    }

    /// Returns `None` when `parent` does not exist.
    pub fn add(&mut self, parent: NodeId, name: impl Into<String>, kind: NodeKind) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind,
            pickable: false,
            parent: Some(parent),
            children: Vec::new(),
        }));
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.push(id);
        }
        Some(id)
    }

    /// Insert a detached tree under `parent`, returning the new subtree root.
    pub fn insert(&mut self, parent: NodeId, subtree: Subtree) -> Option<NodeId> {
        let Subtree {
            name,
            transform,
            kind,
            children,
        } = subtree;
        let id = self.add(parent, name, kind)?;
        self.set_transform(id, transform);
        for child in children {
            self.insert(id, child);
        }
        Some(id)
    }

    /// Remove a node and everything below it. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        let doomed = self.descendants(id);
        if let Some(parent) = self.node(id).and_then(Node::parent) {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|child| *child != id);
            }
        }
        for node in doomed {
            if let Some(slot) = self.nodes.get_mut(node.index()) {
                *slot = None;
            }
        }
        true
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn transform(&self, id: NodeId) -> Option<Transform> {
        self.node(id).map(|node| node.transform)
    }

    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.node(*child).is_some_and(|node| node.name == name))
    }

    /// `id` and all of its descendants, parents before children.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn set_pickable(&mut self, id: NodeId, pickable: bool) {
        for node in self.descendants(id) {
            if let Some(node) = self.node_mut(node) {
                node.pickable = pickable;
            }
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.node(node_id) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// World-space bounds of every drawable in the subtree rooted at `id`.
    pub fn bounding_box(&self, id: NodeId) -> Aabb {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| {
                let mesh = self.node(node)?.kind.mesh()?;
                Some(mesh.bounds_under(&self.world_matrix(node)))
            })
            .fold(Aabb::EMPTY, |acc, bounds| acc.union(&bounds))
    }

    /// All drawable surfaces under `id` crossed by a world-space ray, nearest
    /// first.
    pub fn intersect_ray(&self, id: NodeId, ray: &Ray) -> Vec<RayHit> {
        let mut hits: Vec<RayHit> = self
            .descendants(id)
            .into_iter()
            .filter_map(|node| {
                let mesh = self.node(node)?.kind.mesh()?;
                let world = self.world_matrix(node);
                if world.determinant().abs() < f32::EPSILON {
                    return None;
                }
                let local_ray = ray.transformed(&world.inverse());
                let t = mesh.intersect_ray(&local_ray)?;
                Some(RayHit {
                    node,
                    distance: t,
                    point: ray.at(t),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}
