//! glTF 2.0 model reading
//!
//! Turns `.gltf` (JSON) and `.glb` (binary container) models into a detached
//! [`Subtree`]. The `gltf` crate parses and validates the document; every
//! external reference it makes (buffers, images) goes through a
//! [`UriResolver`] first and is then fetched from the transient store, a
//! `data:` URI, an `http(s)` host or the file system.
//!
//! Only triangle geometry is read: positions and indices. Normals, UVs,
//! skins and animations are skipped.

use super::resources::{ResourceStore, UriResolver, BLOB_PREFIX};
use crate::scene::{
    ImageData, Material, Mesh, NodeKind, Subtree, TextureKind, TextureSlot, Transform,
};
use base64::Engine as _;
use glam::{Mat4, Quat, Vec3};
use gltf::accessor::{DataType, Dimensions};
use gltf::mesh::Mode;
use gltf::{Document, Gltf, Semantic};
use std::collections::HashMap;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transient resource {0} is not registered")]
    Released(String),
    #[error("malformed data URI")]
    DataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("request to {uri} failed: {message}")]
    Http { uri: String, message: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum GltfError {
    #[error("invalid glTF document: {0}")]
    Document(#[from] gltf::Error),
    #[error("could not fetch {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: FetchError,
    },
    #[error("{kind} {index} does not exist")]
    MissingIndex { kind: &'static str, index: usize },
    #[error("accessor {index}: {reason}")]
    Accessor { index: usize, reason: &'static str },
    #[error("node {0} is its own ancestor")]
    NodeCycle(usize),
    #[error("document has no scene")]
    NoScene,
    #[error("model reader crashed: {0}")]
    Panicked(String),
}

/// Reads resource addresses into bytes.
#[derive(Clone, Default)]
pub struct Fetcher {
    store: ResourceStore,
}

impl Fetcher {
    pub fn new(store: ResourceStore) -> Self {
        Self { store }
    }

    pub fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        if address.starts_with(BLOB_PREFIX) {
            return self
                .store
                .get(address)
                .map(|bytes| bytes.to_vec())
                .ok_or_else(|| FetchError::Released(address.to_string()));
        }
        if let Some(rest) = address.strip_prefix("data:") {
            return decode_data_uri(rest);
        }
        if address.starts_with("http://") || address.starts_with("https://") {
            return fetch_http(address);
        }
        let path = address.strip_prefix("file://").unwrap_or(address);
        std::fs::read(path).map_err(|source| FetchError::Io {
            path: path.to_string(),
            source,
        })
    }
}

fn decode_data_uri(rest: &str) -> Result<Vec<u8>, FetchError> {
    let (header, payload) = rest.split_once(',').ok_or(FetchError::DataUri)?;
    if header.ends_with(";base64") {
        Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

fn fetch_http(uri: &str) -> Result<Vec<u8>, FetchError> {
    let http_error = |message: String| FetchError::Http {
        uri: uri.to_string(),
        message,
    };
    let response = ureq::get(uri)
        .call()
        .map_err(|err| http_error(err.to_string()))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| http_error(err.to_string()))?;
    Ok(bytes)
}

/// Every buffer view and accessor must lie inside the data it points at.
/// The accessor iterators slice without overflow checks, so hostile offsets
/// are turned away here.
fn check_ranges(document: &Document, buffers: &[Vec<u8>]) -> Result<(), GltfError> {
    for view in document.views() {
        let available = buffers.get(view.buffer().index()).map_or(0, Vec::len);
        let end = view.offset().checked_add(view.length());
        if end.map_or(true, |end| end > available) {
            return Err(GltfError::MissingIndex {
                kind: "byte range of bufferView",
                index: view.index(),
            });
        }
    }
    for accessor in document.accessors() {
        let Some(view) = accessor.view() else {
            continue;
        };
        let stride = view.stride().unwrap_or_else(|| accessor.size());
        let end = accessor
            .count()
            .checked_sub(1)
            .and_then(|last| last.checked_mul(stride))
            .and_then(|span| span.checked_add(accessor.offset()))
            .and_then(|start| start.checked_add(accessor.size()));
        if end.map_or(true, |end| end > view.length()) {
            return Err(GltfError::Accessor {
                index: accessor.index(),
                reason: "reads past the end of its buffer view",
            });
        }
    }
    Ok(())
}

struct Reader<'a> {
    buffers: Vec<Vec<u8>>,
    resolver: &'a UriResolver,
    fetcher: &'a Fetcher,
    images: HashMap<usize, Option<ImageData>>,
    materials: HashMap<usize, Material>,
}

impl<'a> Reader<'a> {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, GltfError> {
        let address = self.resolver.resolve(uri);
        self.fetcher
            .fetch(&address)
            .map_err(|source| GltfError::Fetch {
                uri: uri.to_string(),
                source,
            })
    }

    fn view_bytes(&self, view: &gltf::buffer::View<'_>) -> Option<&[u8]> {
        let end = view.offset().checked_add(view.length())?;
        self.buffers.get(view.buffer().index())?.get(view.offset()..end)
    }

    fn image(&mut self, image: gltf::Image<'_>) -> Option<ImageData> {
        let index = image.index();
        if let Some(cached) = self.images.get(&index) {
            return cached.clone();
        }
        let decoded = self.decode_image(&image).map_err(|err| {
            log::warn!("image {index} unavailable: {err}");
        });
        let decoded = decoded.ok();
        self.images.insert(index, decoded.clone());
        decoded
    }

    fn decode_image(&self, image: &gltf::Image<'_>) -> Result<ImageData, String> {
        let bytes = match image.source() {
            gltf::image::Source::Uri { uri, .. } => self.fetch(uri).map_err(|err| err.to_string())?,
            gltf::image::Source::View { view, .. } => self
                .view_bytes(&view)
                .ok_or("buffer view out of range")?
                .to_vec(),
        };
        let rgba = image::load_from_memory(&bytes)
            .map_err(|err| err.to_string())?
            .to_rgba8();
        Ok(ImageData {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    fn material(&mut self, index: usize, def: gltf::Material<'_>) -> Material {
        if let Some(material) = self.materials.get(&index) {
            return material.clone();
        }
        let mut material = Material::new(
            def.name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material_{index}")),
        );
        let pbr = def.pbr_metallic_roughness();
        material.base_color = pbr.base_color_factor();
        let refs = [
            (TextureKind::BaseColor, pbr.base_color_texture().map(|info| info.texture())),
            (
                TextureKind::MetallicRoughness,
                pbr.metallic_roughness_texture().map(|info| info.texture()),
            ),
            (TextureKind::Normal, def.normal_texture().map(|info| info.texture())),
            (TextureKind::Occlusion, def.occlusion_texture().map(|info| info.texture())),
            (TextureKind::Emissive, def.emissive_texture().map(|info| info.texture())),
        ];
        for (kind, texture) in refs {
            let Some(texture) = texture else { continue };
            material.textures.push(TextureSlot {
                kind,
                image: self.image(texture.source()),
                color_space: Default::default(),
            });
        }
        self.materials.insert(index, material.clone());
        material
    }

    fn primitive_mesh(
        &mut self,
        mesh_index: usize,
        primitive: &gltf::Primitive<'_>,
    ) -> Result<Option<Mesh>, GltfError> {
        if primitive.mode() != Mode::Triangles {
            log::warn!("mesh {mesh_index}: skipping non-triangle primitive");
            return Ok(None);
        }
        let Some(position) = primitive.get(&Semantic::Positions) else {
            log::warn!("mesh {mesh_index}: skipping primitive without POSITION");
            return Ok(None);
        };
        if position.data_type() != DataType::F32 || position.dimensions() != Dimensions::Vec3 {
            return Err(GltfError::Accessor {
                index: position.index(),
                reason: "POSITION must be a float VEC3",
            });
        }
        if let Some(indices) = primitive.indices() {
            let integral = matches!(indices.data_type(), DataType::U8 | DataType::U16 | DataType::U32);
            if !integral || indices.dimensions() != Dimensions::Scalar {
                return Err(GltfError::Accessor {
                    index: indices.index(),
                    reason: "indices must be unsigned integer scalars",
                });
            }
        }

        let buffers = &self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or(GltfError::Accessor {
                index: position.index(),
                reason: "sparse or empty accessors are not supported",
            })?
            .map(Vec3::from_array)
            .collect();
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        if indices.iter().any(|&i| i as usize >= positions.len()) {
            return Err(GltfError::Accessor {
                index: position.index(),
                reason: "index refers past the last vertex",
            });
        }

        let mut mesh = Mesh::new(positions, indices);
        let material = primitive.material();
        if let Some(index) = material.index() {
            mesh = mesh.with_material(self.material(index, material));
        }
        Ok(Some(mesh))
    }

    fn node(&mut self, node: gltf::Node<'_>, path: &mut Vec<usize>) -> Result<Subtree, GltfError> {
        let index = node.index();
        if path.contains(&index) {
            return Err(GltfError::NodeCycle(index));
        }
        let mut subtree = Subtree::group(
            node.name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("node_{index}")),
        );
        subtree.transform = node_transform(&node);

        if let Some(mesh_def) = node.mesh() {
            let mut meshes = Vec::new();
            for primitive in mesh_def.primitives() {
                if let Some(mesh) = self.primitive_mesh(mesh_def.index(), &primitive)? {
                    meshes.push(mesh);
                }
            }
            if meshes.len() == 1 {
                subtree.kind = NodeKind::Drawable(meshes.remove(0));
            } else {
                let base = mesh_def
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("mesh_{}", mesh_def.index()));
                for (i, mesh) in meshes.into_iter().enumerate() {
                    subtree.children.push(Subtree::drawable(format!("{base}_{i}"), mesh));
                }
            }
        } else if node.camera().is_some() {
            subtree.kind = NodeKind::Camera;
        }

        path.push(index);
        for child in node.children() {
            subtree.children.push(self.node(child, path)?);
        }
        path.pop();
        Ok(subtree)
    }
}

fn node_transform(node: &gltf::Node<'_>) -> Transform {
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            Transform::from_matrix(&Mat4::from_cols_array_2d(&matrix))
        }
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => {
            let mut transform = Transform {
                position: Vec3::from_array(translation),
                scale: Vec3::from_array(scale),
                ..Transform::IDENTITY
            };
            transform.set_quat(Quat::from_array(rotation));
            transform
        }
    }
}

/// Deserialize a model from its bytes. References are routed through
/// `resolver` and read with `fetcher`.
pub fn parse(bytes: &[u8], resolver: &UriResolver, fetcher: &Fetcher) -> Result<Subtree, GltfError> {
    let Gltf { document, mut blob } = Gltf::from_slice(bytes)?;

    let mut reader = Reader {
        buffers: Vec::with_capacity(document.buffers().len()),
        resolver,
        fetcher,
        images: HashMap::new(),
        materials: HashMap::new(),
    };
    for buffer in document.buffers() {
        let bytes = match buffer.source() {
            gltf::buffer::Source::Uri(uri) => reader.fetch(uri)?,
            gltf::buffer::Source::Bin => blob.take().ok_or(GltfError::MissingIndex {
                kind: "binary chunk for buffer",
                index: buffer.index(),
            })?,
        };
        if bytes.len() < buffer.length() {
            return Err(GltfError::MissingIndex {
                kind: "full byte length of buffer",
                index: buffer.index(),
            });
        }
        reader.buffers.push(bytes);
    }
    check_ranges(&document, &reader.buffers)?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(GltfError::NoScene)?;
    let scene_count = document.scenes().len();
    if scene_count > 1 {
        log::info!("document has {scene_count} scenes, using scene {}", scene.index());
    }
    let mut root = Subtree::group(scene.name().unwrap_or("scene"));
    let mut path = Vec::new();
    for node in scene.nodes() {
        root.children.push(reader.node(node, &mut path)?);
    }
    Ok(root)
}

/// Fetch a model from `address` and deserialize it.
pub fn load(address: &str, resolver: &UriResolver, fetcher: &Fetcher) -> Result<Subtree, GltfError> {
    let bytes = fetcher.fetch(address).map_err(|source| GltfError::Fetch {
        uri: address.to_string(),
        source,
    })?;
    parse(&bytes, resolver, fetcher)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const COMPONENT_U16: u32 = 5123;
    const COMPONENT_F32: u32 = 5126;

    /// One triangle in a separate `.bin`, placed by a translated node.
    pub(crate) fn triangle_package(bin_uri: &str) -> (String, Vec<u8>) {
        let mut bin = Vec::new();
        for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        for index in [0u16, 1, 2] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "tri", "mesh": 0, "translation": [0.0, 2.0, 0.0] }],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
            "accessors": [
                {
                    "bufferView": 0, "componentType": COMPONENT_F32, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
                },
                { "bufferView": 1, "componentType": COMPONENT_U16, "count": 3, "type": "SCALAR" }
            ],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
            ],
            "buffers": [{ "uri": bin_uri, "byteLength": bin.len() }]
        });
        (json.to_string(), bin)
    }

    /// [`triangle_package`] with the index view moved to `byte_offset`.
    pub(crate) fn shifted_index_view(bin_uri: &str, byte_offset: u64) -> (String, Vec<u8>) {
        let (json, bin) = triangle_package(bin_uri);
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["bufferViews"][1]["byteOffset"] = serde_json::json!(byte_offset);
        (value.to_string(), bin)
    }

    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::new();
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    fn only_mesh(root: &Subtree) -> &Mesh {
        root.children[0].kind.mesh().expect("node carries the triangle")
    }

    #[test]
    fn resolves_companion_buffer_through_store() {
        let store = ResourceStore::new();
        let fetcher = Fetcher::new(store.clone());
        let (json, bin) = triangle_package("scene.bin");
        let handle = store.register(bin);
        let mut resolver = UriResolver::new();
        resolver.insert("scene.bin", handle.address());

        let root = parse(json.as_bytes(), &resolver, &fetcher).unwrap();
        assert_eq!(root.children[0].name, "tri");
        assert_eq!(root.children[0].transform.position, Vec3::new(0.0, 2.0, 0.0));
        let mesh = only_mesh(&root);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.positions[1], Vec3::X);
    }

    #[test]
    fn unresolved_companion_is_a_fetch_error() {
        let fetcher = Fetcher::default();
        let (json, _) = triangle_package("missing-dir/scene.bin");
        let err = parse(json.as_bytes(), &UriResolver::new(), &fetcher).unwrap_err();
        assert!(matches!(err, GltfError::Fetch { ref uri, .. } if uri == "missing-dir/scene.bin"));
    }

    #[test]
    fn embedded_data_uri_buffer() {
        let (_, bin) = triangle_package("unused");
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bin)
        );
        let (json, _) = triangle_package(&uri);
        let root = parse(json.as_bytes(), &UriResolver::new(), &Fetcher::default()).unwrap();
        assert_eq!(only_mesh(&root).triangle_count(), 1);
    }

    #[test]
    fn binary_container_uses_bin_chunk() {
        let (json, bin) = triangle_package("unused");
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["buffers"][0]
            .as_object_mut()
            .unwrap()
            .remove("uri");
        let bytes = glb(&value.to_string(), &bin);
        let root = parse(&bytes, &UriResolver::new(), &Fetcher::default()).unwrap();
        assert_eq!(only_mesh(&root).positions.len(), 3);
    }

    #[test]
    fn overflowing_view_offset_is_rejected() {
        let (json, bin) = shifted_index_view("data.bin", u64::MAX);
        let store = ResourceStore::new();
        let handle = store.register(bin);
        let mut resolver = UriResolver::new();
        resolver.insert("data.bin", handle.address());

        let err = parse(json.as_bytes(), &resolver, &Fetcher::new(store.clone())).unwrap_err();
        assert!(!matches!(err, GltfError::Panicked(_)), "{err}");
    }

    #[test]
    fn view_past_buffer_end_is_rejected() {
        let (json, bin) = shifted_index_view("data.bin", 40);
        let store = ResourceStore::new();
        let handle = store.register(bin);
        let mut resolver = UriResolver::new();
        resolver.insert("data.bin", handle.address());

        let err = parse(json.as_bytes(), &resolver, &Fetcher::new(store.clone())).unwrap_err();
        assert!(matches!(err, GltfError::MissingIndex { index: 1, .. }), "{err}");
    }

    #[test]
    fn document_without_scenes_is_reported() {
        let json = r#"{ "asset": { "version": "2.0" }, "nodes": [] }"#;
        let err = parse(json.as_bytes(), &UriResolver::new(), &Fetcher::default()).unwrap_err();
        assert!(matches!(err, GltfError::NoScene));
    }

    #[test]
    fn garbage_is_a_document_error() {
        let err = parse(b"not a model", &UriResolver::new(), &Fetcher::default()).unwrap_err();
        assert!(matches!(err, GltfError::Document(_)));
    }

    #[test]
    fn node_cycles_are_rejected() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "children": [1] }, { "children": [2] }, { "children": [1] }]
        }"#;
        let err = parse(json.as_bytes(), &UriResolver::new(), &Fetcher::default()).unwrap_err();
        assert!(matches!(err, GltfError::NodeCycle(1)));
    }

    #[test]
    fn matrix_nodes_decompose() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "matrix": [2,0,0,0, 0,2,0,0, 0,0,2,0, 1,2,3,1] }]
        }"#;
        let root = parse(json.as_bytes(), &UriResolver::new(), &Fetcher::default()).unwrap();
        let transform = root.children[0].transform;
        assert!((transform.position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert!((transform.scale - Vec3::splat(2.0)).length() < 1e-5);
    }

    #[test]
    fn camera_nodes_are_kept_as_cameras() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "cameras": [{ "type": "perspective", "perspective": { "yfov": 1.0, "znear": 0.1 } }],
            "nodes": [{ "name": "shot", "camera": 0 }]
        }"#;
        let root = parse(json.as_bytes(), &UriResolver::new(), &Fetcher::default()).unwrap();
        assert!(matches!(root.children[0].kind, NodeKind::Camera));
    }

    #[test]
    fn percent_encoded_data_uri() {
        assert_eq!(decode_data_uri(",a%20b").unwrap(), b"a b");
        assert!(matches!(decode_data_uri("no-comma"), Err(FetchError::DataUri)));
    }
}
