// src/instancing/merge.rs
//! CPU mesh merging: bake transforms into vertex data and concatenate meshes
//! into one static buffer. Positions, normals and UVs are carried; every input
//! must expose the same attribute set as the first one.

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology, VertexAttributeValues};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MergeError {
    #[error("nothing to merge")]
    Empty,
    #[error("geometry {index} has no {attribute} attribute in Float32 format")]
    MissingAttribute { index: usize, attribute: &'static str },
    #[error("geometry {index} does not match the indexing of the first geometry")]
    MixedIndexing { index: usize },
    #[error("geometry {index} uses a different primitive topology")]
    TopologyMismatch { index: usize },
}

/// Which optional attributes the output carries. Fixed by the first input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Layout {
    topology: PrimitiveTopology,
    normals: bool,
    uvs: bool,
    indexed: bool,
}

impl Layout {
    fn of(mesh: &Mesh) -> Self {
        Self {
            topology: mesh.primitive_topology(),
            normals: float3(mesh, Mesh::ATTRIBUTE_NORMAL).is_some(),
            uvs: float2(mesh, Mesh::ATTRIBUTE_UV_0).is_some(),
            indexed: mesh.indices().is_some(),
        }
    }
}

fn float3(mesh: &Mesh, attr: bevy::render::mesh::MeshVertexAttribute) -> Option<&Vec<[f32; 3]>> {
    match mesh.attribute(attr)? {
        VertexAttributeValues::Float32x3(v) => Some(v),
        _ => None,
    }
}

fn float2(mesh: &Mesh, attr: bevy::render::mesh::MeshVertexAttribute) -> Option<&Vec<[f32; 2]>> {
    match mesh.attribute(attr)? {
        VertexAttributeValues::Float32x2(v) => Some(v),
        _ => None,
    }
}

/// Streaming accumulator: every `push_transformed` appends a transformed copy
/// of its source without materialising the copy as its own `Mesh`.
pub struct MeshMerger {
    layout: Layout,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
    pushed: usize,
}

impl MeshMerger {
    /// Output layout follows `first`, which is not appended.
    pub fn with_capacity(first: &Mesh, vertices: usize, indices: usize) -> Self {
        let layout = Layout::of(first);
        Self {
            layout,
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(if layout.normals { vertices } else { 0 }),
            uvs: Vec::with_capacity(if layout.uvs { vertices } else { 0 }),
            indices: Vec::with_capacity(if layout.indexed { indices } else { 0 }),
            pushed: 0,
        }
    }

    /// Append `mesh` with `transform` baked into positions and normals.
    /// Indices are rebased onto the shared buffer.
    pub fn push_transformed(&mut self, mesh: &Mesh, transform: &Transform) -> Result<(), MergeError> {
        let index = self.pushed;
        if mesh.primitive_topology() != self.layout.topology {
            return Err(MergeError::TopologyMismatch { index });
        }
        let positions = float3(mesh, Mesh::ATTRIBUTE_POSITION)
            .ok_or(MergeError::MissingAttribute { index, attribute: "position" })?;
        let normals = if self.layout.normals {
            Some(float3(mesh, Mesh::ATTRIBUTE_NORMAL)
                .ok_or(MergeError::MissingAttribute { index, attribute: "normal" })?)
        } else {
            None
        };
        let uvs = if self.layout.uvs {
            Some(float2(mesh, Mesh::ATTRIBUTE_UV_0)
                .ok_or(MergeError::MissingAttribute { index, attribute: "uv" })?)
        } else {
            None
        };
        let src_indices = match (self.layout.indexed, mesh.indices()) {
            (true, Some(ix)) => Some(ix),
            (false, None) => None,
            _ => return Err(MergeError::MixedIndexing { index }),
        };

        let base = self.positions.len() as u32;
        let trs = Mat4::from_scale_rotation_translation(transform.scale, transform.rotation, transform.translation);
        let normal_matrix = Mat3::from_mat4(trs).inverse().transpose();
        self.positions
            .extend(positions.iter().map(|p| trs.transform_point3(Vec3::from_array(*p)).to_array()));
        if let Some(ns) = normals {
            self.normals.extend(
                ns.iter()
                    .map(|n| (normal_matrix * Vec3::from_array(*n)).normalize_or_zero().to_array()),
            );
        }
        if let Some(uv) = uvs {
            self.uvs.extend_from_slice(uv);
        }
        if let Some(ix) = src_indices {
            self.indices.extend(ix.iter().map(|i| i as u32 + base));
        }

        self.pushed += 1;
        Ok(())
    }

    pub fn finish(self) -> Mesh {
        let mut mesh = Mesh::new(self.layout.topology, Default::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions);
        if self.layout.normals {
            mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals);
        }
        if self.layout.uvs {
            mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs);
        }
        if self.layout.indexed {
            mesh.insert_indices(Indices::U32(self.indices));
        }
        mesh
    }
}
