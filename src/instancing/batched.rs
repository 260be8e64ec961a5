// src/instancing/batched.rs
//! Batched container: a handful of geometries packed into shared vertex/index
//! buffers, plus a capacity-bounded list of instances that each reference one
//! geometry by id and carry their own transform.
//!
//! The container is plain data. The ECS side (see `systems.rs`) turns each
//! geometry into one mesh asset and each instance into a slot entity so Bevy
//! batches every geometry bucket into a single draw.

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology, VertexAttributeValues};

/// Stable handle for a geometry registered with `add_geometry`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

/// Stable handle for an instance registered with `add_instance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BatchError {
    #[error("geometry needs {requested} vertices, only {available} left")]
    VertexCapacity { requested: usize, available: usize },
    #[error("geometry needs {requested} indices, only {available} left")]
    IndexCapacity { requested: usize, available: usize },
    #[error("instance capacity of {max} reached")]
    InstanceCapacity { max: usize },
    #[error("geometry is missing the {0} attribute (Float32 layout required)")]
    MissingAttribute(&'static str),
    #[error("unknown geometry {0:?}")]
    UnknownGeometry(GeometryId),
    #[error("unknown instance {0:?}")]
    UnknownInstance(InstanceId),
}

/// Where one geometry lives inside the packed buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryRange {
    pub vertex_start: usize,
    pub vertex_count: usize,
    pub index_start: usize,
    pub index_count: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct BatchedInstance {
    pub geometry: GeometryId,
    pub transform: Transform,
}

#[derive(Component, Clone, Debug)]
pub struct BatchedMesh {
    max_instances: usize,
    max_vertices: usize,
    max_indices: usize,

    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,

    geometries: Vec<GeometryRange>,
    instances: Vec<BatchedInstance>,

    /// Draw instances front-to-back within each geometry bucket.
    pub sort_objects: bool,
    /// Cull each instance against the view frustum on its own.
    pub per_object_frustum_culled: bool,
    /// Cull the container as a whole. Instances move independently, so a
    /// single bounding test over the container is not meaningful; when off,
    /// the aggregate root is tagged `NoFrustumCulling`.
    pub frustum_culled: bool,
}

impl BatchedMesh {
    pub fn new(max_instances: usize, max_vertices: usize, max_indices: usize) -> Self {
        Self {
            max_instances,
            max_vertices,
            max_indices,
            positions: Vec::with_capacity(max_vertices),
            normals: Vec::with_capacity(max_vertices),
            uvs: Vec::with_capacity(max_vertices),
            indices: Vec::with_capacity(max_indices),
            geometries: Vec::new(),
            instances: Vec::with_capacity(max_instances),
            sort_objects: true,
            per_object_frustum_culled: true,
            frustum_culled: true,
        }
    }

    pub fn max_vertices(&self) -> usize { self.max_vertices }
    pub fn max_indices(&self) -> usize { self.max_indices }
    pub fn vertices_used(&self) -> usize { self.positions.len() }
    pub fn indices_used(&self) -> usize { self.indices.len() }
    pub fn geometry_count(&self) -> usize { self.geometries.len() }
    pub fn instance_count(&self) -> usize { self.instances.len() }

    pub fn geometry_range(&self, id: GeometryId) -> Option<GeometryRange> {
        self.geometries.get(id.0 as usize).copied()
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &BatchedInstance)> {
        self.instances.iter().enumerate().map(|(i, inst)| (InstanceId(i as u32), inst))
    }

    /// Pack `mesh` into the shared buffers. Non-indexed meshes get a
    /// sequential index list.
    pub fn add_geometry(&mut self, mesh: &Mesh) -> Result<GeometryId, BatchError> {
        let positions = match mesh.attribute(Mesh::ATTRIBUTE_POSITION) {
            Some(VertexAttributeValues::Float32x3(v)) => v,
            _ => return Err(BatchError::MissingAttribute("position")),
        };
        let normals = match mesh.attribute(Mesh::ATTRIBUTE_NORMAL) {
            Some(VertexAttributeValues::Float32x3(v)) => v,
            _ => return Err(BatchError::MissingAttribute("normal")),
        };
        let uvs = match mesh.attribute(Mesh::ATTRIBUTE_UV_0) {
            Some(VertexAttributeValues::Float32x2(v)) => v,
            _ => return Err(BatchError::MissingAttribute("uv")),
        };
        let local_indices: Vec<u32> = match mesh.indices() {
            Some(ix) => ix.iter().map(|i| i as u32).collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let free_vertices = self.max_vertices - self.positions.len();
        if positions.len() > free_vertices {
            return Err(BatchError::VertexCapacity { requested: positions.len(), available: free_vertices });
        }
        let free_indices = self.max_indices - self.indices.len();
        if local_indices.len() > free_indices {
            return Err(BatchError::IndexCapacity { requested: local_indices.len(), available: free_indices });
        }

        let range = GeometryRange {
            vertex_start: self.positions.len(),
            vertex_count: positions.len(),
            index_start: self.indices.len(),
            index_count: local_indices.len(),
        };
        let base = range.vertex_start as u32;
        self.positions.extend_from_slice(positions);
        self.normals.extend_from_slice(normals);
        self.uvs.extend_from_slice(uvs);
        self.indices.extend(local_indices.into_iter().map(|i| i + base));

        let id = GeometryId(self.geometries.len() as u32);
        self.geometries.push(range);
        Ok(id)
    }

    /// New instance of `geometry` at the identity transform.
    pub fn add_instance(&mut self, geometry: GeometryId) -> Result<InstanceId, BatchError> {
        if self.geometry_range(geometry).is_none() {
            return Err(BatchError::UnknownGeometry(geometry));
        }
        if self.instances.len() >= self.max_instances {
            return Err(BatchError::InstanceCapacity { max: self.max_instances });
        }
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(BatchedInstance { geometry, transform: Transform::IDENTITY });
        Ok(id)
    }

    pub fn set_transform_at(&mut self, id: InstanceId, transform: Transform) -> Result<(), BatchError> {
        let inst = self.instances.get_mut(id.0 as usize).ok_or(BatchError::UnknownInstance(id))?;
        inst.transform = transform;
        Ok(())
    }

    pub fn transform_at(&self, id: InstanceId) -> Option<Transform> {
        self.instances.get(id.0 as usize).map(|inst| inst.transform)
    }

    /// One registered geometry as a standalone mesh, indices rebased to zero.
    pub fn geometry_mesh(&self, id: GeometryId) -> Result<Mesh, BatchError> {
        let r = self.geometry_range(id).ok_or(BatchError::UnknownGeometry(id))?;
        let verts = r.vertex_start..r.vertex_start + r.vertex_count;
        let base = r.vertex_start as u32;
        let indices: Vec<u32> = self.indices[r.index_start..r.index_start + r.index_count]
            .iter()
            .map(|&i| i - base)
            .collect();

        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, Default::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions[verts.clone()].to_vec());
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals[verts.clone()].to_vec());
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs[verts].to_vec());
        mesh.insert_indices(Indices::U32(indices));
        Ok(mesh)
    }

    /// Instance ids grouped by geometry (outer index = `GeometryId.0`).
    /// With `sort_objects` and a camera position, each bucket is ordered
    /// front-to-back; otherwise insertion order is kept.
    pub fn draw_order(&self, camera: Option<Vec3>) -> Vec<Vec<InstanceId>> {
        let mut buckets: Vec<Vec<InstanceId>> = vec![Vec::new(); self.geometries.len()];
        for (id, inst) in self.instances() {
            buckets[inst.geometry.0 as usize].push(id);
        }
        if let (true, Some(eye)) = (self.sort_objects, camera) {
            for bucket in &mut buckets {
                bucket.sort_by(|a, b| {
                    let da = self.instances[a.0 as usize].transform.translation.distance_squared(eye);
                    let db = self.instances[b.0 as usize].transform.translation.distance_squared(eye);
                    da.total_cmp(&db)
                });
            }
        }
        buckets
    }

    /// Instances per geometry, in `GeometryId` order.
    pub fn bucket_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.geometries.len()];
        for inst in &self.instances {
            sizes[inst.geometry.0 as usize] += 1;
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Mesh {
        Mesh::from(Cuboid::new(2.0, 2.0, 2.0))
    }

    #[test]
    fn geometry_ids_are_sequential_and_ranges_packed() {
        let mut batch = BatchedMesh::new(4, 512, 1024);
        let a = batch.add_geometry(&cube()).unwrap();
        let b = batch.add_geometry(&cube()).unwrap();
        assert_eq!((a, b), (GeometryId(0), GeometryId(1)));

        let ra = batch.geometry_range(a).unwrap();
        let rb = batch.geometry_range(b).unwrap();
        assert_eq!(rb.vertex_start, ra.vertex_count);
        assert_eq!(rb.index_start, ra.index_count);
        assert_eq!(batch.vertices_used(), ra.vertex_count * 2);
    }

    #[test]
    fn vertex_budget_is_enforced() {
        let mesh = cube();
        let n = mesh.count_vertices();
        let mut batch = BatchedMesh::new(1, n + 1, 1024);
        batch.add_geometry(&mesh).unwrap();
        assert_eq!(
            batch.add_geometry(&mesh).unwrap_err(),
            BatchError::VertexCapacity { requested: n, available: 1 }
        );
        assert_eq!(batch.geometry_count(), 1);
    }

    #[test]
    fn index_budget_is_enforced() {
        let mut batch = BatchedMesh::new(1, 512, 3);
        assert!(matches!(batch.add_geometry(&cube()), Err(BatchError::IndexCapacity { available: 3, .. })));
        assert_eq!(batch.vertices_used(), 0);
    }

    #[test]
    fn instance_budget_is_enforced() {
        let mut batch = BatchedMesh::new(2, 512, 1024);
        let g = batch.add_geometry(&cube()).unwrap();
        batch.add_instance(g).unwrap();
        batch.add_instance(g).unwrap();
        assert_eq!(batch.add_instance(g).unwrap_err(), BatchError::InstanceCapacity { max: 2 });
        assert_eq!(
            batch.add_instance(GeometryId(9)).unwrap_err(),
            BatchError::UnknownGeometry(GeometryId(9))
        );
    }

    #[test]
    fn transforms_are_per_instance() {
        let mut batch = BatchedMesh::new(2, 512, 1024);
        let g = batch.add_geometry(&cube()).unwrap();
        let a = batch.add_instance(g).unwrap();
        let b = batch.add_instance(g).unwrap();
        batch.set_transform_at(b, Transform::from_xyz(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(batch.transform_at(a), Some(Transform::IDENTITY));
        assert_eq!(batch.transform_at(b).unwrap().translation, Vec3::new(1.0, 2.0, 3.0));
        assert!(batch.set_transform_at(InstanceId(5), Transform::IDENTITY).is_err());
    }

    #[test]
    fn extracted_geometry_matches_source() {
        let sphere = Sphere::new(1.0).mesh().uv(16, 8);
        let mut batch = BatchedMesh::new(1, 1024, 2048);
        batch.add_geometry(&cube()).unwrap();
        let s = batch.add_geometry(&sphere).unwrap();
        let out = batch.geometry_mesh(s).unwrap();
        assert_eq!(out.count_vertices(), sphere.count_vertices());
        let src: Vec<usize> = sphere.indices().unwrap().iter().collect();
        let got: Vec<usize> = out.indices().unwrap().iter().collect();
        assert_eq!(src, got);
    }

    #[test]
    fn draw_order_sorts_front_to_back_only_when_enabled() {
        let mut batch = BatchedMesh::new(3, 512, 1024);
        let g = batch.add_geometry(&cube()).unwrap();
        for z in [10.0, 1.0, 5.0] {
            let id = batch.add_instance(g).unwrap();
            batch.set_transform_at(id, Transform::from_xyz(0.0, 0.0, z)).unwrap();
        }
        let eye = Some(Vec3::ZERO);
        assert_eq!(batch.draw_order(eye)[0], vec![InstanceId(1), InstanceId(2), InstanceId(0)]);

        batch.sort_objects = false;
        assert_eq!(batch.draw_order(eye)[0], vec![InstanceId(0), InstanceId(1), InstanceId(2)]);
    }
}
