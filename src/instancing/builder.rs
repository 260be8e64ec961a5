// src/instancing/builder.rs
//! Builds one render aggregate from fresh templates and sampled transforms.
//! Pure: the ECS side of a rebuild lives in `systems.rs`.
//!
//! The full-size batched-then-merged run bakes ~20M vertices and is ignored by
//! default: `cargo test max_count_batched_then_merged -- --ignored`.

use bevy::prelude::*;

use super::batched::{BatchError, BatchedMesh, GeometryId};
use super::merge::{MergeError, MeshMerger};
use super::method::Method;
use super::sampler::TransformSampler;
use super::templates::{
    build_templates, TemplateShape, INDICES_PER_TEMPLATE, TEMPLATE_COUNT, VERTICES_PER_TEMPLATE,
};

/// Upper bound of the instance-count control.
pub const MAX_INSTANCE_COUNT: usize = 200_000;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("batched container: {0}")]
    Batch(#[from] BatchError),
    #[error("mesh merge: {0}")]
    Merge(#[from] MergeError),
}

pub enum RenderAggregate {
    Batched(BatchedMesh),
    Merged { mesh: Mesh, instance_count: usize },
}

impl RenderAggregate {
    pub fn method(&self) -> Method {
        match self {
            RenderAggregate::Batched(_) => Method::Batched,
            RenderAggregate::Merged { .. } => Method::Merged,
        }
    }

    pub fn instance_count(&self) -> usize {
        match self {
            RenderAggregate::Batched(batch) => batch.instance_count(),
            RenderAggregate::Merged { instance_count, .. } => *instance_count,
        }
    }

    /// Vertices uploaded to the GPU for this aggregate.
    pub fn vertex_count(&self) -> usize {
        match self {
            RenderAggregate::Batched(batch) => batch.vertices_used(),
            RenderAggregate::Merged { mesh, .. } => mesh.count_vertices(),
        }
    }
}

pub fn build_aggregate(
    method: Method,
    count: usize,
    sampler: &mut TransformSampler,
) -> Result<RenderAggregate, BuildError> {
    let templates = build_templates();
    match method {
        Method::Batched => Ok(RenderAggregate::Batched(build_batched(&templates, count, sampler)?)),
        Method::Merged => Ok(RenderAggregate::Merged {
            mesh: build_merged(&templates, count, sampler)?,
            instance_count: count,
        }),
    }
}

/// Templates are stored once; the vertex/index budget covers them, not the instances.
/// `templates` is in `TemplateShape::ORDER`.
fn build_batched(
    templates: &[Mesh],
    count: usize,
    sampler: &mut TransformSampler,
) -> Result<BatchedMesh, BatchError> {
    let mut batch = BatchedMesh::new(
        count,
        templates.len() * VERTICES_PER_TEMPLATE,
        templates.len() * INDICES_PER_TEMPLATE,
    );
    // all instances may be anywhere, so only per-instance culling makes sense
    batch.frustum_culled = false;

    let ids: Vec<GeometryId> = templates
        .iter()
        .map(|mesh| batch.add_geometry(mesh))
        .collect::<Result<_, _>>()?;

    for i in 0..count {
        let id = batch.add_instance(ids[TemplateShape::for_instance(i).index()])?;
        batch.set_transform_at(id, sampler.sample())?;
    }
    Ok(batch)
}

/// Vertex and index totals of a merged aggregate of `count` instances.
fn merged_totals(templates: &[Mesh], count: usize) -> (usize, usize) {
    TemplateShape::ORDER.iter().fold((0, 0), |(v, ix), shape| {
        let t = &templates[shape.index()];
        // instances i with i % TEMPLATE_COUNT == shape.index()
        let n = (count + TEMPLATE_COUNT - 1 - shape.index()) / TEMPLATE_COUNT;
        (v + n * t.count_vertices(), ix + n * t.indices().map_or(0, |x| x.len()))
    })
}

fn build_merged(templates: &[Mesh], count: usize, sampler: &mut TransformSampler) -> Result<Mesh, MergeError> {
    let first = templates.first().ok_or(MergeError::Empty)?;
    let (vertices, indices) = merged_totals(templates, count);

    let mut merger = MeshMerger::with_capacity(first, vertices, indices);
    for i in 0..count {
        merger.push_transformed(&templates[TemplateShape::for_instance(i).index()], &sampler.sample())?;
    }
    Ok(merger.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instancing::batched::InstanceId;
    use crate::instancing::sampler::POSITION_EXTENT;

    fn sampler() -> TransformSampler {
        TransformSampler::new(Some(1234))
    }

    #[test]
    fn instance_count_matches_request_for_both_methods() {
        let mut s = sampler();
        for count in [1, 2, 3, 7, 100, 1_000] {
            for method in Method::ALL {
                let agg = build_aggregate(method, count, &mut s).unwrap();
                assert_eq!(agg.method(), method);
                assert_eq!(agg.instance_count(), count, "{method} x {count}");
            }
        }
    }

    #[test]
    fn batched_three_cycles_cone_box_sphere() {
        let agg = build_aggregate(Method::Batched, 3, &mut sampler()).unwrap();
        let RenderAggregate::Batched(batch) = agg else { panic!("expected batched aggregate") };
        assert_eq!(batch.instance_count(), 3);
        assert_eq!(batch.geometry_count(), 3);
        assert!(!batch.frustum_culled);

        let geoms: Vec<GeometryId> = batch.instances().map(|(_, inst)| inst.geometry).collect();
        assert_eq!(geoms, vec![GeometryId(0), GeometryId(1), GeometryId(2)]);

        for (i, shape) in TemplateShape::ORDER.iter().enumerate() {
            let range = batch.geometry_range(GeometryId(i as u32)).unwrap();
            assert_eq!(range.vertex_count, shape.mesh().count_vertices());
        }
        for id in 0..3 {
            let t = batch.transform_at(InstanceId(id)).unwrap();
            assert!(t.translation.abs().max_element() <= POSITION_EXTENT);
        }
    }

    #[test]
    fn merged_single_instance_does_not_duplicate_vertices() {
        let agg = build_aggregate(Method::Merged, 1, &mut sampler()).unwrap();
        let cone = TemplateShape::Cone.mesh();
        assert_eq!(agg.vertex_count(), cone.count_vertices());
        let RenderAggregate::Merged { mesh, .. } = agg else { panic!("expected merged aggregate") };
        assert_eq!(mesh.indices().unwrap().len(), cone.indices().unwrap().len());
    }

    #[test]
    fn merged_vertex_total_is_sum_of_cycled_templates() {
        let agg = build_aggregate(Method::Merged, 5, &mut sampler()).unwrap();
        let expected: usize = (0..5).map(|i| TemplateShape::for_instance(i).mesh().count_vertices()).sum();
        assert_eq!(agg.vertex_count(), expected);
    }

    #[test]
    fn switching_method_keeps_the_count() {
        let mut s = sampler();
        let a = build_aggregate(Method::Batched, 600, &mut s).unwrap();
        let b = build_aggregate(Method::Merged, 600, &mut s).unwrap();
        assert_eq!(a.instance_count(), b.instance_count());
    }

    #[test]
    fn max_count_fits_batched_capacity() {
        let agg = build_aggregate(Method::Batched, MAX_INSTANCE_COUNT, &mut sampler()).unwrap();
        let RenderAggregate::Batched(batch) = agg else { panic!("expected batched aggregate") };
        assert_eq!(batch.instance_count(), MAX_INSTANCE_COUNT);
        assert!(batch.vertices_used() <= batch.max_vertices());
        assert!(batch.indices_used() <= batch.max_indices());
        assert_eq!(batch.bucket_sizes().iter().sum::<usize>(), MAX_INSTANCE_COUNT);
    }

    #[test]
    fn merged_totals_match_the_materialised_mesh() {
        let templates = build_templates();
        for count in [1, 2, 3, 4, 11] {
            let agg = build_aggregate(Method::Merged, count, &mut sampler()).unwrap();
            let RenderAggregate::Merged { mesh, .. } = agg else { panic!("expected merged aggregate") };
            let (v, ix) = merged_totals(&templates, count);
            assert_eq!(v, mesh.count_vertices(), "count {count}");
            assert_eq!(ix, mesh.indices().unwrap().len(), "count {count}");
        }
    }

    #[test]
    fn max_count_merged_stays_within_u32_indices() {
        let templates = build_templates();
        let (v, ix) = merged_totals(&templates, MAX_INSTANCE_COUNT);
        // 200_000 = 66_667 cones + 66_667 boxes + 66_666 spheres
        let per = |s: TemplateShape| templates[s.index()].count_vertices();
        let expected = 66_667 * per(TemplateShape::Cone) + 66_667 * per(TemplateShape::Box)
            + 66_666 * per(TemplateShape::Sphere);
        assert_eq!(v, expected);
        // rebased indices are u32
        assert!(v < u32::MAX as usize);
        assert!(ix >= MAX_INSTANCE_COUNT);
    }

    #[test]
    #[ignore = "bakes ~20M vertices; run with --ignored"]
    fn max_count_batched_then_merged() {
        let mut s = sampler();
        let a = build_aggregate(Method::Batched, MAX_INSTANCE_COUNT, &mut s).unwrap();
        assert_eq!(a.instance_count(), MAX_INSTANCE_COUNT);
        drop(a);
        let b = build_aggregate(Method::Merged, MAX_INSTANCE_COUNT, &mut s).unwrap();
        assert_eq!(b.instance_count(), MAX_INSTANCE_COUNT);
    }
}
