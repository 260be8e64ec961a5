// src/instancing/templates.rs
//! The fixed set of source shapes every aggregate is built from.

use bevy::prelude::*;

pub const TEMPLATE_COUNT: usize = 3;

/// Per-template budget used to size the batched container.
pub const VERTICES_PER_TEMPLATE: usize = 512;
pub const INDICES_PER_TEMPLATE: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TemplateShape {
    Cone,
    Box,
    Sphere,
}

impl TemplateShape {
    /// Instance `i` uses `ORDER[i % TEMPLATE_COUNT]`.
    pub const ORDER: [TemplateShape; TEMPLATE_COUNT] =
        [TemplateShape::Cone, TemplateShape::Box, TemplateShape::Sphere];

    pub fn for_instance(i: usize) -> Self {
        Self::ORDER[i % TEMPLATE_COUNT]
    }

    /// Position in `ORDER`, which is also the index into `build_templates()`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn mesh(self) -> Mesh {
        match self {
            // radius 1, height 2, default 32 radial segments
            TemplateShape::Cone => Mesh::from(Cone { radius: 1.0, height: 2.0 }),
            TemplateShape::Box => Mesh::from(Cuboid::new(2.0, 2.0, 2.0)),
            TemplateShape::Sphere => Sphere::new(1.0).mesh().uv(16, 8),
        }
    }
}

/// Fresh copies of all templates, in instance order.
pub fn build_templates() -> Vec<Mesh> {
    TemplateShape::ORDER.iter().map(|s| s.mesh()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_fit_the_per_template_budget() {
        for mesh in build_templates() {
            assert!(mesh.count_vertices() > 0);
            assert!(mesh.count_vertices() <= VERTICES_PER_TEMPLATE);
            let indices = mesh.indices().map(|ix| ix.len()).unwrap_or(0);
            assert!(indices <= INDICES_PER_TEMPLATE);
        }
    }

    #[test]
    fn instances_cycle_cone_box_sphere() {
        assert_eq!(TemplateShape::for_instance(0), TemplateShape::Cone);
        assert_eq!(TemplateShape::for_instance(1), TemplateShape::Box);
        assert_eq!(TemplateShape::for_instance(2), TemplateShape::Sphere);
        assert_eq!(TemplateShape::for_instance(3), TemplateShape::Cone);
        for (i, shape) in TemplateShape::ORDER.iter().enumerate() {
            assert_eq!(shape.index(), i);
        }
    }
}
