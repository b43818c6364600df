//! CPU-side data shared with the shaders: vertex layout, the grid uniform,
//! the clear color, and the WGSL source for each stage.

use bytemuck::{Pod, Zeroable};

use crate::config::Stage;
use crate::util::Color;

pub const CLEAR_COLOR: Color = Color::rgb(0.0, 0.0, 0.4);

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
}

const fn vertex(x: f32, y: f32) -> Vertex {
    Vertex { position: [x, y] }
}

/// Two triangles covering `[-0.8, 0.8]²`
pub const SQUARE_VERTICES: [Vertex; 6] = [
    vertex(-0.8, -0.8),
    vertex(0.8, -0.8),
    vertex(0.8, 0.8),
    vertex(-0.8, -0.8),
    vertex(0.8, 0.8),
    vertex(-0.8, 0.8),
];

pub const VERTEX_COUNT: u32 = SQUARE_VERTICES.len() as u32;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

pub const VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &VERTEX_ATTRIBUTES,
};

/// Grid dimensions as seen by the shader (`var<uniform> grid: vec2f`)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GridUniform {
    pub size: [f32; 2],
}

impl GridUniform {
    pub fn square(grid_size: u32) -> Self {
        Self {
            size: [grid_size as f32, grid_size as f32],
        }
    }
}

pub const VERTEX_ENTRY: &str = "vertexMain";
pub const FRAGMENT_ENTRY: &str = "fragmentMain";

/// WGSL source for the stage, `None` when the stage draws nothing
pub fn shader_source(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Clear => None,
        Stage::Square => Some(include_str!("./square.wgsl")),
        Stage::Grid => Some(include_str!("./grid.wgsl")),
        Stage::Cells => Some(include_str!("./cells.wgsl")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_has_six_points_in_bounds() {
        assert_eq!(SQUARE_VERTICES.len(), 6);
        for v in SQUARE_VERTICES {
            for c in v.position {
                assert!((-0.8..=0.8).contains(&c));
            }
        }
        let bytes: &[u8] = bytemuck::cast_slice(&SQUARE_VERTICES);
        assert_eq!(bytes.len(), 6 * 2 * 4);
    }

    fn signed_area(t: &[Vertex]) -> f32 {
        let [a, b, c] = [t[0].position, t[1].position, t[2].position];
        ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])) / 2.0
    }

    #[test]
    fn triangles_cover_the_square() {
        let (first, second) = SQUARE_VERTICES.split_at(3);
        let total = signed_area(first).abs() + signed_area(second).abs();
        assert!((total - 1.6 * 1.6).abs() < 1e-5);
        // both wind the same way and share the diagonal
        assert!(signed_area(first) > 0.0 && signed_area(second) > 0.0);
        assert_eq!(first[0], second[0]);
        assert_eq!(first[2], second[1]);
    }

    #[test]
    fn layout_matches_vertex() {
        assert_eq!(VERTEX_LAYOUT.array_stride, 8);
        assert_eq!(VERTEX_LAYOUT.attributes.len(), 1);
        assert_eq!(VERTEX_LAYOUT.attributes[0].shader_location, 0);
        assert_eq!(
            VERTEX_LAYOUT.attributes[0].format,
            wgpu::VertexFormat::Float32x2
        );
    }

    #[test]
    fn grid_uniform_is_two_floats() {
        let uniform = GridUniform::square(32);
        assert_eq!(bytemuck::bytes_of(&uniform).len(), 8);
        assert_eq!(uniform.size, [32.0, 32.0]);
    }

    #[test]
    fn shaders_expose_entry_points() {
        assert!(shader_source(Stage::Clear).is_none());
        for stage in [Stage::Square, Stage::Grid, Stage::Cells] {
            let src = shader_source(stage).unwrap();
            assert!(src.contains(VERTEX_ENTRY), "{stage}");
            assert!(src.contains(FRAGMENT_ENTRY), "{stage}");
        }
        assert!(shader_source(Stage::Grid).unwrap().contains("var<uniform> grid"));
        assert!(shader_source(Stage::Cells).unwrap().contains("var<storage> cellState"));
    }
}
