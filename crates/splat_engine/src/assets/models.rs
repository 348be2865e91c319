//! Built-in geometry

use super::splat_loader::GpuVec4;

/// Number of vertices in [`bounding_cube`]
pub const BOUNDING_CUBE_VERTEX_COUNT: u32 = 36;

const CUBE_FACES: [[[f32; 3]; 6]; 6] = [
    // back
    [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0]],
    // front
    [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0]],
    // bottom
    [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0]],
    // top
    [[-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]],
    // left
    [[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0]],
    // right
    [[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0], [1.0, -1.0, -1.0]],
];

/// Unit bounding cube drawn once per splat instance
///
/// Triangle list over [-1, 1]^3; winding is mixed, so draw with culling off.
pub fn bounding_cube() -> Vec<GpuVec4> {
    CUBE_FACES
        .iter()
        .flatten()
        .map(|&[x, y, z]| GpuVec4([x, y, z, 1.0]))
        .collect()
}
