//! Asset loading: splat point clouds and built-in geometry

pub mod models;
pub mod splat_loader;

pub use models::{bounding_cube, BOUNDING_CUBE_VERTEX_COUNT};
pub use splat_loader::{
    GaussianSurface, GpuVec4, PlyHeader, SplatCloud, SplatLoadError, SplatLoader,
};
