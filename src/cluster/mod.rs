//! Frustum-aligned clustering of selected capsules.
//!
//! A frame runs [`grid::ClusterGrid::new`] for the camera, resets and fills
//! the [`lists::ClusterLists`] with [`builder::build`], then compacts them
//! with [`merge::MergedClusters::merge`].

pub mod builder;
pub mod compute;
pub mod grid;
pub mod lists;
pub mod merge;
pub mod raster;

pub use builder::{build, BuildReport, BuildSettings, ClusterAssigner, ClusteringMethod};
pub use compute::RangeTest;
pub use grid::{ClusterGrid, ClusterGridUniform};
pub use lists::ClusterLists;
pub use merge::{ClusterCell, MergedClusters};
pub use raster::Rasterizer;
