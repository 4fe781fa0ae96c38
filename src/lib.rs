// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Frustum-clustered capsule occlusion.
//!
//! Builds, once per camera per frame, a compact spatial index of occlusion
//! capsules (sphere-swept segments approximating occluders such as limbs)
//! so a shading pass can ask "which capsules can darken this point?"
//! without looping over every capsule in the scene.
//!
//! # Key entry points
//!
//! - [`pipeline::OcclusionPipeline`] - per-camera frame driver
//! - [`capsule::CapsuleSet`] - arena of active capsule instances
//! - [`select`] - frustum cull, distance sort and budgeted pick
//! - [`cluster`] - frustum-aligned grid, linked-list build and merge
//! - [`options::Options`] - runtime configuration with TOML presets
//!
//! # Architecture
//!
//! A frame runs four strictly ordered stages: selection picks at most
//! [`select::MAX_SELECTED`] capsules, the [`cluster::ClusterGrid`] is derived
//! from the camera, the builder appends capsule references into per-cell
//! lock-free linked lists, and the merger compacts those lists into a flat
//! `(offset, count)` table. The result can be mirrored to the GPU through
//! [`gpu::ClusterGpuBuffers`].

pub mod camera;
pub mod capsule;
pub mod cluster;
pub mod error;
pub mod gpu;
pub mod options;
pub mod pipeline;
pub mod select;
pub mod util;
