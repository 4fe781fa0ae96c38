//! GPU mirror of a frame's occlusion data.
//!
//! Bindings, all visible to the fragment stage:
//!
//! | binding | contents                          | type            |
//! |---------|-----------------------------------|-----------------|
//! | 0       | [`OcclusionUniform`]              | uniform         |
//! | 1       | `params1`: `(point1, radius)`     | storage, `vec4` |
//! | 2       | `params2`: `(point2, influence)`  | storage, `vec4` |
//! | 3       | merged cells `(offset, count)`    | storage         |
//! | 4       | flat capsule indices              | storage, `u32`  |

use glam::Vec4;
use wgpu::util::DeviceExt;

use super::dynamic_buffer::DynamicBuffer;
use crate::cluster::{ClusterCell, ClusterGridUniform};
use crate::options::Options;
use crate::pipeline::FrameOutput;
use crate::select::CAPSULE_CAPACITY;

/// Per-frame constants for the shading pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OcclusionUniform {
    /// Cell mapping parameters.
    pub grid: ClusterGridUniform,
    /// Selected capsules.
    pub capsule_count: u32,
    /// Effect strength.
    pub intensity: f32,
    /// 1 to shade by cell occupancy instead of occlusion.
    pub debug_clusters: u32,
    /// 1 to draw the selected capsules over the scene.
    pub show_capsules: u32,
}

impl OcclusionUniform {
    /// Uniform for a frame's output under `options`.
    #[must_use]
    pub fn from_frame(output: &FrameOutput, options: &Options) -> Self {
        let options = options.clamped();
        Self {
            grid: output
                .grid()
                .map_or_else(bytemuck::Zeroable::zeroed, |grid| grid.uniform()),
            capsule_count: output.selection().count() as u32,
            intensity: options.effect.intensity,
            debug_clusters: u32::from(options.debug.debug_clusters),
            show_capsules: u32::from(options.debug.show_capsules),
        }
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// wgpu buffers holding the selected capsules and merged clusters.
#[derive(Debug)]
pub struct ClusterGpuBuffers {
    uniform: wgpu::Buffer,
    params1: DynamicBuffer<Vec4>,
    params2: DynamicBuffer<Vec4>,
    cells: DynamicBuffer<ClusterCell>,
    indices: DynamicBuffer<u32>,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl ClusterGpuBuffers {
    /// Allocate buffers sized for the capsule capacity and `cell_count`
    /// cells.
    #[must_use]
    pub fn new(device: &wgpu::Device, cell_count: usize) -> Self {
        let storage = wgpu::BufferUsages::STORAGE;
        let uniform =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Occlusion Uniform"),
                contents: bytemuck::bytes_of(
                    &<OcclusionUniform as bytemuck::Zeroable>::zeroed(),
                ),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            });
        let params1 = DynamicBuffer::with_capacity(
            device,
            "Occlusion Capsule Params1",
            CAPSULE_CAPACITY,
            storage,
        );
        let params2 = DynamicBuffer::with_capacity(
            device,
            "Occlusion Capsule Params2",
            CAPSULE_CAPACITY,
            storage,
        );
        let cells = DynamicBuffer::with_capacity(
            device,
            "Occlusion Cluster Cells",
            cell_count,
            storage,
        );
        let indices = DynamicBuffer::with_capacity(
            device,
            "Occlusion Cluster Indices",
            cell_count,
            storage,
        );

        let layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Occlusion Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage_entry(1),
                    storage_entry(2),
                    storage_entry(3),
                    storage_entry(4),
                ],
            });
        let bind_group = Self::create_bind_group(
            device, &layout, &uniform, &params1, &params2, &cells, &indices,
        );

        Self {
            uniform,
            params1,
            params2,
            cells,
            indices,
            layout,
            bind_group,
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform: &wgpu::Buffer,
        params1: &DynamicBuffer<Vec4>,
        params2: &DynamicBuffer<Vec4>,
        cells: &DynamicBuffer<ClusterCell>,
        indices: &DynamicBuffer<u32>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Occlusion Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params1.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params2.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: cells.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: indices.buffer().as_entire_binding(),
                },
            ],
        })
    }

    /// Upload a frame's output.
    ///
    /// Returns `true` if any buffer was reallocated; the bind group has then
    /// been rebuilt and must be re-fetched with [`Self::bind_group`].
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &FrameOutput,
        options: &Options,
    ) -> bool {
        queue.write_buffer(
            &self.uniform,
            0,
            bytemuck::bytes_of(&OcclusionUniform::from_frame(output, options)),
        );

        let selection = output.selection();
        let clusters = output.clusters();
        let mut reallocated = false;
        reallocated |= self.params1.write(device, queue, &selection.params1);
        reallocated |= self.params2.write(device, queue, &selection.params2);
        reallocated |= self.cells.write(device, queue, clusters.cells());
        reallocated |= self.indices.write(device, queue, clusters.indices());

        if reallocated {
            self.bind_group = Self::create_bind_group(
                device,
                &self.layout,
                &self.uniform,
                &self.params1,
                &self.params2,
                &self.cells,
                &self.indices,
            );
        }
        reallocated
    }

    /// Layout of [`Self::bind_group`].
    #[must_use]
    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    /// Bind group over all occlusion buffers.
    #[must_use]
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Capsules uploaded by the last frame.
    #[must_use]
    pub fn capsule_count(&self) -> usize {
        self.params1.len()
    }

    /// Cells uploaded by the last frame.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Affine3A, Vec3};

    use super::*;
    use crate::capsule::OcclusionCapsule;
    use crate::pipeline::OcclusionPipeline;
    use crate::select::test_scene::camera;

    #[test]
    fn gpu_records_have_shader_layouts() {
        assert_eq!(size_of::<ClusterGridUniform>(), 112);
        assert_eq!(size_of::<OcclusionUniform>(), 128);
        assert_eq!(size_of::<ClusterCell>(), 8);
        assert_eq!(size_of::<Vec4>(), 16);
    }

    #[test]
    fn uniform_before_first_frame_is_zeroed_grid() {
        let uniform =
            OcclusionUniform::from_frame(&FrameOutput::default(), &Options::default());
        assert_eq!(uniform.capsule_count, 0);
        assert_eq!(uniform.grid.resolution, [0, 0, 0]);
        assert_eq!(uniform.intensity, 10.0);
        assert_eq!(uniform.debug_clusters, 0);
        assert_eq!(uniform.show_capsules, 0);
    }

    #[test]
    fn uniform_reflects_frame_and_clamped_options() {
        let mut options = Options::default();
        options.clustering.resolution = [8, 8, 8];
        options.clustering.max_range = 8.0;
        options.effect.intensity = 250.0;
        options.debug.debug_clusters = true;
        options.debug.show_capsules = true;

        let mut pipeline = OcclusionPipeline::new(options.clone());
        for z in [-2.0, -3.0, -5.0] {
            let _ = pipeline.capsules_mut().insert(OcclusionCapsule::new(
                Affine3A::from_translation(Vec3::new(0.0, 0.0, z)),
                0.5,
                0.1,
            ));
        }
        let output = pipeline.begin_frame(&camera());
        let uniform = OcclusionUniform::from_frame(output, &options);

        assert_eq!(uniform.capsule_count, 3);
        assert_eq!(uniform.intensity, 100.0);
        assert_eq!(uniform.debug_clusters, 1);
        assert_eq!(uniform.show_capsules, 1);
        assert_eq!(uniform.grid.resolution, [8, 8, 8]);
        assert_eq!(uniform.grid.range, 8.0);
        assert_eq!(uniform.grid.depth_to_range, 12.5);
    }
}
