use glam::{Mat4, Vec3};

/// Perspective camera defined by eye position, target, and projection
/// parameters.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Eye (camera) position in world space.
    pub eye: Vec3,
    /// Look-at target position.
    pub target: Vec3,
    /// Up direction vector.
    pub up: Vec3,
    /// Viewport aspect ratio (width / height).
    pub aspect: f32,
    /// Vertical field of view in degrees.
    pub fovy: f32,
    /// Near clipping plane distance.
    pub znear: f32,
    /// Far clipping plane distance.
    pub zfar: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.6, 5.0),
            target: Vec3::new(0.0, 1.0, 0.0),
            up: Vec3::Y,
            aspect: 16.0 / 9.0,
            fovy: 60.0,
            znear: 0.1,
            zfar: 500.0,
        }
    }
}

impl Camera {
    /// Build the world-to-view matrix.
    #[must_use]
    pub fn build_view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Build the projection matrix.
    #[must_use]
    pub fn build_projection(&self) -> Mat4 {
        // perspective_rh already uses [0,1] depth range (wgpu/Vulkan
        // convention)
        Mat4::perspective_rh(
            self.fovy.to_radians(),
            self.aspect,
            self.znear,
            self.zfar,
        )
    }

    /// Snapshot the per-frame inputs the occlusion pipeline consumes.
    #[must_use]
    pub fn frame(&self) -> CameraFrame {
        CameraFrame {
            position: self.eye,
            forward: (self.target - self.eye).normalize_or(Vec3::NEG_Z),
            view: self.build_view(),
            projection: self.build_projection(),
            far: self.zfar,
        }
    }
}

/// Per-frame camera inputs handed over by the host renderer.
///
/// This is everything the selection and clustering stages read from the
/// camera; it is decoupled from [`Camera`] so hosts with their own camera
/// types can fill it directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// Camera world-space position.
    pub position: Vec3,
    /// Unit view direction in world space.
    pub forward: Vec3,
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix with a [0,1] depth range.
    pub projection: Mat4,
    /// Far clip distance.
    pub far: f32,
}

impl CameraFrame {
    /// Combined view-projection matrix.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_forward_points_at_target() {
        let camera = Camera {
            eye: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            ..Camera::default()
        };
        let frame = camera.frame();
        assert!((frame.forward - Vec3::NEG_Z).length() < 1e-6);
        assert_eq!(frame.position, camera.eye);
        assert_eq!(frame.far, camera.zfar);
    }

    #[test]
    fn degenerate_target_falls_back_to_neg_z() {
        let camera = Camera {
            eye: Vec3::ONE,
            target: Vec3::ONE,
            ..Camera::default()
        };
        assert_eq!(camera.frame().forward, Vec3::NEG_Z);
    }
}
