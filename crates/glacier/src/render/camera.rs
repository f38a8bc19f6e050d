//! Fly cameras with orthographic and perspective projections
//!
//! A [`Camera`] holds a position and a pitch/yaw orientation and produces the
//! view matrix. The projection wrappers add an aspect ratio (and a field of
//! view for [`PerspectiveCamera`]) and produce the projection matrix. Both
//! use right-handed, Y-up conventions with clip depth in `[-1, 1]`.
//!
//! Angles are in radians. Yaw 0 looks down +X; positive pitch looks up.

use nalgebra::{Matrix4, Point3, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Distance to the near clipping plane
pub const NEAR_PLANE: f32 = 0.1;

/// Distance to the far clipping plane
pub const FAR_PLANE: f32 = 100.0;

fn world_up() -> Vec3 {
    Vec3::y()
}

fn direction_from_euler(pitch: f32, yaw: f32) -> Vec3 {
    Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
}

/// Position and orientation shared by every projection
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    direction: Vec3,
    pitch: f32,
    yaw: f32,
}

impl Camera {
    /// Place a camera at `position` looking along `pitch` and `yaw`
    pub fn new(position: Vec3, pitch: f32, yaw: f32) -> Self {
        Self {
            position,
            direction: direction_from_euler(pitch, yaw),
            pitch,
            yaw,
        }
    }

    /// World-space position
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit view direction
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Pitch in radians
    pub const fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Yaw in radians
    pub const fn yaw(&self) -> f32 {
        self.yaw
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        let eye = Point3::from(self.position);
        let target = Point3::from(self.position + self.direction);
        Mat4::look_at_rh(&eye, &target, &world_up())
    }

    /// Add `pitch` and `yaw` to the current orientation
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        self.pitch += pitch;
        self.yaw += yaw;
        self.direction = direction_from_euler(self.pitch, self.yaw);
    }

    /// Move relative to the view direction
    ///
    /// `offset.x` strafes right, `offset.y` moves along world up and
    /// `offset.z` moves forward. Strafing is skipped while looking straight
    /// up or down, where "right" is undefined.
    pub fn move_local(&mut self, offset: Vec3) {
        if let Some(right) = self.direction.cross(&world_up()).try_normalize(f32::EPSILON) {
            self.position += offset.x * right;
        }
        self.position.y += offset.y;
        self.position += offset.z * self.direction;
    }
}

/// A camera with a projection
pub trait Projection {
    /// Position and orientation
    fn camera(&self) -> &Camera;

    /// Position and orientation, mutably
    fn camera_mut(&mut self) -> &mut Camera;

    /// View-to-clip transform
    fn projection_matrix(&self) -> Mat4;

    /// Width over height of the target
    fn aspect_ratio(&self) -> f32;

    /// Set width over height of the target
    fn set_aspect_ratio(&mut self, aspect_ratio: f32);

    /// World-to-clip transform
    fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.camera().view_matrix()
    }

    /// Match the aspect ratio to a drawable area
    ///
    /// Returns `false` and keeps the current ratio when either dimension is
    /// zero, as it is while the window is minimized.
    fn resize(&mut self, drawable_size: (u32, u32)) -> bool {
        let (width, height) = drawable_size;
        if width == 0 || height == 0 {
            return false;
        }
        self.set_aspect_ratio(width as f32 / height as f32);
        true
    }
}

/// Orthographic projection spanning `[-aspect, aspect]` by `[-1, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct OrthographicCamera {
    camera: Camera,
    aspect_ratio: f32,
}

impl OrthographicCamera {
    /// Create an orthographic camera
    pub fn new(position: Vec3, pitch: f32, yaw: f32, aspect_ratio: f32) -> Self {
        Self {
            camera: Camera::new(position, pitch, yaw),
            aspect_ratio,
        }
    }
}

impl Projection for OrthographicCamera {
    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::new_orthographic(
            -self.aspect_ratio,
            self.aspect_ratio,
            -1.0,
            1.0,
            NEAR_PLANE,
            FAR_PLANE,
        )
    }

    fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }
}

/// Perspective projection with a vertical field of view
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    camera: Camera,
    aspect_ratio: f32,
    fov: f32,
}

impl PerspectiveCamera {
    /// Create a perspective camera; `fov` is the vertical field of view in radians
    pub fn new(position: Vec3, pitch: f32, yaw: f32, aspect_ratio: f32, fov: f32) -> Self {
        Self {
            camera: Camera::new(position, pitch, yaw),
            aspect_ratio,
            fov,
        }
    }

    /// Vertical field of view in radians
    pub const fn fov(&self) -> f32 {
        self.fov
    }

    /// Set the vertical field of view in radians
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
    }
}

impl Projection for PerspectiveCamera {
    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::new_perspective(self.aspect_ratio, self.fov, NEAR_PLANE, FAR_PLANE)
    }

    fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if (self.aspect_ratio - aspect_ratio).abs() > 0.01 {
            log::debug!("Camera aspect ratio {:.3} -> {:.3}", self.aspect_ratio, aspect_ratio);
        }
        self.aspect_ratio = aspect_ratio;
    }
}

/// View and projection matrices laid out for a uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    /// Column-major world-to-view matrix
    pub view: [[f32; 4]; 4],
    /// Column-major view-to-clip matrix
    pub projection: [[f32; 4]; 4],
}

impl CameraUniform {
    /// Snapshot the matrices of `camera`
    pub fn from_projection<P: Projection + ?Sized>(camera: &P) -> Self {
        Self {
            view: camera.camera().view_matrix().into(),
            projection: camera.projection_matrix().into(),
        }
    }
}
