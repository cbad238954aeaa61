use glam::{Mat3, UVec2, Vec2, Vec3};

use crate::ray::Ray;

/// Pinhole camera: a pose plus intrinsics. Rays are bounded by the far
/// plane and start with an air entry on their refraction stack.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    position: Vec3,
    direction: Vec3,
    up: Vec3,
    resolution: UVec2,
    aspect: f32,
    near_plane: f32,
    far_plane: f32,
    field_of_view: f32,
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3, aspect: f32) -> Self {
        Self {
            position,
            direction,
            up: Vec3::Y,
            resolution: UVec2::new(1920, 1080),
            aspect,
            near_plane: 0.1,
            far_plane: 10.0,
            field_of_view: 90.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction;
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
    }

    /// The basis vector perpendicular to direction and up.
    pub fn right(&self) -> Vec3 {
        self.direction.normalize().cross(self.up)
    }

    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: UVec2) {
        self.resolution = resolution;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn near_plane(&self) -> f32 {
        self.near_plane
    }

    pub fn set_near_plane(&mut self, near: f32) {
        self.near_plane = near;
    }

    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    pub fn set_far_plane(&mut self, far: f32) {
        self.far_plane = far;
    }

    pub fn field_of_view(&self) -> f32 {
        self.field_of_view
    }

    pub fn set_fov_degrees(&mut self, fov: f32) {
        self.field_of_view = fov;
    }

    /// Primary ray for a pixel, jittered inside the pixel footprint.
    pub fn generate_ray(&self, jitter: Vec2, pixel: UVec2) -> Ray {
        let ndc = Vec3::new(
            ((pixel.x as f32 + jitter.x) / self.resolution.x as f32 - 0.5) * self.aspect,
            (pixel.y as f32 + jitter.y) / self.resolution.y as f32 - 0.5,
            1.0,
        );
        let direction =
            (ndc.z * self.direction + ndc.y * self.up + ndc.x * self.right()).normalize();

        Ray::new(self.position.extend(1.0), direction, self.far_plane)
    }

    pub fn move_forward(&mut self, distance: f32) {
        self.position += distance * self.direction;
    }

    pub fn move_backward(&mut self, distance: f32) {
        self.position -= distance * self.direction;
    }

    pub fn move_left(&mut self, distance: f32) {
        self.position -= distance * self.right();
    }

    pub fn move_right(&mut self, distance: f32) {
        self.position += distance * self.right();
    }

    pub fn move_up(&mut self, distance: f32) {
        self.position += distance * self.up;
    }

    pub fn move_down(&mut self, distance: f32) {
        self.position -= distance * self.up;
    }

    /// Rotate around the local right axis, carrying the up vector along.
    pub fn rotate_pitch(&mut self, degrees: f32) {
        let rotation = Mat3::from_axis_angle(self.right(), degrees.to_radians());
        self.direction = (rotation * self.direction).normalize();
        self.up = (rotation * self.up).normalize();
    }

    /// Rotate around the local up axis.
    pub fn rotate_yaw(&mut self, degrees: f32) {
        let rotation = Mat3::from_axis_angle(self.up, degrees.to_radians());
        self.direction = (rotation * self.direction).normalize();
    }

    /// Rotate around the global vertical.
    pub fn rotate_world_up(&mut self, degrees: f32) {
        let rotation = Mat3::from_axis_angle(Vec3::new(0.0, -1.0, 0.0), degrees.to_radians());
        self.direction = (rotation * self.direction).normalize();
        self.up = (rotation * self.up).normalize();
    }
}
