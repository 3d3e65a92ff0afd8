use crate::scene::Ray;
use glam::{Mat4, Vec2, Vec3, Vec4};

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Pixel size of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_deg: 60.0,
            near: 0.1,
            far: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CameraController {
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub projection: Projection,
}

impl CameraController {
    pub fn new(position: [f32; 3], yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            projection: Projection::default(),
        }
    }

    pub fn looking_at(position: [f32; 3], target: [f32; 3]) -> Self {
        let forward = Vec3::from_array(target) - Vec3::from_array(position);
        let (yaw, pitch) = forward_to_yaw_pitch(forward);
        Self::new(position, yaw, pitch)
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn eye(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn forward(&self) -> Vec3 {
        self.basis().0
    }

    /// (forward, right, up)
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        camera_basis(self.yaw, self.pitch)
    }

    pub fn orbit_around(&mut self, pivot: Vec3, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = wrap_angle(self.yaw + yaw_delta);
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let distance = (self.eye() - pivot).length().max(0.05);
        let (dir, _, _) = self.basis();
        self.position = (pivot - dir * distance).to_array();
    }

    pub fn view_matrix(&self) -> Mat4 {
        let (forward, _, up) = self.basis();
        let eye = self.eye();
        Mat4::look_at_rh(eye, eye + forward, up)
    }

    pub fn projection_matrix(&self, viewport: Viewport) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.projection.fov_y_deg.to_radians(),
            viewport.aspect(),
            self.projection.near,
            self.projection.far,
        )
    }

    pub fn view_projection(&self, viewport: Viewport) -> Mat4 {
        self.projection_matrix(viewport) * self.view_matrix()
    }

    /// World-space ray through a pixel (top-left origin).
    pub fn screen_ray(&self, screen_x: f32, screen_y: f32, viewport: Viewport) -> Ray {
        let ndc_x = (2.0 * screen_x) / viewport.width - 1.0;
        let ndc_y = 1.0 - (2.0 * screen_y) / viewport.height;

        let inv_view_proj = self.view_projection(viewport).inverse();
        let near = inv_view_proj * Vec4::new(ndc_x, ndc_y, -1.0, 1.0);
        let far = inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;

        Ray::new(near, far - near)
    }

    /// Pixel position of a world point, or `None` when it is behind the camera.
    pub fn world_to_screen(&self, point: Vec3, viewport: Viewport) -> Option<Vec2> {
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * viewport.width,
            (1.0 - ndc.y) * 0.5 * viewport.height,
        ))
    }
}

/// Pointer-drag orbiting about a target. Disabled while something else (the
/// transform gizmo) owns the pointer.
#[derive(Debug, Clone, Copy)]
pub struct OrbitControls {
    pub target: Vec3,
    pub sensitivity: f32,
    enabled: bool,
}

impl OrbitControls {
    pub fn new(target: Vec3, sensitivity: f32) -> Self {
        Self {
            target,
            sensitivity,
            enabled: true,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns whether the camera moved.
    pub fn drag(&self, camera: &mut CameraController, dx: f32, dy: f32) -> bool {
        if !self.enabled || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        camera.orbit_around(self.target, dx * self.sensitivity, -dy * self.sensitivity);
        true
    }
}

fn forward_to_yaw_pitch(forward: Vec3) -> (f32, f32) {
    let n = forward.normalize_or_zero();
    if n == Vec3::ZERO {
        return (0.0, 0.0);
    }
    (n.z.atan2(n.x), n.y.clamp(-1.0, 1.0).asin())
}

fn camera_basis(yaw: f32, pitch: f32) -> (Vec3, Vec3, Vec3) {
    let cos_pitch = pitch.cos();
    let forward = Vec3::new(yaw.cos() * cos_pitch, pitch.sin(), yaw.sin() * cos_pitch);
    let right = Vec3::new(-yaw.sin(), 0.0, yaw.cos());
    let up = right.cross(forward).normalize_or_zero();
    (forward, right, up)
}

fn wrap_angle(angle: f32) -> f32 {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        (angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(800.0, 600.0)
    }

    #[test]
    fn looking_at_points_forward_at_target() {
        let camera = CameraController::looking_at([6.0, 4.0, 8.0], [0.0, 1.0, 0.0]);
        let expected = (Vec3::new(0.0, 1.0, 0.0) - Vec3::new(6.0, 4.0, 8.0)).normalize();
        assert!((camera.forward() - expected).length() < 1e-4);
    }

    #[test]
    fn centre_pixel_ray_follows_forward() {
        let camera = CameraController::looking_at([0.0, 0.0, 5.0], [0.0, 0.0, 0.0]);
        let ray = camera.screen_ray(400.0, 300.0, viewport());
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-3);
        assert!(ray.origin.z < 5.0);
    }

    #[test]
    fn world_to_screen_inverts_screen_ray() {
        let camera = CameraController::looking_at([6.0, 4.0, 8.0], [0.0, 1.0, 0.0]);
        let point = Vec3::new(0.5, 0.8, -0.3);
        let pixel = camera.world_to_screen(point, viewport()).unwrap();
        let ray = camera.screen_ray(pixel.x, pixel.y, viewport());
        let to_point = point - ray.origin;
        let off_axis = to_point - ray.direction * to_point.dot(ray.direction);
        assert!(off_axis.length() < 1e-3);
    }

    #[test]
    fn point_behind_camera_is_not_projected() {
        let camera = CameraController::looking_at([0.0, 0.0, 5.0], [0.0, 0.0, 0.0]);
        assert!(camera
            .world_to_screen(Vec3::new(0.0, 0.0, 10.0), viewport())
            .is_none());
    }

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut camera = CameraController::looking_at([6.0, 4.0, 8.0], [0.0, 1.0, 0.0]);
        let controls = OrbitControls::new(Vec3::new(0.0, 1.0, 0.0), 0.005);
        let before = (camera.eye() - controls.target).length();
        assert!(controls.drag(&mut camera, 40.0, -12.0));
        let after = (camera.eye() - controls.target).length();
        assert!((before - after).abs() < 1e-3);
        assert!(camera.position.iter().all(|value| value.is_finite()));
    }

    #[test]
    fn disabled_orbit_does_not_move_camera() {
        let mut camera = CameraController::looking_at([6.0, 4.0, 8.0], [0.0, 1.0, 0.0]);
        let mut controls = OrbitControls::new(Vec3::new(0.0, 1.0, 0.0), 0.005);
        controls.set_enabled(false);
        let before = camera.position;
        assert!(!controls.drag(&mut camera, 40.0, 40.0));
        assert_eq!(camera.position, before);
    }
}
