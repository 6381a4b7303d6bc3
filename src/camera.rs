use crate::cube::Cube;
use crate::device::{Device, RenderError};
use crate::matrix::Matrix;
use crate::shader::U_MVP_MATRIX;

/// Fixed camera looking down at the playing field.
///
/// `world` holds the bare perspective projection; `proj` is the composed
/// view-projection that `point` and `render` use. Splitting the two lets
/// `look_at` rebuild the view part without re-deriving the frustum.
pub struct Camera {
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    scale: f32,
    look_at: glam::Vec3,
    world: Matrix,
    proj: Matrix,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            fov: 120.0,
            aspect: 1.0,
            near: 0.01,
            far: 10.0,
            scale: 0.0,
            look_at: glam::Vec3::ZERO,
            world: Matrix::identity(4),
            proj: Matrix::identity(4),
        }
    }

    pub fn field_of_view(&self) -> f32 {
        self.fov
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    #[allow(dead_code)]
    pub fn proj(&self) -> &Matrix {
        &self.proj
    }

    /// Builds the projection and parks the camera above the field. `scale`
    /// sets how far the viewpoint backs away from the origin.
    pub fn setup(&mut self, fov: f32, aspect: f32, near: f32, far: f32, scale: f32) {
        self.fov = fov;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self.scale = scale;

        let fov_scale = (0.5 * fov.to_radians()).tan();
        self.world = Matrix::perspective(fov_scale, aspect, near, far);

        let x = -0.5 * scale - 0.5;
        let y = 0.5 * scale + 0.5;
        let z = -scale;
        self.look_at(Some(x * aspect), Some(y), Some(z), 1.0);
        self.move_by(0.0, 0.0, 0.0);
    }

    /// Re-aims the camera. `None` keeps the stored component, so callers can
    /// adjust a single axis. `w` scales the whole view uniformly.
    pub fn look_at(&mut self, x: Option<f32>, y: Option<f32>, z: Option<f32>, w: f32) {
        if let Some(x) = x {
            self.look_at.x = x;
        }
        if let Some(y) = y {
            self.look_at.y = y;
        }
        if let Some(z) = z {
            self.look_at.z = z;
        }

        let offset = Matrix::identity(4)
            .shift(self.look_at.x, self.look_at.y, self.look_at.z)
            .scale(w, w, w);
        self.proj = self.world.clone().mul_matrix(&offset);
    }

    pub fn move_by(&mut self, x: f32, y: f32, z: f32) {
        self.proj = Matrix::identity(4).shift(x, y, z).mul_matrix(&self.proj);
    }

    /// Projects a world-space point through the composed matrix. The result
    /// is pre-division clip space, which is what the scene's grid warp wants.
    #[allow(dead_code)]
    pub fn point(&self, x: f32, y: f32, z: f32) -> glam::Vec3 {
        let v = self.proj.mul_vector(&[x, y, z]);
        glam::vec3(v[0], v[1], v[2])
    }

    pub fn render<D: Device>(&self, device: &mut D, items: &[Cube]) -> Result<(), RenderError> {
        device.set_mat4(U_MVP_MATRIX, self.proj.to_uniform());
        for item in items {
            item.render(device)?;
        }
        Ok(())
    }

    pub fn resize(&mut self, aspect: f32) {
        self.setup(self.fov, aspect, self.near, self.far, self.scale);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    fn assert_vec3_approx(actual: glam::Vec3, expected: glam::Vec3) {
        assert!(
            (actual - expected).abs().max_element() < 1e-4,
            "{actual} vs {expected}"
        );
    }

    fn field_camera() -> Camera {
        let mut camera = Camera::new();
        camera.setup(60.0, 1.5, 0.1, 100.0, 15.0);
        camera
    }

    #[test]
    fn fresh_camera_projects_through_identity() {
        let camera = Camera::new();
        assert_vec3_approx(camera.point(1.0, 2.0, 3.0), glam::vec3(1.0, 2.0, 3.0));
    }

    #[test]
    fn setup_composes_projection_and_view() {
        let camera = field_camera();

        let expected = Matrix::from_rows([
            [1.154_701, 0.0, 0.0, -13.856_406],
            [0.0, 1.732_051, 0.0, 13.856_406],
            [0.0, 0.0, -1.002_002, 14.829_83],
            [0.0, 0.0, -1.0, 15.0],
        ]);
        let proj = camera.proj();
        for row in 0..4 {
            for col in 0..4 {
                assert!(
                    (proj.at(row, col) - expected.at(row, col)).abs() < 1e-4,
                    "mismatch at ({row}, {col})"
                );
            }
        }
    }

    #[test]
    fn point_projects_the_origin() {
        let camera = field_camera();
        assert_vec3_approx(
            camera.point(0.0, 0.0, 0.0),
            glam::vec3(-13.856_406, 13.856_406, 14.829_83),
        );
        assert_vec3_approx(
            camera.point(1.0, 1.0, 1.0),
            glam::vec3(-12.701_706, 15.588_457, 13.827_828),
        );
    }

    #[test]
    fn move_by_shifts_in_clip_space() {
        let mut camera = field_camera();
        let before = camera.point(2.0, 3.0, 1.0);
        camera.move_by(1.0, 2.0, 3.0);
        let after = camera.point(2.0, 3.0, 1.0);

        // The shift lands after projection, so it is scaled by the
        // homogeneous w of the projected point (14 here).
        assert_vec3_approx(after - before, glam::vec3(14.0, 28.0, 42.0));
    }

    #[test]
    fn look_at_keeps_unset_components() {
        let mut camera = field_camera();
        camera.look_at(None, Some(0.0), None, 1.0);

        assert_vec3_approx(
            camera.point(0.0, 0.0, 0.0),
            glam::vec3(-13.856_406, 0.0, 14.829_83),
        );
    }

    #[test]
    fn resize_rebuilds_for_the_new_aspect() {
        let mut camera = field_camera();
        camera.resize(1.0);

        assert_eq!(camera.aspect_ratio(), 1.0);
        assert!((camera.proj().at(0, 0) - 1.732_051).abs() < 1e-4);
        assert!((camera.proj().at(1, 1) - 1.732_051).abs() < 1e-4);
    }

    #[test]
    fn render_uploads_the_composed_matrix() {
        let camera = field_camera();
        let mut device = RecordingDevice::new();

        camera.render(&mut device, &[]).unwrap();
        let uploaded = device.mat4s[U_MVP_MATRIX];
        assert!((uploaded[3][0] - -13.856_406).abs() < 1e-4);
        assert!((uploaded[0][3] - 0.0).abs() < 1e-4);
    }
}
