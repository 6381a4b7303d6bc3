use crate::device::{BufferId, Device, RenderError, VertexAttribute};
use crate::matrix::Matrix;
use crate::shader::{U_COLOR_ID, U_MV_MATRIX};
use crate::utils::normalize_angle;

// Four vertices per face so every face can carry its own normal.
#[rustfmt::skip]
const VERTICES: [f32; 72] = [
    // front
    -1.0, -1.0,  1.0,
     1.0, -1.0,  1.0,
     1.0,  1.0,  1.0,
    -1.0,  1.0,  1.0,
    // back
    -1.0, -1.0, -1.0,
    -1.0,  1.0, -1.0,
     1.0,  1.0, -1.0,
     1.0, -1.0, -1.0,
    // top
    -1.0,  1.0, -1.0,
    -1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,
     1.0,  1.0, -1.0,
    // bottom
    -1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,
     1.0, -1.0,  1.0,
    -1.0, -1.0,  1.0,
    // right
     1.0, -1.0, -1.0,
     1.0,  1.0, -1.0,
     1.0,  1.0,  1.0,
     1.0, -1.0,  1.0,
    // left
    -1.0, -1.0, -1.0,
    -1.0, -1.0,  1.0,
    -1.0,  1.0,  1.0,
    -1.0,  1.0, -1.0,
];

#[rustfmt::skip]
const INDICES: [u16; 36] = [
    0,  1,  2,    0,  2,  3,  // front
    4,  5,  6,    4,  6,  7,  // back
    8,  9,  10,   8,  10, 11, // top
    12, 13, 14,   12, 14, 15, // bottom
    16, 17, 18,   16, 18, 19, // right
    20, 21, 22,   20, 22, 23, // left
];

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// One face normal per vertex. The cross product order makes the normals
/// point into the cube; the fragment shader's light direction accounts
/// for that.
fn build_normals() -> Vec<f32> {
    let mut normals = [[0.0f32; 3]; 24];

    for triangle in INDICES.chunks_exact(3) {
        let a = Cube::vertex(triangle[0] as usize);
        let b = Cube::vertex(triangle[1] as usize);
        let c = Cube::vertex(triangle[2] as usize);

        let q = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let p = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];

        let normal = [
            p[1] * q[2] - p[2] * q[1],
            p[2] * q[0] - p[0] * q[2],
            p[0] * q[1] - p[1] * q[0],
        ];

        for &index in triangle {
            normals[index as usize] = normal;
        }
    }

    normals.concat()
}

fn plane_coord(v: &[f32]) -> (f32, f32) {
    (v[0] / v[2], v[1] / v[2])
}

/// A falling cube and its device-side buffers.
///
/// Movement and rotation accumulate in grid units and degrees; the model
/// matrix is recomposed from them on every render. `speed` and `color_id`
/// belong to the scene: it assigns a speed on spawn and a unique pick color
/// on insertion.
pub struct Cube {
    id: String,
    rotation: glam::Vec3,
    position: glam::Vec3,
    size: f32,
    anchor: glam::Vec3,
    pub speed: f32,
    pub color_id: [f32; 4],
    destructed: bool,
    vertex_buffer: Option<BufferId>,
    color_buffer: Option<BufferId>,
    normal_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
}

impl Cube {
    pub fn new<D: Device>(device: &mut D, id: impl Into<String>) -> Result<Self, RenderError> {
        Self::with_size(device, id, 1.0, glam::vec3(0.5, -0.5, 0.0))
    }

    pub fn with_size<D: Device>(
        device: &mut D,
        id: impl Into<String>,
        size: f32,
        anchor: glam::Vec3,
    ) -> Result<Self, RenderError> {
        let colors: Vec<f32> = [WHITE; 24].concat();
        let normals = build_normals();

        let vertex_buffer = device.create_attribute_buffer(VertexAttribute::Position, &VERTICES)?;
        let color_buffer = device.create_attribute_buffer(VertexAttribute::Color, &colors)?;
        let normal_buffer = device.create_attribute_buffer(VertexAttribute::Normal, &normals)?;
        let index_buffer = device.create_index_buffer(&INDICES)?;

        Ok(Self {
            id: id.into(),
            rotation: glam::Vec3::ZERO,
            position: glam::Vec3::ZERO,
            size,
            anchor,
            speed: 1.0,
            color_id: [0.0, 0.0, 0.0, 1.0],
            destructed: false,
            vertex_buffer: Some(vertex_buffer),
            color_buffer: Some(color_buffer),
            normal_buffer: Some(normal_buffer),
            index_buffer: Some(index_buffer),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    #[allow(dead_code)]
    pub fn destructed(&self) -> bool {
        self.destructed
    }

    /// World position of the anchor point, in the camera's convention
    /// (y up, z toward the viewer).
    pub fn pos(&self) -> glam::Vec3 {
        glam::vec3(
            self.position.x + self.anchor.x,
            -(self.position.y + self.anchor.y),
            -(self.position.z + self.anchor.z),
        )
    }

    fn vertex(i: usize) -> [f32; 3] {
        let at = i * 3;
        [VERTICES[at], VERTICES[at + 1], VERTICES[at + 2]]
    }

    pub fn model_matrix(&self, rotate: bool) -> Matrix {
        let mut m = Matrix::identity(4)
            .translate(
                self.position.x + self.anchor.x,
                self.position.y + self.anchor.y,
                self.position.z + self.anchor.z,
            )
            .scale(self.size / 2.0, self.size / 2.0, self.size / 2.0);

        if rotate {
            m = m
                .rotate(self.rotation.x, 1.0, 0.0, 0.0)
                .rotate(self.rotation.y, 0.0, 1.0, 0.0)
                .rotate(self.rotation.z, 0.0, 0.0, 1.0);
        }

        m
    }

    /// Moves by whole cube sizes. Positive y is down, positive z is away
    /// from the viewer; `pos` reports the flipped result.
    pub fn move_by(&mut self, delta: glam::Vec3) -> &mut Self {
        self.position.x += self.size * delta.x;
        self.position.y -= self.size * delta.y;
        self.position.z -= self.size * delta.z;
        self
    }

    /// Adds degrees per axis, wrapped to two full turns.
    pub fn rotate_by(&mut self, delta: glam::Vec3) -> &mut Self {
        self.rotation.x = normalize_angle(self.rotation.x + delta.x);
        self.rotation.y = normalize_angle(self.rotation.y + delta.y);
        self.rotation.z = normalize_angle(self.rotation.z + delta.z);
        self
    }

    /// Tests a clip-space point against the cube's unrotated front quad.
    /// Corners are projected through `proj` and divided by their z.
    #[allow(dead_code)]
    pub fn collide_2d(&self, proj: &Matrix, x: f32, y: f32) -> bool {
        let view = proj.clone().mul_matrix(&self.model_matrix(false));

        let tl = plane_coord(&view.mul_vector(&Self::vertex(3)));
        let br = plane_coord(&view.mul_vector(&Self::vertex(1)));

        (tl.0 <= x && x <= br.0) && (br.1 <= y && y <= tl.1)
    }

    pub fn render<D: Device>(&self, device: &mut D) -> Result<(), RenderError> {
        if self.destructed {
            return Ok(());
        }

        device.set_mat4(U_MV_MATRIX, self.model_matrix(true).to_uniform());
        device.set_vec4(U_COLOR_ID, self.color_id);

        self.bind(device)?;
        device.draw_elements(INDICES.len())?;
        self.release(device);

        Ok(())
    }

    fn bind<D: Device>(&self, device: &mut D) -> Result<(), RenderError> {
        let color = self
            .color_buffer
            .ok_or(RenderError::MissingBuffer(VertexAttribute::Color.name()))?;
        let position = self
            .vertex_buffer
            .ok_or(RenderError::MissingBuffer(VertexAttribute::Position.name()))?;
        let normal = self
            .normal_buffer
            .ok_or(RenderError::MissingBuffer(VertexAttribute::Normal.name()))?;
        let index = self.index_buffer.ok_or(RenderError::MissingBuffer("index"))?;

        device.bind_attribute(VertexAttribute::Color, color)?;
        device.bind_attribute(VertexAttribute::Position, position)?;
        device.bind_attribute(VertexAttribute::Normal, normal)?;
        device.bind_index(index)
    }

    fn release<D: Device>(&self, device: &mut D) {
        // The index binding stays; the next draw rebinds it anyway.
        device.release_attribute(VertexAttribute::Color);
        device.release_attribute(VertexAttribute::Normal);
        device.release_attribute(VertexAttribute::Position);
    }

    /// Frees the device buffers and marks the cube dead. Rendering a dead
    /// cube is a no-op.
    pub fn destroy<D: Device>(&mut self, device: &mut D) {
        self.destructed = true;

        for id in [
            self.index_buffer.take(),
            self.vertex_buffer.take(),
            self.normal_buffer.take(),
            self.color_buffer.take(),
        ]
        .into_iter()
        .flatten()
        {
            device.delete_buffer(id);
        }
    }
}
