use crate::shader::{Shader, ShaderKind};

pub mod gl;

/// Handle to a device-owned buffer. Handles are never reused within the
/// lifetime of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    Position,
    Color,
    Normal,
}

impl VertexAttribute {
    /// The attribute name the shaders declare.
    pub fn name(self) -> &'static str {
        match self {
            VertexAttribute::Position => "a_Position",
            VertexAttribute::Color => "a_Color",
            VertexAttribute::Normal => "a_Normal",
        }
    }

    pub fn components(self) -> usize {
        match self {
            VertexAttribute::Position => 3,
            VertexAttribute::Color => 4,
            VertexAttribute::Normal => 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{kind} shader failed to compile: {log}")]
    ShaderCompile { kind: ShaderKind, log: String },
    #[error("shader program failed to link: {log}")]
    ShaderLink { log: String },
    #[error("program creation failed: {0}")]
    Program(String),
    #[error("expected one vertex and one fragment shader")]
    ShaderKindMismatch,
    #[error("could not create {0} buffer: {1}")]
    BufferCreation(&'static str, String),
    #[error("could not create pick target: {0}")]
    PickTarget(String),
    #[error("no {0} buffer bound for drawing")]
    MissingBuffer(&'static str),
    #[error("no shader program installed")]
    NoProgram,
    #[error("no frame in progress")]
    NoActiveFrame,
    #[error("draw call failed: {0}")]
    Draw(String),
}

/// The rendering seam between the scene and the graphics backend.
///
/// The scene records uniforms, binds buffers and issues indexed draws either
/// into the visible frame or into the off-screen pick target; `read_pixel`
/// inspects the latter. Keeping the scene behind this trait lets the tests
/// run against a recording implementation with no GL context at all.
pub trait Device {
    fn surface_size(&self) -> (u32, u32);

    fn create_program(&mut self, vertex: &Shader, fragment: &Shader) -> Result<(), RenderError>;

    fn create_attribute_buffer(
        &mut self,
        attribute: VertexAttribute,
        data: &[f32],
    ) -> Result<BufferId, RenderError>;

    fn create_index_buffer(&mut self, data: &[u16]) -> Result<BufferId, RenderError>;

    fn delete_buffer(&mut self, id: BufferId);

    fn set_mat4(&mut self, name: &str, value: [[f32; 4]; 4]);

    fn set_vec3(&mut self, name: &str, value: [f32; 3]);

    fn set_vec4(&mut self, name: &str, value: [f32; 4]);

    fn set_int(&mut self, name: &str, value: i32);

    fn begin_frame(&mut self, clear_color: [f32; 4]);

    /// Marks the scene's rendering as complete. The backend may keep the
    /// frame open so the host can paint an overlay before presenting.
    fn end_frame(&mut self);

    /// Routes subsequent draws to the pick target instead of the frame.
    /// Entering the pick pass clears the target.
    fn bind_offscreen(&mut self, off_screen: bool) -> Result<(), RenderError>;

    fn bind_attribute(&mut self, attribute: VertexAttribute, id: BufferId)
        -> Result<(), RenderError>;

    fn release_attribute(&mut self, attribute: VertexAttribute);

    fn bind_index(&mut self, id: BufferId) -> Result<(), RenderError>;

    fn draw_elements(&mut self, count: usize) -> Result<(), RenderError>;

    /// Reads one pixel from the pick target. The origin is the bottom-left
    /// corner, matching the surface coordinates `CanvasGeometry` produces.
    fn read_pixel(&mut self, x: i32, y: i32) -> [u8; 4];

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError>;
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRecord {
    pub off_screen: bool,
    pub count: usize,
}

/// Headless device that records every call so scene behavior can be asserted
/// without a GL context.
#[cfg(test)]
pub struct RecordingDevice {
    pub size: (u32, u32),
    pub live_buffers: Vec<BufferId>,
    pub deleted_buffers: Vec<BufferId>,
    pub mat4s: std::collections::HashMap<String, [[f32; 4]; 4]>,
    pub vec3s: std::collections::HashMap<String, [f32; 3]>,
    pub vec4s: std::collections::HashMap<String, [f32; 4]>,
    pub ints: std::collections::HashMap<String, i32>,
    pub off_screen_flags: Vec<i32>,
    pub draws: Vec<DrawRecord>,
    pub frames_begun: usize,
    pub frames_ended: usize,
    pub program_created: bool,
    pub pick_pixel: [u8; 4],
    pub last_read: Option<(i32, i32)>,
    next_buffer: u32,
    off_screen: bool,
    bound_attributes: [Option<BufferId>; 3],
    bound_index: Option<BufferId>,
}

#[cfg(test)]
impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            size: (300, 300),
            live_buffers: Vec::new(),
            deleted_buffers: Vec::new(),
            mat4s: std::collections::HashMap::new(),
            vec3s: std::collections::HashMap::new(),
            vec4s: std::collections::HashMap::new(),
            ints: std::collections::HashMap::new(),
            off_screen_flags: Vec::new(),
            draws: Vec::new(),
            frames_begun: 0,
            frames_ended: 0,
            program_created: false,
            pick_pixel: [0, 0, 0, 255],
            last_read: None,
            next_buffer: 0,
            off_screen: false,
            bound_attributes: [None; 3],
            bound_index: None,
        }
    }

    fn slot(attribute: VertexAttribute) -> usize {
        match attribute {
            VertexAttribute::Position => 0,
            VertexAttribute::Color => 1,
            VertexAttribute::Normal => 2,
        }
    }

    fn allocate(&mut self) -> BufferId {
        self.next_buffer += 1;
        let id = BufferId(self.next_buffer);
        self.live_buffers.push(id);
        id
    }
}

#[cfg(test)]
impl Device for RecordingDevice {
    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_program(&mut self, _vertex: &Shader, _fragment: &Shader) -> Result<(), RenderError> {
        self.program_created = true;
        Ok(())
    }

    fn create_attribute_buffer(
        &mut self,
        _attribute: VertexAttribute,
        _data: &[f32],
    ) -> Result<BufferId, RenderError> {
        Ok(self.allocate())
    }

    fn create_index_buffer(&mut self, _data: &[u16]) -> Result<BufferId, RenderError> {
        Ok(self.allocate())
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.live_buffers.retain(|&live| live != id);
        self.deleted_buffers.push(id);
    }

    fn set_mat4(&mut self, name: &str, value: [[f32; 4]; 4]) {
        self.mat4s.insert(name.to_owned(), value);
    }

    fn set_vec3(&mut self, name: &str, value: [f32; 3]) {
        self.vec3s.insert(name.to_owned(), value);
    }

    fn set_vec4(&mut self, name: &str, value: [f32; 4]) {
        self.vec4s.insert(name.to_owned(), value);
    }

    fn set_int(&mut self, name: &str, value: i32) {
        if name == crate::shader::U_OFF_SCREEN {
            self.off_screen_flags.push(value);
        }
        self.ints.insert(name.to_owned(), value);
    }

    fn begin_frame(&mut self, _clear_color: [f32; 4]) {
        self.frames_begun += 1;
    }

    fn end_frame(&mut self) {
        self.frames_ended += 1;
    }

    fn bind_offscreen(&mut self, off_screen: bool) -> Result<(), RenderError> {
        self.off_screen = off_screen;
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        attribute: VertexAttribute,
        id: BufferId,
    ) -> Result<(), RenderError> {
        if !self.live_buffers.contains(&id) {
            return Err(RenderError::MissingBuffer(attribute.name()));
        }
        self.bound_attributes[Self::slot(attribute)] = Some(id);
        Ok(())
    }

    fn release_attribute(&mut self, attribute: VertexAttribute) {
        self.bound_attributes[Self::slot(attribute)] = None;
    }

    fn bind_index(&mut self, id: BufferId) -> Result<(), RenderError> {
        if !self.live_buffers.contains(&id) {
            return Err(RenderError::MissingBuffer("index"));
        }
        self.bound_index = Some(id);
        Ok(())
    }

    fn draw_elements(&mut self, count: usize) -> Result<(), RenderError> {
        for attribute in [
            VertexAttribute::Position,
            VertexAttribute::Color,
            VertexAttribute::Normal,
        ] {
            if self.bound_attributes[Self::slot(attribute)].is_none() {
                return Err(RenderError::MissingBuffer(attribute.name()));
            }
        }
        if self.bound_index.is_none() {
            return Err(RenderError::MissingBuffer("index"));
        }

        self.draws.push(DrawRecord {
            off_screen: self.off_screen,
            count,
        });
        Ok(())
    }

    fn read_pixel(&mut self, x: i32, y: i32) -> [u8; 4] {
        self.last_read = Some((x, y));
        self.pick_pixel
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.size = (width, height);
        Ok(())
    }
}
