use std::collections::HashMap;

use glium::glutin::surface::WindowSurface;
use glium::Surface;

use crate::device::{BufferId, Device, RenderError, VertexAttribute};
use crate::shader::{Shader, ShaderKind};

// One buffer per attribute, so the field names below are the attribute names
// the shaders declare.

#[derive(Clone, Copy)]
#[allow(non_snake_case)]
struct PositionVertex {
    a_Position: [f32; 3],
}
implement_vertex!(PositionVertex, a_Position);

#[derive(Clone, Copy)]
#[allow(non_snake_case)]
struct ColorVertex {
    a_Color: [f32; 4],
}
implement_vertex!(ColorVertex, a_Color);

#[derive(Clone, Copy)]
#[allow(non_snake_case)]
struct NormalVertex {
    a_Normal: [f32; 3],
}
implement_vertex!(NormalVertex, a_Normal);

enum StagedUniform {
    Mat4([[f32; 4]; 4]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
}

/// Uniform names are only known at run time, so this visits the staged map
/// instead of going through the `uniform!` macro.
struct SceneUniforms<'a>(&'a HashMap<String, StagedUniform>);

impl glium::uniforms::Uniforms for SceneUniforms<'_> {
    fn visit_values<'a, F: FnMut(&str, glium::uniforms::UniformValue<'a>)>(
        &'a self,
        mut visit: F,
    ) {
        for (name, staged) in self.0 {
            let value = match staged {
                StagedUniform::Mat4(m) => glium::uniforms::UniformValue::Mat4(*m),
                StagedUniform::Vec3(v) => glium::uniforms::UniformValue::Vec3(*v),
                StagedUniform::Vec4(v) => glium::uniforms::UniformValue::Vec4(*v),
                StagedUniform::Int(i) => glium::uniforms::UniformValue::SignedInt(*i),
            };
            visit(name, value);
        }
    }
}

/// Glium-backed device. Owns the display, the compiled program, every buffer
/// the cubes allocate and a window-sized texture that serves as the pick
/// target.
pub struct GlDevice {
    display: glium::Display<WindowSurface>,
    program: Option<glium::Program>,
    next_buffer: u32,
    position_buffers: HashMap<BufferId, glium::VertexBuffer<PositionVertex>>,
    color_buffers: HashMap<BufferId, glium::VertexBuffer<ColorVertex>>,
    normal_buffers: HashMap<BufferId, glium::VertexBuffer<NormalVertex>>,
    index_buffers: HashMap<BufferId, glium::IndexBuffer<u16>>,
    uniforms: HashMap<String, StagedUniform>,
    bound_position: Option<BufferId>,
    bound_color: Option<BufferId>,
    bound_normal: Option<BufferId>,
    bound_index: Option<BufferId>,
    pick_texture: glium::texture::Texture2d,
    pick_depth: glium::framebuffer::DepthRenderBuffer,
    off_screen: bool,
    frame: Option<glium::Frame>,
}

impl GlDevice {
    pub fn new(display: glium::Display<WindowSurface>) -> Result<Self, RenderError> {
        let (width, height) = display.get_framebuffer_dimensions();
        let (pick_texture, pick_depth) = Self::create_pick_target(&display, width, height)?;

        Ok(Self {
            display,
            program: None,
            next_buffer: 0,
            position_buffers: HashMap::new(),
            color_buffers: HashMap::new(),
            normal_buffers: HashMap::new(),
            index_buffers: HashMap::new(),
            uniforms: HashMap::new(),
            bound_position: None,
            bound_color: None,
            bound_normal: None,
            bound_index: None,
            pick_texture,
            pick_depth,
            off_screen: false,
            frame: None,
        })
    }

    fn create_pick_target(
        display: &glium::Display<WindowSurface>,
        width: u32,
        height: u32,
    ) -> Result<(glium::texture::Texture2d, glium::framebuffer::DepthRenderBuffer), RenderError>
    {
        let texture = glium::texture::Texture2d::empty_with_format(
            display,
            glium::texture::UncompressedFloatFormat::U8U8U8U8,
            glium::texture::MipmapsOption::NoMipmap,
            width,
            height,
        )
        .map_err(|err| RenderError::PickTarget(err.to_string()))?;

        let depth = glium::framebuffer::DepthRenderBuffer::new(
            display,
            glium::texture::DepthFormat::I24,
            width,
            height,
        )
        .map_err(|err| RenderError::PickTarget(err.to_string()))?;

        Ok((texture, depth))
    }

    fn pick_target(&self) -> Result<glium::framebuffer::SimpleFrameBuffer<'_>, RenderError> {
        glium::framebuffer::SimpleFrameBuffer::with_depth_buffer(
            &self.display,
            &self.pick_texture,
            &self.pick_depth,
        )
        .map_err(|err| RenderError::PickTarget(err.to_string()))
    }

    fn draw_parameters() -> glium::DrawParameters<'static> {
        glium::DrawParameters {
            depth: glium::Depth {
                test: glium::draw_parameters::DepthTest::IfLessOrEqual,
                write: true,
                ..Default::default()
            },
            // The cube indices wind counter-clockwise on outward faces.
            backface_culling: glium::draw_parameters::BackfaceCullingMode::CullClockwise,
            ..Default::default()
        }
    }

    fn allocate(&mut self) -> BufferId {
        self.next_buffer += 1;
        BufferId(self.next_buffer)
    }

    /// Runs `f` against the frame opened by `begin_frame`, e.g. to paint an
    /// egui overlay on top of the scene.
    pub fn with_frame<R>(
        &mut self,
        f: impl FnOnce(&glium::Display<WindowSurface>, &mut glium::Frame) -> R,
    ) -> Option<R> {
        let frame = self.frame.as_mut()?;
        Some(f(&self.display, frame))
    }

    /// Presents the open frame. Safe to call when no frame is open.
    pub fn finish_frame(&mut self) -> Result<(), RenderError> {
        match self.frame.take() {
            Some(frame) => frame
                .finish()
                .map_err(|err| RenderError::Draw(err.to_string())),
            None => Ok(()),
        }
    }
}

impl Device for GlDevice {
    fn surface_size(&self) -> (u32, u32) {
        self.display.get_framebuffer_dimensions()
    }

    fn create_program(&mut self, vertex: &Shader, fragment: &Shader) -> Result<(), RenderError> {
        let program = glium::Program::from_source(
            &self.display,
            vertex.source(),
            fragment.source(),
            None,
        )
        .map_err(|err| match err {
            glium::ProgramCreationError::CompilationError(log, shader_type) => {
                let kind = match shader_type {
                    glium::program::ShaderType::Vertex => ShaderKind::Vertex,
                    _ => ShaderKind::Fragment,
                };
                RenderError::ShaderCompile { kind, log }
            }
            glium::ProgramCreationError::LinkingError(log) => RenderError::ShaderLink { log },
            other => RenderError::Program(other.to_string()),
        })?;

        self.program = Some(program);
        Ok(())
    }

    fn create_attribute_buffer(
        &mut self,
        attribute: VertexAttribute,
        data: &[f32],
    ) -> Result<BufferId, RenderError> {
        let id = self.allocate();
        let creation = |err: glium::vertex::BufferCreationError| {
            RenderError::BufferCreation(attribute.name(), err.to_string())
        };

        match attribute {
            VertexAttribute::Position => {
                let vertices: Vec<PositionVertex> = data
                    .chunks_exact(attribute.components())
                    .map(|v| PositionVertex {
                        a_Position: [v[0], v[1], v[2]],
                    })
                    .collect();
                let buffer = glium::VertexBuffer::new(&self.display, &vertices).map_err(creation)?;
                self.position_buffers.insert(id, buffer);
            }
            VertexAttribute::Color => {
                let vertices: Vec<ColorVertex> = data
                    .chunks_exact(attribute.components())
                    .map(|v| ColorVertex {
                        a_Color: [v[0], v[1], v[2], v[3]],
                    })
                    .collect();
                let buffer = glium::VertexBuffer::new(&self.display, &vertices).map_err(creation)?;
                self.color_buffers.insert(id, buffer);
            }
            VertexAttribute::Normal => {
                let vertices: Vec<NormalVertex> = data
                    .chunks_exact(attribute.components())
                    .map(|v| NormalVertex {
                        a_Normal: [v[0], v[1], v[2]],
                    })
                    .collect();
                let buffer = glium::VertexBuffer::new(&self.display, &vertices).map_err(creation)?;
                self.normal_buffers.insert(id, buffer);
            }
        }

        Ok(id)
    }

    fn create_index_buffer(&mut self, data: &[u16]) -> Result<BufferId, RenderError> {
        let id = self.allocate();
        let buffer = glium::IndexBuffer::new(
            &self.display,
            glium::index::PrimitiveType::TrianglesList,
            data,
        )
        .map_err(|err| RenderError::BufferCreation("index", err.to_string()))?;

        self.index_buffers.insert(id, buffer);
        Ok(id)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.position_buffers.remove(&id);
        self.color_buffers.remove(&id);
        self.normal_buffers.remove(&id);
        self.index_buffers.remove(&id);

        for bound in [
            &mut self.bound_position,
            &mut self.bound_color,
            &mut self.bound_normal,
            &mut self.bound_index,
        ] {
            if *bound == Some(id) {
                *bound = None;
            }
        }
    }

    fn set_mat4(&mut self, name: &str, value: [[f32; 4]; 4]) {
        self.uniforms.insert(name.to_owned(), StagedUniform::Mat4(value));
    }

    fn set_vec3(&mut self, name: &str, value: [f32; 3]) {
        self.uniforms.insert(name.to_owned(), StagedUniform::Vec3(value));
    }

    fn set_vec4(&mut self, name: &str, value: [f32; 4]) {
        self.uniforms.insert(name.to_owned(), StagedUniform::Vec4(value));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.uniforms.insert(name.to_owned(), StagedUniform::Int(value));
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        // A glium frame must be finished, never dropped.
        if let Some(stale) = self.frame.take() {
            let _ = stale.finish();
        }

        let mut frame = self.display.draw();
        frame.clear_color_and_depth(
            (clear_color[0], clear_color[1], clear_color[2], clear_color[3]),
            1.0,
        );
        self.frame = Some(frame);
    }

    fn end_frame(&mut self) {
        // The frame stays open for overlay painting; finish_frame presents it.
    }

    fn bind_offscreen(&mut self, off_screen: bool) -> Result<(), RenderError> {
        self.off_screen = off_screen;
        if off_screen {
            self.pick_target()?
                .clear_color_and_depth((0.0, 0.0, 0.0, 1.0), 1.0);
        }
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        attribute: VertexAttribute,
        id: BufferId,
    ) -> Result<(), RenderError> {
        match attribute {
            VertexAttribute::Position if self.position_buffers.contains_key(&id) => {
                self.bound_position = Some(id);
            }
            VertexAttribute::Color if self.color_buffers.contains_key(&id) => {
                self.bound_color = Some(id);
            }
            VertexAttribute::Normal if self.normal_buffers.contains_key(&id) => {
                self.bound_normal = Some(id);
            }
            _ => return Err(RenderError::MissingBuffer(attribute.name())),
        }
        Ok(())
    }

    fn release_attribute(&mut self, attribute: VertexAttribute) {
        match attribute {
            VertexAttribute::Position => self.bound_position = None,
            VertexAttribute::Color => self.bound_color = None,
            VertexAttribute::Normal => self.bound_normal = None,
        }
    }

    fn bind_index(&mut self, id: BufferId) -> Result<(), RenderError> {
        if !self.index_buffers.contains_key(&id) {
            return Err(RenderError::MissingBuffer("index"));
        }
        self.bound_index = Some(id);
        Ok(())
    }

    fn draw_elements(&mut self, count: usize) -> Result<(), RenderError> {
        let program = self.program.as_ref().ok_or(RenderError::NoProgram)?;
        let position = self
            .bound_position
            .and_then(|id| self.position_buffers.get(&id))
            .ok_or(RenderError::MissingBuffer(VertexAttribute::Position.name()))?;
        let color = self
            .bound_color
            .and_then(|id| self.color_buffers.get(&id))
            .ok_or(RenderError::MissingBuffer(VertexAttribute::Color.name()))?;
        let normal = self
            .bound_normal
            .and_then(|id| self.normal_buffers.get(&id))
            .ok_or(RenderError::MissingBuffer(VertexAttribute::Normal.name()))?;
        let index = self
            .bound_index
            .and_then(|id| self.index_buffers.get(&id))
            .ok_or(RenderError::MissingBuffer("index"))?;

        if count != index.len() {
            return Err(RenderError::Draw(format!(
                "draw count {count} does not match index buffer length {}",
                index.len()
            )));
        }

        let uniforms = SceneUniforms(&self.uniforms);
        let params = Self::draw_parameters();

        if self.off_screen {
            let mut target = self.pick_target()?;
            target
                .draw((position, color, normal), index, program, &uniforms, &params)
                .map_err(|err| RenderError::Draw(err.to_string()))?;
        } else {
            let frame = self.frame.as_mut().ok_or(RenderError::NoActiveFrame)?;
            frame
                .draw((position, color, normal), index, program, &uniforms, &params)
                .map_err(|err| RenderError::Draw(err.to_string()))?;
        }

        Ok(())
    }

    fn read_pixel(&mut self, x: i32, y: i32) -> [u8; 4] {
        let (width, height) = (self.pick_texture.width(), self.pick_texture.height());
        if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
            return [0; 4];
        }

        // Rows come back bottom-up, which matches the surface coordinates
        // the pointer mapping produces.
        let pixels: Vec<Vec<(u8, u8, u8, u8)>> = self.pick_texture.read();
        let (r, g, b, a) = pixels[y as usize][x as usize];
        [r, g, b, a]
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.display.resize((width, height));

        let (texture, depth) = Self::create_pick_target(&self.display, width, height)?;
        self.pick_texture = texture;
        self.pick_depth = depth;
        Ok(())
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            let _ = frame.finish();
        }
    }
}
