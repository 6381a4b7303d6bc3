use std::fmt;

pub const U_MVP_MATRIX: &str = "u_MVPMatrix";
pub const U_MV_MATRIX: &str = "u_MVMatrix";
pub const U_LIGHT_POS: &str = "u_LightPos";
pub const U_OFF_SCREEN: &str = "u_OffScreen";
pub const U_COLOR_ID: &str = "u_ColorId";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => write!(f, "vertex"),
            ShaderKind::Fragment => write!(f, "fragment"),
        }
    }
}

/// A GLSL source tagged with its pipeline stage.
pub struct Shader {
    kind: ShaderKind,
    source: String,
}

impl Shader {
    pub fn vertex(source: &str) -> Self {
        Self::new(ShaderKind::Vertex, source)
    }

    pub fn fragment(source: &str) -> Self {
        Self::new(ShaderKind::Fragment, source)
    }

    /// Non-ASCII characters (typically non-breaking spaces picked up in
    /// copied sources) are stripped; GLSL compilers reject them.
    pub fn new(kind: ShaderKind, source: &str) -> Self {
        Self {
            kind,
            source: source.chars().filter(char::is_ascii).collect(),
        }
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
