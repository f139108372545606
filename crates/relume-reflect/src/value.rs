//! GPU-side uniform data model.

/// Uniform data types the engine understands. Anything the driver reports
/// outside this set is warned about and skipped at reflection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    Bool,
    Mat3,
    Mat4,
    Sampler2D,
}

impl GpuType {
    /// GLSL spelling, for logs and diagnostics.
    pub fn glsl_name(&self) -> &'static str {
        match self {
            GpuType::Float => "float",
            GpuType::Vec2 => "vec2",
            GpuType::Vec3 => "vec3",
            GpuType::Vec4 => "vec4",
            GpuType::Int => "int",
            GpuType::IVec2 => "ivec2",
            GpuType::IVec3 => "ivec3",
            GpuType::IVec4 => "ivec4",
            GpuType::UInt => "uint",
            GpuType::Bool => "bool",
            GpuType::Mat3 => "mat3",
            GpuType::Mat4 => "mat4",
            GpuType::Sampler2D => "sampler2D",
        }
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, GpuType::Sampler2D)
    }

    /// Scalar slots per element (a mat3 is 9 floats).
    pub fn component_count(&self) -> usize {
        match self {
            GpuType::Float | GpuType::Int | GpuType::UInt | GpuType::Bool => 1,
            GpuType::Vec2 | GpuType::IVec2 => 2,
            GpuType::Vec3 | GpuType::IVec3 => 3,
            GpuType::Vec4 | GpuType::IVec4 => 4,
            GpuType::Mat3 => 9,
            GpuType::Mat4 => 16,
            GpuType::Sampler2D => 0,
        }
    }
}

impl std::fmt::Display for GpuType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// One element's worth of uniform data.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    UInt(u32),
    Bool(bool),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn gpu_type(&self) -> GpuType {
        match self {
            UniformValue::Float(_) => GpuType::Float,
            UniformValue::Vec2(_) => GpuType::Vec2,
            UniformValue::Vec3(_) => GpuType::Vec3,
            UniformValue::Vec4(_) => GpuType::Vec4,
            UniformValue::Int(_) => GpuType::Int,
            UniformValue::IVec2(_) => GpuType::IVec2,
            UniformValue::IVec3(_) => GpuType::IVec3,
            UniformValue::IVec4(_) => GpuType::IVec4,
            UniformValue::UInt(_) => GpuType::UInt,
            UniformValue::Bool(_) => GpuType::Bool,
            UniformValue::Mat3(_) => GpuType::Mat3,
            UniformValue::Mat4(_) => GpuType::Mat4,
        }
    }

    /// All-zero value of a type; identity for matrices. `None` for samplers,
    /// which carry bindings instead of values.
    pub fn default_of(ty: GpuType) -> Option<UniformValue> {
        let v = match ty {
            GpuType::Float => UniformValue::Float(0.0),
            GpuType::Vec2 => UniformValue::Vec2([0.0; 2]),
            GpuType::Vec3 => UniformValue::Vec3([0.0; 3]),
            GpuType::Vec4 => UniformValue::Vec4([0.0; 4]),
            GpuType::Int => UniformValue::Int(0),
            GpuType::IVec2 => UniformValue::IVec2([0; 2]),
            GpuType::IVec3 => UniformValue::IVec3([0; 3]),
            GpuType::IVec4 => UniformValue::IVec4([0; 4]),
            GpuType::UInt => UniformValue::UInt(0),
            GpuType::Bool => UniformValue::Bool(false),
            GpuType::Mat3 => {
                let mut m = [0.0; 9];
                m[0] = 1.0;
                m[4] = 1.0;
                m[8] = 1.0;
                UniformValue::Mat3(m)
            }
            GpuType::Mat4 => {
                let mut m = [0.0; 16];
                m[0] = 1.0;
                m[5] = 1.0;
                m[10] = 1.0;
                m[15] = 1.0;
                UniformValue::Mat4(m)
            }
            GpuType::Sampler2D => return None,
        };
        Some(v)
    }
}
