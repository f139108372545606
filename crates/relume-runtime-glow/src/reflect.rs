use glow::HasContext;

use relume_core::FrameInputs;
use relume_reflect::{
    base_name, builtin_value, classify_uniform, occurrence_key, BuiltinKind, GpuType,
    SharedUniforms, UniformClass, UniformValue, ValueStore,
};

/// One active uniform after classification, with its GL locations resolved.
pub struct ReflectedUniform {
    /// Base name; `levels[0]` reported by the driver becomes `levels`.
    pub name: String,
    pub ty: GpuType,
    pub class: UniformClass,
    pub array_len: usize,
    /// Current values, one per element. Empty for builtins and samplers.
    pub values: Vec<UniformValue>,
    /// Location per element. Arrays get one location per index so partial
    /// updates skip elements the linker discarded.
    pub locations: Vec<Option<glow::NativeUniformLocation>>,
}

/// Everything reflection learned about one layer's program, ordered by
/// first occurrence in the flattened reflection-stage source so UI rows
/// follow the author's declaration order.
pub struct UniformReflectionContext {
    pub uniforms: Vec<ReflectedUniform>,
}

impl UniformReflectionContext {
    pub fn empty() -> Self {
        Self {
            uniforms: Vec::new(),
        }
    }

    pub fn uniform(&self, name: &str) -> Option<&ReflectedUniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn uniform_mut(&mut self, name: &str) -> Option<&mut ReflectedUniform> {
        self.uniforms.iter_mut().find(|u| u.name == name)
    }

    /// User-editable uniforms only, in declaration order.
    pub fn editable_mut(&mut self) -> impl Iterator<Item = &mut ReflectedUniform> {
        self.uniforms
            .iter_mut()
            .filter(|u| matches!(u.class, UniformClass::Value(_)))
    }

    /// Snapshot of the editable values, used to migrate them into the next
    /// build of the same layer.
    pub fn value_store(&self) -> ValueStore {
        let mut store = ValueStore::new();
        for u in &self.uniforms {
            if matches!(u.class, UniformClass::Value(_)) {
                store.insert(&u.name, u.ty, &u.values);
            }
        }
        store
    }
}

/// Enumerate and classify every active uniform of a freshly linked program.
///
/// Value seeding order: the shader's own initializer read back from the
/// driver, overwritten by a migrated previous value on a name+type match,
/// overwritten by the shared canonical value when the name is shared.
pub unsafe fn reflect_program(
    gl: &glow::Context,
    program: glow::NativeProgram,
    flattened: &str,
    previous: &ValueStore,
    shared: &SharedUniforms,
) -> UniformReflectionContext {
    let mut uniforms = Vec::new();

    let count = gl.get_active_uniforms(program);
    for i in 0..count {
        let Some(info) = gl.get_active_uniform(program, i) else {
            continue;
        };
        let name = base_name(&info.name).to_string();
        let Some(ty) = gl_uniform_type(info.utype) else {
            tracing::warn!(
                uniform = %name,
                raw_type = info.utype,
                "skipping uniform with unsupported type"
            );
            continue;
        };
        let array_len = info.size.max(1) as usize;

        let locations = element_locations(gl, program, &name, array_len);
        if locations.iter().all(Option::is_none) {
            // Block members show up in the enumeration but have no
            // settable location.
            tracing::debug!(uniform = %name, "no location; skipping");
            continue;
        }

        let class = classify_uniform(&name, ty, flattened);
        if let UniformClass::Sampler(None) = class {
            tracing::warn!(
                uniform = %name,
                "sampler has no binding comment and will stay unbound"
            );
        }

        let values = match class {
            UniformClass::Value(_) => {
                let mut values = seeded_values(gl, program, ty, array_len, &locations);
                previous.migrate(&name, ty, &mut values);
                adopt_shared(shared, &name, ty, &mut values);
                values
            }
            _ => Vec::new(),
        };

        uniforms.push(ReflectedUniform {
            name,
            ty,
            class,
            array_len,
            values,
            locations,
        });
    }

    uniforms.sort_by_key(|u| occurrence_key(flattened, &u.name));

    UniformReflectionContext { uniforms }
}

fn adopt_shared(shared: &SharedUniforms, name: &str, ty: GpuType, values: &mut [UniformValue]) {
    if !shared.is_shared(name) {
        return;
    }
    if let Some(canonical) = shared.canonical(name, ty) {
        let n = values.len().min(canonical.len());
        values[..n].clone_from_slice(&canonical[..n]);
    }
}

unsafe fn element_locations(
    gl: &glow::Context,
    program: glow::NativeProgram,
    name: &str,
    array_len: usize,
) -> Vec<Option<glow::NativeUniformLocation>> {
    if array_len == 1 {
        vec![gl.get_uniform_location(program, name)]
    } else {
        (0..array_len)
            .map(|k| gl.get_uniform_location(program, &format!("{name}[{k}]")))
            .collect()
    }
}

unsafe fn seeded_values(
    gl: &glow::Context,
    program: glow::NativeProgram,
    ty: GpuType,
    array_len: usize,
    locations: &[Option<glow::NativeUniformLocation>],
) -> Vec<UniformValue> {
    (0..array_len)
        .map(|k| {
            locations[k]
                .as_ref()
                .and_then(|loc| read_initializer(gl, program, loc, ty))
                .or_else(|| UniformValue::default_of(ty))
                .unwrap_or(UniformValue::Float(0.0))
        })
        .collect()
}

/// Read the value a uniform holds right after linking, which is the
/// shader-source initializer when one was written.
unsafe fn read_initializer(
    gl: &glow::Context,
    program: glow::NativeProgram,
    loc: &glow::NativeUniformLocation,
    ty: GpuType,
) -> Option<UniformValue> {
    match ty {
        GpuType::Float => {
            let mut v = [0.0f32; 1];
            gl.get_uniform_f32(program, loc, &mut v);
            Some(UniformValue::Float(v[0]))
        }
        GpuType::Vec2 => {
            let mut v = [0.0f32; 2];
            gl.get_uniform_f32(program, loc, &mut v);
            Some(UniformValue::Vec2(v))
        }
        GpuType::Vec3 => {
            let mut v = [0.0f32; 3];
            gl.get_uniform_f32(program, loc, &mut v);
            Some(UniformValue::Vec3(v))
        }
        GpuType::Vec4 => {
            let mut v = [0.0f32; 4];
            gl.get_uniform_f32(program, loc, &mut v);
            Some(UniformValue::Vec4(v))
        }
        GpuType::Int => {
            let mut v = [0i32; 1];
            gl.get_uniform_i32(program, loc, &mut v);
            Some(UniformValue::Int(v[0]))
        }
        GpuType::IVec2 => {
            let mut v = [0i32; 2];
            gl.get_uniform_i32(program, loc, &mut v);
            Some(UniformValue::IVec2(v))
        }
        GpuType::IVec3 => {
            let mut v = [0i32; 3];
            gl.get_uniform_i32(program, loc, &mut v);
            Some(UniformValue::IVec3(v))
        }
        GpuType::IVec4 => {
            let mut v = [0i32; 4];
            gl.get_uniform_i32(program, loc, &mut v);
            Some(UniformValue::IVec4(v))
        }
        GpuType::Bool => {
            let mut v = [0i32; 1];
            gl.get_uniform_i32(program, loc, &mut v);
            Some(UniformValue::Bool(v[0] != 0))
        }
        GpuType::Mat3 => {
            let mut v = [0.0f32; 9];
            gl.get_uniform_f32(program, loc, &mut v);
            Some(UniformValue::Mat3(v))
        }
        GpuType::Mat4 => {
            let mut v = [0.0f32; 16];
            gl.get_uniform_f32(program, loc, &mut v);
            Some(UniformValue::Mat4(v))
        }
        // No unsigned readback in the backend-portable subset; uints start
        // at their zero default.
        GpuType::UInt => None,
        GpuType::Sampler2D => None,
    }
}

/// Raw `GL_ACTIVE_UNIFORM` type enum to engine type.
pub(crate) fn gl_uniform_type(raw: u32) -> Option<GpuType> {
    match raw {
        glow::FLOAT => Some(GpuType::Float),
        glow::FLOAT_VEC2 => Some(GpuType::Vec2),
        glow::FLOAT_VEC3 => Some(GpuType::Vec3),
        glow::FLOAT_VEC4 => Some(GpuType::Vec4),
        glow::INT => Some(GpuType::Int),
        glow::INT_VEC2 => Some(GpuType::IVec2),
        glow::INT_VEC3 => Some(GpuType::IVec3),
        glow::INT_VEC4 => Some(GpuType::IVec4),
        glow::UNSIGNED_INT => Some(GpuType::UInt),
        glow::BOOL => Some(GpuType::Bool),
        glow::FLOAT_MAT3 => Some(GpuType::Mat3),
        glow::FLOAT_MAT4 => Some(GpuType::Mat4),
        glow::SAMPLER_2D => Some(GpuType::Sampler2D),
        _ => None,
    }
}

/// Upload one element's value to a location.
pub(crate) unsafe fn apply_value(
    gl: &glow::Context,
    loc: &glow::NativeUniformLocation,
    value: &UniformValue,
) {
    match value {
        UniformValue::Float(x) => gl.uniform_1_f32(Some(loc), *x),
        UniformValue::Vec2([x, y]) => gl.uniform_2_f32(Some(loc), *x, *y),
        UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(Some(loc), *x, *y, *z),
        UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(Some(loc), *x, *y, *z, *w),
        UniformValue::Int(x) => gl.uniform_1_i32(Some(loc), *x),
        UniformValue::IVec2([x, y]) => gl.uniform_2_i32(Some(loc), *x, *y),
        UniformValue::IVec3([x, y, z]) => gl.uniform_3_i32(Some(loc), *x, *y, *z),
        UniformValue::IVec4([x, y, z, w]) => gl.uniform_4_i32(Some(loc), *x, *y, *z, *w),
        UniformValue::UInt(x) => gl.uniform_1_u32(Some(loc), *x),
        UniformValue::Bool(b) => gl.uniform_1_i32(Some(loc), *b as i32),
        UniformValue::Mat3(m) => gl.uniform_matrix_3_f32_slice(Some(loc), false, m),
        UniformValue::Mat4(m) => gl.uniform_matrix_4_f32_slice(Some(loc), false, m),
    }
}

/// Upload a builtin's current value from the frame inputs.
pub(crate) unsafe fn apply_builtin(
    gl: &glow::Context,
    loc: &glow::NativeUniformLocation,
    kind: BuiltinKind,
    ty: GpuType,
    inputs: &FrameInputs,
) {
    if let Some(value) = builtin_value(kind, ty, inputs) {
        apply_value(gl, loc, &value);
    }
}
