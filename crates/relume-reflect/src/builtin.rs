//! The fixed builtin-uniform table.
//!
//! A uniform is a builtin only when both its name and its declared type
//! match a table row; `uniform vec3 time;` is an ordinary user value.

use relume_core::FrameInputs;

use crate::value::{GpuType, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Time,
    Frame,
    Resolution,
    View,
    Mouse,
    Click,
}

impl BuiltinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinKind::Time => "time",
            BuiltinKind::Frame => "frame",
            BuiltinKind::Resolution => "resolution",
            BuiltinKind::View => "view",
            BuiltinKind::Mouse => "mouse",
            BuiltinKind::Click => "click",
        }
    }
}

/// Table lookup; name and type must both match.
pub fn builtin_for(name: &str, ty: GpuType) -> Option<BuiltinKind> {
    let kind = match (name, ty) {
        ("time", GpuType::Float) => BuiltinKind::Time,
        ("frame", GpuType::Int | GpuType::UInt | GpuType::Float) => BuiltinKind::Frame,
        ("resolution", GpuType::Vec2 | GpuType::IVec2) => BuiltinKind::Resolution,
        ("view", GpuType::Mat4) => BuiltinKind::View,
        ("mouse", GpuType::Vec2 | GpuType::Vec4) => BuiltinKind::Mouse,
        ("click", GpuType::Bool | GpuType::Int) => BuiltinKind::Click,
        _ => return None,
    };
    Some(kind)
}

/// Live value of a builtin at the declared type. `None` only for (kind, ty)
/// pairs [`builtin_for`] never admits.
pub fn builtin_value(kind: BuiltinKind, ty: GpuType, inputs: &FrameInputs) -> Option<UniformValue> {
    let v = match (kind, ty) {
        (BuiltinKind::Time, GpuType::Float) => UniformValue::Float(inputs.time),
        (BuiltinKind::Frame, GpuType::Int) => UniformValue::Int(inputs.frame as i32),
        (BuiltinKind::Frame, GpuType::UInt) => UniformValue::UInt(inputs.frame as u32),
        (BuiltinKind::Frame, GpuType::Float) => UniformValue::Float(inputs.frame as f32),
        (BuiltinKind::Resolution, GpuType::Vec2) => {
            UniformValue::Vec2([inputs.width as f32, inputs.height as f32])
        }
        (BuiltinKind::Resolution, GpuType::IVec2) => {
            UniformValue::IVec2([inputs.width, inputs.height])
        }
        (BuiltinKind::View, GpuType::Mat4) => UniformValue::Mat4(inputs.view),
        (BuiltinKind::Mouse, GpuType::Vec2) => {
            UniformValue::Vec2([inputs.mouse[0], inputs.mouse[1]])
        }
        (BuiltinKind::Mouse, GpuType::Vec4) => UniformValue::Vec4(inputs.mouse),
        (BuiltinKind::Click, GpuType::Bool) => UniformValue::Bool(inputs.click),
        (BuiltinKind::Click, GpuType::Int) => UniformValue::Int(inputs.click as i32),
        _ => return None,
    };
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_requires_name_and_type() {
        assert_eq!(builtin_for("time", GpuType::Float), Some(BuiltinKind::Time));
        assert_eq!(builtin_for("time", GpuType::Vec3), None);
        assert_eq!(builtin_for("times", GpuType::Float), None);
        assert_eq!(
            builtin_for("resolution", GpuType::IVec2),
            Some(BuiltinKind::Resolution)
        );
        assert_eq!(builtin_for("view", GpuType::Mat4), Some(BuiltinKind::View));
        assert_eq!(builtin_for("view", GpuType::Mat3), None);
    }

    #[test]
    fn frame_binds_at_every_admitted_type() {
        let mut inputs = FrameInputs::default();
        inputs.frame = 41;

        assert_eq!(
            builtin_value(BuiltinKind::Frame, GpuType::Int, &inputs),
            Some(UniformValue::Int(41))
        );
        assert_eq!(
            builtin_value(BuiltinKind::Frame, GpuType::Float, &inputs),
            Some(UniformValue::Float(41.0))
        );
        assert_eq!(builtin_value(BuiltinKind::Frame, GpuType::Vec2, &inputs), None);
    }

    #[test]
    fn mouse_vec2_is_position_vec4_adds_last_click() {
        let mut inputs = FrameInputs::default();
        inputs.mouse = [10.0, 20.0, 3.0, 4.0];

        assert_eq!(
            builtin_value(BuiltinKind::Mouse, GpuType::Vec2, &inputs),
            Some(UniformValue::Vec2([10.0, 20.0]))
        );
        assert_eq!(
            builtin_value(BuiltinKind::Mouse, GpuType::Vec4, &inputs),
            Some(UniformValue::Vec4([10.0, 20.0, 3.0, 4.0]))
        );
    }

    #[test]
    fn resolution_tracks_frame_inputs() {
        let mut inputs = FrameInputs::default();
        inputs.width = 1280;
        inputs.height = 720;

        assert_eq!(
            builtin_value(BuiltinKind::Resolution, GpuType::Vec2, &inputs),
            Some(UniformValue::Vec2([1280.0, 720.0]))
        );
        assert_eq!(
            builtin_value(BuiltinKind::Resolution, GpuType::IVec2, &inputs),
            Some(UniformValue::IVec2([1280, 720]))
        );
    }
}
