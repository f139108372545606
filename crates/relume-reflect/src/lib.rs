#![forbid(unsafe_code)]

//! Uniform reflection model: classification, the builtin table, the sampler
//! binding-comment protocol, and value migration across rebuilds.
//!
//! This crate is GL-free. The runtime backend enumerates a program's active
//! uniforms and reads back defaults; everything string-shaped and rule-shaped
//! lives here so it can be tested without a context. All name/comment
//! matching funnels through [`classify_uniform`] and
//! [`parse_binding_comment`].
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

mod binding;
mod builtin;
mod scan;
mod store;
mod value;

pub use binding::{parse_binding_comment, SamplerBinding, TextureBinding};
pub use builtin::{builtin_for, builtin_value, BuiltinKind};
pub use scan::{base_name, first_occurrence, occurrence_key, sampler_comment};
pub use store::{SharedUniforms, StoredValue, ValueStore};
pub use value::{GpuType, UniformValue};

/// What one active uniform turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformClass {
    /// Bound to a live system value; not user-editable.
    Builtin(BuiltinKind),
    /// A sampler; `None` means no usable binding comment was found and the
    /// unit stays unbound (warned, not fatal).
    Sampler(Option<SamplerBinding>),
    /// User-editable numeric/bool/matrix value.
    Value(GpuType),
}

/// Classify one active uniform against the flattened source it came from.
/// First match wins: builtin table, then sampler protocol, then plain value.
pub fn classify_uniform(name: &str, ty: GpuType, flattened: &str) -> UniformClass {
    if let Some(kind) = builtin_for(name, ty) {
        return UniformClass::Builtin(kind);
    }
    if ty.is_sampler() {
        let binding = sampler_comment(flattened, name).and_then(parse_binding_comment);
        return UniformClass::Sampler(binding);
    }
    UniformClass::Value(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
#version 330 core
uniform float time;
uniform sampler2D prev; // target feedback
uniform sampler2D loose;
uniform vec3 tint;
";

    #[test]
    fn builtin_table_wins_over_value() {
        assert_eq!(
            classify_uniform("time", GpuType::Float, SOURCE),
            UniformClass::Builtin(BuiltinKind::Time)
        );
    }

    #[test]
    fn builtin_name_at_wrong_type_is_a_plain_value() {
        assert_eq!(
            classify_uniform("time", GpuType::Vec3, SOURCE),
            UniformClass::Value(GpuType::Vec3)
        );
    }

    #[test]
    fn sampler_with_comment_gets_a_binding() {
        match classify_uniform("prev", GpuType::Sampler2D, SOURCE) {
            UniformClass::Sampler(Some(b)) => {
                assert_eq!(b.source, TextureBinding::Target("feedback".to_string()));
            }
            other => panic!("expected bound sampler, got {other:?}"),
        }
    }

    #[test]
    fn sampler_without_comment_is_unbound() {
        assert_eq!(
            classify_uniform("loose", GpuType::Sampler2D, SOURCE),
            UniformClass::Sampler(None)
        );
    }

    #[test]
    fn everything_else_is_a_value() {
        assert_eq!(
            classify_uniform("tint", GpuType::Vec3, SOURCE),
            UniformClass::Value(GpuType::Vec3)
        );
    }
}
