//! Compile error and warning types.
//!
//! Every pipeline stage returns `Result<_, CompileError>`. The driver stores
//! the first error on the spec and releases everything built so far; callers
//! read it back through `ModelSpec::last_error`. Warnings reuse the same
//! record with `is_warning` set and never fail a compile.

use sim_model::ObjectType;
use thiserror::Error;

/// Failure taxonomy. The class is diagnostic only; recovery is always
/// "fix the spec and recompile".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed spec input: missing name, empty size, duplicate name,
    /// invalid enum value.
    ParseOrSpec,
    /// Dangling or wrong-kind cross-reference, repeated object in a tuple.
    Reference,
    /// Degenerate geometry: zero axis, negative or NaN size, incompatible
    /// fromto, flat inertia.
    Geometry,
    /// Physically invalid model: negative mass, triangle inequality
    /// violation, free joint misuse.
    Physical,
    /// Asset loading failure: missing file, decode error, dimension
    /// mismatch, unsupported content.
    Asset,
    /// Unknown plugin, missing attribute, or capability mismatch.
    Plugin,
    /// Error propagated from the physics-engine subcall.
    Engine,
    /// Invariant breakage inside the compiler. Should not occur.
    Internal,
}

/// The entity a failure is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Entity kind.
    pub kind: ObjectType,
    /// Entity name, possibly empty.
    pub name: String,
    /// Entity id within its kind.
    pub id: usize,
}

/// A structured compile failure (or stored warning).
#[derive(Debug, Clone, Error)]
#[error("{}", self.render())]
pub struct CompileError {
    /// Failure class.
    pub kind: ErrorKind,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// The offending entity, when one can be named.
    pub object: Option<ObjectRef>,
    /// True for warnings stored alongside a successful compile.
    pub is_warning: bool,
}

impl CompileError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            object: None,
            is_warning: false,
        }
    }

    /// Malformed spec input.
    pub fn spec(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseOrSpec, message)
    }

    /// Dangling or wrong-kind reference.
    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reference, message)
    }

    /// Degenerate geometry.
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Geometry, message)
    }

    /// Physically invalid model.
    pub fn physical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Physical, message)
    }

    /// Asset loading failure.
    pub fn asset(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Asset, message)
    }

    /// Plugin resolution failure.
    pub fn plugin(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Plugin, message)
    }

    /// Engine subcall failure.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Engine, message)
    }

    /// Compiler invariant breakage. SHOULD NOT OCCUR.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach the offending entity.
    #[must_use]
    pub fn with_object(mut self, kind: ObjectType, name: impl Into<String>, id: usize) -> Self {
        self.object = Some(ObjectRef {
            kind,
            name: name.into(),
            id,
        });
        self
    }

    /// Convert into a stored warning record.
    #[must_use]
    pub fn into_warning(mut self) -> Self {
        self.is_warning = true;
        self
    }

    fn render(&self) -> String {
        let label = if self.is_warning { "Warning" } else { "Error" };
        match &self.object {
            Some(obj) => format!(
                "{label}: {}\nObject name={}, id={}, {:?}",
                self.message, obj.name, obj.id, obj.kind
            ),
            None => format!("{label}: {}", self.message),
        }
    }
}

/// Result alias for compile operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Orientation resolution failures. Carriers of these tags wrap them with the
/// offending entity via [`CompileError::with_object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrientationError {
    /// Axis-angle axis shorter than the degeneracy threshold.
    #[error("axisangle axis too small")]
    AxisTooSmall,
    /// Y axis collapses after orthogonalization against X.
    #[error("xyaxes y axis too small after orthogonalization")]
    YAxisTooSmall,
    /// X axis of an xyaxes pair is degenerate.
    #[error("xyaxes cross product too small")]
    CrossTooSmall,
    /// Z-axis direction shorter than the degeneracy threshold.
    #[error("zaxis direction too small")]
    ZAxisTooSmall,
    /// Euler sequence contains a character outside `xyzXYZ`.
    #[error("euler sequence must use characters from \"xyzXYZ\"")]
    EulerSequence,
}

impl From<OrientationError> for CompileError {
    fn from(err: OrientationError) -> Self {
        Self::geometry(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_object_context() {
        let err = CompileError::spec("repeated name 'foo' in geom").with_object(
            ObjectType::Geom,
            "foo",
            3,
        );
        let text = err.to_string();
        assert!(text.starts_with("Error: repeated name 'foo' in geom"));
        assert!(text.contains("Object name=foo, id=3"));
    }

    #[test]
    fn warning_label() {
        let warn = CompileError::engine("soft limit exceeded").into_warning();
        assert!(warn.to_string().starts_with("Warning:"));
        assert!(warn.is_warning);
    }

    #[test]
    fn orientation_tags_convert_to_geometry() {
        let err: CompileError = OrientationError::AxisTooSmall.into();
        assert_eq!(err.kind, ErrorKind::Geometry);
    }
}
