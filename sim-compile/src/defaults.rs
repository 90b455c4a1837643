//! Default-class table.
//!
//! Defaults form a tree rooted at the implicit "main" class. Inheritance is
//! flattened at insertion: a new class starts as a copy of its parent's
//! bundle, so application to an entity is always a one-level merge. Each
//! entity records the class it was added under; unset entity fields are
//! filled from that class before per-entity compilation.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::spec::actuator::ActuatorParams;
use crate::spec::body::{GeomParams, JointParams, SiteParams};
use crate::spec::constraint::PairParams;
use crate::spec::tendon::TendonParams;

/// One named bundle of per-kind parameter defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultClass {
    /// Class name; "main" for the root.
    pub name: String,
    /// Parent class id; `None` only for the root.
    pub parent: Option<usize>,
    /// Joint defaults.
    pub joint: JointParams,
    /// Geom defaults.
    pub geom: GeomParams,
    /// Site defaults.
    pub site: SiteParams,
    /// Contact-pair defaults.
    pub pair: PairParams,
    /// Tendon defaults.
    pub tendon: TendonParams,
    /// Actuator defaults.
    pub actuator: ActuatorParams,
    /// Mesh scale default.
    pub mesh_scale: Option<Vector3<f64>>,
}

/// The default-class tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultTable {
    classes: Vec<DefaultClass>,
}

impl Default for DefaultTable {
    fn default() -> Self {
        Self {
            classes: vec![DefaultClass {
                name: "main".to_string(),
                ..DefaultClass::default()
            }],
        }
    }
}

impl DefaultTable {
    /// Id of the implicit root class.
    pub const MAIN: usize = 0;

    /// Add a class under `parent`, copying the parent's bundle so later
    /// application never needs to walk the tree.
    pub fn add_class(&mut self, name: impl Into<String>, parent: usize) -> Result<usize> {
        let name = name.into();
        if self.find(&name).is_some() {
            return Err(CompileError::spec(format!(
                "repeated default class name '{name}'"
            )));
        }
        if parent >= self.classes.len() {
            return Err(CompileError::internal(format!(
                "default parent {parent} out of range"
            )));
        }
        let mut class = self.classes[parent].clone();
        class.name = name;
        class.parent = Some(parent);
        self.classes.push(class);
        Ok(self.classes.len() - 1)
    }

    /// Look a class up by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name == name)
    }

    /// Access a class by id.
    #[must_use]
    pub fn class(&self, id: usize) -> &DefaultClass {
        &self.classes[id]
    }

    /// Mutable access, for populating a class after insertion.
    pub fn class_mut(&mut self, id: usize) -> &mut DefaultClass {
        &mut self.classes[id]
    }

    /// Number of classes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Always false: the root class exists from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Resolve the class an entity should use: its explicit class if set,
    /// else the enclosing body's childclass, else main. Unknown names are a
    /// reference error.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        childclass: Option<&str>,
    ) -> Result<&DefaultClass> {
        let name = explicit.or(childclass);
        match name {
            None => Ok(&self.classes[Self::MAIN]),
            Some(n) => self
                .find(n)
                .map(|id| &self.classes[id])
                .ok_or_else(|| CompileError::reference(format!("unknown default class '{n}'"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn child_class_copies_parent_bundle() {
        let mut table = DefaultTable::default();
        table.class_mut(DefaultTable::MAIN).joint.damping = Some(0.5);
        let arm = table.add_class("arm", DefaultTable::MAIN).unwrap();
        // Copied at insertion.
        assert_eq!(table.class(arm).joint.damping, Some(0.5));

        // Child override does not leak back to the parent.
        table.class_mut(arm).joint.damping = Some(1.0);
        assert_eq!(table.class(DefaultTable::MAIN).joint.damping, Some(0.5));
    }

    #[test]
    fn flattening_is_insertion_time() {
        let mut table = DefaultTable::default();
        let arm = table.add_class("arm", DefaultTable::MAIN).unwrap();
        // A later root change is not seen by the already-created child.
        table.class_mut(DefaultTable::MAIN).joint.armature = Some(0.2);
        assert_eq!(table.class(arm).joint.armature, None);
    }

    #[test]
    fn resolve_prefers_explicit_over_childclass() {
        let mut table = DefaultTable::default();
        let a = table.add_class("a", DefaultTable::MAIN).unwrap();
        table.class_mut(a).joint.damping = Some(1.0);
        let b = table.add_class("b", DefaultTable::MAIN).unwrap();
        table.class_mut(b).joint.damping = Some(2.0);

        let resolved = table.resolve(Some("a"), Some("b")).unwrap();
        assert_eq!(resolved.joint.damping, Some(1.0));
        let resolved = table.resolve(None, Some("b")).unwrap();
        assert_eq!(resolved.joint.damping, Some(2.0));
    }

    #[test]
    fn unknown_class_is_a_reference_error() {
        let table = DefaultTable::default();
        assert!(table.resolve(Some("ghost"), None).is_err());
    }

    #[test]
    fn duplicate_class_name_rejected() {
        let mut table = DefaultTable::default();
        table.add_class("arm", DefaultTable::MAIN).unwrap();
        assert!(table.add_class("arm", DefaultTable::MAIN).is_err());
    }
}
