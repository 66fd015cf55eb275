//! Descriptor tables for logical configuration shapes
//!
//! Every shape that takes part in structural comparison is registered once at
//! startup with the list of accessors it exposes. Only accessors that are part
//! of the configuration surface are walked by the comparator.

use std::collections::HashMap;

/// Whether a shape is a recognised configuration shape
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    /// Root configuration mapping
    Mapping,
    /// Nested configuration group
    Group,
    /// Not marked as configuration; never compared structurally
    Plain,
}

impl ShapeKind {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ShapeKind::Mapping | ShapeKind::Group)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// One accessor of a shape
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessorDescriptor {
    pub name: String,
    pub arity: usize,
    pub is_static: bool,
    pub is_transient: bool,
    pub visibility: Visibility,
    /// Declared by the implementation rather than the configuration shape
    pub incidental: bool,
}

impl AccessorDescriptor {
    /// Zero-argument public configuration accessor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: 0,
            is_static: false,
            is_transient: false,
            visibility: Visibility::Public,
            incidental: false,
        }
    }

    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn transient(mut self) -> Self {
        self.is_transient = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn incidental(mut self) -> Self {
        self.incidental = true;
        self
    }

    /// True if the accessor belongs to the compared configuration surface
    pub fn is_configuration(&self) -> bool {
        self.arity == 0
            && !self.is_static
            && !self.is_transient
            && self.visibility != Visibility::Private
            && !self.incidental
    }
}

/// Declared accessor surface of a logical shape
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeDescriptor {
    pub name: String,
    pub kind: ShapeKind,
    accessors: Vec<AccessorDescriptor>,
}

impl ShapeDescriptor {
    pub fn new(name: impl Into<String>, kind: ShapeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            accessors: Vec::new(),
        }
    }

    pub fn mapping(name: impl Into<String>) -> Self {
        Self::new(name, ShapeKind::Mapping)
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, ShapeKind::Group)
    }

    /// Add a plain configuration accessor (fluent API)
    pub fn accessor(self, name: impl Into<String>) -> Self {
        self.with(AccessorDescriptor::new(name))
    }

    /// Add a fully described accessor (fluent API)
    pub fn with(mut self, accessor: AccessorDescriptor) -> Self {
        self.accessors.push(accessor);
        self
    }

    pub fn accessors(&self) -> &[AccessorDescriptor] {
        &self.accessors
    }

    /// Accessors walked by the comparator, in declaration order
    pub fn configuration_accessors(&self) -> impl Iterator<Item = &AccessorDescriptor> {
        self.accessors.iter().filter(|a| a.is_configuration())
    }
}

/// Startup-time table of every comparable shape
#[derive(Clone, Debug, Default)]
pub struct ShapeRegistry {
    shapes: HashMap<String, ShapeDescriptor>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape, replacing any earlier descriptor of the same name
    pub fn register(&mut self, shape: ShapeDescriptor) {
        let name = shape.name.clone();
        if self.shapes.insert(name.clone(), shape).is_some() {
            tracing::debug!(shape = %name, "Replaced configuration shape descriptor");
        }
    }

    /// Register a shape (fluent API)
    pub fn with_shape(mut self, shape: ShapeDescriptor) -> Self {
        self.register(shape);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ShapeDescriptor> {
        self.shapes.get(name)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_accessor_filter() {
        let shape = ShapeDescriptor::mapping("datasource")
            .accessor("url")
            .with(AccessorDescriptor::new("connection").with_arity(1))
            .with(AccessorDescriptor::new("DEFAULT").as_static())
            .with(AccessorDescriptor::new("cache").transient())
            .with(AccessorDescriptor::new("secret").private())
            .with(AccessorDescriptor::new("toString").incidental())
            .accessor("port");

        let walked: Vec<&str> = shape.configuration_accessors().map(|a| a.name.as_str()).collect();
        assert_eq!(walked, vec!["url", "port"]);
        assert_eq!(shape.accessors().len(), 7);
    }

    #[test]
    fn test_registry_lookup_and_replace() {
        let mut registry = ShapeRegistry::new().with_shape(ShapeDescriptor::group("pool").accessor("size"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("pool").unwrap().accessors().len(), 1);

        registry.register(ShapeDescriptor::group("pool").accessor("size").accessor("idle"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("pool").unwrap().accessors().len(), 2);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_plain_shapes_are_not_configuration() {
        assert!(ShapeKind::Mapping.is_configuration());
        assert!(ShapeKind::Group.is_configuration());
        assert!(!ShapeKind::Plain.is_configuration());
    }
}
