/// Component schema registry: the named set of component types a flight
/// accepts, with their defaults and validators.
///
/// Registration is open at startup (`define::<T>()`); dispatch afterwards is
/// closed over [`ComponentKind`]. Anything that refers to components by name
/// resolves the name here, so an unknown name fails at the boundary instead
/// of deep inside a tick.
use std::collections::BTreeMap;

use serde_json::Value;

use crate::component::{Component, ComponentData, ComponentKind};
use crate::error::{RegistryError, ValidationError};
use crate::schema::*;

/// A registered component type.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub kind: ComponentKind,
    pub name: &'static str,
    defaults: fn() -> Value,
    validate: fn(Value) -> Result<ComponentData, ValidationError>,
}

impl ComponentDef {
    fn of<T: Component>() -> Self {
        Self {
            kind: T::KIND,
            name: T::type_name(),
            defaults: T::defaults,
            validate: |value| T::from_json(value).map(T::into_data),
        }
    }

    /// The default value set, as JSON.
    #[must_use]
    pub fn defaults(&self) -> Value {
        (self.defaults)()
    }

    /// Validate a payload and merge it with the defaults.
    pub fn validate(&self, data: Value) -> Result<ComponentData, ValidationError> {
        (self.validate)(data)
    }

    /// A tag component carries no fields.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.defaults().as_object().is_some_and(|o| o.is_empty())
    }
}

/// Registry of all component types known to a flight.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    defs: BTreeMap<&'static str, ComponentDef>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in component type.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.define_all();
        registry
    }

    fn define_all(&mut self) {
        // Cannot collide on an empty registry.
        let _ = self.define::<Identity>();
        let _ = self.define::<Tags>();
        let _ = self.define::<Position>();
        let _ = self.define::<Velocity>();
        let _ = self.define::<Rotation>();
        let _ = self.define::<RotationVelocity>();
        let _ = self.define::<IsShip>();
        let _ = self.define::<IsShipSystem>();
        let _ = self.define::<IsImpulseEngines>();
        let _ = self.define::<Hull>();
        let _ = self.define::<Shields>();
        let _ = self.define::<IsWaypoint>();
        let _ = self.define::<Autopilot>();
        let _ = self.define::<IsDestroyed>();
        let _ = self.define::<PhysicsWorld>();
        let _ = self.define::<PhysicsHandles>();
        let _ = self.define::<IsTorpedo>();
        let _ = self.define::<IsTorpedoLauncher>();
        let _ = self.define::<IsTimeline>();
        let _ = self.define::<IsTimelineStep>();
        let _ = self.define::<IsTrigger>();
    }

    /// Register a component type under its name.
    pub fn define<T: Component>(&mut self) -> Result<(), RegistryError> {
        let def = ComponentDef::of::<T>();
        if self.defs.contains_key(def.name) {
            return Err(RegistryError::DuplicateComponent(def.name.to_string()));
        }
        self.defs.insert(def.name, def);
        Ok(())
    }

    /// Get a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentDef> {
        self.defs.get(name)
    }

    /// Resolve a name to its kind.
    pub fn kind_of(&self, name: &str) -> Result<ComponentKind, RegistryError> {
        self.get(name)
            .map(|d| d.kind)
            .ok_or_else(|| RegistryError::UnknownComponentType(name.to_string()))
    }

    /// Returns `true` if the kind has been registered.
    #[must_use]
    pub fn is_registered(&self, kind: ComponentKind) -> bool {
        self.defs.contains_key(kind.name())
    }

    /// Fail unless every kind in `kinds` is registered. Called at startup by
    /// whatever declares static component dependencies.
    pub fn require(&self, required_by: &str, kinds: &[ComponentKind]) -> Result<(), RegistryError> {
        match kinds.iter().find(|k| !self.is_registered(**k)) {
            Some(kind) => Err(RegistryError::MissingComponent {
                component: kind.name().to_string(),
                required_by: required_by.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Validate `data` against the named component's schema.
    pub fn validate(&self, name: &str, data: Value) -> Result<ComponentData, RegistryError> {
        let def = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownComponentType(name.to_string()))?;
        Ok(def.validate(data)?)
    }

    /// Default values for the named component.
    pub fn defaults(&self, name: &str) -> Result<Value, RegistryError> {
        self.get(name)
            .map(ComponentDef::defaults)
            .ok_or_else(|| RegistryError::UnknownComponentType(name.to_string()))
    }

    /// All registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.defs.keys().copied().collect()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` if no component type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Describe the registry for clients: every component with its defaults.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "components": self.defs.values().map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "isTag": d.is_tag(),
                    "defaults": d.defaults(),
                })
            }).collect::<Vec<_>>(),
        })
    }
}
