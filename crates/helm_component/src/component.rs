//! Core [`Component`] trait and the closed set of component kinds.
//!
//! Component types are registered by name at startup (see
//! [`ComponentRegistry`](crate::ComponentRegistry)) but dispatched at runtime
//! through [`ComponentKind`] and [`ComponentData`], a closed enumeration with
//! one variant per schema. The store never holds a value that did not pass
//! through [`Component::check`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::schema::*;
use crate::validate::Validate;

/// The core component trait.
///
/// Every schema struct implements it through the `components!` table below.
/// Fields default through serde, so a partial payload is merged with the
/// type's defaults during deserialisation, and `deny_unknown_fields` keeps
/// type-confused payloads out.
pub trait Component:
    Validate + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The kind tag for this component type.
    const KIND: ComponentKind;

    /// Borrow this type out of a type-erased component value.
    fn from_data(data: &ComponentData) -> Option<&Self>;

    /// Mutably borrow this type out of a type-erased component value.
    fn from_data_mut(data: &mut ComponentData) -> Option<&mut Self>;

    /// Wrap this value in the type-erased enum.
    fn into_data(self) -> ComponentData;

    /// The registry name (e.g. `"isTorpedoLauncher"`).
    fn type_name() -> &'static str {
        Self::KIND.name()
    }

    /// Run the schema's range checks, attributing failures to this component.
    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
            .map_err(|e| ValidationError::new(Self::type_name(), e.to_string()))
    }

    /// Deserialise and validate a JSON payload. Missing fields take their
    /// defaults; `null` is treated as an empty object.
    fn from_json(value: Value) -> Result<Self, ValidationError> {
        let value = match value {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        if !value.is_object() {
            return Err(ValidationError::new(
                Self::type_name(),
                "expected JSON object",
            ));
        }
        let component: Self = serde_json::from_value(value)
            .map_err(|e| ValidationError::new(Self::type_name(), e.to_string()))?;
        component.check()?;
        Ok(component)
    }

    /// The default value set, as JSON.
    fn defaults() -> Value {
        serde_json::to_value(Self::default()).unwrap_or(Value::Null)
    }
}

macro_rules! components {
    ($($variant:ident => $ty:ty, $name:literal;)*) => {
        /// Every component type known at compile time.
        ///
        /// Serialises as the registry name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum ComponentKind {
            $($variant,)*
        }

        impl ComponentKind {
            /// All kinds, in declaration order.
            pub const ALL: &'static [ComponentKind] = &[$(ComponentKind::$variant,)*];

            /// The registry name of this kind.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(ComponentKind::$variant => $name,)*
                }
            }

            /// Look a kind up by its registry name.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(ComponentKind::$variant),)*
                    _ => None,
                }
            }
        }

        /// A validated component value of any kind.
        #[derive(Debug, Clone, PartialEq)]
        pub enum ComponentData {
            $($variant($ty),)*
        }

        impl ComponentData {
            /// The kind of the contained value.
            #[must_use]
            pub fn kind(&self) -> ComponentKind {
                match self {
                    $(ComponentData::$variant(_) => ComponentKind::$variant,)*
                }
            }

            /// Serialise the contained value to JSON.
            pub fn to_json(&self) -> Result<Value, serde_json::Error> {
                match self {
                    $(ComponentData::$variant(c) => serde_json::to_value(c),)*
                }
            }

            /// Deserialise and validate a payload of the given kind.
            pub fn from_json(kind: ComponentKind, value: Value) -> Result<Self, ValidationError> {
                match kind {
                    $(ComponentKind::$variant => <$ty as Component>::from_json(value).map(ComponentData::$variant),)*
                }
            }

            /// Re-run the range checks on the contained value.
            pub fn validate(&self) -> Result<(), ValidationError> {
                match self {
                    $(ComponentData::$variant(c) => c.check(),)*
                }
            }
        }

        $(
            impl Component for $ty {
                const KIND: ComponentKind = ComponentKind::$variant;

                fn from_data(data: &ComponentData) -> Option<&Self> {
                    match data {
                        ComponentData::$variant(c) => Some(c),
                        _ => None,
                    }
                }

                fn from_data_mut(data: &mut ComponentData) -> Option<&mut Self> {
                    match data {
                        ComponentData::$variant(c) => Some(c),
                        _ => None,
                    }
                }

                fn into_data(self) -> ComponentData {
                    ComponentData::$variant(self)
                }
            }
        )*
    };
}

components! {
    Identity => Identity, "identity";
    Tags => Tags, "tags";
    Position => Position, "position";
    Velocity => Velocity, "velocity";
    Rotation => Rotation, "rotation";
    RotationVelocity => RotationVelocity, "rotationVelocity";
    IsShip => IsShip, "isShip";
    IsShipSystem => IsShipSystem, "isShipSystem";
    IsImpulseEngines => IsImpulseEngines, "isImpulseEngines";
    Hull => Hull, "hull";
    Shields => Shields, "shields";
    IsWaypoint => IsWaypoint, "isWaypoint";
    Autopilot => Autopilot, "autopilot";
    IsDestroyed => IsDestroyed, "isDestroyed";
    PhysicsWorld => PhysicsWorld, "physicsWorld";
    PhysicsHandles => PhysicsHandles, "physicsHandles";
    IsTorpedo => IsTorpedo, "isTorpedo";
    IsTorpedoLauncher => IsTorpedoLauncher, "isTorpedoLauncher";
    IsTimeline => IsTimeline, "isTimeline";
    IsTimelineStep => IsTimelineStep, "isTimelineStep";
    IsTrigger => IsTrigger, "isTrigger";
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
