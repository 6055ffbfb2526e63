//! NATS subject hierarchy.
//!
//! Every subject lives under a prefix (default `helm`) so several
//! deployments can share a cluster:
//!
//! | subject | pattern |
//! |---------|---------|
//! | `{prefix}.flight.create` | request/reply |
//! | `{prefix}.flight.stop` | request/reply |
//! | `{prefix}.flight.list` | request/reply |
//! | `{prefix}.query` | request/reply |
//! | `{prefix}.mutate` | request/reply |
//! | `{prefix}.snapshot` | request/reply |
//! | `{prefix}.restore` | request/reply |
//! | `{prefix}.schema` | request/reply |
//! | `{prefix}.events.{flight}.{component}` | broadcast |

use crate::error::NetError;

/// Default root prefix.
pub const DEFAULT_PREFIX: &str = "helm";

/// Event subject segment for changes to an entity itself rather than one of
/// its components.
pub const ENTITY_SEGMENT: &str = "entity";

/// A request/reply operation, named by the subject it arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FlightCreate,
    FlightStop,
    FlightList,
    Query,
    Mutate,
    Snapshot,
    Restore,
    Schema,
}

impl Operation {
    pub const ALL: &'static [Operation] = &[
        Operation::FlightCreate,
        Operation::FlightStop,
        Operation::FlightList,
        Operation::Query,
        Operation::Mutate,
        Operation::Snapshot,
        Operation::Restore,
        Operation::Schema,
    ];

    /// The subject suffix below the prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            Operation::FlightCreate => "flight.create",
            Operation::FlightStop => "flight.stop",
            Operation::FlightList => "flight.list",
            Operation::Query => "query",
            Operation::Mutate => "mutate",
            Operation::Snapshot => "snapshot",
            Operation::Restore => "restore",
            Operation::Schema => "schema",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.suffix() == suffix)
    }
}

/// Subject builder bound to one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subjects {
    prefix: String,
}

impl Default for Subjects {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl Subjects {
    /// A builder for `prefix`, which may itself be dotted (`ship.helm`).
    pub fn new(prefix: impl Into<String>) -> Result<Self, NetError> {
        let prefix = prefix.into();
        for segment in prefix.split('.') {
            check_segment(segment)?;
        }
        Ok(Self { prefix })
    }

    /// The subject prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Subject for one request/reply operation.
    pub fn operation(&self, op: Operation) -> String {
        format!("{}.{}", self.prefix, op.suffix())
    }

    /// Wildcard covering every request/reply operation.
    pub fn requests(&self) -> String {
        format!("{}.>", self.prefix)
    }

    /// `{prefix}.events.{flight}.{component}`
    pub fn event(&self, flight: &str, component: &str) -> String {
        format!("{}.events.{flight}.{component}", self.prefix)
    }

    /// Wildcard covering every event of one flight.
    pub fn flight_events(&self, flight: &str) -> String {
        format!("{}.events.{flight}.*", self.prefix)
    }

    /// Which operation `subject` names, if any. Event subjects and unknown
    /// suffixes give `None`.
    pub fn parse(&self, subject: &str) -> Option<Operation> {
        subject
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(Operation::from_suffix)
    }

    /// The suffix of `subject` below the prefix, for logging unknown
    /// operations.
    pub fn suffix_of<'s>(&self, subject: &'s str) -> &'s str {
        subject
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(subject)
    }

    /// Whether `subject` is one of this prefix's broadcast subjects.
    pub fn is_event(&self, subject: &str) -> bool {
        self.suffix_of(subject).starts_with("events.")
    }
}

fn check_segment(segment: &str) -> Result<(), NetError> {
    let bad = segment.is_empty()
        || segment
            .chars()
            .any(|c| matches!(c, '.' | '*' | '>') || c.is_whitespace());
    if bad {
        Err(NetError::InvalidSubject(segment.to_string()))
    } else {
        Ok(())
    }
}
