//! Delta classification between a desired and an existing object.

use serde::{Deserialize, Serialize};

/// Semantic equality for one resource kind.
///
/// Implementations compare an explicit list of fields the controller owns and
/// ignore everything the server assigns. They must be reflexive and must not
/// fail; both arguments are always present when called.
pub trait Comparator<T>: Send + Sync {
    fn equal(&self, desired: &T, existing: &T) -> bool;
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> bool + Send + Sync,
{
    fn equal(&self, desired: &T, existing: &T) -> bool {
        self(desired, existing)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Unchanged,
    Added,
    Updated,
    Removed,
}

impl DeltaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaKind::Unchanged => "none",
            DeltaKind::Added => "add",
            DeltaKind::Updated => "update",
            DeltaKind::Removed => "remove",
        }
    }
}

/// Outcome of one comparison. Computed once per pass and consumed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    kind: DeltaKind,
}

impl Delta {
    pub fn kind(&self) -> DeltaKind { self.kind }
    pub fn has_changes(&self) -> bool { self.kind != DeltaKind::Unchanged }
    pub fn is_added(&self) -> bool { self.kind == DeltaKind::Added }
    pub fn is_updated(&self) -> bool { self.kind == DeltaKind::Updated }
    pub fn is_removed(&self) -> bool { self.kind == DeltaKind::Removed }
}

/// Stateless; performs no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaProcessor;

impl DeltaProcessor {
    pub fn new() -> Self { Self }

    pub fn compute_delta<T>(
        &self,
        comparator: &dyn Comparator<T>,
        desired: Option<&T>,
        existing: Option<&T>,
    ) -> Delta {
        let kind = match (desired, existing) {
            (None, None) => DeltaKind::Unchanged,
            (Some(_), None) => DeltaKind::Added,
            (None, Some(_)) => DeltaKind::Removed,
            (Some(d), Some(e)) => {
                if comparator.equal(d, e) { DeltaKind::Unchanged } else { DeltaKind::Updated }
            }
        };
        Delta { kind }
    }
}
