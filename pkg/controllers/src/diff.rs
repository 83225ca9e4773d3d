use std::collections::BTreeMap;
use std::fmt;

use pkg_types::secret::Secret;

/// Why an existing Secret is out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    VersionId,
    Labels,
    Annotations,
    /// Owned by an earlier declaration with the same name.
    Owner,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::VersionId => write!(f, "versionId"),
            ChangeReason::Labels => write!(f, "labels"),
            ChangeReason::Annotations => write!(f, "annotations"),
            ChangeReason::Owner => write!(f, "ownerReference"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Create,
    Update(Vec<ChangeReason>),
    Noop,
}

/// Decide what to do with the Secret currently in the cluster.
///
/// Only the recorded `AWSVersionId`, labels, annotations and the owner
/// reference take part in the comparison. Values, `type` and keys other
/// than the anchor are never inspected, so edits to them are not reverted
/// until the anchor moves.
pub fn decide(desired: &Secret, current: Option<&Secret>) -> Decision {
    let Some(current) = current else {
        return Decision::Create;
    };

    let mut reasons = Vec::new();
    if current.version_anchor() != desired.version_anchor() {
        reasons.push(ChangeReason::VersionId);
    }
    if !same_map(&current.labels, &desired.labels) {
        reasons.push(ChangeReason::Labels);
    }
    if !same_map(&current.annotations, &desired.annotations) {
        reasons.push(ChangeReason::Annotations);
    }
    if current.owner_ref != desired.owner_ref {
        reasons.push(ChangeReason::Owner);
    }

    if reasons.is_empty() {
        Decision::Noop
    } else {
        Decision::Update(reasons)
    }
}

/// An absent map and an empty map are the same thing.
fn same_map(a: &Option<BTreeMap<String, String>>, b: &Option<BTreeMap<String, String>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (Some(m), None) | (None, Some(m)) => m.is_empty(),
        (None, None) => true,
    }
}
