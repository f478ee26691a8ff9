//! Controller ownership references.

use kube::{Resource, ResourceExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("{kind} owner has no name")]
    MissingName { kind: String },

    #[error("owner {owner} has no uid; it must be persisted before it can own objects")]
    MissingUid { owner: String },

    #[error("{owner} in namespace {owner_namespace} cannot own an object in namespace {namespace}")]
    CrossNamespace { owner: String, owner_namespace: String, namespace: String },

    #[error("{object} is already controlled by {kind} {name}")]
    AlreadyOwned { object: String, kind: String, name: String },
}

/// Stamp `owner` as the controlling owner of `obj` so the API server garbage
/// collects `obj` when `owner` is deleted.
///
/// A reference to the same owner (by uid) is replaced. A different controlling
/// owner is an error.
pub fn set_controller_reference<P, K>(owner: &P, obj: &mut K) -> Result<(), OwnershipError>
where
    P: Resource<DynamicType = ()>,
    K: Resource,
{
    if let Some(owner_ns) = owner.namespace() {
        let ns = obj.namespace().unwrap_or_default();
        if ns != owner_ns {
            return Err(OwnershipError::CrossNamespace { owner: owner.name_any(), owner_namespace: owner_ns, namespace: ns });
        }
    }
    if owner.meta().name.is_none() {
        return Err(OwnershipError::MissingName { kind: P::kind(&()).into_owned() });
    }
    let mut oref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| OwnershipError::MissingUid { owner: owner.name_any() })?;
    oref.block_owner_deletion = Some(true);

    let object = obj.name_any();
    let refs = obj.owner_references_mut();
    if let Some(other) = refs.iter().find(|r| r.controller == Some(true) && r.uid != oref.uid) {
        return Err(OwnershipError::AlreadyOwned { object, kind: other.kind.clone(), name: other.name.clone() });
    }
    refs.retain(|r| r.uid != oref.uid);
    refs.push(oref);
    Ok(())
}
