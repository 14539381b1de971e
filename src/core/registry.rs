//! # Registry: resources tracked for one owner.
//!
//! Plain map from [`ResourceId`] to the registered resource and its scope. The
//! supervisor guards it with an async `RwLock`; the `closed` flag is flipped
//! under the same write lock as teardown, so a registration either lands before
//! teardown (and is torn down with everything else) or is rejected.
//!
//! ## Rules
//! - Entries keep insertion order for `ids` and `snapshot` (ids are monotonic).
//! - Detached entries are never drained by teardown; they stay until released.

use std::collections::BTreeMap;

use crate::resources::{Resource, ResourceId, Scope};

/// One tracked resource.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub resource: Resource,
    pub scope: Scope,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<ResourceId, Entry>,
    closed: bool,
}

impl Registry {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rejects every later insert. Returns `false` if already closed.
    pub fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    pub fn insert(&mut self, id: ResourceId, resource: Resource, scope: Scope) {
        self.entries.insert(id, Entry { resource, scope });
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<Entry> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    /// Removes and returns every entry with `scope`.
    pub fn drain_scope(&mut self, scope: Scope) -> Vec<(ResourceId, Entry)> {
        let ids: Vec<ResourceId> = self.ids(scope);
        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|e| (id, e)))
            .collect()
    }

    pub fn ids(&self, scope: Scope) -> Vec<ResourceId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.scope == scope)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &Entry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ReferenceHandle, Strength};

    fn handle() -> Resource {
        ReferenceHandle::empty(Strength::Strong).into()
    }

    #[test]
    fn test_drain_scope_leaves_other_scope() {
        let mut reg = Registry::default();
        let (a, b, c) = (ResourceId::next(), ResourceId::next(), ResourceId::next());
        reg.insert(a, handle(), Scope::Bound);
        reg.insert(b, handle(), Scope::Detached);
        reg.insert(c, handle(), Scope::Bound);

        let drained: Vec<ResourceId> = reg.drain_scope(Scope::Bound).into_iter().map(|(id, _)| id).collect();
        assert_eq!(drained, vec![a, c]);
        assert_eq!(reg.ids(Scope::Detached), vec![b]);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_close_once() {
        let mut reg = Registry::default();
        assert!(reg.close());
        assert!(!reg.close());
        assert!(reg.is_closed());
    }
}
