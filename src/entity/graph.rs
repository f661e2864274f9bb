//! # Ownership-tree queries.
//!
//! Upward queries follow the owner chain and cost O(depth). Downward queries
//! walk the subtree with an explicit stack (no recursion), so deep trees are fine.

use std::collections::HashSet;
use std::sync::Arc;

use crate::entity::{Entity, EntityId};

/// True if `candidate` is a strict ancestor of `descendant`.
///
/// Walks the owner chain from `descendant` upwards.
pub fn is_ancestor(descendant: &Entity, candidate: &Entity) -> bool {
    let mut cursor = descendant.owner();
    while let Some(current) = cursor {
        if current.id() == candidate.id() {
            return true;
        }
        cursor = current.owner();
    }
    false
}

/// True if `candidate` is a strict descendant of `ancestor`.
///
/// More expensive than [`is_ancestor`]: it searches the whole subtree of
/// `ancestor` instead of one owner chain. Prefer `is_ancestor(candidate, ancestor)`
/// when the answer is the same.
pub fn is_descendant(ancestor: &Entity, candidate: &Entity) -> bool {
    let mut inspected: HashSet<EntityId> = HashSet::new();
    let mut frontier: Vec<Arc<Entity>> = ancestor.children();

    while !frontier.is_empty() {
        if frontier.iter().any(|e| e.id() == candidate.id()) {
            return true;
        }
        let layer = std::mem::take(&mut frontier);
        for entity in layer {
            if inspected.insert(entity.id()) {
                frontier.extend(entity.children());
            }
        }
        frontier.retain(|e| !inspected.contains(&e.id()));
    }
    false
}

/// Owner chain from the direct owner up to the root.
pub fn ancestors(entity: &Entity) -> Vec<Arc<Entity>> {
    let mut out = Vec::new();
    let mut cursor = entity.owner();
    while let Some(current) = cursor {
        cursor = current.owner();
        out.push(current);
    }
    out
}

/// Topmost entity of the tree containing `entity`.
pub fn root(entity: &Arc<Entity>) -> Arc<Entity> {
    ancestors(entity)
        .pop()
        .unwrap_or_else(|| Arc::clone(entity))
}

/// Strict descendants of `entity` in depth-first pre-order.
pub fn descendants(entity: &Entity) -> Vec<Arc<Entity>> {
    let mut out = Vec::new();
    let mut stack: Vec<Arc<Entity>> = entity.children().into_iter().rev().collect();
    while let Some(current) = stack.pop() {
        stack.extend(current.children().into_iter().rev());
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::ExecutionContext;

    struct Tree {
        root: Arc<Entity>,
        a: Arc<Entity>,
        a1: Arc<Entity>,
        b: Arc<Entity>,
    }

    fn tree() -> Tree {
        let ctx = ExecutionContext::current();
        let root = Entity::builder("Root").build(&ctx);
        let a = Entity::builder("A").build_child_of(&root).unwrap();
        let a1 = Entity::builder("A1").build_child_of(&a).unwrap();
        let b = Entity::builder("B").build_child_of(&root).unwrap();
        Tree { root, a, a1, b }
    }

    #[tokio::test]
    async fn test_ancestor_and_descendant_agree() {
        let t = tree();

        assert!(is_ancestor(&t.a1, &t.root));
        assert!(is_ancestor(&t.a1, &t.a));
        assert!(!is_ancestor(&t.a1, &t.b));
        assert!(!is_ancestor(&t.root, &t.root));

        assert!(is_descendant(&t.root, &t.a1));
        assert!(is_descendant(&t.a, &t.a1));
        assert!(!is_descendant(&t.b, &t.a1));
        assert!(!is_descendant(&t.a1, &t.a1));
    }

    #[tokio::test]
    async fn test_preorder_and_root() {
        let t = tree();

        let ids: Vec<_> = descendants(&t.root).iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![t.a.id(), t.a1.id(), t.b.id()]);
        assert_eq!(root(&t.a1).id(), t.root.id());
        assert_eq!(root(&t.root).id(), t.root.id());

        let chain: Vec<_> = ancestors(&t.a1).iter().map(|e| e.id()).collect();
        assert_eq!(chain, vec![t.a.id(), t.root.id()]);
    }
}
