//! Coindexation classes.
//!
//! A coindex class groups category occurrences that share a semantic head.
//! Classes live in a [`CoindexArena`] owned by a single parse or build
//! context and are addressed by small integer ids, so independent parses
//! never observe each other's classes.
//!
//! Merging is a disjoint-set union: the surviving root absorbs the head
//! indices and child links of the other class. Ids stored in categories are
//! always resolved through [`CoindexArena::root`] before their heads are read.

use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a coindex class inside one [`CoindexArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct ClassNode {
    parent: u32,
    heads: BTreeSet<usize>,
    children: Vec<ClassId>,
}

#[derive(Debug, Clone, Default)]
pub struct CoindexArena {
    nodes: Vec<ClassNode>,
}

impl CoindexArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh class with no heads.
    pub fn fresh(&mut self) -> ClassId {
        let id = self.nodes.len() as u32;
        self.nodes.push(ClassNode {
            parent: id,
            heads: BTreeSet::new(),
            children: Vec::new(),
        });
        ClassId(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Representative of `id` without compressing the path.
    pub fn root(&self, id: ClassId) -> ClassId {
        let mut current = id.0;
        while self.nodes[current as usize].parent != current {
            current = self.nodes[current as usize].parent;
        }
        ClassId(current)
    }

    /// Representative of `id`, compressing the path on the way back.
    pub fn find(&mut self, id: ClassId) -> ClassId {
        let root = self.root(id);
        let mut current = id.0;
        while current != root.0 {
            let next = self.nodes[current as usize].parent;
            self.nodes[current as usize].parent = root.0;
            current = next;
        }
        root
    }

    /// Merges the classes of `a` and `b`; the root of `a` survives.
    pub fn union(&mut self, a: ClassId, b: ClassId) -> ClassId {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let absorbed = std::mem::take(&mut self.nodes[rb.index()].heads);
        let children = std::mem::take(&mut self.nodes[rb.index()].children);
        self.nodes[rb.index()].parent = ra.0;
        let survivor = &mut self.nodes[ra.index()];
        survivor.heads.extend(absorbed);
        for child in children {
            if !survivor.children.contains(&child) {
                survivor.children.push(child);
            }
        }
        ra
    }

    /// Records `child` as a contributor of `parent`, copying its heads.
    pub fn attach(&mut self, parent: ClassId, child: ClassId) {
        let parent = self.find(parent);
        let child_root = self.find(child);
        if parent == child_root {
            return;
        }
        let heads: Vec<usize> = self.nodes[child_root.index()].heads.iter().copied().collect();
        let node = &mut self.nodes[parent.index()];
        node.heads.extend(heads);
        if !node.children.contains(&child) {
            node.children.push(child);
        }
    }

    pub fn add_head(&mut self, id: ClassId, head: usize) {
        let root = self.find(id);
        self.nodes[root.index()].heads.insert(head);
    }

    pub fn heads(&self, id: ClassId) -> &BTreeSet<usize> {
        &self.nodes[self.root(id).index()].heads
    }

    pub fn children(&self, id: ClassId) -> &[ClassId] {
        &self.nodes[self.root(id).index()].children
    }

    pub fn same_class(&self, a: ClassId, b: ClassId) -> bool {
        self.root(a) == self.root(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_ids_are_unique() {
        let mut arena = CoindexArena::new();
        let a = arena.fresh();
        let b = arena.fresh();
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_union_merges_heads_transitively() {
        let mut arena = CoindexArena::new();
        let a = arena.fresh();
        let b = arena.fresh();
        let c = arena.fresh();
        arena.add_head(a, 1);
        arena.add_head(b, 2);
        arena.add_head(c, 3);
        arena.union(a, b);
        arena.union(c, b);
        assert!(arena.same_class(a, c));
        assert_eq!(
            arena.heads(b).iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_union_is_commutative() {
        let mut left = CoindexArena::new();
        let mut right = CoindexArena::new();
        for arena in [&mut left, &mut right] {
            let a = arena.fresh();
            let b = arena.fresh();
            arena.add_head(a, 4);
            arena.add_head(b, 7);
        }
        left.union(ClassId(0), ClassId(1));
        right.union(ClassId(1), ClassId(0));
        assert_eq!(left.heads(ClassId(0)), right.heads(ClassId(0)));
    }

    #[test]
    fn test_attach_copies_heads_and_records_child() {
        let mut arena = CoindexArena::new();
        let child = arena.fresh();
        arena.add_head(child, 5);
        let parent = arena.fresh();
        arena.attach(parent, child);
        assert!(arena.heads(parent).contains(&5));
        assert_eq!(arena.children(parent), &[child]);
    }

    #[test]
    fn test_find_compresses_paths() {
        let mut arena = CoindexArena::new();
        let ids: Vec<ClassId> = (0..4).map(|_| arena.fresh()).collect();
        arena.union(ids[0], ids[1]);
        arena.union(ids[1], ids[2]);
        arena.union(ids[2], ids[3]);
        let root = arena.find(ids[3]);
        assert_eq!(root, ids[0]);
        assert_eq!(arena.root(ids[3]), ids[0]);
    }
}
