//! Unification and head wiring.
//!
//! [`unifiable`] is the pure structural test. A [`Wiring`] records, for one
//! combinator application, which class of the result each child class feeds
//! into; the derivation layer reads those links back to fill argument slots.

use super::{Category, ClassId, CoindexArena};
use std::collections::HashMap;

/// Structural compatibility: same slashes everywhere, atomic symbols equal
/// (or `NP` against `N`), and no two conflicting features.
pub fn unifiable(x1: &Category, x2: &Category) -> bool {
    match (x1.parts(), x2.parts()) {
        (Some((d1, r1, a1)), Some((d2, r2, a2))) => {
            d1 == d2 && unifiable(r1, r2) && unifiable(a1, a2)
        }
        (None, None) => {
            let (Some(s1), Some(s2)) = (x1.symbol(), x2.symbol()) else {
                return false;
            };
            let symbols = s1 == s2 || matches!((s1, s2), ("NP", "N") | ("N", "NP"));
            let features = match (x1.feature(), x2.feature()) {
                (Some(f1), Some(f2)) => f1 == f2,
                _ => true,
            };
            symbols && features
        }
        _ => false,
    }
}

/// Unifies two categories. With a wiring, the classes of both inputs are
/// merged and the returned category is coindexed with the merged classes.
pub fn unify(x1: &Category, x2: &Category, wiring: Option<&mut Wiring<'_>>) -> Option<Category> {
    if !unifiable(x1, x2) {
        return None;
    }
    let mut unified = build_unified(x1, x2);
    if let Some(wiring) = wiring {
        wiring.merge_tree(x1, x2);
        wiring.recursive_attach_head(&mut unified, x1);
        wiring.recursive_attach_head(&mut unified, x2);
        wiring.normalize(&mut unified);
    }
    Some(unified)
}

fn build_unified(x1: &Category, x2: &Category) -> Category {
    match (x1.parts(), x2.parts()) {
        (Some((dir, r1, a1)), Some((_, r2, a2))) => {
            Category::functor(build_unified(r1, r2), dir, build_unified(a1, a2))
        }
        _ => {
            let chosen = if x1.feature().is_some() { x1 } else { x2 };
            let mut atom = Category::atomic(
                chosen.symbol().unwrap_or_default(),
                chosen.feature().map(str::to_string),
            );
            atom.set_conj(chosen.is_conj());
            atom
        }
    }
}

/// Class bookkeeping for one combinator application.
#[derive(Debug)]
pub struct Wiring<'a> {
    arena: &'a mut CoindexArena,
    arity_cap: Option<usize>,
    links: HashMap<ClassId, ClassId>,
    features: HashMap<ClassId, (String, String)>,
}

impl<'a> Wiring<'a> {
    pub fn new(arena: &'a mut CoindexArena, arity_cap: Option<usize>) -> Self {
        Self {
            arena,
            arity_cap,
            links: HashMap::new(),
            features: HashMap::new(),
        }
    }

    pub fn arity_cap(&self) -> Option<usize> {
        self.arity_cap
    }

    pub fn arena(&self) -> &CoindexArena {
        &*self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut CoindexArena {
        &mut *self.arena
    }

    /// Current parent class of a child class.
    pub fn link(&mut self, child: ClassId) -> Option<ClassId> {
        let parent = self.links.get(&child).copied()?;
        Some(self.arena.find(parent))
    }

    /// All child-to-parent links, resolved and ordered by child.
    pub fn links(&mut self) -> Vec<(ClassId, ClassId)> {
        let mut pairs: Vec<(ClassId, ClassId)> = self.links.iter().map(|(c, p)| (*c, *p)).collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(child, parent)| (child, self.arena.find(parent)))
            .collect()
    }

    fn union(&mut self, a: ClassId, b: ClassId) -> ClassId {
        let absorbed = self.arena.find(b);
        let root = self.arena.union(a, b);
        if absorbed != root {
            if let Some(feature) = self.features.remove(&absorbed) {
                self.features.entry(root).or_insert(feature);
            }
        }
        root
    }

    fn merge(&mut self, x1: Option<ClassId>, x2: Option<ClassId>) {
        let (Some(c1), Some(c2)) = (x1, x2) else {
            return;
        };
        match (self.link(c1), self.link(c2)) {
            (Some(p1), Some(p2)) => {
                if p1 != p2 {
                    self.union(p1, p2);
                }
            }
            (None, None) => {
                let parent = self.arena.fresh();
                self.arena.attach(parent, c1);
                self.arena.attach(parent, c2);
                self.links.insert(c1, parent);
                self.links.insert(c2, parent);
            }
            (Some(parent), None) => {
                self.arena.attach(parent, c2);
                self.links.insert(c2, parent);
            }
            (None, Some(parent)) => {
                self.arena.attach(parent, c1);
                self.links.insert(c1, parent);
            }
        }
    }

    pub(crate) fn merge_tree(&mut self, x1: &Category, x2: &Category) {
        if let (Some((_, r1, a1)), Some((_, r2, a2))) = (x1.parts(), x2.parts()) {
            self.merge_tree(r1, r2);
            self.merge_tree(a1, a2);
        }
        self.merge(x1.class(), x2.class());
        let featured = [x1, x2].into_iter().find(|x| x.feature().is_some());
        let parent = x1.class().or(x2.class()).and_then(|c| self.link(c));
        if let (Some(atom), Some(parent)) = (featured, parent) {
            if let (Some(symbol), Some(feature)) = (atom.symbol(), atom.feature()) {
                self.features
                    .entry(parent)
                    .or_insert_with(|| (symbol.to_string(), feature.to_string()));
            }
        }
    }

    /// Unifies and merges classes; nothing is recorded on failure.
    pub(crate) fn unify_classes(&mut self, x1: &Category, x2: &Category) -> bool {
        if !unifiable(x1, x2) {
            return false;
        }
        self.merge_tree(x1, x2);
        true
    }

    /// Puts `target` into `class`, or into a fresh class when `class` is
    /// absent and `target` has none yet.
    pub(crate) fn coindex(&mut self, target: &mut Category, class: Option<ClassId>) {
        match (target.class(), class) {
            (None, None) => target.set_class(Some(self.arena.fresh())),
            (Some(_), None) => {}
            (None, Some(class)) => target.set_class(Some(self.arena.find(class))),
            (Some(own), Some(class)) => {
                if own != class {
                    let root = self.union(class, own);
                    target.set_class(Some(root));
                }
            }
        }
    }

    /// Makes `target` the parent of `prev`'s class.
    pub(crate) fn attach_head(&mut self, target: &mut Category, prev: &Category) -> bool {
        let Some(child) = prev.class() else {
            return false;
        };
        let linked = self.link(child);
        self.coindex(target, linked);
        let Some(parent) = target.class() else {
            return false;
        };
        self.arena.attach(parent, child);
        self.links.insert(child, parent);
        true
    }

    /// [`Self::attach_head`] over two trees of the same shape.
    pub(crate) fn recursive_attach_head(&mut self, target: &mut Category, prev: &Category) -> bool {
        if target.depth() != prev.depth() {
            tracing::debug!(target = %target, prev = %prev, "head attachment across different depths");
            return false;
        }
        self.attach_head(target, prev);
        match (target.parts_mut(), prev.parts()) {
            (Some((tr, ta)), Some((_, pr, pa))) => {
                self.recursive_attach_head(tr, pr) && self.recursive_attach_head(ta, pa)
            }
            _ => true,
        }
    }

    /// Mutually coindexes two trees of the same shape.
    pub(crate) fn recursive_coindex(&mut self, a: &mut Category, b: &mut Category) -> bool {
        if a.depth() != b.depth() {
            return false;
        }
        self.coindex(a, b.class());
        self.coindex(b, a.class());
        match (a.parts_mut(), b.parts_mut()) {
            (Some((ar, aa)), Some((br, ba))) => {
                self.recursive_coindex(ar, br) && self.recursive_coindex(aa, ba)
            }
            _ => true,
        }
    }

    /// Copies `child` with every class replaced by its parent class,
    /// creating parents for classes not linked yet.
    pub(crate) fn generate(&mut self, child: &Category) -> Category {
        let mut links = std::mem::take(&mut self.links);
        let generated = self.generate_with(child, &mut links, true);
        self.links = links;
        generated
    }

    /// Like [`Self::generate`] but with private links, so no class of the
    /// copy is shared with the rest of this application.
    pub(crate) fn generate_detached(&mut self, child: &Category) -> Category {
        let mut links = HashMap::new();
        self.generate_with(child, &mut links, false)
    }

    fn generate_with(
        &mut self,
        child: &Category,
        links: &mut HashMap<ClassId, ClassId>,
        propagate: bool,
    ) -> Category {
        let mut out = match child.parts() {
            Some((dir, result, argument)) => {
                let result = self.generate_with(result, links, propagate);
                let argument = self.generate_with(argument, links, propagate);
                Category::functor(result, dir, argument)
            }
            None => Category::atomic(
                child.symbol().unwrap_or_default(),
                child.feature().map(str::to_string),
            ),
        };
        let parent = match child.class() {
            Some(class) => {
                let parent = match links.get(&class).copied() {
                    Some(parent) => self.arena.find(parent),
                    None => self.arena.fresh(),
                };
                self.arena.attach(parent, class);
                links.insert(class, parent);
                parent
            }
            None => self.arena.fresh(),
        };
        out.set_class(Some(parent));
        if propagate && out.is_atomic() && out.feature().is_none() {
            if let Some((symbol, feature)) = self.features.get(&parent) {
                if out.symbol() == Some(symbol.as_str()) {
                    out.set_feature(Some(feature.clone()));
                }
            }
        }
        out
    }

    /// Gives an unwired category its own head class when it has none,
    /// following the pattern table for complex categories.
    pub(crate) fn make_head_from_nowhere(&mut self, target: &mut Category) -> bool {
        if target.is_atomic() {
            self.coindex(target, None);
            return true;
        }
        let key = target.without_features().to_string();
        match super::notation::lookup_pattern(&key) {
            Some(pattern) => {
                super::notation::apply_pattern(pattern, target, &mut *self.arena).is_ok()
            }
            None => false,
        }
    }

    pub(crate) fn normalize(&mut self, category: &mut Category) {
        category.normalize_classes(self.arena);
    }
}
