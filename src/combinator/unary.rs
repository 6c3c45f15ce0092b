use crate::category::{unifiable, Category, Direction, Wiring};
use lazy_static::lazy_static;

lazy_static! {
    static ref NP: Category = Category::atomic("NP", None);
    static ref S: Category = Category::atomic("S", None);
    static ref NP_MODIFIER: Category = Category::functor(NP.clone(), Direction::Backward, NP.clone());
    static ref VP_MODIFIER: Category = {
        let vp = Category::functor(S.clone(), Direction::Backward, NP.clone());
        Category::functor(vp.clone(), Direction::Backward, vp)
    };
}

/// `X => T/(T\X)` or `X => T\(T/X)`; the raised category heads the result.
pub(super) fn type_raising_verify(child: &Category, result: &mut Category, wiring: Option<&mut Wiring<'_>>) -> bool {
    let Some((dir, raised_result, raised_argument)) = result.parts() else {
        return false;
    };
    let Some((inner_dir, inner_result, inner_argument)) = raised_argument.parts() else {
        return false;
    };
    if dir == inner_dir || !unifiable(inner_argument, child) || !unifiable(raised_result, inner_result) {
        return false;
    }
    let Some(w) = wiring else {
        return true;
    };
    let Some((outer_result, outer_argument)) = result.parts_mut() else {
        return false;
    };
    {
        let Some((inner_result, _)) = outer_argument.parts_mut() else {
            return false;
        };
        w.make_head_from_nowhere(inner_result);
        w.recursive_coindex(outer_result, inner_result);
    }
    let inner_head = outer_argument.result().and_then(Category::class);
    w.coindex(outer_argument, inner_head);
    if let Some(inner_argument) = outer_argument.argument_mut() {
        w.recursive_attach_head(inner_argument, child);
    }
    let head = result
        .argument()
        .and_then(Category::argument)
        .and_then(Category::class);
    w.coindex(result, head);
    true
}

pub(super) fn type_changing_simple_verify(
    child: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
) -> bool {
    if result.is_atomic() && child.is_atomic() {
        if let Some(w) = wiring {
            w.attach_head(result, child);
        }
        return true;
    }
    match child.result() {
        Some(child_result) if unifiable(child_result, result) => {
            if let Some(w) = wiring {
                w.recursive_attach_head(result, child_result);
            }
            true
        }
        _ => false,
    }
}

fn is_clausal_predicate(child: &Category) -> bool {
    match child.parts() {
        Some((_, child_result, child_argument)) => unifiable(child_argument, &NP) && unifiable(child_result, &S),
        None => false,
    }
}

/// `S$NP => NP\NP`, the reduced relative clause.
pub(super) fn type_changing_n_verify(child: &Category, result: &mut Category, wiring: Option<&mut Wiring<'_>>) -> bool {
    if !is_clausal_predicate(child) || !unifiable(result, &NP_MODIFIER) {
        return false;
    }
    let (Some(w), Some(child_argument)) = (wiring, child.argument()) else {
        return true;
    };
    w.attach_head(result, child);
    if let Some((result_result, result_argument)) = result.parts_mut() {
        w.attach_head(result_argument, child_argument);
        w.attach_head(result_result, child_argument);
    }
    true
}

/// `S[X]$NP => (S\NP)\(S\NP)`, the adverbial clause.
pub(super) fn type_changing_v_verify(child: &Category, result: &mut Category, wiring: Option<&mut Wiring<'_>>) -> bool {
    if !is_clausal_predicate(child) || !unifiable(result, &VP_MODIFIER) {
        return false;
    }
    let (Some(w), Some(child_argument)) = (wiring, child.argument()) else {
        return true;
    };
    w.attach_head(result, child);
    let Some((modified, modifier_argument)) = result.parts_mut() else {
        return false;
    };
    w.coindex(modified, None);
    let head = modified.class();
    w.coindex(modifier_argument, head);
    if let Some((inner_result, inner_argument)) = modified.parts_mut() {
        w.coindex(inner_result, head);
        w.attach_head(inner_argument, child_argument);
    }
    if let Some((inner_result, inner_argument)) = modifier_argument.parts_mut() {
        w.coindex(inner_result, head);
        w.attach_head(inner_argument, child_argument);
    }
    true
}

pub(super) fn unknown_verify(_child: &Category, result: &mut Category, wiring: Option<&mut Wiring<'_>>) -> bool {
    if let Some(w) = wiring {
        result.fill_blank_classes(w.arena_mut());
    }
    true
}

/// `N => NP`.
pub fn type_change(child: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    if child.symbol() != Some("N") {
        return None;
    }
    let mut result = Category::atomic("NP", None);
    w.attach_head(&mut result, child);
    w.normalize(&mut result);
    Some(result)
}

fn type_raise(child: &Category, target: &Category, dir: Direction, w: &mut Wiring<'_>) -> Option<Category> {
    let mut outer = target.unwired();
    let mut inner = target.unwired();
    w.recursive_coindex(&mut outer, &mut inner);
    let raised = w.generate_detached(child);
    let head = raised.class();
    let argument = Category::functor(inner, dir.flip(), raised);
    let mut result = Category::functor(outer, dir, argument);
    w.coindex(&mut result, head);
    w.normalize(&mut result);
    Some(result)
}

/// `X => T/(T\X)`.
pub fn forward_type_raise(child: &Category, target: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    type_raise(child, target, Direction::Forward, w)
}

/// `X => T\(T/X)`.
pub fn backward_type_raise(child: &Category, target: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    type_raise(child, target, Direction::Backward, w)
}
