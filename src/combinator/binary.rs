use crate::category::{unifiable, Category, Direction, Wiring};

use Direction::{Backward, Forward};

fn spine(category: &Category, levels: usize) -> Option<&Category> {
    (0..levels).try_fold(category, |next, _| next.result())
}

fn spine_mut(category: &mut Category, levels: usize) -> Option<&mut Category> {
    let mut next = category;
    for _ in 0..levels {
        next = next.result_mut()?;
    }
    Some(next)
}

/// Unifies with the wiring when there is one, otherwise only tests.
fn unify_with(x1: &Category, x2: &Category, wiring: &mut Option<&mut Wiring<'_>>) -> bool {
    match wiring {
        Some(w) => w.unify_classes(x1, x2),
        None => unifiable(x1, x2),
    }
}

fn coindex_with_result(result: &mut Category, w: &mut Wiring<'_>) {
    let head = result.result().and_then(Category::class);
    w.coindex(result, head);
}

fn finish(mut result: Category, w: &mut Wiring<'_>) -> Option<Category> {
    w.normalize(&mut result);
    Some(result)
}

fn is_conj_or_punct(category: &Category) -> bool {
    category.is_conjunction_word() || category.is_punctuation()
}

pub(super) fn coordination(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    if unifiable(left, right) {
        w.unify_classes(left, right);
        let mut result = w.generate(left);
        w.attach_head(&mut result, right);
        finish(result, w)
    } else if is_conj_or_punct(left) {
        let mut result = w.generate_detached(right);
        result.set_conj(true);
        finish(result, w)
    } else if is_conj_or_punct(right) {
        let mut result = w.generate_detached(left);
        result.set_conj(true);
        finish(result, w)
    } else {
        None
    }
}

pub(super) fn coordination_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    mut wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    if unifiable(left, right) && unifiable(left, result) && unifiable(right, result) {
        if let Some(w) = wiring {
            w.unify_classes(left, right);
            w.recursive_attach_head(result, left);
            w.recursive_attach_head(result, right);
        }
        return true;
    }
    let conjunct = if is_conj_or_punct(left) {
        right
    } else if is_conj_or_punct(right) {
        left
    } else {
        return false;
    };
    if unifiable(conjunct, result) {
        if let Some(w) = wiring {
            w.recursive_attach_head(result, conjunct);
        }
        return true;
    }
    super::unary::type_changing_simple_verify(conjunct, result, wiring.as_deref_mut())
        || super::unary::type_changing_n_verify(conjunct, result, wiring.as_deref_mut())
        || super::unary::type_changing_v_verify(conjunct, result, wiring)
}

pub(super) fn forward_apply(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    let Some((Forward, functor_result, functor_argument)) = left.parts() else {
        return None;
    };
    if !w.unify_classes(functor_argument, right) {
        return None;
    }
    let result = w.generate(functor_result);
    finish(result, w)
}

pub(super) fn forward_apply_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    mut wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    let Some((Forward, functor_result, functor_argument)) = left.parts() else {
        return false;
    };
    if !unifiable(result, functor_result) || !unify_with(functor_argument, right, &mut wiring) {
        return false;
    }
    match wiring {
        Some(w) => w.recursive_attach_head(result, functor_result),
        None => true,
    }
}

pub(super) fn backward_apply(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    let Some((Backward, functor_result, functor_argument)) = right.parts() else {
        return None;
    };
    if !w.unify_classes(functor_argument, left) {
        return None;
    }
    let result = w.generate(functor_result);
    finish(result, w)
}

pub(super) fn backward_apply_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    mut wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    let Some((Backward, functor_result, functor_argument)) = right.parts() else {
        return false;
    };
    if !unifiable(result, functor_result) || !unify_with(functor_argument, left, &mut wiring) {
        return false;
    }
    match wiring {
        Some(w) => w.recursive_attach_head(result, functor_result),
        None => true,
    }
}

/// Shared construct form of the four first-order compositions.
///
/// `primary` supplies the result, `secondary` the argument, and
/// `primary.argument` must unify with `secondary.result`.
fn compose(
    primary: &Category,
    secondary: &Category,
    primary_dir: Direction,
    secondary_dir: Direction,
    result_dir: Direction,
    w: &mut Wiring<'_>,
) -> Option<Category> {
    let (p_dir, p_result, p_argument) = primary.parts()?;
    let (s_dir, s_result, s_argument) = secondary.parts()?;
    if p_dir != primary_dir || s_dir != secondary_dir {
        return None;
    }
    if !w.unify_classes(p_argument, s_result) {
        return None;
    }
    let result = w.generate(p_result);
    let argument = w.generate(s_argument);
    let mut composed = Category::functor(result, result_dir, argument);
    coindex_with_result(&mut composed, w);
    finish(composed, w)
}

/// Shared verify form of the four first-order compositions.
#[allow(clippy::too_many_arguments)]
fn compose_verify(
    primary: &Category,
    secondary: &Category,
    result: &mut Category,
    primary_dir: Direction,
    secondary_dir: Direction,
    result_dir: Direction,
    mut wiring: Option<&mut Wiring<'_>>,
) -> bool {
    let (Some((p_dir, p_result, p_argument)), Some((s_dir, s_result, s_argument))) =
        (primary.parts(), secondary.parts())
    else {
        return false;
    };
    let Some((r_dir, r_result, r_argument)) = result.parts() else {
        return false;
    };
    if p_dir != primary_dir || s_dir != secondary_dir || r_dir != result_dir {
        return false;
    }
    if !unifiable(r_result, p_result) || !unifiable(r_argument, s_argument) {
        return false;
    }
    if !unify_with(p_argument, s_result, &mut wiring) {
        return false;
    }
    let Some(w) = wiring else {
        return true;
    };
    let Some((r_result, r_argument)) = result.parts_mut() else {
        return false;
    };
    if !w.recursive_attach_head(r_result, p_result) || !w.recursive_attach_head(r_argument, s_argument) {
        return false;
    }
    coindex_with_result(result, w);
    true
}

pub(super) fn simple_forward_compose(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    compose(left, right, Forward, Forward, Forward, w)
}

pub(super) fn simple_forward_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    compose_verify(left, right, result, Forward, Forward, Forward, wiring)
}

pub(super) fn simple_backward_compose(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    compose(right, left, Backward, Backward, Backward, w)
}

pub(super) fn simple_backward_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    compose_verify(right, left, result, Backward, Backward, Backward, wiring)
}

pub(super) fn cross_backward_compose(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    compose(right, left, Backward, Forward, Forward, w)
}

pub(super) fn cross_backward_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    compose_verify(right, left, result, Backward, Forward, Forward, wiring)
}

pub(super) fn cross_forward_compose(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    compose(left, right, Forward, Backward, Backward, w)
}

pub(super) fn cross_forward_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    compose_verify(left, right, result, Forward, Backward, Backward, wiring)
}

fn exceeds_cap(secondary_result: &Category, primary_argument: &Category, arity_cap: Option<usize>) -> bool {
    match arity_cap {
        Some(cap) => secondary_result.depth() > primary_argument.depth() + cap,
        None => false,
    }
}

/// Shared construct form of generalized composition.
///
/// The secondary functor's result spine is descended until its result is
/// no deeper than the primary argument; the arguments passed on the way are
/// re-applied, with their own slashes, around the composed core.
fn generalized_compose(
    primary: &Category,
    secondary: &Category,
    primary_dir: Direction,
    top_dir: Option<Direction>,
    base_dir: Option<Direction>,
    result_dir: Direction,
    w: &mut Wiring<'_>,
) -> Option<Category> {
    let (p_dir, p_result, p_argument) = primary.parts()?;
    let (s_dir, s_result, _) = secondary.parts()?;
    if p_dir != primary_dir || top_dir.is_some_and(|dir| dir != s_dir) {
        return None;
    }
    if exceeds_cap(s_result, p_argument, w.arity_cap()) {
        return None;
    }
    let mut stack = Vec::new();
    let mut next = secondary;
    loop {
        let (_, next_result, _) = next.parts()?;
        if p_argument.depth() >= next_result.depth() {
            break;
        }
        stack.push(next);
        next = next_result;
    }
    let (next_dir, next_result, next_argument) = next.parts()?;
    if base_dir.is_some_and(|dir| dir != next_dir) {
        return None;
    }
    if !w.unify_classes(p_argument, next_result) {
        return None;
    }
    let core_result = w.generate(p_result);
    let core_argument = w.generate(next_argument);
    let mut composed = Category::functor(core_result, result_dir, core_argument);
    coindex_with_result(&mut composed, w);
    while let Some(level) = stack.pop() {
        let (dir, _, argument) = level.parts()?;
        let argument = w.generate(argument);
        composed = Category::functor(composed, dir, argument);
        w.attach_head(&mut composed, level);
    }
    finish(composed, w)
}

/// Shared verify form of generalized composition.
fn generalized_compose_verify(
    primary: &Category,
    secondary: &Category,
    result: &mut Category,
    primary_dir: Direction,
    base_dir: Direction,
    mut wiring: Option<&mut Wiring<'_>>,
    arity_cap: Option<usize>,
) -> bool {
    let Some((p_dir, p_result, p_argument)) = primary.parts() else {
        return false;
    };
    if p_dir != primary_dir || secondary.depth() < 2 {
        return false;
    }
    let Some(s_result) = secondary.result() else {
        return false;
    };
    if p_argument.depth() >= s_result.depth()
        || result.depth() + p_argument.depth() != p_result.depth() + secondary.depth()
        || exceeds_cap(s_result, p_argument, arity_cap)
    {
        return false;
    }

    let mut levels = 0;
    let mut secondary_next = secondary;
    let mut result_next: &Category = result;
    loop {
        let Some((s_dir, s_next_result, s_next_argument)) = secondary_next.parts() else {
            return false;
        };
        if p_argument.depth() >= s_next_result.depth() {
            break;
        }
        let Some((r_dir, r_next_result, r_next_argument)) = result_next.parts() else {
            return false;
        };
        if s_dir != r_dir || !unifiable(r_next_argument, s_next_argument) {
            return false;
        }
        levels += 1;
        secondary_next = s_next_result;
        result_next = r_next_result;
    }
    let (Some((s_dir, s_base_result, s_base_argument)), Some((r_dir, r_base_result, _))) =
        (secondary_next.parts(), result_next.parts())
    else {
        return false;
    };
    if s_dir != base_dir || r_dir != base_dir || !unifiable(r_base_result, p_result) {
        return false;
    }
    if !unify_with(s_base_result, p_argument, &mut wiring) {
        return false;
    }
    let Some(w) = wiring else {
        return true;
    };

    let Some(base) = spine_mut(result, levels) else {
        return false;
    };
    let Some((base_result, base_argument)) = base.parts_mut() else {
        return false;
    };
    if !w.recursive_attach_head(base_result, p_result)
        || !w.recursive_attach_head(base_argument, s_base_argument)
    {
        return false;
    }
    w.attach_head(base, p_result);
    for level in (0..levels).rev() {
        let (Some(node), Some(secondary_level)) = (spine_mut(result, level), spine(secondary, level)) else {
            return false;
        };
        let (Some(node_argument), Some(secondary_argument)) = (node.argument_mut(), secondary_level.argument())
        else {
            return false;
        };
        if !w.recursive_attach_head(node_argument, secondary_argument) {
            return false;
        }
        w.attach_head(node, secondary_level);
    }
    true
}

pub(super) fn generalized_forward_compose(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    generalized_compose(left, right, Forward, Some(Forward), None, Forward, w)
}

pub(super) fn generalized_forward_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    arity_cap: Option<usize>,
) -> bool {
    generalized_compose_verify(left, right, result, Forward, Forward, wiring, arity_cap)
}

pub(super) fn generalized_backward_compose(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    generalized_compose(right, left, Backward, Some(Backward), None, Backward, w)
}

pub(super) fn generalized_backward_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    arity_cap: Option<usize>,
) -> bool {
    generalized_compose_verify(right, left, result, Backward, Backward, wiring, arity_cap)
}

pub(super) fn generalized_forward_cross_compose(
    left: &Category,
    right: &Category,
    w: &mut Wiring<'_>,
) -> Option<Category> {
    generalized_compose(left, right, Forward, None, Some(Backward), Backward, w)
}

pub(super) fn generalized_forward_cross_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    arity_cap: Option<usize>,
) -> bool {
    generalized_compose_verify(left, right, result, Forward, Backward, wiring, arity_cap)
}

pub(super) fn generalized_backward_cross_compose(
    left: &Category,
    right: &Category,
    w: &mut Wiring<'_>,
) -> Option<Category> {
    generalized_compose(right, left, Backward, None, Some(Forward), Forward, w)
}

pub(super) fn generalized_backward_cross_compose_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    arity_cap: Option<usize>,
) -> bool {
    generalized_compose_verify(right, left, result, Backward, Forward, wiring, arity_cap)
}

/// Shared construct form of substitution: `(X|Y)|Z` with `Y|Z` gives `X|Z`,
/// where `main` is the doubly-applied functor.
fn substitute(
    main: &Category,
    other: &Category,
    inner_dir: Direction,
    w: &mut Wiring<'_>,
) -> Option<Category> {
    let (m_dir, m_result, m_argument) = main.parts()?;
    let (o_dir, o_result, o_argument) = other.parts()?;
    let (mr_dir, mr_result, mr_argument) = m_result.parts()?;
    if m_dir != o_dir || mr_dir != inner_dir {
        return None;
    }
    if !w.unify_classes(mr_argument, o_result) || !w.unify_classes(m_argument, o_argument) {
        return None;
    }
    let result = w.generate(mr_result);
    let argument = w.generate(o_argument);
    let mut substituted = Category::functor(result, o_dir, argument);
    coindex_with_result(&mut substituted, w);
    if let Some(argument) = substituted.argument_mut() {
        w.recursive_attach_head(argument, m_argument);
    }
    finish(substituted, w)
}

fn substitute_verify(
    main: &Category,
    other: &Category,
    result: &mut Category,
    inner_dir: Direction,
    mut wiring: Option<&mut Wiring<'_>>,
) -> bool {
    let (Some((m_dir, m_result, m_argument)), Some((o_dir, o_result, o_argument))) = (main.parts(), other.parts())
    else {
        return false;
    };
    let Some((mr_dir, mr_result, mr_argument)) = m_result.parts() else {
        return false;
    };
    let Some((r_dir, r_result, r_argument)) = result.parts() else {
        return false;
    };
    if m_dir != r_dir || o_dir != r_dir || mr_dir != inner_dir {
        return false;
    }
    if !unifiable(r_result, mr_result) || !unifiable(r_argument, o_argument) || !unifiable(r_argument, m_argument) {
        return false;
    }
    if !unify_with(mr_argument, o_result, &mut wiring) || !unify_with(m_argument, o_argument, &mut wiring) {
        return false;
    }
    let Some(w) = wiring else {
        return true;
    };
    let Some((result_result, result_argument)) = result.parts_mut() else {
        return false;
    };
    if !w.recursive_attach_head(result_result, mr_result)
        || !w.recursive_attach_head(result_argument, m_argument)
        || !w.recursive_attach_head(result_argument, o_argument)
    {
        return false;
    }
    coindex_with_result(result, w);
    true
}

pub(super) fn forward_substitute(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    substitute(left, right, Forward, w)
}

pub(super) fn forward_substitute_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    substitute_verify(left, right, result, Forward, wiring)
}

pub(super) fn backward_substitute(left: &Category, right: &Category, w: &mut Wiring<'_>) -> Option<Category> {
    substitute(right, left, Backward, w)
}

pub(super) fn backward_substitute_verify(
    left: &Category,
    right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    substitute_verify(right, left, result, Backward, wiring)
}

/// Accepts anything; the result gets unshared classes so it carries no
/// dependencies.
pub(super) fn unknown_verify(
    _left: &Category,
    _right: &Category,
    result: &mut Category,
    wiring: Option<&mut Wiring<'_>>,
    _arity_cap: Option<usize>,
) -> bool {
    if let Some(w) = wiring {
        result.fill_blank_classes(w.arena_mut());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::BuildContext;
    use pretty_assertions::assert_eq;

    fn construct(
        form: fn(&Category, &Category, &mut Wiring<'_>) -> Option<Category>,
        left: &str,
        right: &str,
    ) -> Option<String> {
        let mut ctx = BuildContext::new();
        let left = ctx.parse_pred_arg(left).unwrap().category;
        let right = ctx.parse_pred_arg(right).unwrap().category;
        let mut wiring = ctx.wiring();
        form(&left, &right, &mut wiring).map(|c| c.to_string())
    }

    #[test]
    fn test_application() {
        assert_eq!(construct(forward_apply, "S/NP", "NP"), Some("S".to_string()));
        assert_eq!(construct(forward_apply, "S\\NP", "NP"), None);
        assert_eq!(construct(backward_apply, "NP", "S[dcl]\\NP"), Some("S[dcl]".to_string()));
        assert_eq!(construct(backward_apply, "PP", "S\\NP"), None);
    }

    #[test]
    fn test_first_order_composition() {
        assert_eq!(construct(simple_forward_compose, "S/NP", "NP/N"), Some("S/N".to_string()));
        assert_eq!(
            construct(simple_backward_compose, "NP\\NP", "S\\NP"),
            Some("S\\NP".to_string())
        );
        assert_eq!(
            construct(cross_backward_compose, "(S\\NP)/NP", "(S\\NP)\\(S\\NP)"),
            Some("(S\\NP)/NP".to_string())
        );
        assert_eq!(construct(cross_forward_compose, "S/NP", "NP\\N"), Some("S\\N".to_string()));
    }

    #[test]
    fn test_generalized_composition_keeps_outer_arguments() {
        assert_eq!(
            construct(generalized_forward_compose, "S/S", "(S/NP)/PP"),
            Some("(S/NP)/PP".to_string())
        );
        assert_eq!(
            construct(generalized_backward_cross_compose, "((S\\NP)/NP)/PP", "(S\\NP)\\(S\\NP)"),
            Some("((S\\NP)/NP)/PP".to_string())
        );
    }

    #[test]
    fn test_degree_one_generalized_matches_simple() {
        for (left, right) in [("S/NP", "NP/N"), ("S/(S\\NP)", "(S\\NP)/NP")] {
            assert_eq!(
                construct(generalized_forward_compose, left, right),
                construct(simple_forward_compose, left, right)
            );
        }
    }

    #[test]
    fn test_generalized_composition_respects_cap() {
        let mut ctx = BuildContext::with_arity_cap(Some(1));
        let left = ctx.parse_pred_arg("S/S").unwrap().category;
        let right = ctx.parse_pred_arg("((S/NP)/PP)/PP").unwrap().category;
        let mut wiring = ctx.wiring();
        assert_eq!(generalized_forward_compose(&left, &right, &mut wiring), None);
    }

    #[test]
    fn test_zero_cap_is_unbounded() {
        let unbounded = construct(generalized_forward_compose, "S/S", "((S/NP)/PP)/PP");
        assert!(unbounded.is_some());

        let mut ctx = BuildContext::with_arity_cap(Some(0));
        assert_eq!(ctx.arity_cap(), None);
        let left = ctx.parse_pred_arg("S/S").unwrap().category;
        let right = ctx.parse_pred_arg("((S/NP)/PP)/PP").unwrap().category;
        let mut wiring = ctx.wiring();
        assert_eq!(
            generalized_forward_compose(&left, &right, &mut wiring).map(|c| c.to_string()),
            unbounded
        );
    }

    #[test]
    fn test_substitution() {
        assert_eq!(
            construct(backward_substitute, "(S\\NP)/NP", "((S\\NP)\\(S\\NP))/NP"),
            Some("(S\\NP)/NP".to_string())
        );
        assert_eq!(
            construct(forward_substitute, "(S/PP)/NP", "PP/NP"),
            Some("S/NP".to_string())
        );
    }

    #[test]
    fn test_coordination_constructs_conjunct() {
        assert_eq!(construct(coordination, "conj", "NP"), Some("NP[conj]".to_string()));
        assert_eq!(construct(coordination, ",", "S[dcl]"), Some("S[dcl][conj]".to_string()));
        assert_eq!(construct(coordination, "NP", "NP[conj]"), Some("NP".to_string()));
        assert_eq!(construct(coordination, "NP", "PP"), None);
    }

    #[test]
    fn test_verify_with_wiring_links_heads() {
        let mut ctx = BuildContext::new();
        let verb = ctx
            .parse_markedup("2 ((S[dcl]{_}\\NP{Y}<1>){_}/NP{Z}<2>){_}")
            .unwrap()
            .category;
        let object = ctx.parse_markedup("0 NP{_}").unwrap().category;
        ctx.arena_mut().add_head(verb.class().unwrap(), 1);
        ctx.arena_mut().add_head(object.class().unwrap(), 2);
        let mut result = Category::from_plain("S[dcl]\\NP").unwrap();
        let mut wiring = ctx.wiring();
        assert!(forward_apply_verify(&verb, &object, &mut result, Some(&mut wiring), None));
        let links = wiring.links();
        drop(wiring);
        assert_eq!(
            ctx.heads(&result).into_iter().collect::<Vec<_>>(),
            vec![1]
        );
        let object_parent = links
            .iter()
            .find(|(child, _)| Some(*child) == object.class())
            .map(|(_, parent)| *parent)
            .unwrap();
        assert_eq!(
            ctx.arena().heads(object_parent).iter().copied().collect::<Vec<_>>(),
            vec![2]
        );
    }
}
