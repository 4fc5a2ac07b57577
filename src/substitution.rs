//! Expression substitution.
//!
//! A [`SubstitutionMap`] is one rewrite pass: an ordered list of
//! `source -> target` pairs. [`substitute`] replaces every subtree that is
//! structurally equal to some source with the corresponding target.
//!
//! Rules of a pass:
//! - the whole tree is matched first, then its children, top-down;
//! - when several entries have equal sources, the first one in map order wins;
//! - a target is never rewritten again within the same pass, so
//!   `{a -> b, b -> a}` swaps `a` and `b` instead of looping;
//! - untouched subtrees are reused as is: if nothing matched, the very same
//!   [`ExprRef`] is returned.

use ahash::AHashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::expr::{Expr, ExprKind, ExprRef};

#[derive(Clone, Debug, Default)]
pub struct SubstitutionMap {
    /// Pairs in insertion order, duplicates included.
    entries: Vec<(ExprRef, ExprRef)>,
    /// Map of { source -> position of its first entry }.
    index: AHashMap<ExprRef, usize>,
}

impl SubstitutionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        SubstitutionMap {
            entries: Vec::with_capacity(capacity),
            index: AHashMap::with_capacity(capacity),
        }
    }

    /// Appends a `source -> target` pair.
    ///
    /// A source equal to an already present one is kept in the entry list,
    /// but lookups keep returning the earlier target.
    pub fn put(&mut self, source: ExprRef, target: ExprRef) {
        let pos = self.entries.len();
        self.index.entry(Arc::clone(&source)).or_insert(pos);
        self.entries.push((source, target));
    }

    /// Target of the first entry whose source equals `expr`.
    #[must_use]
    pub fn get(&self, expr: &Expr) -> Option<&ExprRef> {
        self.index.get(expr).map(|pos| &self.entries[*pos].1)
    }

    #[must_use]
    pub fn contains_source(&self, expr: &Expr) -> bool {
        self.index.contains_key(expr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExprRef, &ExprRef)> {
        self.entries.iter().map(|(s, t)| (s, t))
    }

    pub fn sources(&self) -> impl Iterator<Item = &ExprRef> {
        self.entries.iter().map(|(s, _)| s)
    }

    pub fn targets(&self) -> impl Iterator<Item = &ExprRef> {
        self.entries.iter().map(|(_, t)| t)
    }

    /// Checks that no two entries have equal sources.
    ///
    /// # Errors
    /// - some source is duplicated
    pub fn verify(&self) -> Result<(), Error> {
        if self.index.len() == self.entries.len() {
            return Ok(());
        }
        for (pos, (source, _)) in self.entries.iter().enumerate() {
            if self.index.get(source) != Some(&pos) {
                return Err(Error::DuplicateSource(source.to_string()));
            }
        }
        Ok(())
    }

    /// Map with all entries of `f` followed by all entries of `g`.
    /// When both maps have the same source, `f` wins.
    #[must_use]
    pub fn combine(f: &SubstitutionMap, g: &SubstitutionMap) -> SubstitutionMap {
        let mut result = SubstitutionMap::with_capacity(f.len() + g.len());
        for (source, target) in f.iter().chain(g.iter()) {
            result.put(Arc::clone(source), Arc::clone(target));
        }
        result
    }

    /// Folds two passes into one: targets of `f` are rewritten with `g`, then
    /// entries of `g` whose source is not a source of `f` are appended.
    ///
    /// The result rewrites like `f` followed by `g` only while every match of
    /// `g` lies either inside a target of `f` or in a part of the tree that `f`
    /// leaves untouched. A `g` source that contains an `f` source (`a + 1`
    /// against `a -> x`), or that matches a node rebuilt around an `f` target
    /// (`b + 1` against `a -> b`), is matched differently by the single pass.
    #[must_use]
    pub fn compose(f: &SubstitutionMap, g: &SubstitutionMap) -> SubstitutionMap {
        let mut result = SubstitutionMap::with_capacity(f.len() + g.len());
        for (source, target) in f.iter() {
            result.put(Arc::clone(source), substitute(target, g));
        }
        for (source, target) in g.iter() {
            if !f.contains_source(source) {
                result.put(Arc::clone(source), Arc::clone(target));
            }
        }
        result
    }
}

impl FromIterator<(ExprRef, ExprRef)> for SubstitutionMap {
    fn from_iter<T: IntoIterator<Item = (ExprRef, ExprRef)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut map = SubstitutionMap::with_capacity(iter.size_hint().0);
        for (source, target) in iter {
            map.put(source, target);
        }
        map
    }
}

impl Extend<(ExprRef, ExprRef)> for SubstitutionMap {
    fn extend<T: IntoIterator<Item = (ExprRef, ExprRef)>>(&mut self, iter: T) {
        for (source, target) in iter {
            self.put(source, target);
        }
    }
}

/// Rewrites `expr` with `map`. See the module documentation for the rules.
#[must_use]
pub fn substitute(expr: &ExprRef, map: &SubstitutionMap) -> ExprRef {
    if map.is_empty() {
        return Arc::clone(expr);
    }
    rewrite(expr, map).unwrap_or_else(|| Arc::clone(expr))
}

/// Rewrites every expression of the list, keeping its length and order.
#[must_use]
pub fn substitute_list(exprs: &[ExprRef], map: &SubstitutionMap) -> Vec<ExprRef> {
    exprs.iter().map(|e| substitute(e, map)).collect()
}

/// Rewrites the list slots in place.
/// Returns the number of slots that got a new expression.
pub fn substitute_list_in_place(exprs: &mut [ExprRef], map: &SubstitutionMap) -> usize {
    if map.is_empty() {
        return 0;
    }
    let mut changed = 0;
    for slot in exprs.iter_mut() {
        if let Some(new_expr) = rewrite(slot, map) {
            *slot = new_expr;
            changed += 1;
        }
    }
    changed
}

/// Returns `None` when nothing in the subtree matched.
fn rewrite(expr: &ExprRef, map: &SubstitutionMap) -> Option<ExprRef> {
    if let Some(target) = map.get(expr) {
        // `a -> a` keeps the original node.
        if target == expr {
            return None;
        }
        return Some(Arc::clone(target));
    }

    let kind = match expr.kind() {
        ExprKind::Literal(_)
        | ExprKind::Column { .. }
        | ExprKind::Slot(_)
        | ExprKind::Parameter(_) => return None,
        ExprKind::Function { name, args } => ExprKind::Function {
            name: name.clone(),
            args: rewrite_list(args, map)?,
        },
        ExprKind::Aggregate {
            name,
            args,
            distinct,
        } => ExprKind::Aggregate {
            name: name.clone(),
            args: rewrite_list(args, map)?,
            distinct: *distinct,
        },
        ExprKind::Arithmetic { left, op, right } => {
            let (left, right) = rewrite_pair(left, right, map)?;
            ExprKind::Arithmetic { left, op: *op, right }
        }
        ExprKind::Comparison { left, op, right } => {
            let (left, right) = rewrite_pair(left, right, map)?;
            ExprKind::Comparison { left, op: *op, right }
        }
        ExprKind::Bool { left, op, right } => {
            let (left, right) = rewrite_pair(left, right, map)?;
            ExprKind::Bool { left, op: *op, right }
        }
        ExprKind::Unary { op, child } => ExprKind::Unary {
            op: *op,
            child: rewrite(child, map)?,
        },
        ExprKind::Cast { child, to } => ExprKind::Cast {
            child: rewrite(child, map)?,
            to: *to,
        },
        ExprKind::Case {
            search,
            when_then,
            else_expr,
        } => {
            let new_search = search.as_ref().map(|e| rewrite(e, map));
            let new_else = else_expr.as_ref().map(|e| rewrite(e, map));
            let new_when_then: Vec<_> = when_then
                .iter()
                .map(|(when, then)| (rewrite(when, map), rewrite(then, map)))
                .collect();

            let changed = matches!(new_search, Some(Some(_)))
                || matches!(new_else, Some(Some(_)))
                || new_when_then
                    .iter()
                    .any(|(when, then)| when.is_some() || then.is_some());
            if !changed {
                return None;
            }

            let keep =
                |old: &ExprRef, new: Option<ExprRef>| new.unwrap_or_else(|| Arc::clone(old));
            ExprKind::Case {
                search: search
                    .as_ref()
                    .zip(new_search)
                    .map(|(old, new)| keep(old, new)),
                when_then: when_then
                    .iter()
                    .zip(new_when_then)
                    .map(|((old_when, old_then), (when, then))| {
                        (keep(old_when, when), keep(old_then, then))
                    })
                    .collect(),
                else_expr: else_expr
                    .as_ref()
                    .zip(new_else)
                    .map(|(old, new)| keep(old, new)),
            }
        }
    };
    Some(Arc::new(Expr::new(kind, expr.get_type())))
}

fn rewrite_pair(
    left: &ExprRef,
    right: &ExprRef,
    map: &SubstitutionMap,
) -> Option<(ExprRef, ExprRef)> {
    match (rewrite(left, map), rewrite(right, map)) {
        (None, None) => None,
        (l, r) => Some((
            l.unwrap_or_else(|| Arc::clone(left)),
            r.unwrap_or_else(|| Arc::clone(right)),
        )),
    }
}

fn rewrite_list(list: &[ExprRef], map: &SubstitutionMap) -> Option<Vec<ExprRef>> {
    let mut result: Option<Vec<ExprRef>> = None;
    for (pos, e) in list.iter().enumerate() {
        if let Some(new_expr) = rewrite(e, map) {
            result
                .get_or_insert_with(|| list[..pos].to_vec())
                .push(new_expr);
        } else if let Some(result) = result.as_mut() {
            result.push(Arc::clone(e));
        }
    }
    result
}
