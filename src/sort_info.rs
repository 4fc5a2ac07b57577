//! Sort information of an ORDER BY clause.
//!
//! [`SortInfo`] holds everything needed to compute the ordering: resolved
//! ordering expressions with their directions. It contains neither aliases
//! nor positional references, those are resolved before it is built (see
//! [`crate::order_by`]).
//!
//! Keys are fixed at construction. Analysis phases may only replace the
//! expressions of the keys through [`SortInfo::substitute`]; the position and
//! direction of every key stay as they were.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::config::Options;
use crate::error::Error;
use crate::expr::ExprRef;
use crate::substitution::{substitute, SubstitutionMap};
use crate::tlog;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Hash, Serialize)]
pub enum OrderByType {
    #[default]
    Asc,
    Desc,
}

impl OrderByType {
    #[must_use]
    pub fn from_is_asc(is_asc: bool) -> Self {
        if is_asc {
            OrderByType::Asc
        } else {
            OrderByType::Desc
        }
    }

    #[must_use]
    pub fn is_asc(self) -> bool {
        matches!(self, OrderByType::Asc)
    }
}

impl Display for OrderByType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderByType::Asc => write!(f, "ASC"),
            OrderByType::Desc => write!(f, "DESC"),
        }
    }
}

/// One ordering key: expression, direction and optional NULLS placement.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct OrderingKey {
    pub expr: ExprRef,
    pub order_type: OrderByType,
    /// `Some(true)` for explicit `NULLS FIRST`, `Some(false)` for `NULLS LAST`.
    pub nulls_first: Option<bool>,
}

impl OrderingKey {
    #[must_use]
    pub fn new(expr: ExprRef, order_type: OrderByType) -> Self {
        OrderingKey {
            expr,
            order_type,
            nulls_first: None,
        }
    }

    #[must_use]
    pub fn asc(expr: ExprRef) -> Self {
        Self::new(expr, OrderByType::Asc)
    }

    #[must_use]
    pub fn desc(expr: ExprRef) -> Self {
        Self::new(expr, OrderByType::Desc)
    }

    #[must_use]
    pub fn with_nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = Some(nulls_first);
        self
    }

    #[must_use]
    pub fn is_asc(&self) -> bool {
        self.order_type.is_asc()
    }

    /// Whether NULLs go before the other values for this key.
    ///
    /// Without an explicit placement NULL is either the largest
    /// (`nulls_largest`) or the smallest value.
    #[must_use]
    pub fn is_nulls_first(&self, nulls_largest: bool) -> bool {
        self.nulls_first.unwrap_or(self.is_asc() != nulls_largest)
    }
}

impl Display for OrderingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.expr, self.order_type)?;
        match self.nulls_first {
            Some(true) => write!(f, " NULLS FIRST"),
            Some(false) => write!(f, " NULLS LAST"),
            None => Ok(()),
        }
    }
}

/// Everything needed to compute an ORDER BY.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct SortInfo {
    keys: Vec<OrderingKey>,
}

impl SortInfo {
    #[must_use]
    pub fn new(keys: Vec<OrderingKey>) -> Self {
        SortInfo { keys }
    }

    /// Builds sort info from separate lists of expressions and
    /// ascending flags, as the analyzer collects them.
    ///
    /// # Errors
    /// - the lists have different lengths
    pub fn from_parallel(exprs: Vec<ExprRef>, is_asc_order: Vec<bool>) -> Result<Self, Error> {
        if exprs.len() != is_asc_order.len() {
            return Err(Error::MismatchedOrderingLists {
                exprs: exprs.len(),
                flags: is_asc_order.len(),
            });
        }
        let keys = exprs
            .into_iter()
            .zip(is_asc_order)
            .map(|(expr, is_asc)| OrderingKey::new(expr, OrderByType::from_is_asc(is_asc)))
            .collect();
        Ok(SortInfo { keys })
    }

    #[must_use]
    pub fn keys(&self) -> &[OrderingKey] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderingKey> {
        self.keys.iter()
    }

    pub fn ordering_exprs(&self) -> impl Iterator<Item = &ExprRef> {
        self.keys.iter().map(|key| &key.expr)
    }

    #[must_use]
    pub fn is_asc_order(&self) -> Vec<bool> {
        self.keys.iter().map(OrderingKey::is_asc).collect()
    }

    /// NULLS placement of every key, with `options` applied where the
    /// query didn't specify one.
    #[must_use]
    pub fn nulls_first(&self, options: &Options) -> Vec<bool> {
        self.keys
            .iter()
            .map(|key| key.is_nulls_first(options.nulls_largest))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All ordering expressions are slot references,
    /// i.e. the sort input is fully materialized.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.keys.iter().all(|key| key.expr.is_slot())
    }

    /// Substitutes all ordering expressions according to the map.
    ///
    /// Directions, NULLS placements and the order of the keys are kept.
    /// Returns the number of keys whose expression was replaced.
    pub fn substitute(&mut self, map: &SubstitutionMap) -> usize {
        if map.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for (pos, key) in self.keys.iter_mut().enumerate() {
            let new_expr = substitute(&key.expr, map);
            if Arc::ptr_eq(&new_expr, &key.expr) {
                continue;
            }
            tlog!(Trace, "ordering key rewritten";
                "position" => pos,
                "from" => %key.expr,
                "to" => %new_expr,
            );
            key.expr = new_expr;
            changed += 1;
        }
        changed
    }
}

impl<'a> IntoIterator for &'a SortInfo {
    type Item = &'a OrderingKey;
    type IntoIter = std::slice::Iter<'a, OrderingKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

impl Display for SortInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Arithmetic, Expr, SlotId, Type};
    use pretty_assertions::assert_eq;

    fn col(name: &str) -> ExprRef {
        Expr::column(name, Type::Integer)
    }

    fn slot(id: u32) -> ExprRef {
        Expr::slot(SlotId(id), Type::Integer)
    }

    fn smap(pairs: Vec<(ExprRef, ExprRef)>) -> SubstitutionMap {
        pairs.into_iter().collect()
    }

    #[test]
    fn substitute_replaces_expression_and_keeps_direction() {
        let mut sort_info =
            SortInfo::from_parallel(vec![col("a"), col("b")], vec![true, false]).unwrap();
        let b_before = Arc::clone(&sort_info.keys()[1].expr);

        let changed = sort_info.substitute(&smap(vec![(col("a"), slot(3))]));

        assert_eq!(changed, 1);
        assert_eq!(
            sort_info,
            SortInfo::new(vec![OrderingKey::asc(slot(3)), OrderingKey::desc(col("b"))])
        );
        assert!(Arc::ptr_eq(&sort_info.keys()[1].expr, &b_before));
        assert_eq!(sort_info.is_asc_order(), vec![true, false]);
    }

    #[test]
    fn ambiguous_map_uses_first_entry() {
        let mut sort_info = SortInfo::new(vec![OrderingKey::asc(col("a"))]);
        sort_info.substitute(&smap(vec![(col("a"), slot(1)), (col("a"), slot(2))]));
        let exprs: Vec<_> = sort_info.ordering_exprs().cloned().collect();
        assert_eq!(exprs, vec![slot(1)]);
    }

    #[test]
    fn empty_map_is_identity() {
        let sort_info = SortInfo::new(vec![
            OrderingKey::desc(Expr::arithmetic(col("a"), Arithmetic::Multiply, col("b")))
                .with_nulls_first(false),
            OrderingKey::asc(col("c")),
        ]);
        let mut after = sort_info.clone();
        assert_eq!(after.substitute(&SubstitutionMap::new()), 0);
        assert_eq!(after, sort_info);
        for (before, after) in sort_info.iter().zip(&after) {
            assert!(Arc::ptr_eq(&before.expr, &after.expr));
        }
    }

    #[test]
    fn no_op_map_is_idempotent() {
        let mut sort_info = SortInfo::new(vec![OrderingKey::asc(col("a"))]);
        let map = smap(vec![(col("z"), slot(9))]);
        let before = sort_info.clone();
        assert_eq!(sort_info.substitute(&map), 0);
        assert_eq!(sort_info.substitute(&map), 0);
        assert_eq!(sort_info, before);
    }

    #[test]
    fn substitution_never_changes_shape() {
        let mut sort_info = SortInfo::from_parallel(
            vec![col("a"), col("b"), col("a"), col("c")],
            vec![false, true, true, false],
        )
        .unwrap();
        let directions = sort_info.is_asc_order();
        let maps = vec![
            smap(vec![(col("a"), col("c"))]),
            smap(vec![(col("c"), slot(1)), (col("b"), slot(2))]),
            smap(vec![(slot(1), slot(5))]),
        ];
        for map in &maps {
            sort_info.substitute(map);
            assert_eq!(sort_info.len(), 4);
            assert_eq!(sort_info.is_asc_order(), directions);
        }
        assert_eq!(sort_info.to_string(), "#5 DESC, #2 ASC, #5 ASC, #5 DESC");
        assert!(sort_info.is_materialized());
    }

    #[test]
    fn mismatched_parallel_lists() {
        let err = SortInfo::from_parallel(vec![col("a")], vec![true, false]).unwrap_err();
        assert_eq!(err, Error::MismatchedOrderingLists { exprs: 1, flags: 2 });
        assert_eq!(
            err.to_string(),
            "unequal number of ordering expressions and direction flags: 1 and 2"
        );
    }

    #[test]
    fn nulls_placement() {
        let sort_info = SortInfo::new(vec![
            OrderingKey::asc(col("a")),
            OrderingKey::desc(col("b")),
            OrderingKey::asc(col("c")).with_nulls_first(true),
            OrderingKey::desc(col("d")).with_nulls_first(false),
        ]);

        let options = Options::default();
        assert_eq!(sort_info.nulls_first(&options), vec![false, true, true, false]);

        let options = Options {
            nulls_largest: false,
            ..Options::default()
        };
        assert_eq!(sort_info.nulls_first(&options), vec![true, false, true, false]);

        assert_eq!(
            sort_info.to_string(),
            "a ASC, b DESC, c ASC NULLS FIRST, d DESC NULLS LAST"
        );
    }

    #[test]
    fn empty_sort_info() {
        let sort_info = SortInfo::default();
        assert!(sort_info.is_empty());
        assert!(sort_info.is_materialized());
        assert_eq!(sort_info.to_string(), "");
    }

    #[test]
    fn serializes_to_yaml() {
        let sort_info = SortInfo::new(vec![OrderingKey::desc(slot(2)).with_nulls_first(true)]);
        let yaml = serde_yaml::to_string(&sort_info).unwrap();
        let restored: SortInfo = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored, sort_info);
    }
}
