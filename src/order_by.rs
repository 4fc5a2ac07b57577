//! ORDER BY resolution.
//!
//! Turns the ORDER BY elements of a query into [`SortInfo`]. Positional
//! references (`ORDER BY 2`) and select list aliases (`ORDER BY total`) are
//! replaced with the select list expressions they refer to.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;

use crate::config::Options;
use crate::error::Error;
use crate::expr::ExprRef;
use crate::sort_info::{OrderByType, OrderingKey, SortInfo};
use crate::tlog;

/// Select list column with an optional alias.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct SelectItem {
    pub expr: ExprRef,
    pub alias: Option<SmolStr>,
}

impl SelectItem {
    #[must_use]
    pub fn new(expr: ExprRef) -> Self {
        SelectItem { expr, alias: None }
    }

    #[must_use]
    pub fn with_alias(expr: ExprRef, alias: &str) -> Self {
        SelectItem {
            expr,
            alias: Some(SmolStr::from(alias)),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum OrderByEntity {
    Expression { expr: ExprRef },
    /// Alias of a select list column.
    Alias { name: SmolStr },
    /// 1-based position in the select list.
    Index { value: usize },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct OrderByElement {
    pub entity: OrderByEntity,
    pub order_type: Option<OrderByType>,
    pub nulls_first: Option<bool>,
}

impl OrderByElement {
    #[must_use]
    pub fn new(entity: OrderByEntity, order_type: Option<OrderByType>) -> Self {
        OrderByElement {
            entity,
            order_type,
            nulls_first: None,
        }
    }

    #[must_use]
    pub fn expr(expr: ExprRef) -> Self {
        Self::new(OrderByEntity::Expression { expr }, None)
    }

    #[must_use]
    pub fn alias(name: &str) -> Self {
        Self::new(
            OrderByEntity::Alias {
                name: SmolStr::from(name),
            },
            None,
        )
    }

    #[must_use]
    pub fn index(value: usize) -> Self {
        Self::new(OrderByEntity::Index { value }, None)
    }

    #[must_use]
    pub fn desc(mut self) -> Self {
        self.order_type = Some(OrderByType::Desc);
        self
    }

    #[must_use]
    pub fn asc(mut self) -> Self {
        self.order_type = Some(OrderByType::Asc);
        self
    }

    #[must_use]
    pub fn nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = Some(nulls_first);
        self
    }
}

fn alias_matches(alias: &str, name: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        alias == name
    } else {
        alias.eq_ignore_ascii_case(name)
    }
}

fn resolve_alias<'a>(
    select_list: &'a [SelectItem],
    name: &SmolStr,
    options: &Options,
) -> Result<&'a ExprRef, Error> {
    let mut found: Option<&ExprRef> = None;
    let candidates = select_list.iter().filter(|item| {
        item.alias
            .as_deref()
            .is_some_and(|alias| alias_matches(alias, name, options.alias_case_sensitive))
    });
    for item in candidates {
        match found {
            None => found = Some(&item.expr),
            // `SELECT a AS x, a AS x ... ORDER BY x` refers to one expression.
            Some(expr) if expr == &item.expr => {}
            Some(_) => return Err(Error::AmbiguousAlias(name.clone())),
        }
    }
    found.ok_or_else(|| Error::UnknownAlias(name.clone()))
}

/// Builds sort info for the ORDER BY `elements` of a query with the given
/// select list.
///
/// # Errors
/// - position is out of the select list bounds
/// - alias is not found in the select list
/// - alias refers to several different select list expressions
pub fn resolve_order_by(
    select_list: &[SelectItem],
    elements: Vec<OrderByElement>,
    options: &Options,
) -> Result<SortInfo, Error> {
    let mut keys = Vec::with_capacity(elements.len());
    for element in elements {
        let expr = match element.entity {
            OrderByEntity::Expression { expr } => expr,
            OrderByEntity::Alias { name } => {
                Arc::clone(resolve_alias(select_list, &name, options)?)
            }
            OrderByEntity::Index { value } => {
                let item = value
                    .checked_sub(1)
                    .and_then(|pos| select_list.get(pos))
                    .ok_or(Error::OrdinalOutOfRange {
                        position: value,
                        len: select_list.len(),
                    })?;
                Arc::clone(&item.expr)
            }
        };
        keys.push(OrderingKey {
            expr,
            order_type: element.order_type.unwrap_or_default(),
            nulls_first: element.nulls_first,
        });
    }
    let sort_info = SortInfo::new(keys);
    tlog!(Debug, "resolved ORDER BY";
        "keys" => sort_info.len(),
        "order_by" => %sort_info,
    );
    Ok(sort_info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, SlotId, Type};
    use pretty_assertions::assert_eq;

    fn col(name: &str) -> ExprRef {
        Expr::column(name, Type::Integer)
    }

    fn select_list() -> Vec<SelectItem> {
        vec![
            SelectItem::new(col("a")),
            SelectItem::with_alias(
                Expr::aggregate("sum", vec![col("b")], false, Type::Integer),
                "Total",
            ),
            SelectItem::with_alias(col("c"), "x"),
        ]
    }

    #[test]
    fn positions_aliases_and_expressions() {
        let select_list = select_list();
        let elements = vec![
            OrderByElement::index(3).desc(),
            OrderByElement::alias("total").nulls_first(true),
            OrderByElement::expr(Expr::slot(SlotId(1), Type::Integer)).asc(),
            OrderByElement::index(1),
        ];
        let sort_info = resolve_order_by(&select_list, elements, &Options::default()).unwrap();

        assert_eq!(
            sort_info.to_string(),
            "c DESC, sum(b) ASC NULLS FIRST, #1 ASC, a ASC"
        );
        // Resolved keys share the select list nodes.
        assert!(Arc::ptr_eq(&sort_info.keys()[0].expr, &select_list[2].expr));
        assert!(Arc::ptr_eq(&sort_info.keys()[1].expr, &select_list[1].expr));
    }

    #[test]
    fn position_out_of_range() {
        let select_list = select_list();
        for value in [0, 4] {
            let err = resolve_order_by(
                &select_list,
                vec![OrderByElement::index(value)],
                &Options::default(),
            )
            .unwrap_err();
            assert_eq!(
                err,
                Error::OrdinalOutOfRange {
                    position: value,
                    len: 3
                }
            );
        }
    }

    #[test]
    fn alias_case_sensitivity() {
        let select_list = select_list();
        let options = Options {
            alias_case_sensitive: true,
            ..Options::default()
        };
        let err = resolve_order_by(&select_list, vec![OrderByElement::alias("total")], &options)
            .unwrap_err();
        assert_eq!(err, Error::UnknownAlias("total".into()));

        let sort_info =
            resolve_order_by(&select_list, vec![OrderByElement::alias("Total")], &options).unwrap();
        assert_eq!(sort_info.to_string(), "sum(b) ASC");
    }

    #[test]
    fn ambiguous_alias() {
        let mut select_list = select_list();
        select_list.push(SelectItem::with_alias(col("d"), "X"));
        let err = resolve_order_by(
            &select_list,
            vec![OrderByElement::alias("x")],
            &Options::default(),
        )
        .unwrap_err();
        assert_eq!(err, Error::AmbiguousAlias("x".into()));
        assert_eq!(err.to_string(), "ORDER BY alias \"x\" is ambiguous");
    }

    #[test]
    fn repeated_alias_of_same_expression() {
        let mut select_list = select_list();
        select_list.push(SelectItem::with_alias(col("c"), "x"));
        let sort_info = resolve_order_by(
            &select_list,
            vec![OrderByElement::alias("x")],
            &Options::default(),
        )
        .unwrap();
        assert_eq!(sort_info.to_string(), "c ASC");
    }

    #[test]
    fn unknown_alias() {
        let err = resolve_order_by(
            &select_list(),
            vec![OrderByElement::alias("missing")],
            &Options::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "column alias \"missing\" does not exist in select list"
        );
    }
}
