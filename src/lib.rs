//! # Sort info
//!
//! Expression substitution and sort key tracking for a SQL analyzer.
//!
//! While a query is analyzed, its expressions are rewritten many times: aliases
//! are replaced with the expressions they name, aggregates and window functions
//! are replaced with references to the slots that hold their results, views
//! and subqueries are expanded. Every such phase is described by a
//! [`SubstitutionMap`] from source expressions to their replacements.
//!
//! The ORDER BY contract of the query lives in [`SortInfo`]: an ordered list of
//! keys, each one an expression with a direction. Each phase rewrites the key
//! expressions with [`SortInfo::substitute`], while the number of keys, their
//! order and directions stay the same. The plan generator reads the final
//! sort info to build the sort operator.
//!
//! ```
//! use sort_info::expr::{Expr, SlotId, Type};
//! use sort_info::{OrderingKey, SortInfo, SubstitutionMap};
//!
//! let a = Expr::column("a", Type::Integer);
//! let b = Expr::column("b", Type::Integer);
//! let mut sort_info = SortInfo::new(vec![OrderingKey::asc(a.clone()), OrderingKey::desc(b)]);
//!
//! let mut map = SubstitutionMap::new();
//! map.put(a, Expr::slot(SlotId(3), Type::Integer));
//! sort_info.substitute(&map);
//!
//! assert_eq!(sort_info.to_string(), "#3 ASC, b DESC");
//! ```
//!
//! ## Substitution rules
//!
//! Source expressions are matched by structure, not by identity: a separately
//! built `sum(a)` matches the `sum(a)` inside an ordering key. The whole
//! expression is tried first, then its children. A matched subtree is replaced
//! with the target as is, the target itself is not rewritten again. When the
//! map has several entries with equal sources, the first one wins.
//!
//! Expressions are immutable and shared. A rewrite builds new nodes only along
//! the paths that changed, and an expression with nothing to substitute comes
//! back as the very same node.

pub mod analysis;
pub mod config;
pub mod error;
pub mod expr;
pub mod order_by;
pub mod sort_info;
pub mod substitution;
pub mod tlog;

pub use analysis::SortAnalysis;
pub use config::Options;
pub use error::Error;
pub use sort_info::{OrderByType, OrderingKey, SortInfo};
pub use substitution::{substitute, substitute_list, SubstitutionMap};

#[cfg(test)]
mod tests {
    use crate::expr::{Expr, ExprRef};
    use crate::{SortInfo, SubstitutionMap};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn analysis_values_are_thread_safe() {
        assert_send_sync::<ExprRef>();
        assert_send_sync::<Expr>();
        assert_send_sync::<SubstitutionMap>();
        assert_send_sync::<SortInfo>();
    }
}
