//! Expression module.
//!
//! Expressions are immutable trees shared through [`ExprRef`]. A node is never
//! changed after construction: rewriting builds new nodes and reuses the
//! untouched subtrees, so every other holder of the original tree keeps seeing
//! the original.
//!
//! Equality and hashing are structural. Two independently built `a + 1` trees
//! are equal and land in the same hash bucket.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub type ExprRef = Arc<Expr>;

/// Only the nodes above this depth contribute to the expression hash.
/// Deeper nodes are left to the equality check.
pub const EXPR_HASH_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub enum Type {
    Unsigned,
    Integer,
    Double,
    Numeric,
    Text,
    Boolean,
    Datetime,
    Uuid,
    // Type of NULL literal.
    Unknown,
}

impl Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Unsigned => "unsigned",
            Type::Integer => "int",
            Type::Double => "double",
            Type::Numeric => "numeric",
            Type::Text => "text",
            Type::Boolean => "bool",
            Type::Datetime => "datetime",
            Type::Uuid => "uuid",
            Type::Unknown => "unknown",
        }
    }

    fn numeric_rank(self) -> Option<u8> {
        match self {
            Type::Unsigned => Some(0),
            Type::Integer => Some(1),
            Type::Numeric => Some(2),
            Type::Double => Some(3),
            _ => None,
        }
    }

    /// Result type of an arithmetic operation over `self` and `other`.
    ///
    /// Operand types are already resolved by the analyzer, so this only picks
    /// the wider of two numeric types. Anything else keeps the left type.
    #[must_use]
    pub fn wider(self, other: Type) -> Type {
        match (self.numeric_rank(), other.numeric_rank()) {
            (Some(l), Some(r)) if r > l => other,
            _ if self == Type::Unknown => other,
            _ => self,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Double literal compared and hashed by its bit pattern,
/// so that `NaN` literals are equal to themselves.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Double {
    pub value: f64,
}

impl PartialEq for Double {
    fn eq(&self, other: &Self) -> bool {
        self.value.to_bits() == other.value.to_bits()
    }
}

impl Eq for Double {}

impl Hash for Double {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.to_bits().hash(state);
    }
}

impl From<f64> for Double {
    fn from(value: f64) -> Self {
        Double { value }
    }
}

impl Display for Double {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Double(Double),
    String(SmolStr),
}

impl Value {
    #[must_use]
    pub fn get_type(&self) -> Type {
        match self {
            Value::Null => Type::Unknown,
            Value::Boolean(_) => Type::Boolean,
            Value::Integer(_) => Type::Integer,
            Value::Unsigned(_) => Type::Unsigned,
            Value::Double(_) => Type::Double,
            Value::String(_) => Type::Text,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Unsigned(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(SmolStr::from(v))
    }
}

/// Materialized slot the analyzer assigned to a computed value.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct SlotId(pub u32);

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub enum Arithmetic {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl Arithmetic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        }
    }
}

/// Comparison operators, such as `=`, `<` and etc.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::NotEq => "<>",
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub enum UnaryOperator {
    Not,
    IsNull,
    Negate,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::IsNull => "is null",
            Self::Negate => "-",
        }
    }
}

macro_rules! impl_display_as_str {
    ($($t:ty),*) => {
        $(impl Display for $t {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        })*
    };
}

impl_display_as_str!(Arithmetic, ComparisonOperator, BoolOperator, UnaryOperator);

/// Expression kinds known to the analyzer.
///
/// Every traversal matches this enum exhaustively, so a new kind
/// can't be silently skipped by a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ExprKind {
    /// Examples: `1`, `'abc'`, `NULL`.
    Literal(Value),
    /// Logical column reference, not yet bound to storage.
    /// Examples: `a`, `t.a`.
    Column {
        relation: Option<SmolStr>,
        name: SmolStr,
    },
    /// Reference to a materialized slot.
    /// Examples: `#3`.
    Slot(SlotId),
    /// Indexed parameter value starting with 0.
    /// Examples: `$1`, `$2`.
    Parameter(u16),
    /// Scalar function call.
    /// Examples: `lower(a)`, `substr(a, 1, 2)`.
    Function { name: SmolStr, args: Vec<ExprRef> },
    /// Aggregate function call.
    /// Examples: `sum(a)`, `count(DISTINCT b)`.
    Aggregate {
        name: SmolStr,
        args: Vec<ExprRef>,
        distinct: bool,
    },
    Arithmetic {
        left: ExprRef,
        op: Arithmetic,
        right: ExprRef,
    },
    Comparison {
        left: ExprRef,
        op: ComparisonOperator,
        right: ExprRef,
    },
    Bool {
        left: ExprRef,
        op: BoolOperator,
        right: ExprRef,
    },
    /// Examples: `not a`, `a is null`, `-a`.
    Unary { op: UnaryOperator, child: ExprRef },
    /// Examples: `a::text`.
    Cast { child: ExprRef, to: Type },
    /// Examples: `CASE WHEN a = 1 THEN 'one' ELSE 'other' END`,
    ///           `CASE a WHEN 1 THEN 'one' END` (simple form, `search` is set).
    Case {
        search: Option<ExprRef>,
        when_then: Vec<(ExprRef, ExprRef)>,
        else_expr: Option<ExprRef>,
    },
}

/// Expression node: kind with its children and the result type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Expr {
    kind: ExprKind,
    ty: Type,
}

impl Expr {
    #[must_use]
    pub const fn new(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    #[must_use]
    pub fn get_type(&self) -> Type {
        self.ty
    }

    #[must_use]
    pub fn literal(value: impl Into<Value>) -> ExprRef {
        let value = value.into();
        let ty = value.get_type();
        Arc::new(Expr::new(ExprKind::Literal(value), ty))
    }

    #[must_use]
    pub fn null() -> ExprRef {
        Arc::new(Expr::new(ExprKind::Literal(Value::Null), Type::Unknown))
    }

    #[must_use]
    pub fn column(name: &str, ty: Type) -> ExprRef {
        let kind = ExprKind::Column {
            relation: None,
            name: SmolStr::from(name),
        };
        Arc::new(Expr::new(kind, ty))
    }

    #[must_use]
    pub fn qualified_column(relation: &str, name: &str, ty: Type) -> ExprRef {
        let kind = ExprKind::Column {
            relation: Some(SmolStr::from(relation)),
            name: SmolStr::from(name),
        };
        Arc::new(Expr::new(kind, ty))
    }

    #[must_use]
    pub fn slot(id: SlotId, ty: Type) -> ExprRef {
        Arc::new(Expr::new(ExprKind::Slot(id), ty))
    }

    #[must_use]
    pub fn parameter(index: u16, ty: Type) -> ExprRef {
        Arc::new(Expr::new(ExprKind::Parameter(index), ty))
    }

    #[must_use]
    pub fn function(name: &str, args: Vec<ExprRef>, ret: Type) -> ExprRef {
        let kind = ExprKind::Function {
            name: SmolStr::from(name),
            args,
        };
        Arc::new(Expr::new(kind, ret))
    }

    #[must_use]
    pub fn aggregate(name: &str, args: Vec<ExprRef>, distinct: bool, ret: Type) -> ExprRef {
        let kind = ExprKind::Aggregate {
            name: SmolStr::from(name),
            args,
            distinct,
        };
        Arc::new(Expr::new(kind, ret))
    }

    #[must_use]
    pub fn arithmetic(left: ExprRef, op: Arithmetic, right: ExprRef) -> ExprRef {
        let ty = left.ty.wider(right.ty);
        Arc::new(Expr::new(ExprKind::Arithmetic { left, op, right }, ty))
    }

    #[must_use]
    pub fn comparison(left: ExprRef, op: ComparisonOperator, right: ExprRef) -> ExprRef {
        let kind = ExprKind::Comparison { left, op, right };
        Arc::new(Expr::new(kind, Type::Boolean))
    }

    #[must_use]
    pub fn and(left: ExprRef, right: ExprRef) -> ExprRef {
        let kind = ExprKind::Bool {
            left,
            op: BoolOperator::And,
            right,
        };
        Arc::new(Expr::new(kind, Type::Boolean))
    }

    #[must_use]
    pub fn or(left: ExprRef, right: ExprRef) -> ExprRef {
        let kind = ExprKind::Bool {
            left,
            op: BoolOperator::Or,
            right,
        };
        Arc::new(Expr::new(kind, Type::Boolean))
    }

    #[must_use]
    pub fn unary(op: UnaryOperator, child: ExprRef) -> ExprRef {
        let ty = match op {
            UnaryOperator::Not | UnaryOperator::IsNull => Type::Boolean,
            UnaryOperator::Negate => child.ty,
        };
        Arc::new(Expr::new(ExprKind::Unary { op, child }, ty))
    }

    #[must_use]
    pub fn cast(child: ExprRef, to: Type) -> ExprRef {
        Arc::new(Expr::new(ExprKind::Cast { child, to }, to))
    }

    /// Result type is the type of the first result branch, or of the
    /// `ELSE` branch when there are no `WHEN` branches.
    #[must_use]
    pub fn case(
        search: Option<ExprRef>,
        when_then: Vec<(ExprRef, ExprRef)>,
        else_expr: Option<ExprRef>,
    ) -> ExprRef {
        let ty = when_then
            .iter()
            .map(|(_, then)| then.ty)
            .chain(else_expr.iter().map(|e| e.ty))
            .find(|ty| *ty != Type::Unknown)
            .unwrap_or(Type::Unknown);
        let kind = ExprKind::Case {
            search,
            when_then,
            else_expr,
        };
        Arc::new(Expr::new(kind, ty))
    }

    #[must_use]
    pub fn is_slot(&self) -> bool {
        matches!(self.kind, ExprKind::Slot(_))
    }

    fn hash_with_depth<H: Hasher>(&self, state: &mut H, depth: usize) {
        self.ty.hash(state);
        std::mem::discriminant(&self.kind).hash(state);
        if depth == 0 {
            return;
        }
        let depth = depth - 1;
        let hash_list = |list: &[ExprRef], state: &mut H| {
            list.len().hash(state);
            for e in list {
                e.hash_with_depth(state, depth);
            }
        };
        match &self.kind {
            ExprKind::Literal(value) => value.hash(state),
            ExprKind::Column { relation, name } => {
                relation.hash(state);
                name.hash(state);
            }
            ExprKind::Slot(id) => id.hash(state),
            ExprKind::Parameter(index) => index.hash(state),
            ExprKind::Function { name, args } => {
                name.hash(state);
                hash_list(args, state);
            }
            ExprKind::Aggregate {
                name,
                args,
                distinct,
            } => {
                name.hash(state);
                distinct.hash(state);
                hash_list(args, state);
            }
            ExprKind::Arithmetic { left, op, right } => {
                op.hash(state);
                left.hash_with_depth(state, depth);
                right.hash_with_depth(state, depth);
            }
            ExprKind::Comparison { left, op, right } => {
                op.hash(state);
                left.hash_with_depth(state, depth);
                right.hash_with_depth(state, depth);
            }
            ExprKind::Bool { left, op, right } => {
                op.hash(state);
                left.hash_with_depth(state, depth);
                right.hash_with_depth(state, depth);
            }
            ExprKind::Unary { op, child } => {
                op.hash(state);
                child.hash_with_depth(state, depth);
            }
            ExprKind::Cast { child, to } => {
                to.hash(state);
                child.hash_with_depth(state, depth);
            }
            ExprKind::Case {
                search,
                when_then,
                else_expr,
            } => {
                if let Some(search) = search {
                    search.hash_with_depth(state, depth);
                }
                when_then.len().hash(state);
                for (when, then) in when_then {
                    when.hash_with_depth(state, depth);
                    then.hash_with_depth(state, depth);
                }
                if let Some(else_expr) = else_expr {
                    else_expr.hash_with_depth(state, depth);
                }
            }
        }
    }
}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_with_depth(state, EXPR_HASH_DEPTH);
    }
}

fn fmt_list(f: &mut Formatter<'_>, list: &[ExprRef]) -> std::fmt::Result {
    for (i, e) in list.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Literal(value) => write!(f, "{value}"),
            ExprKind::Column {
                relation: Some(relation),
                name,
            } => write!(f, "{relation}.{name}"),
            ExprKind::Column {
                relation: None,
                name,
            } => write!(f, "{name}"),
            ExprKind::Slot(id) => write!(f, "{id}"),
            ExprKind::Parameter(index) => write!(f, "${}", u32::from(*index) + 1),
            ExprKind::Function { name, args } => {
                write!(f, "{name}(")?;
                fmt_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Aggregate {
                name,
                args,
                distinct,
            } => {
                write!(f, "{name}(")?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                fmt_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Arithmetic { left, op, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Comparison { left, op, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Bool { left, op, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Unary {
                op: UnaryOperator::IsNull,
                child,
            } => write!(f, "{child} is null"),
            ExprKind::Unary {
                op: UnaryOperator::Negate,
                child,
            } => write!(f, "-{child}"),
            ExprKind::Unary {
                op: UnaryOperator::Not,
                child,
            } => write!(f, "not {child}"),
            ExprKind::Cast { child, to } => write!(f, "{child}::{to}"),
            ExprKind::Case {
                search,
                when_then,
                else_expr,
            } => {
                write!(f, "CASE")?;
                if let Some(search) = search {
                    write!(f, " {search}")?;
                }
                for (when, then) in when_then {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(else_expr) = else_expr {
                    write!(f, " ELSE {else_expr}")?;
                }
                write!(f, " END")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::RandomState;
    use pretty_assertions::assert_eq;

    fn a() -> ExprRef {
        Expr::column("a", Type::Integer)
    }

    #[test]
    fn independently_built_trees_are_equal() {
        let lhs = Expr::arithmetic(a(), Arithmetic::Add, Expr::literal(1_i64));
        let rhs = Expr::arithmetic(a(), Arithmetic::Add, Expr::literal(1_i64));
        assert!(!Arc::ptr_eq(&lhs, &rhs));
        assert_eq!(lhs, rhs);

        let hasher = RandomState::new();
        assert_eq!(hasher.hash_one(&lhs), hasher.hash_one(&rhs));
    }

    #[test]
    fn type_takes_part_in_equality() {
        assert_ne!(Expr::column("a", Type::Integer), Expr::column("a", Type::Text));
        assert_ne!(
            Expr::column("a", Type::Integer),
            Expr::qualified_column("t", "a", Type::Integer)
        );
    }

    #[test]
    fn deep_trees_differing_below_hash_depth() {
        let mut lhs = Expr::literal(1_i64);
        let mut rhs = Expr::literal(2_i64);
        for _ in 0..EXPR_HASH_DEPTH + 2 {
            lhs = Expr::unary(UnaryOperator::Negate, lhs);
            rhs = Expr::unary(UnaryOperator::Negate, rhs);
        }
        // Same hash bucket, but still different expressions.
        let hasher = RandomState::new();
        assert_eq!(hasher.hash_one(&lhs), hasher.hash_one(&rhs));
        assert_ne!(lhs, rhs);
    }

    #[test]
    fn nan_literal_equals_itself() {
        assert_eq!(Expr::literal(f64::NAN), Expr::literal(f64::NAN));
    }

    #[test]
    fn result_types() {
        let sum = Expr::arithmetic(
            Expr::literal(1_u64),
            Arithmetic::Add,
            Expr::literal(1.5_f64),
        );
        assert_eq!(sum.get_type(), Type::Double);

        let cmp = Expr::comparison(a(), ComparisonOperator::Lt, Expr::literal(3_i64));
        assert_eq!(cmp.get_type(), Type::Boolean);

        let case = Expr::case(
            None,
            vec![(cmp, Expr::null()), (Expr::literal(true), Expr::literal("x"))],
            None,
        );
        assert_eq!(case.get_type(), Type::Text);

        assert_eq!(Expr::cast(a(), Type::Text).get_type(), Type::Text);
        assert_eq!(Type::Unknown.wider(Type::Integer), Type::Integer);
        assert_eq!(Type::Text.wider(Type::Integer), Type::Text);
    }

    #[test]
    fn display() {
        let expr = Expr::case(
            Some(Expr::qualified_column("t", "a", Type::Integer)),
            vec![(Expr::literal(1_i64), Expr::literal("one"))],
            Some(Expr::function(
                "lower",
                vec![Expr::cast(Expr::slot(SlotId(3), Type::Integer), Type::Text)],
                Type::Text,
            )),
        );
        assert_eq!(
            expr.to_string(),
            "CASE t.a WHEN 1 THEN 'one' ELSE lower(#3::text) END"
        );

        let expr = Expr::and(
            Expr::unary(UnaryOperator::IsNull, Expr::parameter(0, Type::Integer)),
            Expr::unary(
                UnaryOperator::Not,
                Expr::comparison(
                    Expr::aggregate("count", vec![a()], true, Type::Integer),
                    ComparisonOperator::GtEq,
                    Expr::literal(2_i64),
                ),
            ),
        );
        assert_eq!(
            expr.to_string(),
            "($1 is null and not (count(DISTINCT a) >= 2))"
        );
    }
}
