// Condition trees - comparison and boolean nodes rendered to parameterized SQL

use crate::schema::Field;
use crate::value::{Params, Value};
use std::fmt;
use std::ops;

/// Prefix of every placeholder key produced for a literal operand.
/// Declared field names and storage columns may not start with `__`, so
/// these keys never clash with column-keyed INSERT/UPDATE parameters.
pub const PLACEHOLDER_PREFIX: &str = "__p";

/// Comparison operator of a `Condition::Compare` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One side of a condition node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A field descriptor, rendered as its storage column name.
    Column(String),
    /// A nested condition, rendered parenthesized.
    Condition(Box<Condition>),
    /// A literal, rendered as a placeholder and collected into the parameters.
    Value(Value),
}

impl From<Condition> for Operand {
    fn from(value: Condition) -> Self {
        Operand::Condition(Box::new(value))
    }
}

impl From<&Field> for Operand {
    fn from(value: &Field) -> Self {
        Operand::Column(value.column_name().to_string())
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Value(value.into())
                }
            }
        )*
    };
}

literal_operand!(Value, &str, String, &String, i64, i32, u32, f64, bool);

/// A composable filter expression.
///
/// Conditions are values, not booleans: comparing a field descriptor yields a
/// `Condition` that can be combined with `and`/`or`/`not` (or `&`, `|`, `!`)
/// and reused across queries. Rendering is deterministic: the same tree always
/// produces the same SQL text and the same parameter map.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Operand,
        op: BinaryOp,
        right: Operand,
    },
    And(Operand, Operand),
    Or(Operand, Operand),
    Not(Operand),
}

impl Condition {
    pub fn compare(left: impl Into<Operand>, op: BinaryOp, right: impl Into<Operand>) -> Self {
        Condition::Compare {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    pub fn and(self, other: impl Into<Operand>) -> Self {
        Condition::And(self.into(), other.into())
    }

    pub fn or(self, other: impl Into<Operand>) -> Self {
        Condition::Or(self.into(), other.into())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Condition::Not(self.into())
    }

    /// SQL text of this condition, with `:key` placeholders for literals.
    pub fn render(&self) -> String {
        self.compile().0
    }

    /// Placeholder key -> literal value for every literal in the tree.
    /// Keys match the placeholders in `render()` one to one.
    pub fn collect_parameters(&self) -> Params {
        self.compile().1
    }

    /// Render and collect in a single traversal.
    pub fn compile(&self) -> (String, Params) {
        let mut writer = Writer::default();
        writer.condition(self);
        (writer.sql, writer.params)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl ops::BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl ops::BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl ops::Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(self.into())
    }
}

/// Walks a tree left to right, depth first. Literal keys come from a counter
/// local to the walk, so they depend only on the tree's structure.
#[derive(Default)]
struct Writer {
    sql: String,
    params: Params,
    literals: usize,
}

impl Writer {
    fn condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Compare { left, op, right } => self.binary(left, op.as_sql(), right),
            Condition::And(left, right) => self.binary(left, "AND", right),
            Condition::Or(left, right) => self.binary(left, "OR", right),
            Condition::Not(inner) => {
                self.sql.push_str("NOT ");
                self.operand(inner);
            }
        }
    }

    fn binary(&mut self, left: &Operand, op: &str, right: &Operand) {
        self.operand(left);
        self.sql.push(' ');
        self.sql.push_str(op);
        self.sql.push(' ');
        self.operand(right);
    }

    fn operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Column(name) => self.sql.push_str(name),
            Operand::Condition(inner) => {
                self.sql.push('(');
                self.condition(inner);
                self.sql.push(')');
            }
            Operand::Value(value) => {
                self.literals += 1;
                let key = format!("{PLACEHOLDER_PREFIX}{}", self.literals);
                self.sql.push(':');
                self.sql.push_str(&key);
                self.params.insert(key, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use pretty_assertions::assert_eq;
    use regex::Regex;
    use std::collections::BTreeSet;

    fn placeholders(sql: &str) -> BTreeSet<String> {
        let re = Regex::new(r":(__p\d+)").unwrap();
        re.captures_iter(sql).map(|c| c[1].to_string()).collect()
    }

    #[test]
    fn test_comparison_renders_column_and_placeholder() {
        let age = Field::integer("age");
        let cond = age.ge(18);

        assert_eq!(cond.render(), "age >= :__p1");
        assert_eq!(cond.collect_parameters()["__p1"], Value::Integer(18));
    }

    #[test]
    fn test_and_parenthesizes_nested_conditions() {
        let age = Field::integer("age");
        let name = Field::text("name");
        let cond = age.ge(18).and(name.ne("Bob"));

        let (sql, params) = cond.compile();
        assert_eq!(sql, "(age >= :__p1) AND (name != :__p2)");
        assert_eq!(params.len(), 2);
        assert_eq!(params["__p1"], Value::Integer(18));
        assert_eq!(params["__p2"], Value::Text("Bob".into()));
    }

    #[test]
    fn test_operators_match_methods() {
        let age = Field::integer("age");
        let name = Field::text("name");

        assert_eq!(age.lt(3) & name.eq("x"), age.lt(3).and(name.eq("x")));
        assert_eq!(age.le(3) | name.eq("x"), age.le(3).or(name.eq("x")));
        assert_eq!(!age.gt(3), age.gt(3).not());
    }

    #[test]
    fn test_not_renders_unary() {
        let active = Field::boolean("active");
        let cond = active.eq(true).not();
        assert_eq!(cond.render(), "NOT (active = :__p1)");
    }

    #[test]
    fn test_render_is_stable() {
        let age = Field::integer("age");
        let name = Field::text("name");
        let cond = age.gt(1).or(name.eq("a").and(age.lt(99))).not();

        assert_eq!(cond.render(), cond.render());
        assert_eq!(cond.collect_parameters(), cond.collect_parameters());
    }

    #[test]
    fn test_parameter_keys_match_placeholders() {
        let age = Field::integer("age");
        let name = Field::text("name");
        let shared = age.eq(5);
        let cond = shared
            .clone()
            .and(shared)
            .or(name.ne("Bob").not())
            .and(true);

        let (sql, params) = cond.compile();
        let keys: BTreeSet<String> = params.keys().cloned().collect();
        assert_eq!(keys, placeholders(&sql));
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_literal_on_left_and_field_on_right() {
        let owner = Field::integer("owner").column("owner_id");
        let id = Field::integer("id");

        assert_eq!(
            Condition::compare(10, BinaryOp::Lt, &owner).render(),
            ":__p1 < owner_id"
        );
        assert_eq!(owner.eq(&id).render(), "owner_id = id");
        assert!(owner.eq(&id).collect_parameters().is_empty());
    }

    #[test]
    fn test_combining_with_a_literal() {
        let flag = Field::boolean("flag");
        let cond = flag.eq(true).or(1);
        let (sql, params) = cond.compile();
        assert_eq!(sql, "(flag = :__p1) OR :__p2");
        assert_eq!(params["__p2"], Value::Integer(1));
    }
}
