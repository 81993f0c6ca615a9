use std::fmt;
use std::fmt::Write as _;

use formula_vector::{format_date, DataType, Value, Vector};

use crate::{FrameError, FrameResult};

/// The parts of one composed `WITH <alias> AS (<source>) SELECT ...` statement.
#[derive(Clone, Copy, Debug)]
pub struct Select<'a> {
    pub alias: &'a str,
    pub source: &'a str,
    /// Output expressions, already aliased (see [`Dialect::field`]).
    pub fields: &'a [String],
    pub group_by: &'a [String],
    pub order_by: Option<&'a str>,
}

/// One SQL variant: fragment syntax plus the database round trips the SQL backend needs.
///
/// The syntax builders have ANSI-flavoured defaults; a dialect overrides what its database
/// spells differently. [`SqlFrame`](crate::SqlFrame) builds every fragment through this trait.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn literal(&self, value: &Value) -> FrameResult<String> {
        Ok(match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) if v.is_finite() => format!("{v:?}"),
            Value::Float(_) => return Err(self.unsupported("non-finite float literals")),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Date(d) => format!("'{}'", format_date(*d)),
        })
    }

    /// Column type used in `CREATE TABLE`.
    fn type_name(&self, data_type: DataType) -> FrameResult<&'static str>;

    fn cast_field(&self, expr: &str, from: DataType, to: DataType) -> FrameResult<String>;

    fn case(&self, whens: &[String], thens: &[String], otherwise: &str) -> String {
        if whens.is_empty() {
            return otherwise.to_string();
        }
        let mut sql = String::from("CASE");
        for (when, then) in whens.iter().zip(thens) {
            let _ = write!(sql, " WHEN {when} THEN {then}");
        }
        let _ = write!(sql, " ELSE {otherwise} END");
        sql
    }

    /// Comparison yielding 1 or 0.
    fn compare(&self, op: &str, left: &str, right: &str) -> FrameResult<String> {
        let symbol = match op {
            "eq" => "=",
            "ne" => "<>",
            "ge" => ">=",
            "gt" => ">",
            "le" => "<=",
            "lt" => "<",
            other => return Err(self.unsupported(&format!("comparison {other}"))),
        };
        Ok(format!("({left} {symbol} {right})"))
    }

    /// The native spelling of a named operation over already-built argument fragments.
    fn function(&self, name: &str, args: &[String]) -> FrameResult<String> {
        let infix = |symbol: &str| format!("({})", args.join(&format!(" {symbol} ")));
        Ok(match (name, args) {
            ("add", [_, _]) => infix("+"),
            ("subtract", [_, _]) => infix("-"),
            ("multiply", [_, _]) => infix("*"),
            ("divide", [_, _]) => infix("/"),
            ("concat", [_, _, ..]) => infix("||"),
            ("and", [_, _]) => infix("AND"),
            ("or", [_, _]) => infix("OR"),
            ("not", [arg]) => format!("(NOT {arg})"),
            ("negate", [arg]) => format!("(- {arg})"),
            ("mean", [arg]) => format!("avg({arg})"),
            ("log", [arg]) => format!("ln({arg})"),
            ("abs" | "exp" | "sqrt" | "pow" | "sum" | "count" | "min" | "max", _) => {
                format!("{name}({})", args.join(", "))
            }
            _ => return Err(self.unsupported(name)),
        })
    }

    /// Zero-based row index.
    fn row_number(&self, order_by: Option<&str>) -> String {
        match order_by {
            Some(order) => format!("(ROW_NUMBER() OVER (ORDER BY {order}) - 1)"),
            None => "(ROW_NUMBER() OVER () - 1)".to_string(),
        }
    }

    fn quantile(&self, expr: &str, level: f64) -> FrameResult<String> {
        Ok(format!(
            "percentile_cont({level:?}) WITHIN GROUP (ORDER BY {expr})"
        ))
    }

    /// Repeat an aggregate's single value on every row.
    fn broadcast(&self, aggregate: &str) -> String {
        format!("{aggregate} OVER ()")
    }

    /// An aggregate over every row of `alias`, usable inside a grouped query.
    fn scalar_subquery(&self, aggregate: &str, alias: &str) -> String {
        format!("(SELECT {aggregate} FROM {alias})")
    }

    /// Null-safe equality.
    fn same(&self, left: &str, right: &str) -> String {
        format!("({left} IS NOT DISTINCT FROM {right})")
    }

    /// An aggregate over the rows of `alias` whose `keys` match the current row's, usable as an
    /// operand of an aggregate in a query grouped on those keys.
    fn group_subquery(&self, aggregate: &str, alias: &str, keys: &[String]) -> String {
        let inner = format!("{alias}_g");
        let matches = keys
            .iter()
            .map(|key| self.same(&format!("{inner}.{key}"), &format!("{alias}.{key}")))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("(SELECT {aggregate} FROM {alias} AS {inner} WHERE {matches})")
    }

    fn field(&self, expr: &str, name: &str) -> String {
        format!("{expr} AS {}", self.quote_ident(name))
    }

    fn order_by(&self, keys: &[String], ascending: bool) -> String {
        let direction = if ascending { "ASC" } else { "DESC" };
        keys.iter()
            .map(|key| format!("{key} {direction}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select(&self, select: &Select<'_>) -> String {
        let fields = if select.fields.is_empty() {
            "*".to_string()
        } else {
            select.fields.join(", ")
        };
        let mut sql = format!(
            "WITH {alias} AS ({source}) SELECT {fields} FROM {alias}",
            alias = select.alias,
            source = select.source,
        );
        if !select.group_by.is_empty() {
            let _ = write!(sql, " GROUP BY {}", select.group_by.join(", "));
        }
        if let Some(order) = select.order_by {
            let _ = write!(sql, " ORDER BY {order}");
        }
        sql
    }

    fn table_query(&self, table: &str) -> String {
        format!("SELECT * FROM {}", self.quote_ident(table))
    }

    /// A single row of aliased literal fields.
    fn select_values(&self, fields: &[String]) -> String {
        format!("SELECT {}", fields.join(", "))
    }

    fn union_all(&self, selects: &[String]) -> String {
        selects.join(" UNION ALL ")
    }

    fn row_count(&self, query: &str) -> FrameResult<usize>;

    /// Output column names and types of `query`.
    fn types(&self, query: &str) -> FrameResult<Vec<(String, DataType)>>;

    /// Run `query` and read each output column as the matching entry of `types`.
    fn fetch(&self, query: &str, types: &[DataType]) -> FrameResult<Vec<Vector>>;

    fn exists(&self, table: &str) -> FrameResult<bool>;

    fn create(&self, table: &str, fields: &[(String, DataType)], overwrite: bool)
        -> FrameResult<()>;

    fn drop_table(&self, table: &str) -> FrameResult<()>;

    fn insert(&self, table: &str, query: &str, fields: &[String]) -> FrameResult<()>;

    fn unsupported(&self, what: &str) -> FrameError {
        FrameError::Unsupported {
            dialect: self.name().to_string(),
            what: what.to_string(),
        }
    }
}
