//! Sandboxed boolean expressions over record fields.
//!
//! The grammar is a small Python-flavoured subset: `and`/`or`/`not`, chained
//! comparisons (including `in`/`not in`), integer arithmetic, string literals
//! (with `r'...'` raw strings), subscripts and dotted access into maps. Names
//! resolve only against the record being evaluated and the only callables are
//! `int`, `len`, `str`, `re_fullmatch` and `re_search`.
mod eval;
mod lexer;
mod parser;

use thiserror::Error;
use tracing::trace;

use crate::domain::value::{FieldSource, Value};

pub use parser::{BinOp, CmpOp, Expr, MAX_NESTING, MAX_TOKENS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("function '{0}' is not allowed")]
    UnknownFunction(String),
    #[error("{name}() takes {expected} argument(s), {got} given")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("key '{0}' not found")]
    MissingKey(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    #[error("invalid regex: {0}")]
    Regex(String),
}

/// A parsed filter expression, compiled once and evaluated per record.
#[derive(Debug, Clone)]
pub struct Condition {
    source: String,
    ast: Expr,
    regexes: eval::RegexCache,
}

impl Condition {
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        let tokens = lexer::tokenize(source)?;
        let ast = parser::parse(&tokens)?;
        let regexes = eval::RegexCache::for_expr(&ast);
        Ok(Self {
            source: source.to_string(),
            ast,
            regexes,
        })
    }

    /// Number of literal regex patterns compiled up front.
    pub fn regex_count(&self) -> usize {
        self.regexes.count()
    }

    pub fn eval(&self, fields: &dyn FieldSource) -> Result<Value, ExprError> {
        let env = eval::Env {
            fields,
            regexes: &self.regexes,
        };
        eval::eval(&self.ast, &env)
    }

    /// Truthiness of the expression; any evaluation error counts as no match.
    pub fn matches(&self, fields: &dyn FieldSource) -> bool {
        match self.eval(fields) {
            Ok(v) => v.truthy(),
            Err(e) => {
                trace!(condition = %self.source, error = %e, "Condition evaluation failed");
                false
            }
        }
    }
}

/// One-shot evaluation: compile errors and runtime errors both yield `false`.
pub fn evaluate_condition(source: &str, fields: &dyn FieldSource) -> bool {
    match Condition::compile(source) {
        Ok(c) => c.matches(fields),
        Err(_) => false,
    }
}
