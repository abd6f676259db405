use std::{cmp::Ordering, collections::HashMap};

use regex::Regex;

use super::parser::{BinOp, CmpOp, Expr};
use super::ExprError;
use crate::domain::value::{FieldSource, Value};

const MAX_STRING_LEN: usize = 100_000;

/// Regexes for the literal patterns passed to `re_fullmatch`/`re_search`,
/// compiled once per condition. Patterns computed at run time are compiled per call.
#[derive(Debug, Clone, Default)]
pub struct RegexCache {
    compiled: HashMap<(String, bool), Result<Regex, ExprError>>,
}

impl RegexCache {
    pub fn for_expr(expr: &Expr) -> Self {
        let mut cache = Self::default();
        cache.collect(expr);
        cache
    }

    fn collect(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) | Expr::Name(_) => {}
            Expr::Call(name, args) => {
                if let (Some(anchored), Some(Expr::Literal(Value::Str(p)))) =
                    (regex_anchoring(name), args.first())
                {
                    self.compiled
                        .entry((p.clone(), anchored))
                        .or_insert_with(|| build_regex(p, anchored));
                }
                args.iter().for_each(|a| self.collect(a));
            }
            Expr::Attr(inner, _) | Expr::Neg(inner) | Expr::Not(inner) => self.collect(inner),
            Expr::Index(l, r) | Expr::And(l, r) | Expr::Or(l, r) | Expr::Binary(_, l, r) => {
                self.collect(l);
                self.collect(r);
            }
            Expr::Compare(first, rest) => {
                self.collect(first);
                rest.iter().for_each(|(_, e)| self.collect(e));
            }
        }
    }

    pub fn count(&self) -> usize {
        self.compiled.len()
    }

    fn get(&self, pattern: &Value, anchored: bool) -> Result<Regex, ExprError> {
        let Value::Str(p) = pattern else {
            return Err(ExprError::Type("regex pattern must be a string".into()));
        };
        match self.compiled.get(&(p.clone(), anchored)) {
            Some(cached) => cached.clone(),
            None => build_regex(p, anchored),
        }
    }
}

/// Record being evaluated plus the condition's precompiled regexes.
pub struct Env<'a> {
    pub fields: &'a dyn FieldSource,
    pub regexes: &'a RegexCache,
}

pub fn eval(expr: &Expr, env: &Env<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Name(name) => env
            .fields
            .field_value(name)
            .ok_or_else(|| ExprError::UnknownName(name.clone())),
        Expr::Attr(target, key) => match eval(target, env)? {
            Value::Map(m) => m
                .get(key)
                .map(|v| Value::Str(v.clone()))
                .ok_or_else(|| ExprError::MissingKey(key.clone())),
            other => Err(ExprError::Type(format!(
                "'{}' object has no attribute '{key}'",
                other.type_name()
            ))),
        },
        Expr::Index(target, index) => {
            let target = eval(target, env)?;
            let index = eval(index, env)?;
            subscript(target, index)
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, env))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, args, env.regexes)
        }
        Expr::Neg(inner) => match eval(inner, env)?.as_int() {
            Some(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| ExprError::Arithmetic("integer overflow".into())),
            None => Err(ExprError::Type("bad operand type for unary -".into())),
        },
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, env)?.truthy())),
        Expr::And(left, right) => {
            let l = eval(left, env)?;
            if !l.truthy() {
                return Ok(l);
            }
            eval(right, env)
        }
        Expr::Or(left, right) => {
            let l = eval(left, env)?;
            if l.truthy() {
                return Ok(l);
            }
            eval(right, env)
        }
        Expr::Binary(op, left, right) => {
            let l = eval(left, env)?;
            let r = eval(right, env)?;
            binary(*op, l, r)
        }
        Expr::Compare(first, rest) => {
            let mut left = eval(first, env)?;
            for (op, right) in rest {
                let right = eval(right, env)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
    }
}

fn subscript(target: Value, index: Value) -> Result<Value, ExprError> {
    match (target, index) {
        (Value::Map(m), Value::Str(key)) => m
            .get(&key)
            .map(|v| Value::Str(v.clone()))
            .ok_or(ExprError::MissingKey(key)),
        (Value::Str(s), idx) => {
            let Some(i) = idx.as_int() else {
                return Err(ExprError::Type("string indices must be integers".into()));
            };
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let pos = if i < 0 { len + i } else { i };
            if pos < 0 || pos >= len {
                return Err(ExprError::Type("string index out of range".into()));
            }
            Ok(Value::Str(chars[pos as usize].to_string()))
        }
        (target, _) => Err(ExprError::Type(format!(
            "'{}' object is not subscriptable",
            target.type_name()
        ))),
    }
}

fn call(name: &str, args: Vec<Value>, regexes: &RegexCache) -> Result<Value, ExprError> {
    match name {
        "int" => {
            let [arg] = take_args::<1>(name, args)?;
            to_int(&arg).map(Value::Int)
        }
        "len" => {
            let [arg] = take_args::<1>(name, args)?;
            match arg {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::Map(m) => Ok(Value::Int(m.len() as i64)),
                other => Err(ExprError::Type(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            }
        }
        "str" => {
            let [arg] = take_args::<1>(name, args)?;
            Ok(Value::Str(arg.to_string()))
        }
        "re_fullmatch" => {
            let [pattern, target] = take_args::<2>(name, args)?;
            let re = regexes.get(&pattern, true)?;
            Ok(Value::Bool(re.is_match(&target.to_string())))
        }
        "re_search" => {
            let [pattern, target] = take_args::<2>(name, args)?;
            let re = regexes.get(&pattern, false)?;
            Ok(Value::Bool(re.is_match(&target.to_string())))
        }
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

fn take_args<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ExprError> {
    let got = args.len();
    args.try_into().map_err(|_| ExprError::Arity {
        name: name.to_string(),
        expected: N,
        got,
    })
}

fn regex_anchoring(helper: &str) -> Option<bool> {
    match helper {
        "re_fullmatch" => Some(true),
        "re_search" => Some(false),
        _ => None,
    }
}

fn build_regex(p: &str, anchored: bool) -> Result<Regex, ExprError> {
    let source = if anchored {
        format!("^(?:{p})$")
    } else {
        p.to_string()
    };
    Regex::new(&source).map_err(|e| ExprError::Regex(e.to_string()))
}

fn to_int(v: &Value) -> Result<i64, ExprError> {
    match v {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Str(s) => {
            let t = s.trim().replace('_', "");
            t.parse::<i64>().map_err(|_| {
                ExprError::Type(format!("invalid literal for int() with base 10: '{s}'"))
            })
        }
        other => Err(ExprError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value, ExprError> {
    if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
        let overflow = || ExprError::Arithmetic("integer overflow".into());
        return match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinOp::FloorDiv => floor_div(a, b).map(Value::Int),
            BinOp::Mod => floor_mod(a, b).map(Value::Int),
        };
    }

    match (op, l, r) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            if a.len() + b.len() > MAX_STRING_LEN {
                return Err(ExprError::Arithmetic("string too long".into()));
            }
            Ok(Value::Str(a + &b))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
            let times = n.as_int().unwrap_or(0).max(0) as usize;
            if s.len().saturating_mul(times) > MAX_STRING_LEN {
                return Err(ExprError::Arithmetic("string too long".into()));
            }
            Ok(Value::Str(s.repeat(times)))
        }
        (op, l, r) => Err(ExprError::Type(format!(
            "unsupported operand types for {op:?}: '{}' and '{}'",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn floor_div(a: i64, b: i64) -> Result<i64, ExprError> {
    if b == 0 {
        return Err(ExprError::Arithmetic("integer division by zero".into()));
    }
    let q = a
        .checked_div(b)
        .ok_or_else(|| ExprError::Arithmetic("integer overflow".into()))?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Result<i64, ExprError> {
    if b == 0 {
        return Err(ExprError::Arithmetic("integer modulo by zero".into()));
    }
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool, ExprError> {
    match op {
        CmpOp::Eq => Ok(equals(l, r)),
        CmpOp::Ne => Ok(!equals(l, r)),
        CmpOp::In => contains(r, l),
        CmpOp::NotIn => contains(r, l).map(|b| !b),
        CmpOp::Lt => order(l, r).map(|o| o == Ordering::Less),
        CmpOp::Le => order(l, r).map(|o| o != Ordering::Greater),
        CmpOp::Gt => order(l, r).map(|o| o == Ordering::Greater),
        CmpOp::Ge => order(l, r).map(|o| o != Ordering::Less),
    }
}

fn equals(l: &Value, r: &Value) -> bool {
    match (l.as_int(), r.as_int()) {
        (Some(a), Some(b)) => a == b,
        _ => l == r,
    }
}

fn order(l: &Value, r: &Value) -> Result<Ordering, ExprError> {
    if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
        return Ok(a.cmp(&b));
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(ExprError::Type(format!(
            "ordering not supported between '{}' and '{}'",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, ExprError> {
    match (haystack, needle) {
        (Value::Str(h), Value::Str(n)) => Ok(h.contains(n.as_str())),
        (Value::Str(_), other) => Err(ExprError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::Map(m), Value::Str(k)) => Ok(m.contains_key(k)),
        (Value::Map(_), _) => Ok(false),
        (other, _) => Err(ExprError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}
