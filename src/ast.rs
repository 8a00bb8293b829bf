//! Core value types for the interpreter.
//!
//! Everything the reader produces and the evaluator consumes is a [`Value`].
//! Lists are chains of [`Pair`]s ending in [`Value::Nil`], so improper
//! (dotted) lists come for free. Logic variables and the reified
//! placeholders they print as are ordinary values, which lets the
//! relational operators flow through the same evaluator as the rest of
//! the language.

use std::fmt;
use std::rc::Rc;

use crate::env::Env;
use crate::error::Error;
use crate::goals::Goal;

/// Numeric type used by the interpreter.
pub type NumberType = i64;

/// Characters allowed in symbols besides ASCII alphanumerics.
pub const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$%.";

/// Check if a string is a valid symbol name.
///
/// Symbols cannot be empty, cannot start with a digit, and cannot look
/// like a negative number.
pub fn is_valid_symbol(name: &str) -> bool {
    let first = match name.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if first.is_ascii_digit() {
        return false;
    }
    if first == '-' && matches!(name.chars().nth(1), Some(c) if c.is_ascii_digit()) {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(NumberType),
    String(String),
    Symbol(String),
    Pair(Rc<Pair>),
    Var(Var),
    Free(usize),
    Goal(Goal),
    Procedure(Procedure),
}

/// A cons cell. `rest` is `Nil` for the last cell of a proper list and
/// an arbitrary value for a dotted pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

// The derived drop glue would recurse along `rest`, so a list as long
// as the ones `run*` can produce would overflow the stack when freed.
// Dismantle the spine in a loop instead, stopping at shared cells.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut rest = std::mem::replace(&mut self.rest, Value::Nil);
        while let Value::Pair(p) = rest {
            match Rc::try_unwrap(p) {
                Ok(mut cell) => rest = std::mem::replace(&mut cell.rest, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// A logic variable.
///
/// Variables are named for printing, but their identity is the
/// allocation: two variables with the same name are distinct unless one
/// is a clone of the other. This mirrors vector-backed variables in the
/// Scheme tradition, where `eq?` compares addresses.
#[derive(Clone)]
pub struct Var(Rc<String>);

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Var(Rc::new(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Var {}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A callable value.
///
/// `Direct` procedures compute a result in place. `Tail` procedures
/// return the expression to evaluate next together with its
/// environment, which the evaluator loop consumes without growing the
/// stack. Both receive their argument list unevaluated, so special
/// forms and ordinary builtins share one calling convention.
#[derive(Clone)]
pub enum Procedure {
    Direct {
        name: &'static str,
        f: Rc<dyn Fn(&Value, &Env) -> Result<Value, Error>>,
    },
    Tail {
        name: &'static str,
        f: Rc<dyn Fn(&Value, &Env) -> Result<(Value, Env), Error>>,
    },
}

impl Procedure {
    pub fn direct(
        name: &'static str,
        f: impl Fn(&Value, &Env) -> Result<Value, Error> + 'static,
    ) -> Value {
        Value::Procedure(Procedure::Direct { name, f: Rc::new(f) })
    }

    pub fn tail(
        name: &'static str,
        f: impl Fn(&Value, &Env) -> Result<(Value, Env), Error> + 'static,
    ) -> Value {
        Value::Procedure(Procedure::Tail { name, f: Rc::new(f) })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Procedure::Direct { name, .. } => name,
            Procedure::Tail { name, .. } => name,
        }
    }
}

impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Direct { f: a, .. }, Procedure::Direct { f: b, .. }) => {
                thin_ptr(a) == thin_ptr(b)
            }
            (Procedure::Tail { f: a, .. }, Procedure::Tail { f: b, .. }) => {
                thin_ptr(a) == thin_ptr(b)
            }
            _ => false,
        }
    }
}

// Compare data pointers only. Fat pointer comparison would include the
// vtable address, which is not unique across codegen units.
fn thin_ptr<T: ?Sized>(rc: &Rc<T>) -> *const () {
    Rc::as_ptr(rc) as *const ()
}

impl Value {
    pub fn cons(first: Value, rest: Value) -> Value {
        Value::Pair(Rc::new(Pair { first, rest }))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Everything is true except `#f` and the empty list.
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::Var(a), Value::Var(b)) => a == b,
            (Value::Free(a), Value::Free(b)) => a == b,
            (Value::Goal(a), Value::Goal(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => a == b,
            _ => false,
        }
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

/// Shorthand for a symbol value.
pub fn sym(name: &str) -> Value {
    Value::Symbol(name.into())
}

/// Build a proper list.
pub fn list(items: Vec<Value>) -> Value {
    list_with_tail(items, Value::Nil)
}

/// Build a list ending in `tail` instead of `Nil`.
pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Value {
    let mut out = tail;
    for item in items.into_iter().rev() {
        out = Value::cons(item, out);
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write_string(f, s),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Pair(p) => write_pair(f, p),
            Value::Var(v) => write!(f, "{}", v.name()),
            Value::Free(n) => write!(f, "_.{n}"),
            Value::Goal(g) => write!(f, "{g}"),
            Value::Procedure(p) => write!(f, "#<procedure {}>", p.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            _ => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

fn write_pair(f: &mut fmt::Formatter<'_>, pair: &Rc<Pair>) -> fmt::Result {
    if let Some((mark, inner)) = quote_sugar(pair) {
        return write!(f, "{mark}{inner}");
    }
    write!(f, "(")?;
    let mut cur = pair;
    loop {
        write!(f, "{}", cur.first)?;
        match &cur.rest {
            Value::Nil => break,
            Value::Pair(next) => {
                write!(f, " ")?;
                cur = next;
            }
            tail => {
                write!(f, " . {tail}")?;
                break;
            }
        }
    }
    write!(f, ")")
}

/// Two-element lists headed by a quoting symbol print in reader sugar,
/// so `(quote x)` displays as `'x`.
fn quote_sugar(pair: &Pair) -> Option<(&'static str, &Value)> {
    let Value::Symbol(name) = &pair.first else {
        return None;
    };
    let Value::Pair(rest) = &pair.rest else {
        return None;
    };
    if !rest.rest.is_nil() {
        return None;
    }
    let mark = match name.as_str() {
        "quote" => "'",
        "quasiquote" => "`",
        "unquote" => ",",
        _ => return None,
    };
    Some((mark, &rest.first))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let cases: Vec<(Value, &str)> = vec![
            (Value::Nil, "()"),
            (Value::Bool(true), "#t"),
            (Value::Bool(false), "#f"),
            (Value::Number(-42), "-42"),
            (sym("foo"), "foo"),
            (Value::from("a \"b\""), "\"a \\\"b\\\"\""),
            (Value::Free(3), "_.3"),
            (Value::cons(1.into(), 2.into()), "(1 . 2)"),
            (
                Value::cons(1.into(), Value::cons(2.into(), 3.into())),
                "(1 2 . 3)",
            ),
            (list(vec![1.into(), 2.into(), 3.into()]), "(1 2 3)"),
            (list(vec![1.into(), 2.into(), Value::Nil]), "(1 2 ())"),
            (
                list_with_tail(vec![1.into(), 2.into(), 3.into()], 4.into()),
                "(1 2 3 . 4)",
            ),
            (list(vec![sym("quote"), sym("x")]), "'x"),
            (
                list(vec![
                    sym("quasiquote"),
                    list(vec![sym("unquote"), sym("x")]),
                ]),
                "`,x",
            ),
            (
                list(vec![sym("quote"), list(vec![1.into(), 2.into()])]),
                "'(1 2)",
            ),
            // three elements is not sugar
            (list(vec![sym("quote"), sym("x"), sym("y")]), "(quote x y)"),
        ];
        for (value, expected) in cases {
            assert_eq!(value.to_string(), expected);
        }
    }

    #[test]
    fn variables_compare_by_identity() {
        let a = Var::new("x");
        let b = Var::new("x");
        assert_ne!(Value::Var(a.clone()), Value::Var(b));
        assert_eq!(Value::Var(a.clone()), Value::Var(a.clone()));
        assert_eq!(Value::Var(a).to_string(), "x");
    }

    #[test]
    fn pairs_compare_structurally() {
        let a = list(vec![1.into(), list(vec![2.into()]), 3.into()]);
        let b = list(vec![1.into(), list(vec![2.into()]), 3.into()]);
        assert_eq!(a, b);
        assert_ne!(a, list(vec![1.into(), 2.into(), 3.into()]));
        assert_ne!(Value::Number(1), Value::Bool(true));
    }

    #[test]
    fn symbol_validation() {
        let cases = vec![
            ("foo", true),
            ("null?", true),
            ("run*", true),
            ("==", true),
            ("-", true),
            ("test-check", true),
            ("x2", true),
            ("", false),
            ("2x", false),
            ("-2", false),
            ("a.b", true),
            ("_.0", true),
            ("#t", false),
        ];
        for (name, expected) in cases {
            assert_eq!(is_valid_symbol(name), expected, "symbol: {name:?}");
        }
    }
}
