//! The global environment and the builtin procedures that are not
//! special forms of the evaluator itself.

use crate::ast::{self, NumberType, Procedure, Value};
use crate::env::Env;
use crate::error::Error;
use crate::evaluator::{self, eval, eval_two};
use crate::goals;

/// Build the global environment with every builtin bound.
///
/// The returned environment is a child of the frame holding the
/// builtins, so user `define`s shadow them without overwriting.
pub fn default_env() -> Env {
    let env = Env::new();
    // special forms
    env.set("quote", Procedure::direct("quote", evaluator::quote));
    env.set("unquote", Procedure::direct("unquote", evaluator::unquote));
    env.set(
        "quasiquote",
        Procedure::direct("quasiquote", evaluator::quasiquote),
    );
    env.set("lambda", Procedure::direct("lambda", evaluator::lambda));
    env.set("let", Procedure::tail("let", evaluator::let_form));
    env.set("define", Procedure::direct("define", evaluator::define));
    env.set("cond", Procedure::tail("cond", evaluator::cond));
    env.set("else", Value::Bool(true));
    // lists
    env.set("car", Procedure::direct("car", car));
    env.set("cdr", Procedure::direct("cdr", cdr));
    env.set("cons", Procedure::direct("cons", cons));
    env.set("list", Procedure::direct("list", list));
    env.set("null?", Procedure::direct("null?", is_null));
    env.set("pair?", Procedure::direct("pair?", is_pair));
    // logic
    env.set("and", Procedure::direct("and", and));
    env.set("or", Procedure::direct("or", or));
    env.set("not", Procedure::direct("not", not));
    // comparisons
    env.set(
        "=",
        Procedure::direct("=", |args, env| cmp_chain(args, env, |a, b| Ok(a == b))),
    );
    env.set(
        "<",
        Procedure::direct("<", |args, env| {
            cmp_chain(args, env, |a, b| Ok(int(a)? < int(b)?))
        }),
    );
    env.set(
        ">",
        Procedure::direct(">", |args, env| {
            cmp_chain(args, env, |a, b| Ok(int(a)? > int(b)?))
        }),
    );
    // arithmetic
    env.set(
        "+",
        Procedure::direct("+", |args, env| {
            fold(args, env, |a, b| {
                a.checked_add(b).ok_or(Error::Overflow("+"))
            })
        }),
    );
    env.set("-", Procedure::direct("-", sub));
    env.set(
        "*",
        Procedure::direct("*", |args, env| {
            fold(args, env, |a, b| {
                a.checked_mul(b).ok_or(Error::Overflow("*"))
            })
        }),
    );
    env.set(
        "/",
        Procedure::direct("/", |args, env| {
            fold(args, env, |a, b| {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                a.checked_div(b).ok_or(Error::Overflow("/"))
            })
        }),
    );
    env.set(
        "%",
        Procedure::direct("%", |args, env| {
            fold(args, env, |a, b| {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                a.checked_rem(b).ok_or(Error::Overflow("%"))
            })
        }),
    );
    // extras
    env.set("test-check", Procedure::direct("test-check", test_check));
    env.set("load", Procedure::direct("load", load_files));
    // relational
    env.set("run", Procedure::direct("run", goals::run));
    env.set("run*", Procedure::direct("run*", goals::run_all));
    env.set("succeed", goals::succeed());
    env.set("fail", goals::fail());
    env.set("==", Procedure::direct("==", goals::unify_goal));
    env.set("fresh", Procedure::direct("fresh", goals::fresh_goal));
    env.set("conde", Procedure::direct("conde", goals::conde_goal));
    env.set("project", Procedure::direct("project", goals::project_goal));
    env.child()
}

/// First element of a pair. Extra arguments are ignored.
fn car(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    match eval(p.first.clone(), env)? {
        Value::Pair(pair) => Ok(pair.first.clone()),
        other => Err(Error::NonList(other)),
    }
}

fn cdr(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    match eval(p.first.clone(), env)? {
        Value::Pair(pair) => Ok(pair.rest.clone()),
        other => Err(Error::NonList(other)),
    }
}

fn cons(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let (first, rest) = eval_two(p, env)?;
    Ok(Value::cons(first, rest))
}

/// Evaluate the arguments into a list. A dotted argument list gives a
/// dotted result.
fn list(args: &Value, env: &Env) -> Result<Value, Error> {
    if args.is_nil() {
        return Ok(Value::Nil);
    }
    if !matches!(args, Value::Pair(_)) {
        return Err(Error::Syntax);
    }
    let mut items = Vec::new();
    let mut head = args;
    while let Value::Pair(p) = head {
        items.push(eval(p.first.clone(), env)?);
        head = &p.rest;
    }
    let tail = match head {
        Value::Nil => Value::Nil,
        other => eval(other.clone(), env)?,
    };
    Ok(ast::list_with_tail(items, tail))
}

fn is_null(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let value = eval(p.first.clone(), env)?;
    Ok(Value::Bool(value.is_nil()))
}

fn is_pair(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let value = eval(p.first.clone(), env)?;
    Ok(Value::Bool(matches!(value, Value::Pair(_))))
}

/// Short-circuiting `and`. Empty is `#t`, a false argument gives `#f`,
/// otherwise the last value.
fn and(args: &Value, env: &Env) -> Result<Value, Error> {
    let mut last = Value::Bool(true);
    let mut head = args;
    while let Value::Pair(p) = head {
        last = eval(p.first.clone(), env)?;
        if !last.is_true() {
            return Ok(Value::Bool(false));
        }
        head = &p.rest;
    }
    if !head.is_nil() {
        return Err(Error::Syntax);
    }
    Ok(last)
}

/// Short-circuiting `or`: the first true value, or `#f`.
fn or(args: &Value, env: &Env) -> Result<Value, Error> {
    let mut head = args;
    while let Value::Pair(p) = head {
        let value = eval(p.first.clone(), env)?;
        if value.is_true() {
            return Ok(value);
        }
        head = &p.rest;
    }
    if !head.is_nil() {
        return Err(Error::Syntax);
    }
    Ok(Value::Bool(false))
}

fn not(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let value = eval(p.first.clone(), env)?;
    Ok(Value::Bool(!value.is_true()))
}

/// Compare consecutive arguments, `(< 1 2 3)` style. False as soon as
/// one comparison fails.
fn cmp_chain(
    args: &Value,
    env: &Env,
    cmp: impl Fn(&Value, &Value) -> Result<bool, Error>,
) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let mut prev = eval(p.first.clone(), env)?;
    let mut head = &p.rest;
    while let Value::Pair(p) = head {
        let this = eval(p.first.clone(), env)?;
        if !cmp(&prev, &this)? {
            return Ok(Value::Bool(false));
        }
        prev = this;
        head = &p.rest;
    }
    if !head.is_nil() {
        return Err(Error::Syntax);
    }
    Ok(Value::Bool(true))
}

fn int(value: &Value) -> Result<NumberType, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::NotANumber(other.clone())),
    }
}

/// Left fold over numeric arguments.
fn fold(
    args: &Value,
    env: &Env,
    op: impl Fn(NumberType, NumberType) -> Result<NumberType, Error>,
) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let mut acc = int(&eval(p.first.clone(), env)?)?;
    let mut head = &p.rest;
    while let Value::Pair(p) = head {
        let this = int(&eval(p.first.clone(), env)?)?;
        acc = op(acc, this)?;
        head = &p.rest;
    }
    if !head.is_nil() {
        return Err(Error::Syntax);
    }
    Ok(Value::Number(acc))
}

/// `-` negates with a single argument and folds otherwise.
fn sub(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    if p.rest.is_nil() {
        let n = int(&eval(p.first.clone(), env)?)?;
        return n.checked_neg().map(Value::Number).ok_or(Error::Overflow("-"));
    }
    fold(args, env, |a, b| {
        a.checked_sub(b).ok_or(Error::Overflow("-"))
    })
}

/// `(test-check "name" expr expected)` errors unless both expressions
/// evaluate to equal values. The name must be a literal string.
fn test_check(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let Value::String(name) = &p.first else {
        return Err(Error::Syntax);
    };
    let Value::Pair(rest) = &p.rest else {
        return Err(Error::Syntax);
    };
    let (got, want) = eval_two(rest, env)?;
    if got != want {
        return Err(Error::TestFailure {
            name: name.clone(),
            got: got.to_string(),
            want: want.to_string(),
        });
    }
    Ok(Value::Nil)
}

/// `(load "path" ...)` evaluates each named file in the current
/// environment.
fn load_files(args: &Value, env: &Env) -> Result<Value, Error> {
    let mut head = args;
    while let Value::Pair(p) = head {
        let value = eval(p.first.clone(), env)?;
        let Value::String(path) = value else {
            return Err(Error::InvalidFilename(value));
        };
        crate::load(&path, env)?;
        head = &p.rest;
    }
    if !head.is_nil() {
        return Err(Error::Syntax);
    }
    Ok(Value::Nil)
}
