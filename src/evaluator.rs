use tracing::trace;

use crate::ast::{Pair, Procedure, Value};
use crate::env::Env;
use crate::error::Error;

use std::rc::Rc;

/// Evaluate a single expression.
///
/// The loop is a trampoline: when a call resolves to a tail procedure,
/// the procedure hands back the next expression and environment instead
/// of evaluating it, so tail calls run in constant stack space.
pub fn eval(expr: Value, env: &Env) -> Result<Value, Error> {
    let mut expr = expr;
    let mut env = env.clone();
    loop {
        trace!(expr = %expr, "eval");
        match expr {
            Value::Symbol(name) => {
                return env.get(&name).ok_or(Error::Unbound(name));
            }
            Value::Pair(call) => {
                let callable = eval(call.first.clone(), &env)?;
                match callable {
                    Value::Procedure(Procedure::Tail { f, .. }) => {
                        let (next, next_env) = f(&call.rest, &env)?;
                        expr = next;
                        env = next_env;
                    }
                    Value::Procedure(Procedure::Direct { f, .. }) => {
                        return f(&call.rest, &env);
                    }
                    other => return Err(Error::NotCallable(other)),
                }
            }
            Value::Var(_) | Value::Free(_) => return Err(Error::StrayVariable),
            other => return Ok(other),
        }
    }
}

/// Evaluate every expression of a body but the last, returning the last
/// for the trampoline in [`eval`].
pub(crate) fn eval_body(body: &Value, env: &Env) -> Result<(Value, Env), Error> {
    let mut head = body;
    loop {
        match head {
            Value::Pair(p) if p.rest.is_nil() => return Ok((p.first.clone(), env.clone())),
            Value::Pair(p) => {
                eval(p.first.clone(), env)?;
                head = &p.rest;
            }
            other => return Ok((other.clone(), env.clone())),
        }
    }
}

/// Evaluate exactly two argument expressions.
pub(crate) fn eval_two(args: &Rc<Pair>, env: &Env) -> Result<(Value, Value), Error> {
    let a = eval(args.first.clone(), env)?;
    let Value::Pair(second) = &args.rest else {
        return Err(Error::Arity);
    };
    if !second.rest.is_nil() {
        return Err(Error::Arity);
    }
    let b = eval(second.first.clone(), env)?;
    Ok((a, b))
}

/// `(quote expr)` returns its argument unevaluated.
pub(crate) fn quote(args: &Value, _env: &Env) -> Result<Value, Error> {
    Ok(one_arg(args)?.clone())
}

/// `(unquote expr)` evaluates its argument. Outside a quasiquote this
/// just doubles as a one-shot eval.
pub(crate) fn unquote(args: &Value, env: &Env) -> Result<Value, Error> {
    eval(one_arg(args)?.clone(), env)
}

/// `(quasiquote expr)` walks its argument, evaluating unquoted holes.
pub(crate) fn quasiquote(args: &Value, env: &Env) -> Result<Value, Error> {
    unquote_walk(one_arg(args)?, 1, env)
}

fn one_arg(args: &Value) -> Result<&Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    if !p.rest.is_nil() {
        return Err(Error::Arity);
    }
    Ok(&p.first)
}

/// Rebuild `value`, tracking quasiquote depth. An unquote at depth zero
/// is evaluated in place, deeper ones are kept verbatim.
fn unquote_walk(value: &Value, depth: usize, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = value else {
        return Ok(value.clone());
    };
    let mut depth = depth;
    if let Value::Symbol(name) = &p.first {
        match name.as_str() {
            "quasiquote" => depth += 1,
            "unquote" => {
                depth -= 1;
                if depth == 0 {
                    return unquote(&p.rest, env);
                }
            }
            _ => {}
        }
    }
    let first = unquote_walk(&p.first, depth, env)?;
    let rest = unquote_walk(&p.rest, depth, env)?;
    Ok(Value::cons(first, rest))
}

/// `(define name expr)` evaluates `expr` and binds it in the current
/// frame, returning the value.
pub(crate) fn define(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let Value::Symbol(name) = &p.first else {
        return Err(Error::InvalidName(p.first.clone()));
    };
    let Value::Pair(rhs) = &p.rest else {
        return Err(Error::Syntax);
    };
    let value = eval(rhs.first.clone(), env)?;
    env.set(name.clone(), value.clone());
    Ok(value)
}

/// `(lambda (params ...) body ...)` builds a closure over the defining
/// environment.
pub(crate) fn lambda(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let params = match &p.first {
        Value::Pair(_) => param_names(&p.first)?,
        Value::Nil => Vec::new(),
        other => return Err(Error::NonList(other.clone())),
    };
    let body = p.rest.clone();
    let defining = env.clone();
    Ok(Procedure::tail("lambda", move |args, calling| {
        let local = bind_params(&params, args, &defining, calling)?;
        eval_body(&body, &local)
    }))
}

/// Collect the symbols of a parameter list.
pub(crate) fn param_names(params: &Value) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    let mut head = params;
    loop {
        match head {
            Value::Nil => return Ok(names),
            Value::Pair(p) => {
                let Value::Symbol(name) = &p.first else {
                    return Err(Error::InvalidName(p.first.clone()));
                };
                names.push(name.clone());
                head = &p.rest;
            }
            other => return Err(Error::NonList(other.clone())),
        }
    }
}

/// Bind call arguments to parameter names. Arguments are evaluated in
/// the calling environment, the bindings land in a child of the
/// defining one.
fn bind_params(
    params: &[String],
    args: &Value,
    defining: &Env,
    calling: &Env,
) -> Result<Env, Error> {
    let local = defining.child();
    let mut head = args;
    let mut bound = 0;
    while let Value::Pair(p) = head {
        if bound >= params.len() {
            return Err(Error::Arity);
        }
        let value = eval(p.first.clone(), calling)?;
        local.set(params[bound].clone(), value);
        bound += 1;
        head = &p.rest;
    }
    if bound != params.len() {
        return Err(Error::Arity);
    }
    Ok(local)
}

/// `(let ((name expr) ...) body ...)` with bindings evaluated in the
/// enclosing environment.
pub(crate) fn let_form(args: &Value, env: &Env) -> Result<(Value, Env), Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let local = env.child();
    match &p.first {
        Value::Pair(_) => bind_all(&p.first, &local, env)?,
        Value::Nil => {}
        other => return Err(Error::NonList(other.clone())),
    }
    eval_body(&p.rest, &local)
}

fn bind_all(bindings: &Value, local: &Env, outer: &Env) -> Result<(), Error> {
    let mut head = bindings;
    while let Value::Pair(p) = head {
        let Value::Pair(binding) = &p.first else {
            return Err(Error::NonList(p.first.clone()));
        };
        bind_one(binding, local, outer)?;
        head = &p.rest;
    }
    Ok(())
}

fn bind_one(binding: &Rc<Pair>, local: &Env, outer: &Env) -> Result<(), Error> {
    let Value::Symbol(name) = &binding.first else {
        return Err(Error::InvalidName(binding.first.clone()));
    };
    let Value::Pair(value) = &binding.rest else {
        return Err(Error::Syntax);
    };
    let value = eval(value.first.clone(), outer)?;
    local.set(name.clone(), value);
    Ok(())
}

/// `(cond (test expr) ...)` returns the expression of the first clause
/// whose test is true. No match evaluates to the empty list.
pub(crate) fn cond(args: &Value, env: &Env) -> Result<(Value, Env), Error> {
    if !matches!(args, Value::Pair(_)) {
        return Err(Error::Syntax);
    }
    let mut head = args;
    while let Value::Pair(p) = head {
        let Value::Pair(clause) = &p.first else {
            return Err(Error::NonList(p.first.clone()));
        };
        let test = eval(clause.first.clone(), env)?;
        if test.is_true() {
            let Value::Pair(body) = &clause.rest else {
                return Err(Error::Syntax);
            };
            return Ok((body.first.clone(), env.clone()));
        }
        head = &p.rest;
    }
    if !head.is_nil() {
        return Err(Error::Syntax);
    }
    Ok((Value::Nil, env.clone()))
}
