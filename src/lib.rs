//! A Scheme-flavored interpreter with a miniKanren relational core.
//!
//! The functional half of the language is a small Scheme: integers,
//! booleans, strings, symbols, pairs, closures with lexical scope and
//! proper tail calls:
//!
//! ```scheme
//! (define fact
//!   (lambda (n)
//!     (cond ((= n 0) 1)
//!           (else (* n (fact (- n 1)))))))
//! (fact 10)            ; => 3628800
//! ```
//!
//! The relational half embeds miniKanren-style goals as first-class
//! values. `run` and `run*` enumerate the values a query variable can
//! take, with `==`, `fresh`, `conde`, and `project` building the goals:
//!
//! ```scheme
//! (run* (q) (conde ((== q 1)) ((== q 2))))   ; => (1 2)
//! (run 1 (q) (fresh (x) (== q (list x))))    ; => ((_.0))
//! ```
//!
//! ## Modules
//!
//! - `parser`: reader from text to [`Value`] trees
//! - `evaluator`: the trampolined evaluation loop and special forms
//! - `builtins`: the global environment and builtin procedures
//! - `goals`, `subst`: the relational engine and its substitution trail

pub mod ast;
pub mod builtins;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod goals;
pub mod parser;
pub mod subst;

use std::path::Path;

pub use ast::Value;
pub use builtins::default_env;
pub use env::Env;
pub use error::Error;
pub use evaluator::eval;

/// Read and evaluate every expression in `code`, returning the values
/// in order. Nothing is returned on error, even if earlier
/// expressions already evaluated.
pub fn eval_string(code: &str, env: &Env) -> Result<Vec<Value>, Error> {
    let exprs = parser::read_all(code)?;
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        values.push(eval(expr, env)?);
    }
    Ok(values)
}

/// Read and evaluate a file, returning the values of its top-level
/// expressions.
pub fn load(path: impl AsRef<Path>, env: &Env) -> Result<Vec<Value>, Error> {
    let code =
        std::fs::read_to_string(path).map_err(|err| Error::Io(err.to_string()))?;
    eval_string(&code, env)
}
