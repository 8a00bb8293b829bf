//! Error types shared by the reader, the evaluator, and the relational
//! engine.

use thiserror::Error as ThisError;

use crate::ast::Value;

#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    #[error("invalid syntax")]
    Syntax,
    #[error("wrong number of arguments")]
    Arity,
    #[error("invalid argument: {0}")]
    WrongArg(Value),
    #[error("{0} is not a list")]
    NonList(Value),
    #[error("{0} is not a number")]
    NotANumber(Value),
    #[error("{0} is not a valid name")]
    InvalidName(Value),
    #[error("{0} is not a valid filename")]
    InvalidFilename(Value),
    #[error("unbound variable {0}")]
    Unbound(String),
    #[error("{0} is not callable")]
    NotCallable(Value),
    #[error("kanren variable was used outside of its context")]
    StrayVariable,
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in {0}")]
    Overflow(&'static str),
    #[error("test {name} failed:\n        {got}\n is not {want}")]
    TestFailure {
        name: String,
        got: String,
        want: String,
    },
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Io(String),
}
