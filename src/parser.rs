//! S-expression reader.
//!
//! Built on nom. The reader produces plain [`Value`]s: quote sugar
//! expands to `(quote ...)` lists, `#t`/`#f` become booleans, and
//! `(a . b)` builds a dotted pair. Comments run from `;` to the end of
//! the line.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::cut,
    error::ErrorKind,
    IResult, Parser,
};

use crate::ast::{self, is_valid_symbol, NumberType, Value, SYMBOL_SPECIAL_CHARS};
use crate::error::Error;

/// Read every expression in `input`.
pub fn read_all(input: &str) -> Result<Vec<Value>, Error> {
    let mut rest = junk(input);
    let mut out = Vec::new();
    while !rest.is_empty() {
        if rest.starts_with(')') {
            return Err(Error::Parse("unexpected closing bracket".into()));
        }
        match expr(rest) {
            Ok((next, value)) => {
                out.push(value);
                rest = junk(next);
            }
            Err(err) => return Err(convert(err)),
        }
    }
    Ok(out)
}

/// Skip whitespace and line comments.
fn junk(mut input: &str) -> &str {
    loop {
        let trimmed = input.trim_start();
        match trimmed.strip_prefix(';') {
            Some(comment) => {
                input = match comment.find('\n') {
                    Some(pos) => &comment[pos + 1..],
                    None => "",
                };
            }
            None => return trimmed,
        }
    }
}

fn expr(input: &str) -> IResult<&str, Value> {
    alt((sugar, list_form, string, atom)).parse(input)
}

/// `'x`, `` `x `` and `,x` expand to their long forms.
fn sugar(input: &str) -> IResult<&str, Value> {
    let (rest, mark) = alt((char('\''), char('`'), char(','))).parse(input)?;
    let name = match mark {
        '\'' => "quote",
        '`' => "quasiquote",
        _ => "unquote",
    };
    let (rest, value) = cut(expr).parse(junk(rest))?;
    Ok((rest, ast::list(vec![ast::sym(name), value])))
}

fn list_form(input: &str) -> IResult<&str, Value> {
    let (mut rest, _) = char('(').parse(input)?;
    let mut items = Vec::new();
    let mut tail = Value::Nil;
    loop {
        rest = junk(rest);
        if rest.is_empty() {
            return Err(unclosed(rest));
        }
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if is_dot(rest) {
            if items.is_empty() {
                return Err(invalid(rest));
            }
            let after_dot = junk(&rest[1..]);
            if after_dot.is_empty() {
                return Err(unclosed(after_dot));
            }
            let (after, value) = cut(expr).parse(after_dot)?;
            let after = junk(after);
            if after.is_empty() {
                return Err(unclosed(after));
            }
            match after.strip_prefix(')') {
                Some(after) => {
                    tail = value;
                    rest = after;
                    break;
                }
                None => return Err(invalid(after)),
            }
        }
        let (next, value) = cut(expr).parse(rest)?;
        items.push(value);
        rest = next;
    }
    Ok((rest, ast::list_with_tail(items, tail)))
}

/// A `.` is the dotted-pair marker only when followed by a delimiter.
fn is_dot(input: &str) -> bool {
    if !input.starts_with('.') {
        return false;
    }
    match input[1..].chars().next() {
        None => true,
        Some(c) => c.is_whitespace() || "()\"';".contains(c),
    }
}

fn string(input: &str) -> IResult<&str, Value> {
    let (rest, _) = char('"').parse(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[i + 1..], Value::String(out))),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        ErrorKind::Tag,
    )))
}

fn atom(input: &str) -> IResult<&str, Value> {
    let (rest, token) = take_while1(is_atom_char).parse(input)?;
    let value = match token {
        "#t" => Value::Bool(true),
        "#f" => Value::Bool(false),
        _ => {
            if let Ok(n) = token.parse::<NumberType>() {
                Value::Number(n)
            } else if is_valid_symbol(token) {
                ast::sym(token)
            } else {
                return Err(invalid(input));
            }
        }
    };
    Ok((rest, value))
}

fn is_atom_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '#' || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn unclosed(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Eof))
}

fn invalid(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Verify))
}

fn convert(err: nom::Err<nom::error::Error<&str>>) -> Error {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => match e.code {
            ErrorKind::Eof => Error::Parse("list was not closed with closing bracket".into()),
            ErrorKind::Tag => Error::Parse("string was not closed with quotation mark".into()),
            _ => {
                let near: String = e.input.chars().take(10).collect();
                if near.is_empty() {
                    Error::Parse("unexpected end of input".into())
                } else {
                    Error::Parse(format!("invalid syntax near '{near}'"))
                }
            }
        },
        nom::Err::Incomplete(_) => Error::Parse("incomplete input".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{list, list_with_tail, sym};

    fn one(input: &str) -> Value {
        let mut values = read_all(input).unwrap();
        assert_eq!(values.len(), 1, "input: {input:?}");
        values.pop().unwrap()
    }

    #[test]
    fn atoms() {
        let cases: Vec<(&str, Value)> = vec![
            ("42", Value::Number(42)),
            ("-42", Value::Number(-42)),
            ("#t", Value::Bool(true)),
            ("#f", Value::Bool(false)),
            ("foo", sym("foo")),
            ("null?", sym("null?")),
            ("run*", sym("run*")),
            ("-", sym("-")),
            ("_.0", sym("_.0")),
            ("\"hello world\"", Value::from("hello world")),
            ("\"a\\\"b\\n\"", Value::String("a\"b\n".into())),
        ];
        for (input, expected) in cases {
            assert_eq!(one(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn lists() {
        let cases: Vec<(&str, Value)> = vec![
            ("()", Value::Nil),
            ("( )", Value::Nil),
            (
                "(1 2 3)",
                list(vec![1.into(), 2.into(), 3.into()]),
            ),
            (
                "(+ 1 (* 2 3))",
                list(vec![
                    sym("+"),
                    1.into(),
                    list(vec![sym("*"), 2.into(), 3.into()]),
                ]),
            ),
            ("(1 . 2)", Value::cons(1.into(), 2.into())),
            (
                "(1 2 . 3)",
                list_with_tail(vec![1.into(), 2.into()], 3.into()),
            ),
            ("(())", list(vec![Value::Nil])),
        ];
        for (input, expected) in cases {
            assert_eq!(one(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn quote_sugar() {
        let cases: Vec<(&str, Value)> = vec![
            ("'x", list(vec![sym("quote"), sym("x")])),
            ("'(1 2)", list(vec![sym("quote"), list(vec![1.into(), 2.into()])])),
            (
                "`(a ,b)",
                list(vec![
                    sym("quasiquote"),
                    list(vec![sym("a"), list(vec![sym("unquote"), sym("b")])]),
                ]),
            ),
            (
                "',x",
                list(vec![
                    sym("quote"),
                    list(vec![sym("unquote"), sym("x")]),
                ]),
            ),
            ("' x", list(vec![sym("quote"), sym("x")])),
        ];
        for (input, expected) in cases {
            assert_eq!(one(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn comments_and_whitespace() {
        let values = read_all("; heading\n 1 ; trailing\n2\n\t3").unwrap();
        assert_eq!(
            values,
            vec![Value::Number(1), Value::Number(2), Value::Number(3)],
        );
        assert_eq!(read_all("; only a comment").unwrap(), vec![]);
        assert_eq!(read_all("").unwrap(), vec![]);
    }

    #[test]
    fn multiple_expressions() {
        let values = read_all("(define x 1) x").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], sym("x"));
    }

    #[test]
    fn round_trips() {
        let cases = vec![
            "(1 2 3)",
            "(1 . 2)",
            "(1 2 . 3)",
            "'x",
            "`,x",
            "'(1 (2 3))",
            "(lambda (x) (+ x 1))",
            "#t",
            "\"a\\\"b\"",
        ];
        for input in cases {
            assert_eq!(one(input).to_string(), input, "input: {input:?}");
        }
    }

    #[test]
    fn reader_errors() {
        let cases = vec![
            ("(1 2", "list was not closed with closing bracket"),
            ("(1 (2 3)", "list was not closed with closing bracket"),
            ("(1 . ", "list was not closed with closing bracket"),
            (")", "unexpected closing bracket"),
            ("(1)) ", "unexpected closing bracket"),
            ("\"abc", "string was not closed with quotation mark"),
            ("(. 2)", "invalid syntax near '. 2)'"),
            ("(1 . 2 3)", "invalid syntax near '3)'"),
            ("#true", "invalid syntax near '#true'"),
            ("12abc", "invalid syntax near '12abc'"),
        ];
        for (input, message) in cases {
            assert_eq!(
                read_all(input),
                Err(Error::Parse(message.into())),
                "input: {input:?}",
            );
        }
    }
}
