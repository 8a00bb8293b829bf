//! The substitution trail backing unification.
//!
//! Bindings live in an append-only list where the most recent entry for
//! a variable wins (Byrd, 2009, p. 25). Backtracking rewinds the trail
//! to an earlier checkpoint instead of copying it.

use std::fmt;

use tracing::trace;

use crate::ast::{self, Value, Var};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subst {
    entries: Vec<(Var, Value)>,
    occurs_check: bool,
}

impl Subst {
    pub fn new() -> Self {
        Subst::default()
    }

    /// Like [`Subst::new`], but [`unify`](Subst::unify) refuses bindings
    /// that would make a variable contain itself. The check is costly
    /// and off by default, as in most miniKanren implementations.
    pub fn with_occurs_check() -> Self {
        Subst {
            entries: Vec::new(),
            occurs_check: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current trail length, to `rewind` to later.
    pub fn checkpoint(&self) -> usize {
        self.len()
    }

    /// Drop every binding made after `checkpoint`.
    pub fn rewind(&mut self, checkpoint: usize) {
        self.entries.truncate(checkpoint);
    }

    /// Record that `var` exists without binding it. A birth record is a
    /// self-binding, which `walk` reports as unbound.
    pub fn birth_record(&mut self, var: &Var) {
        self.entries.push((var.clone(), Value::Var(var.clone())));
    }

    fn lookup(&self, var: &Var) -> Option<Value> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key == var)
            .map(|(_, value)| value.clone())
    }

    fn extend(&mut self, var: Var, value: Value) -> bool {
        if self.occurs_check && self.occurs(&var, &value) {
            return false;
        }
        self.entries.push((var, value));
        true
    }

    /// Unify two values, extending the trail on success (Byrd, 2009,
    /// p. 29).
    pub fn unify(&mut self, u: &Value, v: &Value) -> bool {
        trace!(u = %u, v = %v, trail = %self, "unify");
        let u = self.walk(u);
        let v = self.walk(v);
        if u == v {
            return true;
        }
        if let Value::Var(var) = &u {
            return self.extend(var.clone(), v);
        }
        if let Value::Var(var) = &v {
            return self.extend(var.clone(), u);
        }
        if let (Value::Pair(a), Value::Pair(b)) = (&u, &v) {
            if !self.unify(&a.first, &b.first) {
                return false;
            }
            return self.unify(&a.rest, &b.rest);
        }
        false
    }

    /// Resolve `value` one binding at a time until it is either not a
    /// variable or unbound (Byrd, 2009, p. 27).
    pub fn walk(&self, value: &Value) -> Value {
        if let Value::Var(var) = value {
            if let Some(found) = self.lookup(var) {
                if matches!(&found, Value::Var(next) if next == var) {
                    // birth record, the variable is fresh
                    return value.clone();
                }
                return self.walk(&found);
            }
        }
        value.clone()
    }

    /// `walk` every position of `value`, preserving its shape. Only
    /// nesting recurses; the spine is iterated, so resolving a solution
    /// list costs stack by depth, not by length.
    pub fn deep_walk(&self, value: &Value) -> Value {
        let mut head = self.walk(value);
        if !matches!(head, Value::Pair(_)) {
            return head;
        }
        let mut items = Vec::new();
        loop {
            match head {
                Value::Pair(p) => {
                    items.push(self.deep_walk(&p.first));
                    head = self.walk(&p.rest);
                }
                Value::Nil => return ast::list(items),
                tail => return ast::list_with_tail(items, tail),
            }
        }
    }

    /// Check whether `var` occurs inside `value` (Byrd, 2009, p. 28).
    fn occurs(&self, var: &Var, value: &Value) -> bool {
        match self.walk(value) {
            Value::Var(found) => found == *var,
            Value::Pair(pair) => {
                self.occurs(var, &pair.first) || self.occurs(var, &pair.rest)
            }
            _ => false,
        }
    }

    /// Resolve `value` against the trail, then rename the variables
    /// that remain free to `_.0`, `_.1`, ... in order of appearance.
    pub fn reify(&self, value: &Value) -> Value {
        let value = self.deep_walk(value);
        let mut fresh = Subst::new();
        fresh.number_free(&value);
        fresh.deep_walk(&value)
    }

    fn number_free(&mut self, value: &Value) {
        match self.walk(value) {
            Value::Var(var) => {
                let free = Value::Free(self.len());
                let shown = Value::Var(var.clone());
                trace!(var = %shown, free = %free, "reify");
                self.extend(var, free);
            }
            Value::Pair(pair) => {
                let mut head = Value::Pair(pair);
                loop {
                    match head {
                        Value::Pair(p) => {
                            self.number_free(&p.first);
                            head = p.rest.clone();
                        }
                        Value::Nil => break,
                        tail => {
                            self.number_free(&tail);
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Subst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (var, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", var.name(), value)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{list, sym, NumberType};

    #[test]
    fn walk_follows_chains() {
        let x = Var::new("x");
        let y = Var::new("y");
        let mut trail = Subst::new();
        assert!(trail.unify(&Value::Var(x.clone()), &Value::Var(y.clone())));
        assert!(trail.unify(&Value::Var(y.clone()), &Value::Number(1)));

        assert_eq!(trail.walk(&Value::Var(x)), Value::Number(1));
        assert_eq!(trail.walk(&Value::Var(y)), Value::Number(1));
        assert_eq!(trail.walk(&sym("a")), sym("a"));
    }

    #[test]
    fn birth_records_stay_fresh() {
        let x = Var::new("x");
        let mut trail = Subst::new();
        trail.birth_record(&x);
        assert_eq!(trail.walk(&Value::Var(x.clone())), Value::Var(x));
    }

    #[test]
    fn most_recent_binding_wins() {
        let x = Var::new("x");
        let mut trail = Subst::new();
        assert!(trail.unify(&Value::Var(x.clone()), &Value::Number(1)));
        // rebinding is the trail's job, unify would just compare
        trail.entries.push((x.clone(), Value::Number(2)));
        assert_eq!(trail.walk(&Value::Var(x)), Value::Number(2));
    }

    #[test]
    fn unify_pairs() {
        let x = Var::new("x");
        let y = Var::new("y");
        let mut trail = Subst::new();
        let u = list(vec![sym("a"), Value::Var(x.clone()), sym("c")]);
        let v = list(vec![sym("a"), sym("b"), Value::Var(y.clone())]);
        assert!(trail.unify(&u, &v));
        assert_eq!(trail.walk(&Value::Var(x)), sym("b"));
        assert_eq!(trail.walk(&Value::Var(y)), sym("c"));
    }

    #[test]
    fn unify_dotted_pairs() {
        let x = Var::new("x");
        let mut trail = Subst::new();
        let u = Value::cons(Value::Number(1), Value::Var(x.clone()));
        let v = Value::cons(Value::Number(1), Value::Number(2));
        assert!(trail.unify(&u, &v));
        assert_eq!(trail.walk(&Value::Var(x)), Value::Number(2));
    }

    #[test]
    fn unify_identical_values_appends_nothing() {
        let mut trail = Subst::new();
        for value in [
            Value::Number(7),
            sym("a"),
            Value::Bool(true),
            Value::Nil,
            list(vec![sym("a"), Value::Number(1)]),
        ] {
            assert!(trail.unify(&value, &value.clone()));
        }
        assert!(trail.is_empty());
    }

    #[test]
    fn unify_mismatch_fails() {
        let mut trail = Subst::new();
        assert!(!trail.unify(&Value::Number(1), &Value::Number(2)));
        assert!(!trail.unify(&sym("a"), &Value::Number(1)));
        assert!(!trail.unify(
            &list(vec![Value::Number(1)]),
            &list(vec![Value::Number(1), Value::Number(2)]),
        ));
    }

    #[test]
    fn rewind_discards_later_bindings() {
        let x = Var::new("x");
        let y = Var::new("y");
        let mut trail = Subst::new();
        assert!(trail.unify(&Value::Var(x.clone()), &Value::Number(1)));
        let mark = trail.checkpoint();
        assert!(trail.unify(&Value::Var(y.clone()), &Value::Number(2)));

        trail.rewind(mark);
        assert_eq!(trail.walk(&Value::Var(x)), Value::Number(1));
        assert_eq!(trail.walk(&Value::Var(y.clone())), Value::Var(y));
    }

    #[test]
    fn occurs_check_is_opt_in() {
        let x = Var::new("x");
        let cyclic = list(vec![sym("f"), Value::Var(x.clone())]);

        let mut lax = Subst::new();
        assert!(lax.unify(&Value::Var(x.clone()), &cyclic));

        let mut strict = Subst::with_occurs_check();
        assert!(!strict.unify(&Value::Var(x.clone()), &cyclic));
        assert!(strict.unify(&Value::Var(x), &Value::Number(1)));
    }

    #[test]
    fn reify_numbers_free_variables_in_order() {
        let q = Var::new("q");
        let x = Var::new("x");
        let y = Var::new("y");
        let mut trail = Subst::new();
        trail.birth_record(&q);
        let shape = list(vec![
            Value::Var(x.clone()),
            Value::Number(7),
            Value::Var(y.clone()),
            Value::Var(x.clone()),
        ]);
        assert!(trail.unify(&Value::Var(q.clone()), &shape));

        let reified = trail.reify(&Value::Var(q));
        assert_eq!(reified.to_string(), "(_.0 7 _.1 _.0)");
    }

    #[test]
    fn reify_is_deterministic() {
        let q = Var::new("q");
        let x = Var::new("x");
        let y = Var::new("y");
        let mut trail = Subst::new();
        trail.birth_record(&q);
        let shape = list(vec![Value::Var(y), Value::Var(x)]);
        assert!(trail.unify(&Value::Var(q.clone()), &shape));

        let first = trail.reify(&Value::Var(q.clone()));
        let second = trail.reify(&Value::Var(q));
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "(_.0 _.1)");
    }

    #[test]
    fn reify_resolves_through_pairs() {
        let q = Var::new("q");
        let x = Var::new("x");
        let y = Var::new("y");
        let mut trail = Subst::new();
        trail.birth_record(&q);
        assert!(trail.unify(&Value::Var(x.clone()), &sym("b")));
        assert!(trail.unify(&Value::Var(y.clone()), &sym("c")));
        assert!(trail.unify(
            &Value::Var(q.clone()),
            &Value::cons(Value::Var(x), Value::Var(y)),
        ));

        assert_eq!(trail.reify(&Value::Var(q)).to_string(), "(b . c)");
    }

    #[test]
    fn reify_survives_long_lists() {
        let n: NumberType = 200_000;
        let q = Var::new("q");
        let mut trail = Subst::new();
        trail.birth_record(&q);
        let long = list((0..n).map(Value::Number).collect());
        assert!(trail.unify(&Value::Var(q.clone()), &long));

        let mut head = trail.reify(&Value::Var(q));
        let mut seen = 0;
        while let Value::Pair(p) = head {
            assert_eq!(p.first, Value::Number(seen));
            seen += 1;
            head = p.rest.clone();
        }
        assert_eq!(seen, n);
    }

    #[test]
    fn display_shows_the_trail() {
        let x = Var::new("x");
        let mut trail = Subst::new();
        assert!(trail.unify(&Value::Var(x), &Value::Number(1)));
        assert_eq!(trail.to_string(), "[x:1]");
        assert_eq!(Subst::new().to_string(), "[]");
    }
}
