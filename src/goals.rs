//! The relational sublanguage.
//!
//! Goals are first-class values built by `==`, `fresh`, `conde` and
//! `project`, and driven by `run`/`run*`. A goal answers one question
//! at a time against a substitution trail; asking it to `next` moves it
//! to its following alternative, and `reset` forgets exhaustion so the
//! goal can be replayed under a different prefix of choices. Together
//! the three calls enumerate the solution tree depth-first without
//! streams or continuations.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{self, Value, Var};
use crate::env::Env;
use crate::error::Error;
use crate::evaluator::{eval, param_names};
use crate::subst::Subst;

#[derive(Clone)]
pub enum Goal {
    Const(ConstGoal),
    Unify(Rc<UnifyGoal>),
    Fresh(Rc<FreshGoal>),
    Conde(Rc<CondeGoal>),
    Project(Rc<ProjectGoal>),
}

/// A goal with a fixed answer, `succeed` or `fail`.
#[derive(Clone, PartialEq)]
pub struct ConstGoal {
    name: &'static str,
    value: bool,
}

/// `(== u v)`. The argument expressions are kept unevaluated and
/// evaluated against the captured environment on every query, inside
/// the current trail.
pub struct UnifyGoal {
    u: Value,
    v: Value,
    env: Env,
}

/// `(fresh (x ...) goal ...)`. The variables are allocated once, at
/// construction; every query writes new birth records for them.
pub struct FreshGoal {
    vars: Vec<Var>,
    goals: Vec<Goal>,
}

/// `(conde (goal ...) ...)`. Branches stay unevaluated until tried, so
/// recursive relations terminate: the recursive call only happens when
/// its branch is entered.
pub struct CondeGoal {
    branches: Vec<Value>,
    env: Env,
    state: RefCell<CondeState>,
}

#[derive(Default)]
struct CondeState {
    current: usize,
    branch: Option<Vec<Goal>>,
}

/// `(project (x ...) goal ...)`. Rebinds each name to its current value
/// in the trail, so the body can compute with it as ordinary data.
pub struct ProjectGoal {
    names: Vec<String>,
    goals: Vec<Goal>,
    env: Env,
}

/// The goal that always succeeds.
pub fn succeed() -> Value {
    Value::Goal(Goal::Const(ConstGoal {
        name: "succeed",
        value: true,
    }))
}

/// The goal that never succeeds.
pub fn fail() -> Value {
    Value::Goal(Goal::Const(ConstGoal {
        name: "fail",
        value: false,
    }))
}

impl Goal {
    /// Attempt the goal's current alternative against `trail`.
    pub fn query(&self, trail: &mut Subst) -> Result<bool, Error> {
        match self {
            Goal::Const(g) => Ok(g.value),
            Goal::Unify(g) => g.query(trail),
            Goal::Fresh(g) => g.query(trail),
            Goal::Conde(g) => g.query(trail),
            Goal::Project(g) => g.query(trail),
        }
    }

    /// Move to the next untried alternative. False when exhausted.
    pub fn next(&self) -> bool {
        match self {
            Goal::Const(_) | Goal::Unify(_) => false,
            Goal::Fresh(g) => advance(&g.goals),
            Goal::Conde(g) => g.next(),
            Goal::Project(g) => advance(&g.goals),
        }
    }

    /// Forget exhaustion, restoring the initial choice state.
    pub fn reset(&self) {
        match self {
            Goal::Const(_) | Goal::Unify(_) => {}
            Goal::Fresh(g) => reset_all(&g.goals),
            Goal::Conde(g) => g.reset(),
            Goal::Project(g) => reset_all(&g.goals),
        }
    }
}

impl UnifyGoal {
    fn query(&self, trail: &mut Subst) -> Result<bool, Error> {
        let u = eval(self.u.clone(), &self.env)?;
        let v = eval(self.v.clone(), &self.env)?;
        Ok(trail.unify(&u, &v))
    }
}

impl FreshGoal {
    fn query(&self, trail: &mut Subst) -> Result<bool, Error> {
        for var in &self.vars {
            trail.birth_record(var);
        }
        query_all(&self.goals, trail)
    }
}

impl CondeGoal {
    fn query(&self, trail: &mut Subst) -> Result<bool, Error> {
        let start = trail.checkpoint();
        while let Some(branch) = self.ensure_branch()? {
            if query_all(&branch, trail)? {
                return Ok(true);
            }
            if !self.next() {
                break;
            }
            // the failed branch's bindings must not leak into the next
            trail.rewind(start);
        }
        Ok(false)
    }

    /// Compile the current branch on first use. `None` when no branches
    /// remain.
    fn ensure_branch(&self) -> Result<Option<Vec<Goal>>, Error> {
        let current = self.state.borrow().current;
        if current >= self.branches.len() {
            return Ok(None);
        }
        if let Some(branch) = &self.state.borrow().branch {
            return Ok(Some(branch.clone()));
        }
        let branch = compile_branch(&self.branches[current], &self.env)?;
        self.state.borrow_mut().branch = Some(branch.clone());
        Ok(Some(branch))
    }

    fn next(&self) -> bool {
        // clone the branch out so no borrow is held across sub-goal calls
        let branch = self.state.borrow().branch.clone();
        if let Some(branch) = branch {
            if advance(&branch) {
                return true;
            }
        }
        let mut state = self.state.borrow_mut();
        state.current += 1;
        state.branch = None;
        state.current < self.branches.len()
    }

    fn reset(&self) {
        // the compiled branch is discarded, not recursively reset; it
        // will be rebuilt fresh when this branch is tried again
        let mut state = self.state.borrow_mut();
        state.current = 0;
        state.branch = None;
    }
}

impl ProjectGoal {
    fn query(&self, trail: &mut Subst) -> Result<bool, Error> {
        for name in &self.names {
            let value = self
                .env
                .get(name)
                .ok_or_else(|| Error::Unbound(name.clone()))?;
            let value = trail.deep_walk(&value);
            self.env.set(name.clone(), value);
        }
        query_all(&self.goals, trail)
    }
}

/// Query the goals left to right, short-circuiting on failure.
pub(crate) fn query_all(goals: &[Goal], trail: &mut Subst) -> Result<bool, Error> {
    for goal in goals {
        let ok = goal.query(trail)?;
        trace!(goal = %goal, ok, trail = %trail, "query");
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Move the conjunction to its next alternative: find the rightmost
/// goal that can advance and reset every goal to its right.
pub(crate) fn advance(goals: &[Goal]) -> bool {
    for goal in goals.iter().rev() {
        if goal.next() {
            return true;
        }
        goal.reset();
    }
    false
}

pub(crate) fn reset_all(goals: &[Goal]) {
    for goal in goals {
        goal.reset();
    }
}

/// Evaluate a goal body, one goal per expression.
fn extract_goals(body: &Value, env: &Env) -> Result<Vec<Goal>, Error> {
    let mut goals = Vec::new();
    let mut head = body;
    loop {
        match head {
            Value::Nil => return Ok(goals),
            Value::Pair(p) => {
                let value = eval(p.first.clone(), env)?;
                let Value::Goal(goal) = value else {
                    return Err(Error::WrongArg(value));
                };
                goals.push(goal);
                head = &p.rest;
            }
            _ => return Err(Error::Syntax),
        }
    }
}

/// Constructor behind `==`.
pub(crate) fn unify_goal(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(first) = args else {
        return Err(Error::Syntax);
    };
    let Value::Pair(second) = &first.rest else {
        return Err(Error::Syntax);
    };
    if !second.rest.is_nil() {
        return Err(Error::Arity);
    }
    Ok(Value::Goal(Goal::Unify(Rc::new(UnifyGoal {
        u: first.first.clone(),
        v: second.first.clone(),
        env: env.clone(),
    }))))
}

/// Constructor behind `fresh`.
pub(crate) fn fresh_goal(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    if !matches!(&p.first, Value::Pair(_)) {
        return Err(Error::NonList(p.first.clone()));
    }
    let local = env.child();
    let vars: Vec<Var> = param_names(&p.first)?
        .into_iter()
        .map(|name| {
            let var = Var::new(name.clone());
            local.set(name, Value::Var(var.clone()));
            var
        })
        .collect();
    if !matches!(&p.rest, Value::Pair(_)) {
        return Err(Error::Syntax);
    }
    let goals = extract_goals(&p.rest, &local)?;
    Ok(Value::Goal(Goal::Fresh(Rc::new(FreshGoal { vars, goals }))))
}

/// Constructor behind `conde`. Branches are collected raw and compiled
/// lazily by [`CondeGoal::ensure_branch`].
pub(crate) fn conde_goal(args: &Value, env: &Env) -> Result<Value, Error> {
    if !matches!(args, Value::Pair(_)) {
        return Err(Error::Syntax);
    }
    let mut branches = Vec::new();
    let mut head = args;
    loop {
        match head {
            Value::Nil => break,
            Value::Pair(p) => {
                branches.push(p.first.clone());
                head = &p.rest;
            }
            _ => return Err(Error::Syntax),
        }
    }
    Ok(Value::Goal(Goal::Conde(Rc::new(CondeGoal {
        branches,
        env: env.clone(),
        state: RefCell::new(CondeState::default()),
    }))))
}

fn compile_branch(branch: &Value, env: &Env) -> Result<Vec<Goal>, Error> {
    let Value::Pair(p) = branch else {
        return Err(Error::NonList(branch.clone()));
    };
    // a leading `else` is decorative, as in cond
    if matches!(&p.first, Value::Symbol(name) if name == "else") {
        if !matches!(&p.rest, Value::Pair(_)) {
            return Err(Error::Syntax);
        }
        return extract_goals(&p.rest, env);
    }
    extract_goals(branch, env)
}

/// Constructor behind `project`.
pub(crate) fn project_goal(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    if !matches!(&p.first, Value::Pair(_)) {
        return Err(Error::NonList(p.first.clone()));
    }
    let names = param_names(&p.first)?;
    if !matches!(&p.rest, Value::Pair(_)) {
        return Err(Error::Syntax);
    }
    let local = env.child();
    let goals = extract_goals(&p.rest, &local)?;
    Ok(Value::Goal(Goal::Project(Rc::new(ProjectGoal {
        names,
        goals,
        env: local,
    }))))
}

/// `(run n (q) goal ...)` collects up to `n` solutions for `q`.
/// `(run #f ...)` collects all of them, like `run*`.
pub(crate) fn run(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    if p.first == Value::Bool(false) {
        return run_all(&p.rest, env);
    }
    if p.rest.is_nil() {
        return Err(Error::Arity);
    }
    let Value::Number(limit) = &p.first else {
        return Err(Error::NotANumber(p.first.clone()));
    };
    let Value::Pair(rest) = &p.rest else {
        return Err(Error::WrongArg(p.rest.clone()));
    };
    let Value::Pair(binding) = &rest.first else {
        return Err(Error::WrongArg(rest.first.clone()));
    };
    let Value::Symbol(name) = &binding.first else {
        return Err(Error::InvalidName(binding.first.clone()));
    };
    if !matches!(&rest.rest, Value::Pair(_)) {
        return Err(Error::Syntax);
    }
    let local = env.child();
    let target = Var::new(name.clone());
    local.set(name.clone(), Value::Var(target.clone()));
    let goals = extract_goals(&rest.rest, &local)?;
    let limit = usize::try_from(*limit).unwrap_or(0);
    solve(&goals, &target, Some(limit))
}

/// `(run* (q) goal ...)` collects every solution for `q`.
pub(crate) fn run_all(args: &Value, env: &Env) -> Result<Value, Error> {
    let Value::Pair(p) = args else {
        return Err(Error::Syntax);
    };
    let Value::Pair(binding) = &p.first else {
        return Err(Error::WrongArg(p.first.clone()));
    };
    if p.rest.is_nil() {
        return Err(Error::WrongArg(p.first.clone()));
    }
    let Value::Symbol(name) = &binding.first else {
        return Err(Error::InvalidName(binding.first.clone()));
    };
    if !matches!(&p.rest, Value::Pair(_)) {
        return Err(Error::Syntax);
    }
    let local = env.child();
    let target = Var::new(name.clone());
    local.set(name.clone(), Value::Var(target.clone()));
    let goals = extract_goals(&p.rest, &local)?;
    solve(&goals, &target, None)
}

/// Drive the goals, reifying the target after each success. Every
/// iteration starts from an empty trail holding only the target's birth
/// record; `advance` turns the conjunction to its next alternative.
fn solve(goals: &[Goal], target: &Var, limit: Option<usize>) -> Result<Value, Error> {
    let query = Value::Var(target.clone());
    let mut solutions = Vec::new();
    loop {
        if limit.is_some_and(|n| solutions.len() >= n) {
            break;
        }
        let mut trail = Subst::new();
        trail.birth_record(target);
        if query_all(goals, &mut trail)? {
            let solution = trail.reify(&query);
            debug!(solution = %solution, "solution");
            solutions.push(solution);
        }
        if !advance(goals) {
            break;
        }
    }
    Ok(ast::list(solutions))
}

impl PartialEq for Goal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Goal::Const(a), Goal::Const(b)) => a == b,
            (Goal::Unify(a), Goal::Unify(b)) => Rc::ptr_eq(a, b),
            (Goal::Fresh(a), Goal::Fresh(b)) => Rc::ptr_eq(a, b),
            (Goal::Conde(a), Goal::Conde(b)) => Rc::ptr_eq(a, b),
            (Goal::Project(a), Goal::Project(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Const(g) => write!(f, "{}", g.name),
            Goal::Unify(g) => write!(f, "(== {} {})", g.u, g.v),
            Goal::Fresh(g) => {
                write!(f, "(fresh (")?;
                for (i, var) in g.vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", var.name())?;
                }
                write!(f, ")")?;
                for goal in &g.goals {
                    write!(f, " {goal}")?;
                }
                write!(f, ")")
            }
            Goal::Conde(g) => {
                write!(f, "(conde")?;
                for branch in &g.branches {
                    write!(f, " {branch}")?;
                }
                write!(f, ")")
            }
            Goal::Project(g) => {
                write!(f, "(project (")?;
                for (i, name) in g.names.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{name}")?;
                }
                write!(f, ")")?;
                for goal in &g.goals {
                    write!(f, " {goal}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
