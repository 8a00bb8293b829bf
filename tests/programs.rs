use relish::{default_env, eval_string, load, Env, Error, Value};

fn printed(env: &Env, code: &str) -> Result<String, Error> {
    let values = eval_string(code, env)?;
    Ok(values.last().map(Value::to_string).unwrap_or_default())
}

#[test]
fn script_fixtures() {
    for file in ["prelude.scm", "peano.scm", "kanren.scm"] {
        let env = default_env();
        let path = format!("{}/tests/scm/{file}", env!("CARGO_MANIFEST_DIR"));
        if let Err(err) = load(&path, &env) {
            panic!("{file}: {err}");
        }
    }
}

#[test]
fn definitions_persist_between_evaluations() {
    let env = default_env();
    eval_string("(define x 2)", &env).unwrap();
    assert_eq!(printed(&env, "(+ x 1)").unwrap(), "3");
}

#[test]
fn errors_leave_the_environment_usable() {
    let env = default_env();
    eval_string("(define x 1)", &env).unwrap();
    assert!(eval_string("(car 42)", &env).is_err());
    assert_eq!(printed(&env, "x").unwrap(), "1");
}

#[test]
fn functional_and_relational_halves_compose() {
    let env = default_env();
    eval_string(
        "(define fact
           (lambda (n)
             (cond ((= n 0) 1)
                   (else (* n (fact (- n 1)))))))",
        &env,
    )
    .unwrap();
    assert_eq!(
        printed(&env, "(run* (q) (== q (fact 5)))").unwrap(),
        "(120)"
    );
}

#[test]
fn load_is_available_from_scripts() {
    let env = default_env();
    let path = format!("{}/tests/scm/prelude.scm", env!("CARGO_MANIFEST_DIR"));
    let code = format!("(load \"{path}\") (fact 6)");
    assert_eq!(printed(&env, &code).unwrap(), "720");
}

#[test]
fn solutions_print_with_numbered_placeholders() {
    let env = default_env();
    assert_eq!(printed(&env, "(run* (q) succeed)").unwrap(), "(_.0)");
    assert_eq!(
        printed(&env, "(run* (q) (fresh (x y) (== q (list x y 'lit x))))").unwrap(),
        "((_.0 _.1 lit _.0))"
    );
}

#[test]
fn failed_test_check_reports_both_sides() {
    let env = default_env();
    let err = eval_string("(test-check \"sums\" (+ 2 2) 5)", &env).unwrap_err();
    assert_eq!(
        err,
        Error::TestFailure {
            name: "sums".into(),
            got: "4".into(),
            want: "5".into(),
        }
    );
}
