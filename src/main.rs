use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use relish::{default_env, eval_string, load, Env};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

/// A Scheme-flavored interpreter with a miniKanren relational core.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Script files to evaluate, printing the last value
    files: Vec<PathBuf>,

    /// Trace evaluation and unification steps on stderr
    #[arg(long)]
    debug: bool,

    /// Open the REPL after evaluating the files
    #[arg(long)]
    keep: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let env = default_env();
    if !cli.files.is_empty() {
        let mut last = None;
        for path in &cli.files {
            match load(path, &env) {
                Ok(values) => last = values.into_iter().last().or(last),
                Err(err) => {
                    eprintln!("ERROR: {err}");
                    return ExitCode::FAILURE;
                }
            }
        }
        if let Some(value) = last {
            println!("{value}");
        }
        if !cli.keep {
            return ExitCode::SUCCESS;
        }
    }
    repl(&env)
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("relish=trace")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn repl(env: &Env) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("ERROR: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("Press ^C to exit.");
    println!();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                match eval_string(&line, env) {
                    Ok(values) => {
                        for value in values {
                            println!("{value}");
                        }
                    }
                    Err(err) => println!("ERROR: {err}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("ERROR: {err}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
