//! CLI command implementations.
//!
//! Each command reports its own errors on stderr and returns the exit code
//! to use on failure.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use glint_common::{Arguments, BreakpointAction, ExecutionState, Program, Value};
use glint_parser::{Token, TokenKind};
use log::debug;

/// Read a script, reporting I/O failures with exit code 1.
fn read_source(path: &Path) -> Result<String, i32> {
    fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))
        .map_err(|e| {
            eprintln!("error: {e:#}");
            1
        })
}

/// Read and parse a script. Parse errors exit with code 1.
fn load(path: &Path) -> Result<Rc<Program>, i32> {
    let source = read_source(path)?;
    let program = glint_parser::parse_program(&source, &path.display().to_string());
    if let Some(e) = program.parse_error() {
        eprintln!("error: {e}");
        return Err(1);
    }
    Ok(program)
}

/// Verification failures exit with code 2.
fn verify(program: &Program) -> Result<(), i32> {
    glint_verifier::verify(program).map_err(|errors| {
        for e in &errors {
            eprintln!("error: {e}");
        }
        2
    })
}

fn token_line(token: &Token) -> String {
    let what = match &token.kind {
        TokenKind::Str(s) => format!("string {s:?}"),
        _ => token.describe(),
    };
    format!("{}:{}\t{what}", token.line, token.column)
}

/// Print one token per line.
pub fn tokens(input: &Path) -> Result<(), i32> {
    let source = read_source(input)?;
    let tokens = glint_parser::tokenize(&source, &input.display().to_string()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    for token in &tokens {
        println!("{}", token_line(token));
    }
    Ok(())
}

/// Print the instruction listing.
pub fn list(input: &Path) -> Result<(), i32> {
    let program = load(input)?;
    print!("{}", glint_parser::listing(&program));
    Ok(())
}

/// Parse and verify without running.
pub fn check(input: &Path) -> Result<(), i32> {
    let program = load(input)?;
    verify(&program)?;
    println!(
        "OK: {} ({} procedures)",
        input.display(),
        program.procedures().len()
    );
    Ok(())
}

/// Print the source digest, `sha256sum` style.
pub fn hash(input: &Path) -> Result<(), i32> {
    let source = read_source(input)?;
    println!("{}  {}", glint_parser::source_digest(&source), input.display());
    Ok(())
}

/// Verify, initialize and optionally call an entry point. Breakpoints print
/// the innermost frame and its locals to stderr, then continue.
pub fn run(input: &Path, entry: Option<&str>, breakpoints: &[u32]) -> Result<(), i32> {
    let program = load(input)?;
    verify(&program)?;

    for &line in breakpoints {
        match program.set_breakpoint(line, true) {
            0 => eprintln!("warning: no statement on line {line}"),
            n => debug!("breakpoint on line {line} covers {n} statements"),
        }
    }

    let mut state = ExecutionState::new();
    if !breakpoints.is_empty() {
        state.set_breakpoint_handler(|stack| {
            if let Some(frame) = stack.last() {
                eprintln!("break: {frame}");
                for (name, value) in &frame.locals {
                    eprintln!("  {name} = {value}");
                }
            }
            BreakpointAction::Continue
        });
    }
    state.set_exception_handler(|_, stack| {
        eprintln!("call stack (innermost last):");
        for caller in stack {
            eprintln!("  at {caller}");
        }
    });

    let result = glint_vm::initialize(&mut state, &program).and_then(|()| match entry {
        Some(name) => {
            debug!("calling entry point '{name}'");
            glint_vm::call_member(&mut state, &program, name, Arguments::default())
        }
        None => Ok(Value::None),
    });

    match result {
        Ok(Value::None) => Ok(()),
        Ok(value) => {
            println!("{value}");
            Ok(())
        }
        Err(e) => {
            eprintln!("runtime error: {e}");
            Err(3)
        }
    }
}
