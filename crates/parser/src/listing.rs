//! Human-readable instruction listings.
//!
//! One block per procedure, one instruction per line, prefixed with its
//! index. Jumps also show the absolute index they land on.

use std::fmt::Write;

use glint_common::instruction::{resolve_offset, Target};
use glint_common::{Instruction, Procedure, Program, Value, RETURN_OFFSET};

/// List every procedure of a program, top-level code first.
pub fn listing(program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "; {} blake3:{}",
        program.filename(),
        program.source_digest()
    );
    for procedure in program.procedures() {
        out.push('\n');
        list_procedure(&mut out, &procedure);
    }
    out
}

fn signature(procedure: &Procedure) -> String {
    let params: Vec<String> = procedure
        .params
        .iter()
        .map(|p| match &p.default {
            Some(Value::Str(s)) => format!("{} = {s:?}", p.name),
            Some(default) => format!("{} = {default}", p.name),
            None => p.name.to_string(),
        })
        .collect();
    format!("{}({})", procedure.name, params.join(", "))
}

fn list_procedure(out: &mut String, procedure: &Procedure) {
    let _ = writeln!(out, "proc {} ; line {}", signature(procedure), procedure.line);
    let len = procedure.code.len();
    for (index, instruction) in procedure.code.iter().enumerate() {
        let jump = match instruction {
            Instruction::Branch { offset, .. } | Instruction::TryEnter { offset }
                if *offset != RETURN_OFFSET =>
            {
                Some(*offset)
            }
            _ => None,
        };
        let _ = match jump.map(|offset| resolve_offset(index, offset, len)) {
            Some(Some(Target::Index(target))) => {
                writeln!(out, "  {index:04}  {instruction}  -> {target:04}")
            }
            Some(_) => writeln!(out, "  {index:04}  {instruction}  -> ????"),
            None => writeln!(out, "  {index:04}  {instruction}"),
        };
    }
}
