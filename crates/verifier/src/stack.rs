//! Operand stack analysis.
//!
//! Follows every path through a procedure, tracking the operand stack depth
//! at each instruction. Reports underflow and join points where paths
//! disagree. A `CATCH` is entered with the depth at its `TRY` plus the error
//! message.

use crate::error::VerifyError;
use glint_common::instruction::{resolve_offset, Target};
use glint_common::{BranchKind, Instruction, Procedure, RETURN_OFFSET};

/// Values an instruction pops and pushes.
fn effect(instruction: &Instruction) -> (usize, usize) {
    match instruction {
        Instruction::Value(_) | Instruction::Placeholder { .. } => (0, 1),
        Instruction::Function(site) if &*site.name == "set" => (site.argc(), 0),
        Instruction::Function(site) => (site.argc(), 1),
        Instruction::Command(site) => (site.argc() + 1, 1),
        Instruction::Branch {
            offset: RETURN_OFFSET,
            ..
        } => (1, 0),
        Instruction::Branch {
            kind: BranchKind::Always,
            ..
        } => (0, 0),
        Instruction::Branch { .. } => (1, 0),
        Instruction::Discard | Instruction::Catch { .. } => (1, 0),
        Instruction::Breakpoint(_) | Instruction::TryEnter { .. } | Instruction::TryExit => (0, 0),
    }
}

/// Run the stack check. Assumes the structural pass found no fatal errors.
pub fn check_stack(procedure: &Procedure) -> Vec<VerifyError> {
    let code = &procedure.code;
    let name = procedure.name.to_string();
    let mut errors = Vec::new();
    let mut depths: Vec<Option<usize>> = vec![None; code.len()];
    let mut pending: Vec<(usize, usize)> = vec![(0, 0)];

    while let Some((at, depth)) = pending.pop() {
        if at >= code.len() {
            continue;
        }
        match depths[at] {
            Some(seen) if seen == depth => continue,
            Some(seen) => {
                errors.push(VerifyError::StackMismatch {
                    procedure: name.clone(),
                    at,
                    expected: seen,
                    found: depth,
                });
                continue;
            }
            None => depths[at] = Some(depth),
        }

        let instruction = &code[at];
        let (pops, pushes) = effect(instruction);
        if depth < pops {
            errors.push(VerifyError::StackUnderflow {
                procedure: name.clone(),
                at,
            });
            continue;
        }
        let after = depth - pops + pushes;

        match instruction {
            Instruction::Branch { kind, offset } => {
                match resolve_offset(at, *offset, code.len()) {
                    Some(Target::Index(target)) => pending.push((target, after)),
                    Some(Target::Exit) | None => {}
                }
                if *kind != BranchKind::Always {
                    pending.push((at + 1, after));
                }
            }
            Instruction::TryEnter { offset } => {
                if let Some(Target::Index(target)) = resolve_offset(at, *offset, code.len()) {
                    pending.push((target, depth + 1));
                }
                pending.push((at + 1, after));
            }
            _ => pending.push((at + 1, after)),
        }
    }

    errors
}
