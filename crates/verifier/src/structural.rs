//! Structural validation of one procedure.
//!
//! Checks that every branch and try handler lands inside the list, that
//! handlers point at `CATCH` instructions, and that the reserved calls the
//! parser emits have their fixed arity.

use std::collections::HashSet;

use crate::error::VerifyError;
use glint_common::instruction::{resolve_offset, Target};
use glint_common::{CallSite, Instruction, Procedure};

/// Reserved calls and the argument count each one always has.
const RESERVED_FUNCTIONS: &[(&str, usize)] = &[("set", 2)];
const RESERVED_COMMANDS: &[(&str, usize)] = &[("getMember", 1), ("setMember", 2)];

/// Result of the structural pass.
#[derive(Debug, Default)]
pub struct Structure {
    pub errors: Vec<VerifyError>,
    /// Control flow is broken; passes that follow branches must be skipped.
    pub fatal: bool,
}

/// Run the structural pass on one procedure.
pub fn check_structural(procedure: &Procedure) -> Structure {
    let code = &procedure.code;
    let name = procedure.name.to_string();
    let mut structure = Structure::default();
    let mut handled: HashSet<usize> = HashSet::new();
    let (mut enters, mut exits) = (0, 0);

    for (at, instruction) in code.iter().enumerate() {
        match instruction {
            Instruction::Branch { offset, .. } => {
                if resolve_offset(at, *offset, code.len()).is_none() {
                    structure.fatal = true;
                    structure.errors.push(VerifyError::BranchOutOfRange {
                        procedure: name.clone(),
                        at,
                        offset: *offset,
                    });
                }
            }
            Instruction::TryEnter { offset } => {
                enters += 1;
                match resolve_offset(at, *offset, code.len()) {
                    Some(Target::Index(target)) if target < code.len() => {
                        if let Instruction::Catch { .. } = code[target] {
                            handled.insert(target);
                        } else {
                            structure.fatal = true;
                            structure.errors.push(VerifyError::HandlerNotCatch {
                                procedure: name.clone(),
                                at,
                                found: code[target].mnemonic().to_string(),
                            });
                        }
                    }
                    _ => {
                        structure.fatal = true;
                        structure.errors.push(VerifyError::HandlerOutOfRange {
                            procedure: name.clone(),
                            at,
                            offset: *offset,
                        });
                    }
                }
            }
            Instruction::TryExit => exits += 1,
            Instruction::Function(site) => {
                check_site(&name, at, site, RESERVED_FUNCTIONS, &mut structure.errors);
            }
            Instruction::Command(site) => {
                check_site(&name, at, site, RESERVED_COMMANDS, &mut structure.errors);
            }
            _ => {}
        }
    }

    for (at, instruction) in code.iter().enumerate() {
        if matches!(instruction, Instruction::Catch { .. }) && !handled.contains(&at) {
            structure.errors.push(VerifyError::OrphanCatch {
                procedure: name.clone(),
                at,
            });
        }
    }

    if enters != exits {
        structure.errors.push(VerifyError::UnbalancedTry {
            procedure: name,
            enters,
            exits,
        });
    }

    structure
}

fn check_site(
    procedure: &str,
    at: usize,
    site: &CallSite,
    reserved: &[(&str, usize)],
    errors: &mut Vec<VerifyError>,
) {
    if let Some((name, expected)) = reserved.iter().find(|(name, _)| *name == &*site.name) {
        if site.argc() != *expected {
            errors.push(VerifyError::ReservedArity {
                procedure: procedure.to_string(),
                at,
                name: name.to_string(),
                expected: *expected,
                found: site.argc(),
            });
        }
    }

    let mut seen = HashSet::new();
    for keyword in site.keywords.iter().flatten() {
        if !seen.insert(keyword.clone()) {
            errors.push(VerifyError::DuplicateKeyword {
                procedure: procedure.to_string(),
                at,
                name: keyword.to_string(),
            });
        }
    }
}
