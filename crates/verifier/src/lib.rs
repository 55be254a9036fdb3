//! Glint verifier: static checks for instruction lists.
//!
//! The parser only produces well-formed lists, so a finding here means an
//! engine bug or a hand-built program. The verifier checks every procedure
//! of a [`Program`] before execution and collects all findings.
//!
//! # Usage
//!
//! ```
//! use glint_parser::parse_program;
//! use glint_verifier::verify;
//!
//! let program = parse_program("def f(x) { if (x) { return 1; } return 2; }", "demo.gl");
//! assert!(verify(&program).is_ok());
//! ```
//!
//! # Passes
//!
//! 1. **Limits**: list size and call argument counts
//! 2. **Structural**: branch and handler targets, reserved call arity
//! 3. **Stack**: operand stack depth along every path

pub mod error;
pub mod limits;
pub mod stack;
pub mod structural;

pub use error::VerifyError;

use glint_common::{Procedure, Program};

/// Verify every procedure of a program.
///
/// Returns `Ok(())` if all checks pass, or `Err` with every finding. A
/// program that failed to parse yields a single [`VerifyError::ParseFailed`].
pub fn verify(program: &Program) -> Result<(), Vec<VerifyError>> {
    if let Some(error) = program.parse_error() {
        return Err(vec![VerifyError::ParseFailed(error.to_string())]);
    }

    let errors: Vec<VerifyError> = program
        .procedures()
        .iter()
        .flat_map(|procedure| verify_procedure(procedure))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Run all passes on one procedure.
///
/// The stack pass follows branches, so it is skipped when the structural
/// pass finds a branch it cannot follow.
pub fn verify_procedure(procedure: &Procedure) -> Vec<VerifyError> {
    let mut errors = limits::check_limits(procedure);

    let structure = structural::check_structural(procedure);
    errors.extend(structure.errors);

    if !structure.fatal {
        errors.extend(stack::check_stack(procedure));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_common::{BranchKind, Instruction};
    use std::rc::Weak;

    #[test]
    fn broken_branch_skips_stack_pass() {
        let p = Procedure::new(
            "p",
            Vec::new(),
            vec![
                Instruction::Discard,
                Instruction::Branch {
                    kind: BranchKind::Always,
                    offset: 9,
                },
            ],
            1,
            Weak::new(),
        );
        let errors = verify_procedure(&p);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(errors[0], VerifyError::BranchOutOfRange { .. }));
    }
}
