//! Size limits for instruction lists.

use crate::error::VerifyError;
use glint_common::{Instruction, Procedure};

/// Maximum instructions in one procedure.
pub const MAX_INSTRUCTIONS: usize = 65_536;

/// Maximum arguments in one call.
pub const MAX_ARGUMENTS: usize = 255;

/// Run the limits check on one procedure.
pub fn check_limits(procedure: &Procedure) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    let name = procedure.name.to_string();

    if procedure.code.len() > MAX_INSTRUCTIONS {
        errors.push(VerifyError::TooManyInstructions {
            procedure: name.clone(),
            size: procedure.code.len(),
            limit: MAX_INSTRUCTIONS,
        });
    }

    for (at, instruction) in procedure.code.iter().enumerate() {
        if let Instruction::Function(site) | Instruction::Command(site) = instruction {
            if site.argc() > MAX_ARGUMENTS {
                errors.push(VerifyError::TooManyArguments {
                    procedure: name.clone(),
                    at,
                    argc: site.argc(),
                    limit: MAX_ARGUMENTS,
                });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_common::{CallSite, Pos, Value};
    use std::rc::Weak;

    fn procedure(code: Vec<Instruction>) -> Procedure {
        Procedure::new("p", Vec::new(), code, 1, Weak::new())
    }

    #[test]
    fn small_procedure_passes() {
        let p = procedure(vec![Instruction::Value(Value::None), Instruction::Discard]);
        assert!(check_limits(&p).is_empty());
    }

    #[test]
    fn too_many_arguments() {
        let p = procedure(vec![Instruction::Function(CallSite::new(
            "f",
            300,
            Pos::default(),
        ))]);
        assert_eq!(
            check_limits(&p),
            [VerifyError::TooManyArguments {
                procedure: "p".to_string(),
                at: 0,
                argc: 300,
                limit: MAX_ARGUMENTS,
            }]
        );
    }

    #[test]
    fn too_many_instructions() {
        let p = procedure(vec![Instruction::TryExit; MAX_INSTRUCTIONS + 1]);
        assert!(check_limits(&p)
            .iter()
            .any(|e| matches!(e, VerifyError::TooManyInstructions { .. })));
    }
}
