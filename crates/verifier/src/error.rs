//! Verification errors.
//!
//! Every finding names the procedure and the instruction index it was found
//! at. The verifier collects all findings, not just the first.

use thiserror::Error;

/// Errors found during static verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The program never parsed; there is nothing to verify.
    #[error("program failed to parse: {0}")]
    ParseFailed(String),

    // --- Limits ---
    #[error("{procedure}: {size} instructions exceeds the limit of {limit}")]
    TooManyInstructions {
        procedure: String,
        size: usize,
        limit: usize,
    },

    #[error("{procedure}@{at}: call passes {argc} arguments, limit is {limit}")]
    TooManyArguments {
        procedure: String,
        at: usize,
        argc: usize,
        limit: usize,
    },

    // --- Structural ---
    #[error("{procedure}@{at}: branch {offset:+} lands outside the instruction list")]
    BranchOutOfRange {
        procedure: String,
        at: usize,
        offset: i32,
    },

    #[error("{procedure}@{at}: try handler {offset:+} lands outside the instruction list")]
    HandlerOutOfRange {
        procedure: String,
        at: usize,
        offset: i32,
    },

    /// A `TRY` whose target is not a `CATCH`.
    #[error("{procedure}@{at}: try handler points at {found} instead of CATCH")]
    HandlerNotCatch {
        procedure: String,
        at: usize,
        found: String,
    },

    /// A `CATCH` no `TRY` points at.
    #[error("{procedure}@{at}: CATCH without a TRY")]
    OrphanCatch { procedure: String, at: usize },

    #[error("{procedure}: {enters} TRY but {exits} END_TRY")]
    UnbalancedTry {
        procedure: String,
        enters: usize,
        exits: usize,
    },

    /// A reserved call (`set`, `getMember`, `setMember`) with the wrong
    /// argument count.
    #[error("{procedure}@{at}: {name} takes {expected} arguments, found {found}")]
    ReservedArity {
        procedure: String,
        at: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{procedure}@{at}: keyword '{name}' given twice")]
    DuplicateKeyword {
        procedure: String,
        at: usize,
        name: String,
    },

    // --- Stack ---
    #[error("{procedure}@{at}: stack underflow")]
    StackUnderflow { procedure: String, at: usize },

    /// Two paths reach one instruction with different stack depths.
    #[error("{procedure}@{at}: stack depth {found} disagrees with {expected} on another path")]
    StackMismatch {
        procedure: String,
        at: usize,
        expected: usize,
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_procedure_and_index() {
        let e = VerifyError::BranchOutOfRange {
            procedure: "update".to_string(),
            at: 4,
            offset: -9,
        };
        assert_eq!(
            e.to_string(),
            "update@4: branch -9 lands outside the instruction list"
        );
        let e = VerifyError::ReservedArity {
            procedure: "<module>".to_string(),
            at: 2,
            name: "set".to_string(),
            expected: 2,
            found: 1,
        };
        assert_eq!(e.to_string(), "<module>@2: set takes 2 arguments, found 1");
    }

    #[test]
    fn display_limits() {
        let e = VerifyError::TooManyInstructions {
            procedure: "big".to_string(),
            size: 70_000,
            limit: 65_536,
        };
        assert_eq!(
            e.to_string(),
            "big: 70000 instructions exceeds the limit of 65536"
        );
    }
}
