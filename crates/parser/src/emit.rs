//! Code buffers with explicit pending slots.
//!
//! Forward branches and values that do not exist yet are emitted as pending
//! slots and patched once their target is known. [`Code::finish`] refuses to
//! produce an instruction list while any slot is still pending.

use glint_common::{BranchKind, CallSite, Instruction, Pos, SyntaxError, Value, RETURN_OFFSET};

#[derive(Debug, Clone)]
enum Slot {
    Ready(Instruction),
    PendingBranch(BranchKind),
    PendingTry,
    PendingValue,
}

/// Handle to a pending slot. Must be consumed by a patch call.
#[must_use = "a pending slot that is never patched fails `Code::finish`"]
#[derive(Debug)]
pub(crate) struct Patch(usize);

/// An instruction list under construction.
#[derive(Debug, Clone, Default)]
pub(crate) struct Code {
    slots: Vec<Slot>,
}

impl Code {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn push(&mut self, instruction: Instruction) {
        self.slots.push(Slot::Ready(instruction));
    }

    pub(crate) fn value(&mut self, value: Value) {
        self.push(Instruction::Value(value));
    }

    pub(crate) fn load(&mut self, name: &str, pos: Pos) {
        self.push(Instruction::Placeholder {
            name: name.into(),
            pos,
        });
    }

    pub(crate) fn call(&mut self, name: &str, argc: usize, pos: Pos) {
        self.push(Instruction::Function(CallSite::new(name, argc, pos)));
    }

    pub(crate) fn send(&mut self, name: &str, argc: usize, pos: Pos) {
        self.push(Instruction::Command(CallSite::new(name, argc, pos)));
    }

    /// Emit `Value(name), <value code>, Function(set, 2)`.
    pub(crate) fn assign(&mut self, name: &str, value: Code, pos: Pos) {
        self.value(Value::str(name));
        self.append(value);
        self.call("set", 2, pos);
    }

    pub(crate) fn reserve_branch(&mut self, kind: BranchKind) -> Patch {
        self.slots.push(Slot::PendingBranch(kind));
        Patch(self.slots.len() - 1)
    }

    pub(crate) fn reserve_try(&mut self) -> Patch {
        self.slots.push(Slot::PendingTry);
        Patch(self.slots.len() - 1)
    }

    pub(crate) fn reserve_value(&mut self) -> Patch {
        self.slots.push(Slot::PendingValue);
        Patch(self.slots.len() - 1)
    }

    /// Point a pending branch or try slot at the next instruction emitted.
    pub(crate) fn patch_here(&mut self, patch: Patch) {
        let target = self.len();
        self.patch_to(patch, target);
    }

    pub(crate) fn patch_to(&mut self, patch: Patch, target: usize) {
        let at = patch.0;
        let offset = target as i32 - at as i32;
        let instruction = match self.slots[at] {
            Slot::PendingBranch(kind) => Instruction::Branch { kind, offset },
            Slot::PendingTry => Instruction::TryEnter { offset },
            _ => {
                debug_assert!(false, "slot {at} is not a pending jump");
                return;
            }
        };
        self.slots[at] = Slot::Ready(instruction);
    }

    pub(crate) fn patch_value(&mut self, patch: Patch, value: Value) {
        debug_assert!(matches!(self.slots[patch.0], Slot::PendingValue));
        self.slots[patch.0] = Slot::Ready(Instruction::Value(value));
    }

    /// Emit a branch to an already emitted index (loops).
    pub(crate) fn branch_to(&mut self, kind: BranchKind, target: usize) {
        let offset = target as i32 - self.len() as i32;
        self.push(Instruction::Branch { kind, offset });
    }

    /// Emit the procedure exit.
    pub(crate) fn branch_return(&mut self) {
        self.push(Instruction::Branch {
            kind: BranchKind::Always,
            offset: RETURN_OFFSET,
        });
    }

    /// Concatenate. Relative offsets stay valid; pending slots in `other`
    /// stay pending.
    pub(crate) fn append(&mut self, other: Code) {
        self.slots.extend(other.slots);
    }

    /// Convert to an executable list.
    pub(crate) fn finish(self) -> Result<Vec<Instruction>, SyntaxError> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Ready(instruction) => Ok(instruction),
                _ => Err(SyntaxError::UnresolvedPlaceholder(index)),
            })
            .collect()
    }
}
