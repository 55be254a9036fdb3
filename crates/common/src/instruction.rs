//! Instruction lists: the only executable representation of a script.
//!
//! Expressions are lowered to postfix order, so operands are always pushed
//! before the call that consumes them. Branch offsets are relative to the
//! branch's own index; lists can therefore be concatenated without patching.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::value::{Name, Value};

/// Branch offset meaning "leave the procedure". Always lands past the end of
/// any list.
pub const RETURN_OFFSET: i32 = i32::MAX;

/// Marks compiler-generated variable names. Scripts cannot spell it, and
/// hidden variables never become program members or appear in snapshots.
pub const HIDDEN_MARK: char = '#';

/// A compiler-generated variable, such as a `for` loop counter.
pub fn hidden_name(role: &str, n: usize) -> String {
    format!("{role}{HIDDEN_MARK}{n}")
}

pub fn is_hidden(name: &str) -> bool {
    name.contains(HIDDEN_MARK)
}

/// Source position carried by instructions that can fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Always,
    /// Pops a boolean; branches when it is true.
    IfTrue,
    /// Pops a boolean; branches when it is false.
    IfFalse,
}

/// A call by name with `argc` arguments already on the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub name: Name,
    /// One entry per argument, `Some` for keyword arguments.
    pub keywords: Box<[Option<Name>]>,
    pub pos: Pos,
}

impl CallSite {
    /// A call with only positional arguments.
    pub fn new(name: &str, argc: usize, pos: Pos) -> Self {
        Self {
            name: Rc::from(name),
            keywords: vec![None; argc].into_boxed_slice(),
            pos,
        }
    }

    pub fn with_keywords(name: &str, keywords: Vec<Option<Name>>, pos: Pos) -> Self {
        Self {
            name: Rc::from(name),
            keywords: keywords.into_boxed_slice(),
            pos,
        }
    }

    pub fn argc(&self) -> usize {
        self.keywords.len()
    }
}

/// A statement-level debugger hook.
///
/// `active` is set when a breakpoint is placed on one of the covered lines;
/// `enabled` lets a host mute it without forgetting it.
#[derive(Debug)]
pub struct BreakpointMarker {
    pub first_line: u32,
    pub last_line: u32,
    active: Cell<bool>,
    enabled: Cell<bool>,
}

impl BreakpointMarker {
    pub fn new(first_line: u32, last_line: u32) -> Self {
        Self {
            first_line,
            last_line,
            active: Cell::new(false),
            enabled: Cell::new(true),
        }
    }

    pub fn covers(&self, line: u32) -> bool {
        (self.first_line..=self.last_line).contains(&line)
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Whether execution should pause here outside step mode.
    pub fn should_stop(&self) -> bool {
        self.is_active() && self.is_enabled()
    }
}

/// One element of an instruction list.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Push a literal.
    Value(Value),
    /// Push the current value of a named variable.
    Placeholder { name: Name, pos: Pos },
    /// Call by name without a receiver. `set` is the assignment pseudo-call.
    Function(CallSite),
    /// Call by name on a receiver pushed before the arguments.
    /// `getMember`/`setMember` are member read/write; `setMember` pushes the
    /// assigned value.
    Command(CallSite),
    Branch { kind: BranchKind, offset: i32 },
    Breakpoint(Rc<BreakpointMarker>),
    /// Drop the top of the stack (result of an expression statement).
    Discard,
    /// Register a try handler whose catch block starts at `offset`.
    TryEnter { offset: i32 },
    /// Leave the innermost guarded region normally.
    TryExit,
    /// First instruction of a catch block: consumes the error message.
    Catch { binding: Option<Name> },
}

/// Where a branch lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// An index in `0..=len`; `len` means "fall off the end".
    Index(usize),
    /// The return sentinel.
    Exit,
}

/// Resolve a relative offset taken at index `at` in a list of `len`
/// instructions. `None` means the target is outside the list.
pub fn resolve_offset(at: usize, offset: i32, len: usize) -> Option<Target> {
    if offset == RETURN_OFFSET {
        return Some(Target::Exit);
    }
    let target = at as i64 + offset as i64;
    if target < 0 || target > len as i64 {
        return None;
    }
    Some(Target::Index(target as usize))
}

impl Instruction {
    /// Upper-case mnemonic used by listings.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Value(_) => "VALUE",
            Instruction::Placeholder { .. } => "LOAD",
            Instruction::Function(_) => "CALL",
            Instruction::Command(_) => "SEND",
            Instruction::Branch {
                offset: RETURN_OFFSET,
                ..
            } => "RETURN",
            Instruction::Branch { kind, .. } => match kind {
                BranchKind::Always => "JUMP",
                BranchKind::IfTrue => "JUMP_IF_TRUE",
                BranchKind::IfFalse => "JUMP_IF_FALSE",
            },
            Instruction::Breakpoint(_) => "BREAK",
            Instruction::Discard => "DISCARD",
            Instruction::TryEnter { .. } => "TRY",
            Instruction::TryExit => "END_TRY",
            Instruction::Catch { .. } => "CATCH",
        }
    }
}

fn write_call(f: &mut fmt::Formatter<'_>, mnemonic: &str, site: &CallSite) -> fmt::Result {
    write!(f, "{mnemonic} {}/{}", site.name, site.argc())?;
    let keywords: Vec<&str> = site.keywords.iter().flatten().map(|k| k.as_ref()).collect();
    if !keywords.is_empty() {
        write!(f, " [{}]", keywords.join(", "))?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic();
        match self {
            Instruction::Value(Value::Str(s)) => write!(f, "{mnemonic} {s:?}"),
            Instruction::Value(value) => write!(f, "{mnemonic} {value}"),
            Instruction::Placeholder { name, .. } => write!(f, "{mnemonic} {name}"),
            Instruction::Function(site) | Instruction::Command(site) => {
                write_call(f, mnemonic, site)
            }
            Instruction::Branch {
                offset: RETURN_OFFSET,
                ..
            } => write!(f, "{mnemonic}"),
            Instruction::Branch { offset, .. } | Instruction::TryEnter { offset } => {
                write!(f, "{mnemonic} {offset:+}")
            }
            Instruction::Breakpoint(marker) if marker.first_line == marker.last_line => {
                write!(f, "{mnemonic} line {}", marker.first_line)
            }
            Instruction::Breakpoint(marker) => write!(
                f,
                "{mnemonic} lines {}-{}",
                marker.first_line, marker.last_line
            ),
            Instruction::Catch {
                binding: Some(name),
            } => write!(f, "{mnemonic} {name}"),
            Instruction::Discard | Instruction::TryExit | Instruction::Catch { binding: None } => {
                write!(f, "{mnemonic}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_forward_and_backward() {
        assert_eq!(resolve_offset(2, 3, 10), Some(Target::Index(5)));
        assert_eq!(resolve_offset(7, -7, 10), Some(Target::Index(0)));
        assert_eq!(resolve_offset(9, 1, 10), Some(Target::Index(10)));
    }

    #[test]
    fn hidden_names_are_not_identifiers() {
        assert_eq!(hidden_name("idx", 3), "idx#3");
        assert!(is_hidden(&hidden_name("idx", 3)));
        assert!(!is_hidden("idx3"));
    }

    #[test]
    fn resolve_rejects_out_of_range() {
        assert_eq!(resolve_offset(9, 2, 10), None);
        assert_eq!(resolve_offset(1, -2, 10), None);
    }

    #[test]
    fn return_sentinel_always_exits() {
        assert_eq!(resolve_offset(0, RETURN_OFFSET, 0), Some(Target::Exit));
        assert_eq!(resolve_offset(500, RETURN_OFFSET, 3), Some(Target::Exit));
    }

    #[test]
    fn marker_stops_only_when_active_and_enabled() {
        let marker = BreakpointMarker::new(3, 4);
        assert!(!marker.should_stop());
        marker.set_active(true);
        assert!(marker.should_stop());
        marker.set_enabled(false);
        assert!(!marker.should_stop());
        assert!(marker.covers(4));
        assert!(!marker.covers(5));
    }

    #[test]
    fn display_instructions() {
        assert_eq!(Instruction::Value(Value::Number(1.0)).to_string(), "VALUE 1");
        assert_eq!(Instruction::Value(Value::str("x")).to_string(), "VALUE \"x\"");
        assert_eq!(
            Instruction::Command(CallSite::new("__add__", 1, Pos::default())).to_string(),
            "SEND __add__/1"
        );
        assert_eq!(
            Instruction::Function(CallSite::with_keywords(
                "move",
                vec![None, Some(Rc::from("dy"))],
                Pos::default()
            ))
            .to_string(),
            "CALL move/2 [dy]"
        );
        assert_eq!(
            Instruction::Branch {
                kind: BranchKind::IfFalse,
                offset: 4
            }
            .to_string(),
            "JUMP_IF_FALSE +4"
        );
        assert_eq!(
            Instruction::Branch {
                kind: BranchKind::Always,
                offset: RETURN_OFFSET
            }
            .to_string(),
            "RETURN"
        );
    }
}
