//! Main execution loop and instruction dispatch.

use std::rc::Rc;

use glint_common::instruction::{resolve_offset, Target};
use glint_common::{
    Arguments, BranchKind, BreakpointAction, BreakpointMarker, CallSite, Instruction, Pos,
    RuntimeError, ScriptError, Value,
};

use crate::machine::{Frame, Handler, Machine};

/// What the loop does after an instruction.
enum Flow {
    Next,
    Jump(usize),
    Return(Value),
}

impl Machine<'_> {
    /// Run a frame until it returns or an error escapes every handler in it.
    pub(crate) fn execute(&mut self, frame: &mut Frame) -> Result<Value, ScriptError> {
        let procedure = Rc::clone(&frame.procedure);
        while let Some(instruction) = procedure.code.get(frame.pc) {
            match self.step(frame, instruction) {
                Ok(Flow::Next) => frame.pc += 1,
                Ok(Flow::Jump(target)) => frame.pc = target,
                Ok(Flow::Return(value)) => return Ok(value),
                Err(error) => self.recover(frame, error)?,
            }
        }
        Ok(Value::None)
    }

    fn step(&mut self, frame: &mut Frame, instruction: &Instruction) -> Result<Flow, ScriptError> {
        match instruction {
            Instruction::Value(value) => frame.push(value.clone())?,
            Instruction::Placeholder { name, pos } => {
                frame.pos = *pos;
                let value = self.load(frame, name).map_err(|e| frame.locate(e))?;
                frame.push(value)?;
            }
            Instruction::Function(site) => self.exec_function(frame, site)?,
            Instruction::Command(site) => self.exec_command(frame, site)?,
            Instruction::Branch { kind, offset } => return self.exec_branch(frame, *kind, *offset),
            Instruction::Breakpoint(marker) => self.exec_breakpoint(frame, marker)?,
            Instruction::Discard => {
                frame.pop()?;
            }
            Instruction::TryEnter { offset } => self.exec_try_enter(frame, *offset)?,
            Instruction::TryExit => {
                if frame.handlers.pop().is_none() {
                    return Err(frame.internal("END_TRY without TRY"));
                }
                self.state.exit_try(1);
            }
            Instruction::Catch { binding } => {
                let message = frame.pop()?;
                if let Some(name) = binding {
                    frame.assign(name.clone(), message);
                }
            }
        }
        Ok(Flow::Next)
    }

    /// Route an error to the innermost handler of this frame, or let it
    /// escape. The exception handler sees it at the raise site, once, when
    /// no `try` is active anywhere in the run.
    fn recover(&mut self, frame: &mut Frame, mut error: ScriptError) -> Result<(), ScriptError> {
        if !error.is_catchable() {
            return Err(error);
        }
        if let Some(handler) = frame.handlers.pop() {
            self.state.exit_try(1);
            log::debug!("caught in {}: {error}", frame.procedure.name);
            frame.stack.truncate(handler.depth);
            frame.push(Value::str(&error.to_string()))?;
            frame.pc = handler.target;
            return Ok(());
        }
        if let ScriptError::Runtime(located) = &error {
            if !located.reported && !self.state.in_try() {
                self.sync_caller(frame);
                let seen = self.state.report_exception(&error);
                if let ScriptError::Runtime(located) = &mut error {
                    located.reported = seen;
                }
            }
        }
        Err(error)
    }

    // ---- Calls ----

    fn exec_function(&mut self, frame: &mut Frame, site: &CallSite) -> Result<(), ScriptError> {
        frame.pos = site.pos;
        let args = frame.pop_args(site)?;
        if &*site.name == "set" {
            let mut values = args.into_vec().into_iter();
            let (Some(target), Some(value)) = (values.next(), values.next()) else {
                return Err(frame.internal("set needs a name and a value"));
            };
            let Value::Str(name) = target.value else {
                return Err(frame.internal("set target is not a name"));
            };
            frame.assign(name, value.value);
            return Ok(());
        }
        self.sync_caller(frame);
        let value = self.call_function(frame, &site.name, args)?;
        frame.push(value)
    }

    fn exec_command(&mut self, frame: &mut Frame, site: &CallSite) -> Result<(), ScriptError> {
        frame.pos = site.pos;
        let args = frame.pop_args(site)?;
        let receiver = frame.pop()?;
        match &*site.name {
            "getMember" => {
                let name = member_name(frame, &args)?;
                let value = self
                    .get_member(&receiver, &name)
                    .map_err(|e| frame.locate(e))?;
                frame.push(value)
            }
            "setMember" => {
                let name = member_name(frame, &args)?;
                let value = args.get(1).cloned().unwrap_or(Value::None);
                self.set_member(&receiver, &name, value.clone())
                    .map_err(|e| frame.locate(e))?;
                frame.push(value)
            }
            name => {
                self.sync_caller(frame);
                let value = self.send(&frame.site(), receiver, name, args)?;
                frame.push(value)
            }
        }
    }

    // ---- Control flow ----

    fn exec_branch(
        &mut self,
        frame: &mut Frame,
        kind: BranchKind,
        offset: i32,
    ) -> Result<Flow, ScriptError> {
        let taken = match kind {
            BranchKind::Always => true,
            BranchKind::IfTrue | BranchKind::IfFalse => {
                let condition = frame.pop()?;
                let Some(condition) = condition.as_bool() else {
                    return Err(frame.locate(RuntimeError::type_mismatch(
                        "condition",
                        "bool",
                        condition.type_name(),
                    )));
                };
                condition == (kind == BranchKind::IfTrue)
            }
        };
        if !taken {
            return Ok(Flow::Next);
        }
        let target = resolve_offset(frame.pc, offset, frame.procedure.code.len());
        debug_assert!(
            target.is_some(),
            "branch {offset:+} at {} leaves {}",
            frame.pc,
            frame.procedure.name
        );
        match target {
            Some(Target::Index(index)) => Ok(Flow::Jump(index)),
            Some(Target::Exit) => Ok(Flow::Return(frame.stack.pop().unwrap_or(Value::None))),
            None => Err(frame.internal("branch target outside the instruction list")),
        }
    }

    fn exec_try_enter(&mut self, frame: &mut Frame, offset: i32) -> Result<(), ScriptError> {
        let target = resolve_offset(frame.pc, offset, frame.procedure.code.len());
        debug_assert!(
            matches!(target, Some(Target::Index(_))),
            "try handler {offset:+} at {} leaves {}",
            frame.pc,
            frame.procedure.name
        );
        let Some(Target::Index(target)) = target else {
            return Err(frame.internal("try handler outside the instruction list"));
        };
        frame.handlers.push(Handler {
            target,
            depth: frame.stack.len(),
        });
        self.state.enter_try();
        Ok(())
    }

    /// Termination is honoured at every marker. Without a breakpoint handler
    /// the marker does nothing else.
    fn exec_breakpoint(
        &mut self,
        frame: &mut Frame,
        marker: &BreakpointMarker,
    ) -> Result<(), ScriptError> {
        if self.state.is_terminated() {
            return Err(ScriptError::Terminated);
        }
        frame.pos = Pos::new(marker.first_line, 1);
        if !self.state.has_breakpoint_handler() {
            return Ok(());
        }
        if self.state.step_mode || marker.should_stop() {
            self.sync_caller(frame);
            if self.state.fire_breakpoint() == BreakpointAction::Terminate {
                log::debug!("terminated at {}:{}", frame.program.filename(), marker.first_line);
                return Err(ScriptError::Terminated);
            }
        }
        Ok(())
    }
}

/// The member name argument of `getMember`/`setMember`.
fn member_name(frame: &Frame, args: &Arguments) -> Result<Rc<str>, ScriptError> {
    match args.get(0) {
        Some(Value::Str(name)) => Ok(name.clone()),
        Some(other) => Err(frame.locate(RuntimeError::type_mismatch(
            "member access",
            "string",
            other.type_name(),
        ))),
        None => Err(frame.internal("member access without a name")),
    }
}
