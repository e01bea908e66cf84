// Interactive inspection layer over `vm::VM`: breakpoints, single-stepping,
// run-to-completion-or-breakpoint, and synchronous event subscription.
// Grounded on the teacher's own `vm.rs` `step()` API, which was already
// written as "an interface for an external debugger" (its own doc comment
// said so) — this module is that external debugger.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use crate::bytecode::Program;
use crate::errors::VmError;
use crate::vm::{ExecState, Output, VmLimits, VM};

/// A handle a `Step`/`Breakpoint` subscriber can hold onto to ask a running
/// `continue_` loop to pause before its next instruction, without needing
/// a second borrow of the `Session` it's subscribed to.
#[derive(Clone)]
pub struct PauseHandle(Rc<Cell<bool>>);

impl PauseHandle {
    pub fn request(&self) {
        self.0.set(true);
    }
}

// Conditional breakpoints: the condition text is parsed-and-stored only,
// per the open-question resolution in SPEC_FULL.md §4 — a breakpoint with
// a condition still breaks unconditionally, since there's no expression
// evaluator wired to live VM state to test it against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub address: usize,
    pub enabled: bool,
    pub hit_count: u64,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEvent {
    Start,
    Step,
    Breakpoint(usize),
    Halt,
    Error,
    Reset,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub pc: usize,
    pub state: String,
    pub operand_stack: Vec<String>,
    pub variables: HashMap<String, String>,
    pub call_depth: usize,
    pub step_count: u64,
}

/// Drives a `VM` one instruction at a time, pausing at breakpoints and
/// notifying subscribers of lifecycle events in the order spec.md's Design
/// Notes require: subscribers are called synchronously, in registration
/// order, before control returns to the caller that triggered the event.
pub struct Session<O: Output> {
    vm: VM,
    output: O,
    breakpoints: HashMap<usize, Breakpoint>,
    step_count: u64,
    running: bool,
    paused: bool,
    halted: bool,
    auto_break_on_error: bool,
    subscribers: Vec<Box<dyn FnMut(DebugEvent)>>,
    last_error: Option<VmError>,
    pause_flag: Rc<Cell<bool>>,
}

impl<O: Output> Session<O> {
    pub fn new(program: Program, functions: HashMap<String, usize>, limits: VmLimits, output: O) -> Self {
        Session {
            vm: VM::new(program, functions, limits),
            output,
            breakpoints: HashMap::new(),
            step_count: 0,
            running: false,
            paused: false,
            halted: false,
            auto_break_on_error: false,
            subscribers: Vec::new(),
            last_error: None,
            pause_flag: Rc::new(Cell::new(false)),
        }
    }

    pub fn set_auto_break_on_error(&mut self, value: bool) {
        self.auto_break_on_error = value;
    }

    /// A cloneable handle a subscriber can use to request a pause from
    /// inside its own callback (it cannot re-borrow `self` there).
    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle(Rc::clone(&self.pause_flag))
    }

    /// Requests that the next `continue_` loop stop before its next
    /// instruction, as if a breakpoint had fired at the current `pc`.
    pub fn pause(&self) {
        self.pause_flag.set(true);
    }

    pub fn subscribe(&mut self, callback: impl FnMut(DebugEvent) + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    fn emit(&mut self, event: DebugEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }

    pub fn add_breakpoint(&mut self, address: usize) {
        self.breakpoints.entry(address).or_insert(Breakpoint { address, enabled: true, hit_count: 0, condition: None });
    }

    /// Like `add_breakpoint`, but attaches a condition's source text to the
    /// breakpoint for later inspection (e.g. via `breakpoints()`/`export`).
    /// The condition is stored, not evaluated — the breakpoint still fires
    /// unconditionally, as `add_breakpoint`'s does.
    pub fn add_conditional_breakpoint(&mut self, address: usize, condition: String) {
        self.breakpoints
            .entry(address)
            .and_modify(|bp| bp.condition = Some(condition.clone()))
            .or_insert(Breakpoint { address, enabled: true, hit_count: 0, condition: Some(condition) });
    }

    pub fn remove_breakpoint(&mut self, address: usize) {
        self.breakpoints.remove(&address);
    }

    pub fn toggle_breakpoint(&mut self, address: usize) {
        if let Some(bp) = self.breakpoints.get_mut(&address) {
            bp.enabled = !bp.enabled;
        }
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self) -> Vec<&Breakpoint> {
        let mut bps: Vec<&Breakpoint> = self.breakpoints.values().collect();
        bps.sort_by_key(|b| b.address);
        bps
    }

    pub fn start(&mut self) {
        self.running = true;
        self.paused = false;
        self.halted = false;
        self.step_count = 0;
        self.last_error = None;
        self.emit(DebugEvent::Start);
    }

    /// Executes exactly one instruction, regardless of breakpoints — this
    /// is the primitive "step over" the CLI's `--trace` mode and a
    /// breakpoint-driven `continue_` both build on.
    pub fn step(&mut self) -> Result<(), VmError> {
        if self.halted {
            return Ok(());
        }
        let result = unsafe { self.vm.step_unchecked(&mut self.output) };
        self.step_count += 1;
        match result {
            Ok(ExecState::Halted) => {
                self.halted = true;
                self.running = false;
                self.emit(DebugEvent::Halt);
                Ok(())
            }
            Ok(_) => {
                self.emit(DebugEvent::Step);
                Ok(())
            }
            Err(err) => {
                self.halted = true;
                self.running = false;
                self.last_error = Some(err.clone());
                self.emit(DebugEvent::Error);
                Err(err)
            }
        }
    }

    /// Runs until halted, faulted, a breakpoint at the *current*
    /// instruction's address fires, `max_steps` is exceeded, or a pause is
    /// requested (via `pause()`/a `PauseHandle`). A breakpoint fires before
    /// that instruction executes: `pc` equals the breakpoint's address, the
    /// breakpoint is enabled, and its hit count is incremented.
    ///
    /// `max_steps` bounds only this call, distinct from the VM's own
    /// `max_instructions` budget (spec.md §5): running past it simply
    /// returns control to the caller rather than faulting.
    pub fn continue_(&mut self, max_steps: Option<u64>) -> Result<(), VmError> {
        self.paused = false;
        self.pause_flag.set(false);
        let mut steps_this_call: u64 = 0;
        loop {
            if self.halted {
                return Ok(());
            }
            if self.pause_flag.get() {
                self.pause_flag.set(false);
                self.paused = true;
                return Ok(());
            }
            if let Some(limit) = max_steps {
                if steps_this_call >= limit {
                    self.paused = true;
                    return Ok(());
                }
            }
            let pc = self.vm.pc();
            if let Some(bp) = self.breakpoints.get_mut(&pc) {
                if bp.enabled {
                    bp.hit_count += 1;
                    self.paused = true;
                    self.emit(DebugEvent::Breakpoint(pc));
                    return Ok(());
                }
            }
            self.step()?;
            steps_this_call += 1;
            if self.auto_break_on_error && self.last_error.is_some() {
                return Err(self.last_error.clone().unwrap());
            }
        }
    }

    pub fn reset(&mut self, program: Program, functions: HashMap<String, usize>, limits: VmLimits) {
        self.vm = VM::new(program, functions, limits);
        self.step_count = 0;
        self.running = false;
        self.paused = false;
        self.halted = false;
        self.last_error = None;
        self.emit(DebugEvent::Reset);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn pc(&self) -> usize {
        self.vm.pc()
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            pc: self.vm.pc(),
            state: format!("{:?}", self.vm.state()),
            operand_stack: self.vm.operand_stack().iter().map(|v| v.to_display_string()).collect(),
            variables: self.vm.variables().iter().map(|(k, v)| (k.clone(), v.to_display_string())).collect(),
            call_depth: self.vm.call_depth(),
            step_count: self.step_count,
        }
    }

    pub fn export(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::bytecode::{Instruction, Opcode, Operand};

    fn program() -> Program {
        Program {
            instructions: vec![
                Instruction::new(Opcode::Push, Operand::Float(1.0)),
                Instruction::new(Opcode::Push, Operand::Float(2.0)),
                Instruction::bare(Opcode::Add),
                Instruction::bare(Opcode::Print),
                Instruction::bare(Opcode::Halt),
            ],
        }
    }

    #[test]
    fn stepping_advances_one_instruction_at_a_time() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        session.start();
        session.step().unwrap();
        assert_eq!(session.pc(), 1);
        session.step().unwrap();
        assert_eq!(session.pc(), 2);
    }

    #[test]
    fn continue_stops_at_an_enabled_breakpoint() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        session.add_breakpoint(3);
        session.start();
        session.continue_(None).unwrap();
        assert!(session.is_paused());
        assert_eq!(session.pc(), 3);
        assert_eq!(session.breakpoints()[0].hit_count, 1);
    }

    #[test]
    fn disabled_breakpoint_does_not_pause() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        session.add_breakpoint(3);
        session.toggle_breakpoint(3);
        session.start();
        session.continue_(None).unwrap();
        assert!(session.is_halted());
        assert!(!session.is_paused());
    }

    #[test]
    fn removing_a_breakpoint_lets_execution_run_through() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        session.add_breakpoint(3);
        session.remove_breakpoint(3);
        session.start();
        session.continue_(None).unwrap();
        assert!(session.is_halted());
    }

    #[test]
    fn continue_stops_once_max_steps_is_exceeded() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        session.start();
        session.continue_(Some(2)).unwrap();
        assert!(session.is_paused());
        assert!(!session.is_halted());
        assert_eq!(session.pc(), 2);
    }

    #[test]
    fn pause_handle_stops_a_continue_loop_from_a_step_subscriber() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        let handle = session.pause_handle();
        let mut steps_seen = 0;
        session.subscribe(move |event| {
            if matches!(event, DebugEvent::Step) {
                steps_seen += 1;
                if steps_seen == 2 {
                    handle.request();
                }
            }
        });
        session.start();
        session.continue_(None).unwrap();
        assert!(session.is_paused());
        assert!(!session.is_halted());
        assert_eq!(session.pc(), 2);
    }

    #[test]
    fn halting_leaves_pc_at_program_length() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        session.start();
        session.continue_(None).unwrap();
        assert!(session.is_halted());
        assert_eq!(session.pc(), 5);
        assert_eq!(session.snapshot().pc, 5);
    }

    #[test]
    fn conditional_breakpoint_stores_its_condition_but_still_breaks_unconditionally() {
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        session.add_conditional_breakpoint(3, "x > 10".to_string());
        session.start();
        session.continue_(None).unwrap();
        assert!(session.is_paused());
        assert_eq!(session.pc(), 3);
        assert_eq!(session.breakpoints()[0].condition.as_deref(), Some("x > 10"));
    }

    #[test]
    fn subscribers_observe_events_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        let sink = Rc::clone(&log);
        session.subscribe(move |event| sink.borrow_mut().push(event));
        session.start();
        session.step().unwrap();
        assert_eq!(log.borrow()[0], DebugEvent::Start);
        assert_eq!(log.borrow()[1], DebugEvent::Step);
    }

    #[test]
    fn export_produces_valid_json() {
        let session = Session::new(program(), HashMap::new(), VmLimits::default(), Vec::<String>::new());
        let json = session.export().unwrap();
        assert!(json.contains("\"pc\""));
    }
}
