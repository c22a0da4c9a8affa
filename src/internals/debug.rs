//! Stack/dictionary inspection (`.S`, `SHOW-STACK`/`HIDE-STACK`, `WORDS`, `SEE`) and the
//! `STEPPER`/`STEPPER-DEPTH`-driven single-step/trace facility the inner interpreter consults on
//! every cycle.
//!
//! Grounded on the reference target's `u_step`: 0 disables tracing, 1 traces (prints the stack and
//! the decoded cell before executing it) up to `STEPPER-DEPTH` levels of call nesting, -1
//! single-steps and blocks on a keypress between cycles.

use crate::internals::messages::DebugLevel;
use crate::kernel::{RET_START, STACK_START};
use crate::runtime::{
    ABORT, ADDRESS_MASK, BRANCH, BRANCH0, BREAK, BUILTIN_FLAG, CONSTANT, DEFINITION, DOBUILDS,
    DOCREATE, EXEC, EXIT, ForthRuntime, IMMEDIATE_FLAG, LITERAL, MARKER, STRLIT, VARIABLE,
};

impl ForthRuntime {
    /// `.s` ( -- ) prints the parameter stack, deepest item first, without consuming it.
    pub fn f_dot_s(&mut self) {
        print!("[ ");
        for i in (self.kernel.stack_ptr..STACK_START).rev() {
            print!("{} ", self.kernel.heap[i]);
        }
        print!("] ");
    }

    /// `show-stack` ( -- ) prints the stack after every line QUIT reads.
    pub fn f_show_stack(&mut self) {
        self.show_stack = true;
    }

    /// `hide-stack` ( -- ) stops that.
    pub fn f_hide_stack(&mut self) {
        self.show_stack = false;
    }

    /// `words` ( -- ) lists every word currently in the search chain, most recently defined first.
    pub fn f_words(&mut self) {
        let mut nfa = self.kernel.get(self.context_ptr);
        let mut count = 0;
        while nfa != 0 {
            let name_addr = self.kernel.get(nfa as usize) as usize;
            print!("{} ", self.kernel.string_get(name_addr));
            count += 1;
            if count % 8 == 0 {
                println!();
            }
            nfa = self.kernel.get(nfa as usize - 1);
        }
        println!();
    }

    /// `see` <name> ( -- ) decompiles a word: its thread for a colon definition, or a one-line
    /// description for anything else (builtin, variable, constant, CREATE/DOES>, marker).
    pub fn f_see(&mut self) {
        self.f_tick_p();
        if self.get_abort_flag() {
            return;
        }
        let cfa = self.kernel.pop() as usize;
        let nfa_raw = self.kernel.get(cfa - 1) as usize;
        let is_immediate = nfa_raw & IMMEDIATE_FLAG != 0;
        let name = self.kernel.string_get(nfa_raw & ADDRESS_MASK);
        let tag = self.kernel.get(cfa);

        if tag as usize & BUILTIN_FLAG != 0 {
            let index = tag as usize & ADDRESS_MASK;
            println!("builtin {name}: {}", self.kernel.get_builtin(index).doc);
            return;
        }

        match tag & ADDRESS_MASK as i64 {
            DEFINITION => {
                print!(": {name} ");
                let mut index = cfa + 1;
                loop {
                    let cell = self.kernel.get(index);
                    match cell {
                        LITERAL => {
                            print!("{} ", self.kernel.get(index + 1));
                            index += 2;
                        }
                        STRLIT => {
                            let s_addr = self.kernel.get(index + 1) as usize;
                            print!("\" {}\" ", self.kernel.string_get(s_addr));
                            index += 2;
                        }
                        BRANCH => {
                            print!("branch:{} ", self.kernel.get(index + 1));
                            index += 2;
                        }
                        BRANCH0 => {
                            print!("branch0:{} ", self.kernel.get(index + 1));
                            index += 2;
                        }
                        ABORT => {
                            print!("abort ");
                            index += 1;
                        }
                        BREAK => {
                            print!("exit ");
                            index += 1;
                        }
                        EXIT => {
                            print!(";");
                            if is_immediate {
                                println!(" immediate");
                            } else {
                                println!();
                            }
                            break;
                        }
                        EXEC => {
                            print!("exec ");
                            index += 1;
                        }
                        callee => {
                            let callee = callee as usize;
                            if callee & BUILTIN_FLAG != 0 {
                                let idx = callee & ADDRESS_MASK;
                                print!("{} ", self.kernel.get_builtin(idx).name);
                            } else {
                                let callee_nfa = self.kernel.get(callee - 1) as usize & ADDRESS_MASK;
                                print!("{} ", self.kernel.string_get(callee_nfa));
                            }
                            index += 1;
                        }
                    }
                }
            }
            VARIABLE => println!("variable {name} = {}", self.kernel.get(cfa + 1)),
            CONSTANT => println!("constant {name} = {}", self.kernel.get(cfa + 1)),
            DOCREATE => println!("create {name}, data = {}", self.kernel.get(cfa + 1)),
            DOBUILDS => println!("create/does> {name}, does-xt = {}", self.kernel.get(cfa + 1)),
            MARKER => println!("marker {name}"),
            other => self.msg.error("see", "unrecognized code field", Some(other)),
        }
    }

    /// `dbg` ( n -- ) sets the diagnostic verbosity level used by `Msg`.
    pub fn f_dbg(&mut self) {
        if self.kernel.stack_check(1, "dbg") {
            match self.kernel.pop() {
                0 => self.msg.set_level(DebugLevel::Error),
                1 => self.msg.set_level(DebugLevel::Warning),
                2 => self.msg.set_level(DebugLevel::Info),
                _ => self.msg.set_level(DebugLevel::Debug),
            }
        }
    }

    /// `debuglevel` ( -- ) prints the current verbosity level.
    pub fn f_debuglevel(&mut self) {
        println!("debug level is {:?}", self.msg.get_level());
    }

    /// Called by the inner interpreter before dispatching the cell at `pc`, at call-nesting depth
    /// `call_depth`. A no-op unless `STEPPER` is non-zero.
    pub fn u_step(&mut self, pc: usize, call_depth: usize) {
        let stepper_mode = self.kernel.get(self.stepper_ptr);
        let stepper_depth = self.kernel.get(self.step_depth_ptr) as usize;
        if stepper_mode == 0 || call_depth > stepper_depth {
            return;
        }
        let raw = self.kernel.get(pc) as usize;
        let is_builtin = raw & BUILTIN_FLAG != 0;
        let contents = raw & ADDRESS_MASK;

        for _ in 0..call_depth {
            print!(" ");
        }
        self.f_dot_s();

        match contents as i64 {
            VARIABLE | CONSTANT | DEFINITION => {
                let nfa = self.kernel.get(pc - 1) as usize & ADDRESS_MASK;
                println!(" {}", self.kernel.string_get(nfa));
            }
            LITERAL => println!(" {}", self.kernel.get(pc + 1)),
            STRLIT => {
                let s_addr = self.kernel.get(pc + 1) as usize;
                println!(" {}", self.kernel.string_get(s_addr));
            }
            BRANCH => println!(" branch:{}", self.kernel.get(pc + 1)),
            BRANCH0 => println!(" branch0:{}", self.kernel.get(pc + 1)),
            ABORT => println!(" abort"),
            EXIT => println!(" exit"),
            BREAK => println!(" break"),
            EXEC => println!(" -> exec"),
            _ => {
                if is_builtin {
                    println!(" {}", self.kernel.get_builtin(contents).name);
                } else {
                    let nfa = self.kernel.get(contents - 1) as usize & ADDRESS_MASK;
                    println!(" ->{}", self.kernel.string_get(nfa));
                }
            }
        }

        let mut response = 's';
        if stepper_mode == -1 {
            print!("step> ");
            self.f_flush();
            loop {
                self.f_key();
                response = self.kernel.pop() as u8 as char;
                if response != '\n' {
                    break;
                }
            }
        }
        match response {
            't' => self.kernel.set(self.stepper_ptr, 1),
            'i' => self.kernel.incr(self.step_depth_ptr, 1),
            'o' => self.kernel.decr(self.step_depth_ptr, 1),
            'c' => self.kernel.set(self.stepper_ptr, 0),
            'h' | '?' => {
                println!("stepper: 's' show, 't' trace, 'c' continue, 'i'/'o' depth in/out")
            }
            _ => {}
        }
    }

    /// Call-nesting depth for `u_step`, approximated from how far the return stack has grown.
    pub(crate) fn call_depth(&self) -> usize {
        RET_START - self.kernel.return_ptr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ForthRuntime;

    #[test]
    fn show_hide_stack_toggle() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.f_hide_stack();
        assert!(!rt.show_stack);
        rt.f_show_stack();
        assert!(rt.show_stack);
    }

    #[test]
    fn dbg_sets_level() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push(2);
        rt.f_dbg();
        assert_eq!(rt.msg.get_level(), DebugLevel::Info);
    }

    #[test]
    fn see_prints_a_colon_definition() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let addr = rt.kernel.string_new(": double dup + ;") + 1;
        rt.kernel.push(addr as i64);
        rt.kernel.push(17);
        rt.f_evaluate();

        let tib = rt.kernel.get(rt.tib_ptr) as usize;
        for (i, b) in b"double".iter().enumerate() {
            rt.kernel.byte_set(tib + i, *b);
        }
        rt.kernel.set(rt.tib_size_ptr, 6);
        rt.kernel.set(rt.tib_in_ptr, 0);
        rt.f_see();
        assert!(!rt.get_abort_flag());
    }

    #[test]
    fn u_step_is_a_no_op_when_stepper_is_off() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push(1);
        rt.kernel.push(2);
        rt.u_step(rt.here_ptr, 1);
        assert_eq!(rt.kernel.stack_len(), 2);
    }
}
