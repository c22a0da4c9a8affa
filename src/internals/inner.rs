//! The inner interpreter: walks a compiled thread one cell at a time, the direct-threaded
//! execution engine every colon definition ultimately runs on.
//!
//! A thread cell is either the cfa of a word to call (a plain dictionary address, always below
//! the dispatch-tag constants) or one of the pseudo-ops `LITERAL`/`STRLIT`/`BRANCH`/`BRANCH0`/
//! `EXIT`/`ABORT`/`BREAK`/`EXEC`/`DOES_PATCH` compiled directly into the thread by the compiler.
//! Calling a word means inspecting the tag stored at its cfa (DEFINITION/VARIABLE/CONSTANT/
//! DOCREATE/DOBUILDS/MARKER, or a builtin) and acting accordingly — this is the whole of what the
//! original target's `Finner` does, minus its headless-word indirection, which this flat heap
//! doesn't need.

use crate::runtime::{
    ForthRuntime, ABORT, ADDRESS_MASK, BRANCH, BRANCH0, BREAK, BUILTIN_FLAG, CONSTANT, DEFINITION,
    DOBUILDS, DOCREATE, DOES_PATCH, EXEC, EXIT, FALSE, LITERAL, MARKER, STRLIT, VARIABLE,
};

/// Pushed onto the return stack by a top-level call (one not nested inside an already-running
/// thread); an EXIT that pops this means the whole call has unwound and the inner loop should
/// stop. No legitimate heap address is negative, so it can't collide with a real resume address.
/// `TOP_LEVEL as i64` is bit-identical to this, which is what makes `call_word` work unmodified
/// whether it's invoked from the top or from a nested `step`.
const SENTINEL: i64 = -1;
const TOP_LEVEL: usize = usize::MAX;

impl ForthRuntime {
    fn r_push(&mut self, value: i64) {
        self.kernel.return_ptr -= 1;
        self.kernel.heap[self.kernel.return_ptr] = value;
    }

    fn r_pop(&mut self) -> i64 {
        let value = self.kernel.heap[self.kernel.return_ptr];
        self.kernel.return_ptr += 1;
        value
    }

    /// Calls the word at `cfa` as a top-level operation (not nested inside an already-running
    /// thread) and runs it to completion. Used by `EXECUTE`, by the outer interpreter to run a
    /// found word, and by tests exercising a single word in isolation.
    pub fn run_thread(&mut self, cfa: usize) {
        let mut ip = self.call_word(cfa, TOP_LEVEL);
        if ip == TOP_LEVEL {
            // a leaf op (builtin, VARIABLE, CONSTANT, DOCREATE, MARKER) already ran to completion
            return;
        }
        loop {
            match self.step(ip) {
                Some(next_ip) => ip = next_ip,
                None => break,
            }
        }
    }

    /// Executes one thread cell at `ip`, returning the next `ip` to execute, or `None` once the
    /// sentinel pushed by `run_thread` has been popped back off the return stack.
    fn step(&mut self, ip: usize) -> Option<usize> {
        self.u_step(ip, self.call_depth());
        let cell = self.kernel.get(ip);
        if cell >= LITERAL {
            return self.step_pseudo_op(cell, ip);
        }
        let cfa = cell as usize;
        Some(self.call_word(cfa, ip + 1))
    }

    fn step_pseudo_op(&mut self, cell: i64, ip: usize) -> Option<usize> {
        match cell {
            LITERAL => {
                self.kernel.push(self.kernel.get(ip + 1));
                Some(ip + 2)
            }
            STRLIT => {
                let addr = self.kernel.get(ip + 1);
                let len = self.kernel.get(ip + 2);
                self.kernel.push(addr);
                self.kernel.push(len);
                Some(ip + 3)
            }
            BRANCH => {
                let target = self.kernel.get(ip + 1) as usize;
                Some(target)
            }
            BRANCH0 => {
                let target = self.kernel.get(ip + 1) as usize;
                let flag = self.kernel.pop();
                if flag == FALSE {
                    Some(target)
                } else {
                    Some(ip + 2)
                }
            }
            EXIT => {
                let ret = self.r_pop();
                if ret == SENTINEL {
                    None
                } else {
                    Some(ret as usize)
                }
            }
            ABORT => {
                self.f_abort();
                None
            }
            BREAK => None,
            EXEC => {
                let xt = self.kernel.pop() as usize;
                Some(self.call_word(xt, ip + 1))
            }
            DOES_PATCH => {
                let does_xt = ip + 1;
                self.attach_does(does_xt);
                let ret = self.r_pop();
                if ret == SENTINEL {
                    None
                } else {
                    Some(ret as usize)
                }
            }
            other => {
                self.msg
                    .error("inner", "unrecognized dispatch tag", Some(other));
                self.f_abort();
                None
            }
        }
    }

    /// Calls the word whose cfa is `cfa`, returning the ip execution should resume at.
    /// `return_ip` is where the *caller's* thread should pick back up once this call completes
    /// (pushed onto the return stack only for calls that open a nested thread).
    fn call_word(&mut self, cfa: usize, return_ip: usize) -> usize {
        let raw = self.kernel.get(cfa);
        if raw as usize & BUILTIN_FLAG != 0 {
            let index = raw & ADDRESS_MASK as i64;
            let f = self.kernel.get_builtin(index as usize).code;
            f(self);
            return return_ip;
        }
        match raw & ADDRESS_MASK as i64 {
            DEFINITION => {
                self.r_push(return_ip as i64);
                cfa + 1
            }
            VARIABLE => {
                self.kernel.push(cfa as i64 + 1);
                return_ip
            }
            CONSTANT => {
                self.kernel.push(self.kernel.get(cfa + 1));
                return_ip
            }
            DOCREATE => {
                self.kernel.push(cfa as i64 + 2);
                return_ip
            }
            DOBUILDS => {
                self.kernel.push(cfa as i64 + 2);
                let does_xt = self.kernel.get(cfa + 1) as usize;
                self.r_push(return_ip as i64);
                does_xt
            }
            MARKER => {
                let here = self.kernel.get(cfa + 1);
                let latest = self.kernel.get(cfa + 2);
                let string_ptr = self.kernel.get(cfa + 3);
                self.restore_marker(here, latest, string_ptr);
                return_ip
            }
            other => {
                self.msg
                    .error("inner", "word has unrecognized code field", Some(other));
                self.f_abort();
                return_ip
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{ForthRuntime, CONSTANT, DEFINITION, DOCREATE, DOES_PATCH, EXIT, LITERAL};

    #[test]
    fn colon_word_runs_literal_then_exits() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let cfa = rt.make_word("fortytwo", &[DEFINITION]);
        rt.emit_cell(LITERAL);
        rt.emit_cell(42);
        rt.emit_cell(EXIT);
        rt.run_thread(cfa);
        assert_eq!(rt.kernel.pop(), 42);
    }

    #[test]
    fn constant_word_pushes_its_value() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let cfa = rt.make_word("answer", &[CONSTANT, 99]);
        rt.run_thread(cfa);
        assert_eq!(rt.kernel.pop(), 99);
    }

    #[test]
    fn nested_call_returns_to_caller() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let inner_cfa = rt.make_word("inner-word", &[DEFINITION]);
        rt.emit_cell(LITERAL);
        rt.emit_cell(7);
        rt.emit_cell(EXIT);

        let outer_cfa = rt.make_word("outer-word", &[DEFINITION]);
        rt.emit_cell(inner_cfa as i64);
        rt.emit_cell(LITERAL);
        rt.emit_cell(8);
        rt.emit_cell(EXIT);

        rt.run_thread(outer_cfa);
        assert_eq!(rt.kernel.pop(), 8);
        assert_eq!(rt.kernel.pop(), 7);
    }

    #[test]
    fn does_patch_runs_does_action_on_created_word() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        // emulates `create thing 5 ,` then attaching a hand-built DOES> action (@ 1+ ;) onto
        // thing — the text-level `does>` compiling path is exercised in internals::compiler.
        let thing_cfa = rt.make_word("thing", &[DOCREATE, 0]);
        rt.kernel.set(thing_cfa + 1, 5);

        let builder_cfa = rt.make_word("builder", &[DEFINITION]);
        rt.emit_cell(DOES_PATCH);
        let one_plus_name = rt.kernel.string_new("1+");
        rt.kernel.push(one_plus_name as i64);
        rt.f_find();
        rt.kernel.pop();
        let one_plus_cfa = rt.kernel.pop();
        rt.emit_cell(one_plus_cfa);
        rt.emit_cell(EXIT);

        rt.kernel.set(rt.last_ptr, (thing_cfa - 1) as i64);
        rt.run_thread(builder_cfa);

        rt.run_thread(thing_cfa);
        assert_eq!(rt.kernel.pop(), 6);
    }
}
