//! The text interpreter/compiler: `WORD`, `(parse)`, `TYPE`/`CR`/`SPACE(S)`, `ACCEPT`/`QUERY`,
//! `INTERPRET`/`EVALUATE`/`QUIT`, and the IMMEDIATE control-flow compiling words
//! (`IF`/`ELSE`/`THEN`, `BEGIN`/`UNTIL`/`AGAIN`/`WHILE`/`REPEAT`, `DO`/`LOOP`/`+LOOP`/`LEAVE`).
//!
//! `DO`/`LOOP`/`+LOOP` are grounded on `original_source/forth.c`'s `Fdo`/`Floop`/`Fplusloop`: the
//! loop index and limit live on the return stack (see `internals::primitives`'s `I`/`J`/`UNLOOP`),
//! and `LOOP`/`+LOOP` are compiled as a call to a low-level index-stepping primitive followed by a
//! `BRANCH0` back to the loop start — the same shape the reference target's threaded `(loop)` and
//! `(+loop)` words use, just expressed as two dispatch cells instead of two more THREAD entries.

use crate::kernel::BUF_SIZE;
use crate::runtime::{ForthRuntime, ControlMarker, BRANCH, BRANCH0, FALSE, LITERAL, TRUE};

impl ForthRuntime {
    /// `word` ( c -- addr ) parses the next token delimited by `c` out of the TIB, copies it into
    /// PAD as a counted string, and returns PAD's address. Advances `>IN` past the token and its
    /// trailing delimiter.
    pub fn f_word(&mut self) {
        if self.kernel.stack_check(1, "word") {
            let delim = self.kernel.pop();
            let tib_base = self.kernel.get(self.tib_ptr);
            let in_ptr = self.kernel.get(self.tib_in_ptr);
            let tib_len = self.kernel.get(self.tib_size_ptr);

            self.kernel.push(tib_base + in_ptr);
            self.kernel.push((tib_len - in_ptr).max(0));
            self.kernel.push(delim);
            self.f_parse_p();
            let delta = self.kernel.pop();
            let len = self.kernel.pop();
            let token_addr = self.kernel.pop();

            let pad = self.kernel.get(self.pad_ptr) as usize;
            self.kernel
                .string_copy((token_addr + delta) as usize, pad, len as usize, false);
            self.kernel.set(self.tib_in_ptr, in_ptr + delta + len + 1);
            self.kernel.push(pad as i64);
        }
    }

    /// `(parse)` ( addr len delim -- addr len delta ) scans a leading run of `delim` characters
    /// starting at `addr`, then the non-`delim` token that follows. `delta` is the offset from
    /// `addr` to the start of the token; the returned `len` is the token's length. Both are zero
    /// if the buffer holds nothing but delimiters (or is empty).
    pub fn f_parse_p(&mut self) {
        if self.kernel.stack_check(3, "(parse)") {
            let delim = self.kernel.pop() as u8;
            let buf_len = self.kernel.pop();
            let addr = self.kernel.pop();
            if buf_len <= 0 {
                self.kernel.push(addr);
                self.kernel.push(0);
                self.kernel.push(0);
                return;
            }
            let addr = addr as usize;
            let buf_len = buf_len as usize;
            let mut i = 0;
            while i < buf_len && self.kernel.byte_get(addr + i) == delim {
                i += 1;
            }
            let start = i;
            while i < buf_len && self.kernel.byte_get(addr + i) != delim {
                i += 1;
            }
            self.kernel.push(addr as i64);
            self.kernel.push((i - start) as i64);
            self.kernel.push(start as i64);
        }
    }

    /// `type` ( addr len -- ) prints a raw (uncounted) string.
    pub fn f_type(&mut self) {
        if self.kernel.stack_check(2, "type") {
            let len = self.kernel.pop() as usize;
            let addr = self.kernel.pop() as usize;
            print!("{}", self.kernel.string_slice(addr, len));
        }
    }

    pub fn f_cr(&mut self) {
        println!();
    }

    pub fn f_space(&mut self) {
        print!(" ");
    }

    /// `spaces` ( n -- ) prints n spaces; n <= 0 prints nothing.
    pub fn f_spaces(&mut self) {
        if self.kernel.stack_check(1, "spaces") {
            let n = self.kernel.pop();
            for _ in 0..n.max(0) {
                print!(" ");
            }
        }
    }

    /// `accept` ( addr len1 -- addr len2 ) reads a line from the active input source into the
    /// buffer at `addr`, truncated to `len1` bytes, returning the number of bytes actually read.
    pub fn f_accept(&mut self) {
        if self.kernel.stack_check(2, "accept") {
            let max_len = self.kernel.pop() as usize;
            let addr = self.kernel.pop() as usize;
            let line = self
                .reader
                .last_mut()
                .and_then(|r| r.get_line())
                .unwrap_or_default();
            let bytes = line.as_bytes();
            let len = bytes.len().min(max_len);
            for (i, b) in bytes[..len].iter().enumerate() {
                self.kernel.byte_set(addr + i, *b);
            }
            self.kernel.push(addr as i64);
            self.kernel.push(len as i64);
        }
    }

    /// `query` ( -- ) reads a line into the TIB and resets `>IN` to its start.
    pub fn f_query(&mut self) {
        let tib_base = self.kernel.get(self.tib_ptr);
        self.kernel.push(tib_base);
        self.kernel.push(BUF_SIZE as i64 - 1);
        self.f_accept();
        let len = self.kernel.pop();
        self.kernel.pop();
        self.kernel.set(self.tib_size_ptr, len);
        self.kernel.set(self.tib_in_ptr, 0);
    }

    /// `interpret` ( -- ) consumes tokens from the TIB one at a time until it's exhausted,
    /// dispatching each through `find`/`number?` and either compiling or executing it.
    pub fn f_interpret(&mut self) {
        loop {
            self.kernel.push(' ' as i64);
            self.f_word();
            let addr = self.kernel.pop() as usize;
            if self.kernel.string_length(addr) == 0 {
                break;
            }
            self.interpret_or_compile(addr);
            if self.get_abort_flag() {
                break;
            }
        }
    }

    /// Looks up one parsed token (a counted string at `addr`) and either runs it (interpreting,
    /// or it's IMMEDIATE) or compiles a call to it; failing that, tries to parse it as a number.
    fn interpret_or_compile(&mut self, addr: usize) {
        self.kernel.push(addr as i64);
        self.f_find();
        if self.kernel.pop() == TRUE {
            let cfa = self.kernel.pop() as usize;
            self.kernel.push(cfa as i64);
            self.f_immediate_q();
            let immediate = self.kernel.pop() == TRUE;
            if self.get_compile_mode() && !immediate {
                self.emit_cell(cfa as i64);
            } else {
                self.execute_xt(cfa);
            }
            return;
        }

        let name_addr = self.kernel.pop() as usize;
        let len = self.kernel.string_length(name_addr);
        self.kernel.push((name_addr + 1) as i64);
        self.kernel.push(len as i64);
        self.f_q_number();
        if self.kernel.pop() == TRUE {
            let n = self.kernel.pop();
            if self.get_compile_mode() {
                self.emit_cell(LITERAL);
                self.emit_cell(n);
            } else {
                self.kernel.push(n);
            }
        } else {
            self.kernel.pop();
            let word = self.kernel.string_get(name_addr);
            self.msg.warning("interpret", "word not recognized", Some(word));
            self.f_abort();
        }
    }

    /// `evaluate` ( addr len -- ) interprets a string as though it were the TIB, restoring the
    /// real TIB's cursors afterward.
    pub fn f_evaluate(&mut self) {
        if self.kernel.stack_check(2, "evaluate") {
            let len = self.kernel.pop();
            let addr = self.kernel.pop();
            let saved_tib = self.kernel.get(self.tib_ptr);
            let saved_size = self.kernel.get(self.tib_size_ptr);
            let saved_in = self.kernel.get(self.tib_in_ptr);

            self.kernel.set(self.tib_ptr, addr);
            self.kernel.set(self.tib_size_ptr, len);
            self.kernel.set(self.tib_in_ptr, 0);
            self.f_interpret();

            self.kernel.set(self.tib_ptr, saved_tib);
            self.kernel.set(self.tib_size_ptr, saved_size);
            self.kernel.set(self.tib_in_ptr, saved_in);
        }
    }

    /// `quit` ( -- ) the outer read-interpret loop: reads a line, interprets it, and prints the
    /// stack and a prompt, forever (until BYE or end of input).
    pub fn f_quit(&mut self) {
        self.f_abort();
        loop {
            if self.should_exit() {
                break;
            }
            self.set_abort_flag(false);
            self.f_query();
            self.f_interpret();
            if self.reader.len() == 1 {
                if self.show_stack {
                    self.f_dot_s();
                }
                print!(" ok ");
            }
            self.f_flush();
        }
    }

    /// Looks up a builtin already registered by name, for compiling a call to it from another
    /// compiling word (DO/LOOP/+LOOP compile calls to SWAP/>R/(LOOP)/(+LOOP)/UNLOOP this way,
    /// rather than needing their own dispatch tags).
    fn lookup_cfa(&mut self, name: &str) -> usize {
        let name_addr = self.kernel.string_new(name);
        let latest = self.kernel.get(self.context_ptr);
        self.search_from(latest, name_addr)
            .unwrap_or_else(|| panic!("internal word '{name}' missing from dictionary"))
    }

    fn emit_builtin_call(&mut self, name: &str) {
        let cfa = self.lookup_cfa(name);
        self.emit_cell(cfa as i64);
    }

    /// `if` ( flag -- ) compiles a conditional forward branch, taken when the flag is false.
    pub fn f_if(&mut self) {
        self.emit_cell(BRANCH0);
        let slot = self.here();
        self.emit_cell(0);
        self.control_stack.push(ControlMarker::If(slot));
    }

    /// `else` ( -- ) compiles the unconditional branch past the else-clause, and patches the
    /// pending IF to land here.
    pub fn f_else(&mut self) {
        match self.control_stack.pop() {
            Some(ControlMarker::If(slot)) => {
                self.emit_cell(BRANCH);
                let slot2 = self.here();
                self.emit_cell(0);
                self.kernel.set(slot, self.here() as i64);
                self.control_stack.push(ControlMarker::Else(slot2));
            }
            _ => self.unbalanced("else"),
        }
    }

    /// `then` ( -- ) resolves a pending IF or ELSE to land here.
    pub fn f_then(&mut self) {
        match self.control_stack.pop() {
            Some(ControlMarker::If(slot)) | Some(ControlMarker::Else(slot)) => {
                self.kernel.set(slot, self.here() as i64);
            }
            _ => self.unbalanced("then"),
        }
    }

    /// `begin` ( -- ) marks the address UNTIL, AGAIN, and REPEAT branch back to.
    pub fn f_begin(&mut self) {
        self.control_stack.push(ControlMarker::Begin(self.here()));
    }

    /// `until` ( flag -- ) branches back to BEGIN while the flag is false.
    pub fn f_until(&mut self) {
        match self.control_stack.pop() {
            Some(ControlMarker::Begin(target)) => {
                self.emit_cell(BRANCH0);
                self.emit_cell(target as i64);
            }
            _ => self.unbalanced("until"),
        }
    }

    /// `again` ( -- ) branches back to BEGIN unconditionally.
    pub fn f_again(&mut self) {
        match self.control_stack.pop() {
            Some(ControlMarker::Begin(target)) => {
                self.emit_cell(BRANCH);
                self.emit_cell(target as i64);
            }
            _ => self.unbalanced("again"),
        }
    }

    /// `while` ( flag -- ) compiles a forward branch out of the loop, taken when the flag is
    /// false; REPEAT patches it to the loop's exit.
    pub fn f_while(&mut self) {
        self.emit_cell(BRANCH0);
        let slot = self.here();
        self.emit_cell(0);
        self.control_stack.push(ControlMarker::While(slot));
    }

    /// `repeat` ( -- ) branches back to BEGIN and resolves the matching WHILE to land here.
    pub fn f_repeat(&mut self) {
        let while_slot = match self.control_stack.pop() {
            Some(ControlMarker::While(slot)) => slot,
            _ => return self.unbalanced("repeat"),
        };
        let begin_target = match self.control_stack.pop() {
            Some(ControlMarker::Begin(target)) => target,
            _ => return self.unbalanced("repeat"),
        };
        self.emit_cell(BRANCH);
        self.emit_cell(begin_target as i64);
        self.kernel.set(while_slot, self.here() as i64);
    }

    /// `do` ( limit start -- ) compiles the runtime transfer of limit/start onto the return stack
    /// (`SWAP >R >R`, exactly as a hand-written Forth definition of DO would) and marks the loop
    /// body's start for LOOP/+LOOP to branch back to.
    pub fn f_do(&mut self) {
        self.emit_builtin_call("swap");
        self.emit_builtin_call(">r");
        self.emit_builtin_call(">r");
        self.control_stack
            .push(ControlMarker::Do(self.here(), self.leave_stack.len()));
    }

    /// `loop` ( -- ) compiles a call to the index-by-one stepping primitive followed by a branch
    /// back to DO, and resolves any pending LEAVEs to the loop's exit.
    pub fn f_loop(&mut self) {
        self.emit_builtin_call("(loop)");
        self.finish_do_loop("loop");
    }

    /// `+loop` ( n -- ) as LOOP, but steps the index by a compile-time-unknown amount.
    pub fn f_plus_loop(&mut self) {
        self.emit_builtin_call("(+loop)");
        self.finish_do_loop("+loop");
    }

    fn finish_do_loop(&mut self, caller: &str) {
        let (start, leave_mark) = match self.control_stack.pop() {
            Some(ControlMarker::Do(addr, mark)) => (addr, mark),
            other => {
                if let Some(marker) = other {
                    self.control_stack.push(marker);
                }
                return self.unbalanced(caller);
            }
        };
        self.emit_cell(BRANCH0);
        self.emit_cell(start as i64);
        let exit = self.here() as i64;
        for slot in self.leave_stack.drain(leave_mark..) {
            self.kernel.set(slot, exit);
        }
    }

    /// `leave` ( -- ) drops the loop-control pair and branches to the loop's exit, resolved when
    /// the matching LOOP/+LOOP is compiled. Recorded on its own `leave_stack`, not `control_stack`,
    /// so a LEAVE compiled inside a still-open IF/WHILE/etc. (e.g. `… IF LEAVE THEN …` inside a
    /// DO…LOOP) can't be popped by that construct's own THEN/REPEAT/UNTIL.
    pub fn f_leave(&mut self) {
        self.emit_builtin_call("unloop");
        self.emit_cell(BRANCH);
        let slot = self.here();
        self.emit_cell(0);
        self.leave_stack.push(slot);
    }

    fn unbalanced(&mut self, caller: &str) {
        self.msg
            .error(caller, "unbalanced control structure", None::<bool>);
        self.f_abort();
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{ForthRuntime, FALSE, TRUE};

    #[test]
    fn word_parses_token_and_advances_in() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let tib = rt.kernel.get(rt.tib_ptr) as usize;
        let text = "dup swap";
        for (i, b) in text.as_bytes().iter().enumerate() {
            rt.kernel.byte_set(tib + i, *b);
        }
        rt.kernel.set(rt.tib_size_ptr, text.len() as i64);
        rt.kernel.set(rt.tib_in_ptr, 0);

        rt.kernel.push(' ' as i64);
        rt.f_word();
        let addr = rt.kernel.pop() as usize;
        assert_eq!(rt.kernel.string_get(addr), "dup");

        rt.kernel.push(' ' as i64);
        rt.f_word();
        let addr2 = rt.kernel.pop() as usize;
        assert_eq!(rt.kernel.string_get(addr2), "swap");
    }

    #[test]
    fn parse_p_skips_leading_delimiters() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let base = 2000;
        for (i, b) in b"   hi".iter().enumerate() {
            rt.kernel.byte_set(base + i, *b);
        }
        rt.kernel.push(base as i64);
        rt.kernel.push(5);
        rt.kernel.push(' ' as i64);
        rt.f_parse_p();
        let delta = rt.kernel.pop();
        let len = rt.kernel.pop();
        let addr = rt.kernel.pop();
        assert_eq!(delta, 3);
        assert_eq!(len, 2);
        assert_eq!(rt.kernel.string_slice((addr + delta) as usize, len as usize), "hi");
    }

    #[test]
    fn evaluate_leaves_result_on_stack() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let addr = rt.kernel.string_new("3 4 +") + 1; // skip the count byte; evaluate wants raw text
        rt.kernel.push(addr as i64);
        rt.kernel.push(5);
        rt.f_evaluate();
        assert_eq!(rt.kernel.pop(), 7);
    }

    #[test]
    fn interpret_compiles_a_colon_definition() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let addr = rt.kernel.string_new(": double dup + ;") + 1;
        rt.kernel.push(addr as i64);
        rt.kernel.push(16);
        rt.f_evaluate();
        assert!(!rt.get_compile_mode());

        let addr2 = rt.kernel.string_new("double");
        rt.kernel.push(addr2 as i64);
        rt.f_find();
        assert_eq!(rt.kernel.pop(), TRUE);
        let cfa = rt.kernel.pop() as usize;
        rt.kernel.push(21);
        rt.run_thread(cfa);
        assert_eq!(rt.kernel.pop(), 42);
    }

    #[test]
    fn if_else_then_compiles_both_branches() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let addr = rt.kernel.string_new(": pick-one if 1 else 2 then ;") + 1;
        rt.kernel.push(addr as i64);
        rt.kernel.push(30);
        rt.f_evaluate();

        let name = rt.kernel.string_new("pick-one");
        rt.kernel.push(name as i64);
        rt.f_find();
        rt.kernel.pop();
        let cfa = rt.kernel.pop() as usize;

        rt.kernel.push(TRUE);
        rt.run_thread(cfa);
        assert_eq!(rt.kernel.pop(), 1);

        rt.kernel.push(FALSE);
        rt.run_thread(cfa);
        assert_eq!(rt.kernel.pop(), 2);
    }

    #[test]
    fn do_loop_sums_an_index_range() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let addr = rt.kernel.string_new(": sum-to 0 swap 0 do i + loop ;") + 1;
        rt.kernel.push(addr as i64);
        rt.kernel.push(31);
        rt.f_evaluate();

        let name = rt.kernel.string_new("sum-to");
        rt.kernel.push(name as i64);
        rt.f_find();
        rt.kernel.pop();
        let cfa = rt.kernel.pop() as usize;

        rt.kernel.push(5); // 0 + 1 + 2 + 3 + 4
        rt.run_thread(cfa);
        assert_eq!(rt.kernel.pop(), 10);
    }

    #[test]
    fn leave_exits_a_do_loop_early() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        // LEAVE nested inside a still-open IF, the ordinary idiom: compiling this must not
        // confuse the LEAVE's pending branch patch with the IF's own control-stack marker.
        let src = ": stop-early 0 10 0 do i 3 = if leave then 1+ loop ;";
        let addr = rt.kernel.string_new(src) + 1;
        rt.kernel.push(addr as i64);
        rt.kernel.push(src.len() as i64);
        rt.f_evaluate();
        assert!(!rt.get_abort_flag(), "compiling IF/LEAVE/THEN inside DO...LOOP should not abort");

        let name = rt.kernel.string_new("stop-early");
        rt.kernel.push(name as i64);
        rt.f_find();
        rt.kernel.pop();
        let cfa = rt.kernel.pop() as usize;

        rt.run_thread(cfa);
        assert_eq!(rt.kernel.pop(), 3);
    }
}
