//! Dictionary search and the defining words: `:` / `;`, `CREATE` / `DOES>`, `VARIABLE` /
//! `CONSTANT`, `IMMEDIATE`, `HIDE` / `REVEAL`, `MARKER`, `RECURSE`, and `FIND`.
//!
//! Grounded on `original_source/forth.c`'s `THREAD(create)`/`THREAD(does)`/`THREAD(xdoes)`/
//! `THREAD(hide)`/`THREAD(reveal)`/`THREAD(colon)`/`THREAD(semicolon)`/`THREAD(marker)` — the
//! two-cell CREATE code field and the DOES> patch-and-exit trick come directly from there, though
//! DOES>'s run-time half is expressed as a single dispatch tag (`DOES_PATCH`) here rather than the
//! reference target's headless-word indirection, since this VM's threads are just cells in the
//! same flat heap `inner.rs` can jump into directly.

use crate::runtime::{
    ForthRuntime, ADDRESS_MASK, BUILTIN_FLAG, CONSTANT, DEFINITION, DOBUILDS, DOCREATE,
    DOES_PATCH, EXIT, FALSE, IMMEDIATE_FLAG, MARKER, TRUE, VARIABLE,
};

impl ForthRuntime {
    /// Reads the nfa chain starting at `start`, looking for `name` (a counted string at
    /// `name_addr`). Returns the matching word's cfa. `pub(crate)` so `internals::compiler` can
    /// resolve a builtin's cfa while compiling DO/LOOP without going through the stack-based
    /// `find` word.
    ///
    /// A word currently being defined is kept out of this chain entirely by `f_hide` unlinking
    /// it from `CONTEXT` (see below), not by a per-word flag — `start` is always a chain that
    /// already excludes whatever's hidden.
    pub(crate) fn search_from(&self, start: i64, name_addr: usize) -> Option<usize> {
        let mut nfa = start;
        while nfa != 0 {
            let cfa = nfa as usize + 1;
            let candidate_name = self.kernel.get(nfa as usize) as usize;
            if self.kernel.string_equal(name_addr, candidate_name) {
                return Some(cfa);
            }
            nfa = self.kernel.get(nfa as usize - 1);
        }
        None
    }

    /// `find` ( addr -- xt T | addr F ) searches the dictionary for the counted string at `addr`.
    pub fn f_find(&mut self) {
        if self.kernel.stack_check(1, "find") {
            let name_addr = self.kernel.pop() as usize;
            let latest = self.kernel.get(self.context_ptr);
            match self.search_from(latest, name_addr) {
                Some(cfa) => {
                    self.kernel.push(cfa as i64);
                    self.kernel.push(TRUE);
                }
                None => {
                    self.kernel.push(name_addr as i64);
                    self.kernel.push(FALSE);
                }
            }
        }
    }

    /// `?unique` ( addr -- flag ) true if no word in the dictionary already has this name.
    pub fn f_q_unique(&mut self) {
        if self.kernel.stack_check(1, "?unique") {
            let name_addr = self.kernel.pop() as usize;
            let latest = self.kernel.get(self.context_ptr);
            let found = self.search_from(latest, name_addr).is_some();
            self.kernel.push(if found { FALSE } else { TRUE });
        }
    }

    /// `(')` <name> ( -- xt ) parses the next token from the input and looks it up, aborting on
    /// failure rather than returning a flag — used where a name is mandatory, e.g. after `'`.
    pub fn f_tick_p(&mut self) {
        self.kernel.push(' ' as i64);
        self.f_word();
        self.f_find();
        let found = self.kernel.pop();
        if found == FALSE {
            let addr = self.kernel.pop() as usize;
            let name = self.kernel.string_get(addr);
            self.msg.error("(')", "word not found", Some(name));
            self.f_abort();
        }
    }

    /// `immediate` ( -- ) flags the most recently defined word so the compiler executes it
    /// immediately when encountered, instead of compiling a call to it.
    pub fn f_immediate(&mut self) {
        let nfa = self.kernel.get(self.last_ptr) as usize;
        let cfa = nfa + 1;
        let tag = self.kernel.get(cfa);
        self.kernel.set(cfa, tag | IMMEDIATE_FLAG as i64);
    }

    /// `immed?` ( cfa -- flag )
    pub fn f_immediate_q(&mut self) {
        if self.kernel.stack_check(1, "immed?") {
            let cfa = self.kernel.pop() as usize;
            let tag = self.kernel.get(cfa);
            self.kernel.push(if tag & IMMEDIATE_FLAG as i64 != 0 { TRUE } else { FALSE });
        }
    }

    /// `hide` ( -- ) removes LATEST from the search chain, without touching LAST. Used by `:` so
    /// a word being compiled can't accidentally resolve to itself by name (RECURSE exists for
    /// that).
    pub fn f_hide(&mut self) {
        let nfa = self.kernel.get(self.last_ptr) as usize;
        let link = self.kernel.get(nfa - 1);
        self.kernel.set(self.context_ptr, link);
    }

    /// `reveal` ( -- ) restores LATEST to the head of the search chain. Used by `;`.
    pub fn f_reveal(&mut self) {
        let nfa = self.kernel.get(self.last_ptr);
        self.kernel.set(self.context_ptr, nfa);
    }

    /// `:` <name> ( -- ) opens a new definition and enters compile mode.
    pub fn f_colon(&mut self) {
        self.kernel.push(' ' as i64);
        self.f_word();
        let addr = self.kernel.pop() as usize;
        let name = self.kernel.string_get(addr);
        self.make_word(&name, &[DEFINITION]);
        self.f_hide();
        self.set_compile_mode(true);
    }

    /// `;` ( -- ) closes the current definition.
    pub fn f_semicolon(&mut self) {
        self.emit_cell(EXIT);
        self.f_reveal();
        self.set_compile_mode(false);
    }

    /// `recurse` ( -- ) compiles a call to the word currently being defined.
    pub fn f_recurse(&mut self) {
        let nfa = self.kernel.get(self.last_ptr);
        self.emit_cell(nfa + 1); // cfa of the word being defined
    }

    /// `create` <name> ( -- ) makes a header whose code field is `[DOCREATE][0]`: running the
    /// word pushes the address of its data area (cfa + 2). The reserved second cell is later
    /// overwritten by DOES>.
    pub fn f_create(&mut self) {
        self.kernel.push(' ' as i64);
        self.f_word();
        let addr = self.kernel.pop() as usize;
        let name = self.kernel.string_get(addr);
        self.make_word(&name, &[DOCREATE, 0]);
    }

    /// `does>` ( -- ) compile-time action: compiles a `DOES_PATCH` cell into the definition
    /// currently being compiled. At run time, reaching that cell patches LATEST to dispatch
    /// through the code that follows (see `inner.rs`'s handling of `DOES_PATCH`) and returns
    /// immediately, so the rest of the defining word's thread never runs as part of the defining
    /// word itself — only later, as the does-action of whatever CREATE built.
    pub fn f_does(&mut self) {
        self.emit_cell(DOES_PATCH);
    }

    /// Performs the DOES> patch: called by the inner interpreter when it dispatches a
    /// `DOES_PATCH` cell, with `does_xt` already advanced past that cell (the does-action start).
    pub fn attach_does(&mut self, does_xt: usize) {
        let nfa = self.kernel.get(self.last_ptr) as usize;
        let cfa = nfa + 1;
        self.kernel.set(cfa, DOBUILDS);
        self.kernel.set(cfa + 1, does_xt as i64);
    }

    /// `variable` <name> ( -- ) creates a one-cell variable initialized to zero.
    pub fn f_variable(&mut self) {
        self.kernel.push(' ' as i64);
        self.f_word();
        let addr = self.kernel.pop() as usize;
        let name = self.kernel.string_get(addr);
        self.make_word(&name, &[VARIABLE, 0]);
    }

    /// `constant` <name> ( n -- ) creates a constant holding the value popped off the stack.
    pub fn f_constant(&mut self) {
        if self.kernel.stack_check(1, "constant") {
            let val = self.kernel.pop();
            self.kernel.push(' ' as i64);
            self.f_word();
            let addr = self.kernel.pop() as usize;
            let name = self.kernel.string_get(addr);
            self.make_word(&name, &[CONSTANT, val]);
        }
    }

    /// `,` ( n -- ) compiles a cell at HERE.
    pub fn f_comma(&mut self) {
        if self.kernel.stack_check(1, ",") {
            let val = self.kernel.pop();
            self.emit_cell(val);
        }
    }

    /// `s-move` ( src len dest -- ) copies `len` raw bytes from `src` to `dest`, writing a fresh
    /// count byte at `dest` — used by CREATE/WORD to relocate a parsed token.
    pub fn f_smove(&mut self) {
        if self.kernel.stack_check(3, "s-move") {
            let dest = self.kernel.pop() as usize;
            let len = self.kernel.pop() as usize;
            let src = self.kernel.pop() as usize;
            self.kernel.string_copy(src, dest, len, false);
        }
    }

    /// `marker` <name> ( -- ) creates a word that, when executed, truncates the dictionary and
    /// string space back to this point — wiping every word (and string) defined afterward.
    pub fn f_marker(&mut self) {
        let here = self.here() as i64;
        let latest = self.kernel.get(self.context_ptr);
        let string_ptr = self.kernel.get_string_ptr() as i64;
        self.kernel.push(' ' as i64);
        self.f_word();
        let addr = self.kernel.pop() as usize;
        let name = self.kernel.string_get(addr);
        self.make_word(&name, &[MARKER, here, latest, string_ptr]);
    }

    /// Restores the dictionary/string-space snapshot captured by `MARKER`. Called by the inner
    /// interpreter when it dispatches a `MARKER`-tagged word.
    pub fn restore_marker(&mut self, here: i64, latest: i64, string_ptr: i64) {
        self.kernel.set(self.here_ptr, here);
        self.kernel.set(self.context_ptr, latest);
        self.kernel.set(self.last_ptr, latest);
        self.kernel.set_string_ptr(string_ptr as usize);
    }

    /// `execute` ( xt -- ) runs the word whose cfa is on the stack, the same way the inner
    /// interpreter would dispatch it inline.
    pub fn f_execute(&mut self) {
        if self.kernel.stack_check(1, "execute") {
            let xt = self.kernel.pop() as usize;
            self.execute_xt(xt);
        }
    }

    /// Dispatches a single word by cfa: builtins run directly; everything else (DEFINITION,
    /// VARIABLE, CONSTANT, DOCREATE, DOBUILDS) is handed to the inner interpreter's thread runner.
    pub fn execute_xt(&mut self, cfa: usize) {
        let raw = self.kernel.get(cfa);
        if raw as usize & BUILTIN_FLAG != 0 {
            let index = raw & ADDRESS_MASK as i64;
            let f = self.kernel.get_builtin(index as usize).code;
            f(self);
            return;
        }
        self.run_thread(cfa);
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{ForthRuntime, BUILTIN_FLAG, CONSTANT, DOBUILDS, DOCREATE, FALSE, TRUE, VARIABLE};

    #[test]
    fn create_word_has_docreate_header() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let cfa = rt.make_word("thing", &[DOCREATE, 0]);
        assert_eq!(rt.kernel.get(cfa), DOCREATE);
    }

    #[test]
    fn find_locates_a_builtin() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let name = rt.kernel.string_new("dup");
        rt.kernel.push(name as i64);
        rt.f_find();
        assert_eq!(rt.kernel.pop(), TRUE);
        let cfa = rt.kernel.pop() as usize;
        assert_eq!(rt.kernel.get(cfa) & (BUILTIN_FLAG as i64), BUILTIN_FLAG as i64);
    }

    #[test]
    fn find_reports_failure_for_unknown_word() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let name = rt.kernel.string_new("no-such-word");
        rt.kernel.push(name as i64);
        rt.f_find();
        assert_eq!(rt.kernel.pop(), FALSE);
    }

    #[test]
    fn immediate_flags_latest_word() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let cfa = rt.make_word("my-word", &[VARIABLE, 0]);
        rt.f_immediate();
        rt.kernel.push(cfa as i64);
        rt.f_immediate_q();
        assert_eq!(rt.kernel.pop(), TRUE);
    }

    #[test]
    fn hide_removes_then_reveal_restores_search_visibility() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.make_word("temp-word", &[VARIABLE, 0]);
        rt.f_hide();
        let name = rt.kernel.string_new("temp-word");
        rt.kernel.push(name as i64);
        rt.f_find();
        assert_eq!(rt.kernel.pop(), FALSE);
        rt.kernel.pop();

        rt.f_reveal();
        let name2 = rt.kernel.string_new("temp-word");
        rt.kernel.push(name2 as i64);
        rt.f_find();
        assert_eq!(rt.kernel.pop(), TRUE);
    }

    #[test]
    fn create_then_does_patches_to_dobuilds() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.make_word("thing", &[DOCREATE, 0]);
        let does_xt = rt.here();
        rt.attach_does(does_xt);
        let nfa = rt.kernel.get(rt.last_ptr) as usize;
        let cfa = nfa + 1;
        assert_eq!(rt.kernel.get(cfa), DOBUILDS);
        assert_eq!(rt.kernel.get(cfa + 1), does_xt as i64);
    }

    #[test]
    fn marker_round_trip_restores_here() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let here_before = rt.here() as i64;
        let latest_before = rt.kernel.get(rt.context_ptr);
        let str_before = rt.kernel.get_string_ptr() as i64;
        rt.make_word("scratch", &[CONSTANT, 1]);
        assert!(rt.here() as i64 > here_before);
        rt.restore_marker(here_before, latest_before, str_before);
        assert_eq!(rt.here() as i64, here_before);
        assert_eq!(rt.kernel.get(rt.context_ptr), latest_before);
    }
}
