//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// Forth Runtime Engine
///
/// Defines `ForthRuntime`, which owns the `Kernel` data space plus every user-variable cursor
/// (HERE, CONTEXT, BASE, the TIB cursors, ...), the compile-time control stack, the nested file
/// reader stack, and the host-side bits (debug messages, a timer, the raw-mode terminal).
///
/// `cold_start` brings the whole thing up: install the user variables, register the native
/// (builtin) words, then hand control to the outer interpreter.

use crate::kernel::{Kernel, WORD_START, BUF_SIZE};
use crate::internals::builtin::BuiltInFn;
use crate::internals::messages::Msg;
use crate::internals::files::{FileHandle, FileMode};
use std::time::Instant;
use crate::internals::terminal;

// STRING AREA constants — layout of the byte-addressed string space (`Kernel::strings`).
pub const TIB_START: usize = 0; // Text input buffer, used by readers
pub const PAD_START: usize = TIB_START + BUF_SIZE; // Scratchpad buffer, used by WORD and friends
pub const TMP_START: usize = PAD_START + BUF_SIZE; // Temporary buffer, used for string primitives
pub const HOLD_START: usize = TMP_START + BUF_SIZE; // Pictured numeric output buffer
pub const HOLD_SIZE: usize = 34; // matches the reference target's HOLDSIZE
pub const STR_START: usize = HOLD_START + HOLD_SIZE; // Free space for additional strings

// Indices into builtins, and tags distinguishing code-field kinds, used by the inner interpreter
// to decide how to dispatch a cell: a tagged constant rather than a real address, since real
// dictionary/builtin addresses never reach these values.
pub const BUILTIN: i64 = 100000;
pub const VARIABLE: i64 = 100001;
pub const CONSTANT: i64 = 100002;
pub const LITERAL: i64 = 100003;
pub const STRLIT: i64 = 100004;
pub const DEFINITION: i64 = 100005; // a colon-defined Forth word
pub const BRANCH: i64 = 100006;
pub const BRANCH0: i64 = 100007;
pub const ABORT: i64 = 100008; // break and reset
pub const EXIT: i64 = 100009; // returns from a word
pub const BREAK: i64 = 100010; // breaks out of a word (used by stepper)
pub const EXEC: i64 = 100011; // calls the word with address on the stack
pub const DOCREATE: i64 = 100012; // cfa tag for a word made by CREATE, not yet given a DOES> action
pub const DOBUILDS: i64 = 100013; // cfa tag for a word whose DOES> action lives in the next cell
pub const DOES_PATCH: i64 = 100014; // compiled by DOES>; patches LATEST and exits the defining word
pub const MARKER: i64 = 100015; // cfa tag for a word made by MARKER; restores a dictionary snapshot

// GENERAL constants
pub const TRUE: i64 = -1; // Forth convention for true and false
pub const FALSE: i64 = 0;
pub const IMMEDIATE_FLAG: usize = 0x4000_0000_0000_0000; // the immediate flag bit
pub const BUILTIN_FLAG: usize = 0x2000_0000_0000_0000; // the builtin flag bit
pub const ADDRESS_MASK: usize = 0x00FF_FFFF_FFFF_FFFF; // to strip the flag bits back off an address

/// Compile-time-only control-flow bookkeeping. Never visible to running Forth code — just a Rust
/// `Vec` the compiler pushes to and pops from while laying down IF/ELSE/THEN, loops, and DO-LOOPs.
#[derive(Debug)]
pub enum ControlMarker {
    If(usize),    // address of an unresolved BRANCH0 operand, patched at ELSE or THEN
    Else(usize),  // address of an unresolved BRANCH operand, patched at THEN
    Begin(usize), // address to branch back to: UNTIL, AGAIN, and REPEAT all target this
    While(usize), // address of an unresolved BRANCH0 operand, patched at REPEAT
    Do(usize, usize), // address of the first cell of a DO ... LOOP body, and leave_stack's depth
                      // when this DO opened, so LOOP/+LOOP only drains this loop's own LEAVEs
}

pub struct ForthRuntime {
    pub kernel: Kernel,                    // the data space, stacks, and string space
    pub control_stack: Vec<ControlMarker>, // compile-time control-flow frames
    pub leave_stack: Vec<usize>,           // pending LEAVE patch addresses, separate from control_stack
                                            // so a LEAVE compiled inside an open IF/WHILE/etc. can't be
                                            // mistaken for that construct's own marker
    pub here_ptr: usize,                   // first free cell at top of dictionary
    pub context_ptr: usize,                // nfa of most recently searched vocabulary head
    pub base_ptr: usize,                   // numeric I/O radix
    pub pad_ptr: usize,                    // string buffer for the parser
    pub tmp_ptr: usize,                    // temporary string buffer
    pub last_ptr: usize,                   // nfa of the word currently being defined
    pub hld_ptr: usize,                    // cursor into the pictured-output hold area
    pub state_ptr: usize,                  // 0 = interpreting, -1 = compiling
    pub abort_ptr: usize,                  // true if ABORT has been called
    pub tib_ptr: usize,                    // address of the TIB
    pub tib_size_ptr: usize,               // number of characters currently in the TIB
    pub tib_in_ptr: usize,                 // parse cursor (>IN) into the TIB
    pub exit_flag: bool,                   // set when BYE is executed
    pub msg: Msg,
    pub reader: Vec<FileHandle>,           // nested INCLUDE-FILE stack; top is the active source
    pub files: Vec<Option<FileHandle>>,    // open files created by OPEN-FILE; None marks a closed id
    pub show_stack: bool,                  // show the stack after each line of interaction
    pub stepper_ptr: usize,                // trace/step mode
    pub step_depth_ptr: usize,             // how many call levels deep to trace
    pub timer: Instant,                    // backing clock for NOW/MICROS/MILLIS
}

impl ForthRuntime {
    pub fn new() -> ForthRuntime {
        let mut runtime = ForthRuntime {
            kernel: Kernel::new(),
            control_stack: Vec::new(),
            leave_stack: Vec::new(),
            here_ptr: WORD_START,
            context_ptr: 0,
            base_ptr: 0,
            pad_ptr: 0,
            tmp_ptr: 0,
            last_ptr: 0,
            hld_ptr: 0,
            state_ptr: 0,
            abort_ptr: 0,
            tib_ptr: 0,
            tib_size_ptr: 0,
            tib_in_ptr: 0,
            exit_flag: false,
            msg: Msg::new(),
            reader: Vec::new(),
            files: Vec::new(),
            show_stack: true,
            stepper_ptr: 0,
            step_depth_ptr: 1,
            timer: Instant::now(),
        };
        let fh = FileHandle::new_file(None, Msg::new(), FileMode::RO).expect("stdin handle");
        runtime.reader.push(fh);
        runtime
    }

    /// Current value of the HERE pointer.
    pub fn here(&mut self) -> usize {
        self.kernel.get(self.here_ptr) as usize
    }

    /// Emits a value at HERE and advances it. Equivalent to `,`.
    pub fn emit_cell(&mut self, value: i64) {
        let addr = self.here();
        self.kernel.set(addr, value);
        self.kernel.incr(self.here_ptr, 1);
    }

    /// cold_start brings up user variables and native words, then runs any bootstrap source.
    pub fn cold_start(&mut self) {
        self.insert_variables();
        self.compile_builtins();
        self.kernel.set(self.state_ptr, FALSE);
        self.insert_code();
    }

    /// Whether the compiler (rather than the text interpreter) is currently active.
    pub fn get_compile_mode(&mut self) -> bool {
        self.kernel.get(self.state_ptr) != FALSE
    }

    pub fn set_compile_mode(&mut self, value: bool) {
        self.kernel.set(self.state_ptr, if value { TRUE } else { FALSE });
    }

    /// Empties the stacks and returns to the prompt. Does not terminate the process — unlike
    /// the reference target's hardware reset, there's always an operator to hand control back to.
    pub fn f_abort(&mut self) {
        self.f_raw_mode_off();
        self.msg.warning("abort", "terminating execution", None::<bool>);
        self.f_clear();
        self.set_abort_flag(true);
    }

    /// Resets the parameter and return stacks without touching the dictionary.
    pub fn f_clear(&mut self) {
        self.kernel.reset();
    }

    /// Creates a variable, returning the address of its value cell.
    pub fn make_variable(&mut self, name: &str) -> usize {
        let code_ptr = self.make_word(name, &[VARIABLE, 0]);
        code_ptr + 1
    }

    /// Creates a constant holding `val`.
    pub fn make_constant(&mut self, name: &str, val: i64) -> usize {
        self.make_word(name, &[CONSTANT, val])
    }

    /// Installs a new dictionary header for `name`, followed by `args`, and links it as LATEST.
    /// Returns the address of the first parameter cell (the word's cfa).
    ///
    /// Layout is the classic fixed-offset linked list: `[link][name_addr][args...]`. `link` holds
    /// the nfa of the previously-latest word (0 for the very first), always exactly one cell
    /// before the new word's own nfa — so FIND can walk the chain without knowing any word's
    /// argument count, unlike a trailing back-pointer whose offset would vary per word kind.
    pub fn make_word(&mut self, name: &str, args: &[i64]) -> usize {
        let addr = self.here();
        let link = self.kernel.get(self.context_ptr);
        self.kernel.set(addr, link);
        let nfa = addr + 1;
        let name_addr = self.kernel.string_new(name) as i64;
        self.kernel.set(nfa, name_addr);
        for (i, val) in args.iter().enumerate() {
            self.kernel.set(nfa + 1 + i, *val);
        }
        let new_here = nfa + 1 + args.len();
        self.kernel.set(self.here_ptr, new_here as i64);
        self.kernel.set(self.context_ptr, nfa as i64);
        self.last_ptr_value_update(nfa as i64);
        nfa + 1 // cfa
    }

    /// LAST tracks the nfa of the word currently being defined; updated on every new header so
    /// IMMEDIATE/HIDE/REVEAL/DOES> always act on the most recent one.
    fn last_ptr_value_update(&mut self, nfa: i64) {
        if self.last_ptr != 0 {
            self.kernel.set(self.last_ptr, nfa);
        }
    }

    pub fn insert_variables(&mut self) {
        // Hand-craft HERE and CONTEXT: make_word needs both to already exist (it reads
        // context_ptr for the new LINK and writes through here_ptr), so lay out their two
        // headers by hand using the same [link][name][tag][value] shape make_word would produce.
        let here_name = self.kernel.string_new("here");
        self.kernel.set(0, 0); // link: no previous word
        self.kernel.set(1, here_name as i64); // nfa of HERE
        self.kernel.set(2, VARIABLE);
        self.kernel.set(3, 4); // HERE's own value, corrected below once CONTEXT is laid down too
        self.here_ptr = 3;

        let context_name = self.kernel.string_new("context");
        self.kernel.set(4, 1); // link: nfa of HERE
        self.kernel.set(5, context_name as i64); // nfa of CONTEXT
        self.kernel.set(6, VARIABLE);
        self.kernel.set(7, 5); // CONTEXT's own value: itself is now the latest word
        self.context_ptr = 7;
        self.kernel.set(self.here_ptr, 8);

        self.pad_ptr = self.make_variable("pad");
        self.kernel.set(self.pad_ptr, PAD_START as i64);
        self.base_ptr = self.make_variable("base");
        self.kernel.set(self.base_ptr, 10);
        self.tmp_ptr = self.make_variable("tmp");
        self.kernel.set(self.tmp_ptr, TMP_START as i64);
        self.tib_ptr = self.make_variable("'tib");
        self.kernel.set(self.tib_ptr, TIB_START as i64);
        self.tib_size_ptr = self.make_variable("#tib");
        self.kernel.set(self.tib_size_ptr, 0);
        self.tib_in_ptr = self.make_variable(">in");
        self.kernel.set(self.tib_in_ptr, TIB_START as i64);
        self.hld_ptr = self.make_variable("hld");
        self.last_ptr = self.make_variable("last");
        self.state_ptr = self.make_variable("state");
        self.abort_ptr = self.make_variable("abort?");
        self.kernel.set(self.abort_ptr, FALSE);
        self.stepper_ptr = self.make_variable("stepper");
        self.step_depth_ptr = self.make_variable("stepper-depth");
        self.kernel.set(self.step_depth_ptr, 1);
    }

    /// Hook for running bootstrap Forth source once the dictionary is up. Unused for now: every
    /// word this crate defines is a native builtin, registered directly by `compile_builtins`.
    pub fn insert_code(&mut self) {}

    /// Registers a native word: stores the function in the builtins table and makes a dictionary
    /// header whose single parameter cell is the table index tagged with BUILTIN_FLAG.
    pub fn add_builtin(&mut self, name: &str, code: fn(&mut ForthRuntime), doc: &str) -> usize {
        let index = self.kernel.add_builtin(BuiltInFn::new(name, code, doc));
        let cfa = index | BUILTIN_FLAG;
        self.make_word(name, &[cfa as i64])
    }

    /// Marks the word just defined as IMMEDIATE (executed at compile time rather than compiled).
    /// Used while bootstrapping the native words below; delegates to the `immediate` word itself
    /// (defined in `internals::dictionary`) so there's exactly one implementation of the flag bit.
    fn mark_last_immediate(&mut self) {
        self.f_immediate();
    }

    /// Registers every word implemented natively in Rust. Control-flow, dictionary, parsing, and
    /// I/O words are implemented in their own modules (`compiler`, `dictionary`, `console`,
    /// `debug`, `numeric`) and just registered here.
    fn compile_builtins(&mut self) {
        // Arithmetic and comparisons
        self.add_builtin("+", ForthRuntime::f_plus, "+ ( j k -- j+k )");
        self.add_builtin("-", ForthRuntime::f_minus, "- ( j k -- j-k )");
        self.add_builtin("*", ForthRuntime::f_times, "* ( j k -- j*k )");
        self.add_builtin("/", ForthRuntime::f_divide, "/ ( j k -- j/k )");
        self.add_builtin("mod", ForthRuntime::f_mod, "mod ( j k -- j%k )");
        self.add_builtin("/mod", ForthRuntime::f_slash_mod, "/mod ( j k -- rem quot )");
        self.add_builtin("<", ForthRuntime::f_less, "< ( j k -- flag )");
        self.add_builtin(">", ForthRuntime::f_greater, "> ( j k -- flag )");
        self.add_builtin("=", ForthRuntime::f_equal, "= ( j k -- flag )");
        self.add_builtin("0=", ForthRuntime::f_0equal, "0= ( j -- flag )");
        self.add_builtin("0<", ForthRuntime::f_0less, "0< ( j -- flag )");
        self.add_builtin("true", ForthRuntime::f_true, "true ( -- -1 )");
        self.add_builtin("false", ForthRuntime::f_false, "false ( -- 0 )");
        self.add_builtin("invert", ForthRuntime::f_invert, "invert ( n -- ~n )");
        self.add_builtin("negate", ForthRuntime::f_negate, "negate ( n -- -n )");
        self.add_builtin("abs", ForthRuntime::f_abs, "abs ( n -- |n| )");
        self.add_builtin("max", ForthRuntime::f_max, "max ( j k -- max )");
        self.add_builtin("min", ForthRuntime::f_min, "min ( j k -- min )");
        self.add_builtin("1+", ForthRuntime::f_one_plus, "1+ ( n -- n+1 )");
        self.add_builtin("1-", ForthRuntime::f_one_minus, "1- ( n -- n-1 )");
        self.add_builtin("and", ForthRuntime::f_and, "and ( a b -- a&b )");
        self.add_builtin("or", ForthRuntime::f_or, "or ( a b -- a|b )");
        self.add_builtin("xor", ForthRuntime::f_xor, "xor ( a b -- a^b )");
        self.add_builtin("lshift", ForthRuntime::f_lshift, "lshift ( n u -- n<<u )");
        self.add_builtin("rshift", ForthRuntime::f_rshift, "rshift ( n u -- n>>u, unsigned )");

        // Stack shuffling
        self.add_builtin("dup", ForthRuntime::f_dup, "dup ( n -- n n )");
        self.add_builtin("?dup", ForthRuntime::f_qdup, "?dup ( n -- n n | 0 )");
        self.add_builtin("drop", ForthRuntime::f_drop, "drop ( n -- )");
        self.add_builtin("swap", ForthRuntime::f_swap, "swap ( m n -- n m )");
        self.add_builtin("over", ForthRuntime::f_over, "over ( m n -- m n m )");
        self.add_builtin("rot", ForthRuntime::f_rot, "rot ( i j k -- j k i )");
        self.add_builtin("nip", ForthRuntime::f_nip, "nip ( m n -- n )");
        self.add_builtin("tuck", ForthRuntime::f_tuck, "tuck ( m n -- n m n )");
        self.add_builtin("2dup", ForthRuntime::f_two_dup, "2dup ( m n -- m n m n )");
        self.add_builtin("2drop", ForthRuntime::f_two_drop, "2drop ( m n -- )");
        self.add_builtin("2swap", ForthRuntime::f_two_swap, "2swap ( a b c d -- c d a b )");
        self.add_builtin("pick", ForthRuntime::f_pick, "pick ( ... n -- ... v )");
        self.add_builtin("roll", ForthRuntime::f_roll, "roll ( ... n -- ... v )");
        self.add_builtin("depth", ForthRuntime::f_depth, "depth ( -- n )");

        // Memory and return stack
        self.add_builtin("@", ForthRuntime::f_get, "@ ( a -- v )");
        self.add_builtin("!", ForthRuntime::f_store, "! ( v a -- )");
        self.add_builtin("+!", ForthRuntime::f_plus_store, "+! ( n a -- )");
        self.add_builtin("c@", ForthRuntime::f_c_get, "c@ ( s -- c )");
        self.add_builtin("c!", ForthRuntime::f_c_store, "c! ( c s -- )");
        self.add_builtin(">r", ForthRuntime::f_to_r, ">r ( n -- ) (R: -- n )");
        self.add_builtin("r>", ForthRuntime::f_r_from, "r> ( -- n ) (R: n -- )");
        self.add_builtin("r@", ForthRuntime::f_r_get, "r@ ( -- n ) (R: n -- n )");
        self.add_builtin("i", ForthRuntime::f_i, "i ( -- n ) current loop index");
        self.add_builtin("j", ForthRuntime::f_j, "j ( -- n ) next-outer loop index");
        self.add_builtin("unloop", ForthRuntime::f_unloop, "unloop ( -- ) drops loop control from R");
        self.add_builtin("(loop)", ForthRuntime::f_loop_p, "(loop) ( -- flag ) step the loop index by 1");
        self.add_builtin("(+loop)", ForthRuntime::f_plus_loop_p, "(+loop) ( n -- flag ) step the loop index by n");
        self.add_builtin("s-copy", ForthRuntime::f_s_copy, "s-copy ( src dest -- ) copy a counted string");
        self.add_builtin("s-create", ForthRuntime::f_s_create, "s-create ( s1 -- s2 ) copy string to free space");

        // Timing
        self.add_builtin("now", ForthRuntime::f_now, "now ( -- ) reset the elapsed-time clock");
        self.add_builtin("micros", ForthRuntime::f_micros, "micros ( -- n ) microseconds since now");
        self.add_builtin("millis", ForthRuntime::f_millis, "millis ( -- n ) milliseconds since now");
        self.add_builtin("ms", ForthRuntime::f_ms, "ms ( n -- ) sleep n milliseconds");

        // Pictured numeric output and number parsing
        self.add_builtin("<#", ForthRuntime::f_less_num, "<# ( -- ) start pictured output");
        self.add_builtin("hold", ForthRuntime::f_hold, "hold ( c -- ) prepend a character");
        self.add_builtin("#", ForthRuntime::f_num, "# ( ud -- ud ) prepend next digit");
        self.add_builtin("#s", ForthRuntime::f_nums, "#s ( ud -- 0 ) prepend all remaining digits");
        self.add_builtin("sign", ForthRuntime::f_sign, "sign ( n -- ) prepend - if negative");
        self.add_builtin("#>", ForthRuntime::f_num_greater, "#> ( ud -- addr len ) finish pictured output");
        self.add_builtin("u.", ForthRuntime::f_u_dot, "u. ( u -- ) print unsigned");
        self.add_builtin(".", ForthRuntime::f_dot, ". ( n -- ) print signed");
        self.add_builtin("digit?", ForthRuntime::f_digit_q, "digit? ( c -- n T | F )");
        self.add_builtin(">number", ForthRuntime::f_to_number, ">number ( ud addr len -- ud addr len )");
        self.add_builtin("number?", ForthRuntime::f_q_number, "number? ( addr len -- n T | addr F )");

        // Text interpreter, parser, and compiler (internals::compiler)
        self.add_builtin("word", ForthRuntime::f_word, "word ( c -- addr ) parse a token delimited by c");
        self.add_builtin("(parse)", ForthRuntime::f_parse_p, "(parse) ( addr len c -- addr len delta )");
        self.add_builtin("type", ForthRuntime::f_type, "type ( addr len -- ) print a string");
        self.add_builtin("cr", ForthRuntime::f_cr, "cr ( -- ) newline");
        self.add_builtin("space", ForthRuntime::f_space, "space ( -- ) print one space");
        self.add_builtin("spaces", ForthRuntime::f_spaces, "spaces ( n -- ) print n spaces");
        self.add_builtin("accept", ForthRuntime::f_accept, "accept ( addr len1 -- addr len2 )");
        self.add_builtin("query", ForthRuntime::f_query, "query ( -- ) read a line into the TIB");
        self.add_builtin("interpret", ForthRuntime::f_interpret, "interpret ( -- ) interpret the TIB");
        self.add_builtin("evaluate", ForthRuntime::f_evaluate, "evaluate ( addr len -- ) interpret a string");
        self.add_builtin("quit", ForthRuntime::f_quit, "quit ( -- ) outer read-interpret loop");
        self.add_builtin("execute", ForthRuntime::f_execute, "execute ( xt -- ) run the word at xt");

        self.add_builtin("if", ForthRuntime::f_if, "if ( flag -- ) compile a conditional branch");
        self.mark_last_immediate();
        self.add_builtin("else", ForthRuntime::f_else, "else ( -- ) compile the alternate branch");
        self.mark_last_immediate();
        self.add_builtin("then", ForthRuntime::f_then, "then ( -- ) resolve a pending IF/ELSE");
        self.mark_last_immediate();
        self.add_builtin("begin", ForthRuntime::f_begin, "begin ( -- ) mark a loop start");
        self.mark_last_immediate();
        self.add_builtin("until", ForthRuntime::f_until, "until ( flag -- ) loop back to BEGIN if false");
        self.mark_last_immediate();
        self.add_builtin("again", ForthRuntime::f_again, "again ( -- ) loop back to BEGIN unconditionally");
        self.mark_last_immediate();
        self.add_builtin("while", ForthRuntime::f_while, "while ( flag -- ) exit loop if false");
        self.mark_last_immediate();
        self.add_builtin("repeat", ForthRuntime::f_repeat, "repeat ( -- ) loop back to BEGIN");
        self.mark_last_immediate();
        self.add_builtin("do", ForthRuntime::f_do, "do ( limit start -- ) begin a counted loop");
        self.mark_last_immediate();
        self.add_builtin("loop", ForthRuntime::f_loop, "loop ( -- ) increment index by 1, loop or fall through");
        self.mark_last_immediate();
        self.add_builtin("+loop", ForthRuntime::f_plus_loop, "+loop ( n -- ) increment index by n, loop or fall through");
        self.mark_last_immediate();
        self.add_builtin("leave", ForthRuntime::f_leave, "leave ( -- ) exit the innermost DO loop immediately");
        self.mark_last_immediate();
        self.add_builtin("recurse", ForthRuntime::f_recurse, "recurse ( -- ) compile a call to the word being defined");
        self.mark_last_immediate();

        // Dictionary and defining words (internals::dictionary)
        self.add_builtin(":", ForthRuntime::f_colon, ": <name> ( -- ) begin a definition");
        self.add_builtin(";", ForthRuntime::f_semicolon, "; ( -- ) end a definition");
        self.mark_last_immediate();
        self.add_builtin("create", ForthRuntime::f_create, "create <name> ( -- ) make a header with no code");
        self.add_builtin("does>", ForthRuntime::f_does, "does> ( -- ) attach run-time behavior to CREATE");
        self.mark_last_immediate();
        self.add_builtin("variable", ForthRuntime::f_variable, "variable <name> ( -- ) create a one-cell variable");
        self.add_builtin("constant", ForthRuntime::f_constant, "constant <name> ( n -- ) create a constant holding n");
        self.add_builtin(",", ForthRuntime::f_comma, ", ( n -- ) compile n at HERE");
        self.add_builtin("immediate", ForthRuntime::f_immediate, "immediate ( -- ) flag the last word IMMEDIATE");
        self.add_builtin("immed?", ForthRuntime::f_immediate_q, "immed? ( cfa -- flag )");
        self.add_builtin("find", ForthRuntime::f_find, "find ( addr -- xt T | addr F ) search the dictionary");
        self.add_builtin("(')", ForthRuntime::f_tick_p, "(') <name> ( -- xt ) find the next word in the input");
        self.add_builtin("hide", ForthRuntime::f_hide, "hide ( -- ) remove LATEST from the search order");
        self.add_builtin("reveal", ForthRuntime::f_reveal, "reveal ( -- ) restore LATEST to the search order");
        self.add_builtin("marker", ForthRuntime::f_marker, "marker <name> ( -- ) create a dictionary restore point");
        self.add_builtin("?unique", ForthRuntime::f_q_unique, "?unique ( addr -- flag ) true if name is new");
        self.add_builtin("s-move", ForthRuntime::f_smove, "s-move ( src len dest -- ) copy a raw string");

        // Console, debug, and file I/O (internals::console, internals::debug)
        self.add_builtin("(emit)", ForthRuntime::f_emit_p, "(emit) ( c -- ) write a character");
        self.add_builtin("flush", ForthRuntime::f_flush, "flush ( -- ) force pending output out");
        self.add_builtin("key", ForthRuntime::f_key, "key ( -- c ) blocking character read");
        self.add_builtin("key?", ForthRuntime::f_key_q, "key? ( -- flag ) non-blocking input test");
        self.add_builtin("include-file", ForthRuntime::f_include_file, "include-file ( addr -- ) load a source file");
        self.add_builtin("open-file", ForthRuntime::f_open_file, "open-file ( addr len fam -- id ior )");
        self.add_builtin("close-file", ForthRuntime::f_close_file, "close-file ( id -- ior )");
        self.add_builtin("read-line", ForthRuntime::f_read_line, "read-line ( addr len id -- len2 flag ior )");
        self.add_builtin("write-line", ForthRuntime::f_write_line, "write-line ( addr len id -- ior )");
        self.add_builtin("file-position", ForthRuntime::f_file_position, "file-position ( id -- u ior )");
        self.add_builtin("file-size", ForthRuntime::f_file_size, "file-size ( id -- u ior )");
        self.add_builtin("(system)", ForthRuntime::f_system_p, "(system) ( addr len -- ) run a shell command");
        self.add_builtin("clear", ForthRuntime::f_clear, "clear ( -- ) empty the stacks");
        self.add_builtin("bye", ForthRuntime::f_bye, "bye ( -- ) exit to the operating system");
        self.add_builtin("abort", ForthRuntime::f_abort, "abort ( -- ) clear the stacks and reset");
        self.add_builtin(".s", ForthRuntime::f_dot_s, ".s ( -- ) print the parameter stack");
        self.add_builtin("show-stack", ForthRuntime::f_show_stack, "show-stack ( -- ) show stack after each line");
        self.add_builtin("hide-stack", ForthRuntime::f_hide_stack, "hide-stack ( -- ) stop showing the stack");
        self.add_builtin("words", ForthRuntime::f_words, "words ( -- ) list every word in the dictionary");
        self.add_builtin("see", ForthRuntime::f_see, "see <name> ( -- ) decompile a word");
        self.add_builtin("dbg", ForthRuntime::f_dbg, "dbg ( n -- ) set the debug level");
        self.add_builtin("debuglevel", ForthRuntime::f_debuglevel, "debuglevel ( -- ) print the debug level");
        self.add_builtin("raw-mode-on", ForthRuntime::f_raw_mode_on, "raw-mode-on ( -- ) enable raw terminal mode");
        self.add_builtin("raw-mode-off", ForthRuntime::f_raw_mode_off, "raw-mode-off ( -- ) disable raw terminal mode");
        self.add_builtin("raw-mode?", ForthRuntime::f_raw_mode_q, "raw-mode? ( -- flag )");
    }

    pub fn set_abort_flag(&mut self, v: bool) {
        self.kernel.set(self.abort_ptr, if v { TRUE } else { FALSE });
    }

    pub fn get_abort_flag(&mut self) -> bool {
        self.kernel.get(self.abort_ptr) != FALSE
    }

    pub fn should_exit(&self) -> bool {
        self.exit_flag
    }

    pub fn f_bye(&mut self) {
        self.exit_flag = true;
    }

    pub fn f_raw_mode_on(&mut self) {
        if let Err(e) = terminal::enable_raw() {
            self.msg.error("raw-mode-on", &e.to_string(), None::<bool>);
        }
    }

    pub fn f_raw_mode_off(&mut self) {
        if let Err(e) = terminal::disable_raw() {
            self.msg.error("raw-mode-off", &e.to_string(), None::<bool>);
        }
    }

    pub fn f_raw_mode_q(&mut self) {
        match terminal::get_raw_mode() {
            Ok(enabled) => self.kernel.push(if enabled { TRUE } else { FALSE }),
            Err(e) => self.msg.error("raw-mode?", &e.to_string(), None::<bool>),
        }
    }
}

impl Default for ForthRuntime {
    fn default() -> Self {
        ForthRuntime::new()
    }
}

/////////////////////////
/// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_push_and_pop() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push(42);
        assert_eq!(rt.kernel.pop(), 42);
    }

    #[test]
    fn test_cold_start() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();
        assert_eq!(runtime.kernel.get(runtime.state_ptr), FALSE);
        assert!(!runtime.exit_flag);
    }

    #[test]
    fn test_make_word() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();

        let code_ptr = runtime.make_word("test", &[1, 2, 3]);
        let s1 = runtime.kernel.get(code_ptr - 1) as usize;
        let s2 = runtime.kernel.string_new("test");
        assert!(runtime.kernel.string_equal(s1, s2));
        assert_eq!(runtime.kernel.get(code_ptr), 1);
        assert_eq!(runtime.kernel.get(code_ptr + 1), 2);
        assert_eq!(runtime.kernel.get(code_ptr + 2), 3);
    }

    #[test]
    fn test_add_builtin() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();
        let addr = runtime.add_builtin("test-word", ForthRuntime::f_plus, "test");
        let cfa = runtime.kernel.get(addr) as usize;
        assert!(cfa > BUILTIN_FLAG);
    }

    #[test]
    fn test_insert_variables() {
        let mut runtime = ForthRuntime::new();
        runtime.insert_variables();
        assert!(runtime.kernel.get(runtime.here_ptr) > WORD_START as i64);
        assert_eq!(runtime.kernel.get(runtime.pad_ptr), PAD_START as i64);
        assert_eq!(runtime.kernel.get(runtime.base_ptr), 10);
    }

    #[test]
    fn test_compile_mode_roundtrips() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();
        runtime.set_compile_mode(true);
        assert!(runtime.get_compile_mode());
        assert_eq!(runtime.kernel.get(runtime.state_ptr), TRUE);
        runtime.set_compile_mode(false);
        assert!(!runtime.get_compile_mode());
    }

    #[test]
    fn test_abort_flag_roundtrips() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();
        runtime.set_abort_flag(true);
        assert!(runtime.get_abort_flag());
        runtime.set_abort_flag(false);
        assert!(!runtime.get_abort_flag());
    }

    #[test]
    fn test_bye_sets_exit_flag() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();
        assert!(!runtime.should_exit());
        runtime.f_bye();
        assert!(runtime.should_exit());
    }

    #[test]
    fn test_abort_clears_stack() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();
        runtime.kernel.push(42);
        runtime.kernel.push(99);
        assert_eq!(runtime.kernel.stack_len(), 2);
        runtime.f_abort();
        assert_eq!(runtime.kernel.stack_len(), 0);
        assert!(runtime.get_abort_flag());
    }

    #[test]
    fn test_make_variable_and_constant() {
        let mut runtime = ForthRuntime::new();
        runtime.cold_start();
        let var_addr = runtime.make_variable("my-var");
        runtime.kernel.set(var_addr, 7);
        assert_eq!(runtime.kernel.get(var_addr), 7);

        let const_cfa = runtime.make_constant("my-const", 99);
        assert_eq!(runtime.kernel.get(const_cfa), CONSTANT);
        assert_eq!(runtime.kernel.get(const_cfa + 1), 99);
    }
}
