//! Arithmetic, stack shuffling, memory access, return-stack/loop-index primitives and timing
//! words — the bulk of the ~90-word primitive table named in the spec's inner-interpreter and
//! numeric sections.

use crate::kernel::DATA_SIZE;
use crate::runtime::{ForthRuntime, FALSE, TRUE};
use std::thread;
use std::time::{Duration, Instant};

/// Whether a string parses cleanly as a signed cell value.
pub fn u_is_integer(s: &str) -> bool {
    s.parse::<i64>().is_ok()
}

impl ForthRuntime {
    pub fn f_plus(&mut self) {
        if self.kernel.stack_check(2, "+") {
            self.kernel.pop2_push1(|a, b| a + b);
        }
    }

    pub fn f_minus(&mut self) {
        if self.kernel.stack_check(2, "-") {
            self.kernel.pop2_push1(|a, b| a - b);
        }
    }

    pub fn f_times(&mut self) {
        if self.kernel.stack_check(2, "*") {
            self.kernel.pop2_push1(|a, b| a * b);
        }
    }

    pub fn f_divide(&mut self) {
        if self.kernel.stack_check(2, "/") {
            let b = self.kernel.pop();
            let a = self.kernel.pop();
            if b == 0 {
                self.msg.error("/", "division by zero", None::<i64>);
                self.f_abort();
            } else {
                self.kernel.push(a / b);
            }
        }
    }

    pub fn f_mod(&mut self) {
        if self.kernel.stack_check(2, "mod") {
            let b = self.kernel.pop();
            let a = self.kernel.pop();
            if b == 0 {
                self.msg.error("mod", "division by zero", None::<i64>);
                self.f_abort();
            } else {
                self.kernel.push(a % b);
            }
        }
    }

    pub fn f_slash_mod(&mut self) {
        if self.kernel.stack_check(2, "/mod") {
            let b = self.kernel.pop();
            let a = self.kernel.pop();
            if b == 0 {
                self.msg.error("/mod", "division by zero", None::<i64>);
                self.f_abort();
            } else {
                self.kernel.push(a % b);
                self.kernel.push(a / b);
            }
        }
    }

    pub fn f_less(&mut self) {
        if self.kernel.stack_check(2, "<") {
            self.kernel
                .pop2_push1(|a, b| if a < b { TRUE } else { FALSE });
        }
    }

    pub fn f_greater(&mut self) {
        if self.kernel.stack_check(2, ">") {
            self.kernel
                .pop2_push1(|a, b| if a > b { TRUE } else { FALSE });
        }
    }

    pub fn f_true(&mut self) {
        self.kernel.push(TRUE);
    }

    pub fn f_false(&mut self) {
        self.kernel.push(FALSE);
    }

    pub fn f_equal(&mut self) {
        if self.kernel.stack_check(2, "=") {
            self.kernel
                .pop2_push1(|a, b| if a == b { TRUE } else { FALSE });
        }
    }

    pub fn f_0equal(&mut self) {
        if self.kernel.stack_check(1, "0=") {
            self.kernel.pop1_push1(|a| if a == 0 { TRUE } else { FALSE });
        }
    }

    pub fn f_0less(&mut self) {
        if self.kernel.stack_check(1, "0<") {
            self.kernel.pop1_push1(|a| if a < 0 { TRUE } else { FALSE });
        }
    }

    pub fn f_invert(&mut self) {
        if self.kernel.stack_check(1, "invert") {
            self.kernel.pop1_push1(|a| !a);
        }
    }

    pub fn f_negate(&mut self) {
        if self.kernel.stack_check(1, "negate") {
            self.kernel.pop1_push1(|a| -a);
        }
    }

    pub fn f_abs(&mut self) {
        if self.kernel.stack_check(1, "abs") {
            self.kernel.pop1_push1(|a| a.abs());
        }
    }

    pub fn f_max(&mut self) {
        if self.kernel.stack_check(2, "max") {
            self.kernel.pop2_push1(|a, b| a.max(b));
        }
    }

    pub fn f_min(&mut self) {
        if self.kernel.stack_check(2, "min") {
            self.kernel.pop2_push1(|a, b| a.min(b));
        }
    }

    pub fn f_one_plus(&mut self) {
        if self.kernel.stack_check(1, "1+") {
            self.kernel.pop1_push1(|a| a + 1);
        }
    }

    pub fn f_one_minus(&mut self) {
        if self.kernel.stack_check(1, "1-") {
            self.kernel.pop1_push1(|a| a - 1);
        }
    }

    pub fn f_dup(&mut self) {
        if self.kernel.stack_check(1, "dup") {
            let top = self.kernel.top();
            self.kernel.push(top);
        }
    }

    pub fn f_qdup(&mut self) {
        if self.kernel.stack_check(1, "?dup") {
            let top = self.kernel.top();
            if top != 0 {
                self.kernel.push(top);
            }
        }
    }

    pub fn f_drop(&mut self) {
        if self.kernel.stack_check(1, "drop") {
            self.kernel.pop();
        }
    }

    pub fn f_swap(&mut self) {
        if self.kernel.stack_check(2, "swap") {
            let a = self.kernel.pop();
            let b = self.kernel.pop();
            self.kernel.push(a);
            self.kernel.push(b);
        }
    }

    pub fn f_over(&mut self) {
        if self.kernel.stack_check(2, "over") {
            let first = self.kernel.pop();
            let second = self.kernel.pop();
            self.kernel.push(second);
            self.kernel.push(first);
            self.kernel.push(second);
        }
    }

    pub fn f_rot(&mut self) {
        if self.kernel.stack_check(3, "rot") {
            let first = self.kernel.pop();
            let second = self.kernel.pop();
            let third = self.kernel.pop();
            self.kernel.push(second);
            self.kernel.push(first);
            self.kernel.push(third);
        }
    }

    pub fn f_nip(&mut self) {
        if self.kernel.stack_check(2, "nip") {
            let top = self.kernel.pop();
            self.kernel.pop();
            self.kernel.push(top);
        }
    }

    pub fn f_tuck(&mut self) {
        if self.kernel.stack_check(2, "tuck") {
            let top = self.kernel.pop();
            let second = self.kernel.pop();
            self.kernel.push(top);
            self.kernel.push(second);
            self.kernel.push(top);
        }
    }

    pub fn f_two_dup(&mut self) {
        if self.kernel.stack_check(2, "2dup") {
            let a = self.kernel.peek(1);
            let b = self.kernel.peek(0);
            self.kernel.push(a);
            self.kernel.push(b);
        }
    }

    pub fn f_two_drop(&mut self) {
        if self.kernel.stack_check(2, "2drop") {
            self.kernel.pop();
            self.kernel.pop();
        }
    }

    pub fn f_two_swap(&mut self) {
        if self.kernel.stack_check(4, "2swap") {
            let d = self.kernel.pop();
            let c = self.kernel.pop();
            let b = self.kernel.pop();
            let a = self.kernel.pop();
            self.kernel.push(c);
            self.kernel.push(d);
            self.kernel.push(a);
            self.kernel.push(b);
        }
    }

    pub fn f_pick(&mut self) {
        if self.kernel.stack_check(1, "pick") {
            let n = self.kernel.pop() as usize;
            if self.kernel.stack_check(n + 1, "pick") {
                let value = self.kernel.peek(n);
                self.kernel.push(value);
            }
        }
    }

    pub fn f_roll(&mut self) {
        if self.kernel.stack_check(1, "roll") {
            let n = self.kernel.pop() as usize;
            if n == 0 {
                return;
            }
            if self.kernel.stack_check(n + 1, "roll") {
                let sp = self.kernel.stack_ptr;
                let new_top = self.kernel.heap[sp + n];
                let mut i = sp + n - 1;
                while i >= sp {
                    self.kernel.heap[i + 1] = self.kernel.heap[i];
                    if i == sp {
                        break;
                    }
                    i -= 1;
                }
                self.kernel.stack_ptr += 1;
                self.kernel.push(new_top);
            }
        }
    }

    pub fn f_and(&mut self) {
        if self.kernel.stack_check(2, "and") {
            self.kernel.pop2_push1(|a, b| a & b);
        }
    }

    pub fn f_or(&mut self) {
        if self.kernel.stack_check(2, "or") {
            self.kernel.pop2_push1(|a, b| a | b);
        }
    }

    pub fn f_xor(&mut self) {
        if self.kernel.stack_check(2, "xor") {
            self.kernel.pop2_push1(|a, b| a ^ b);
        }
    }

    pub fn f_lshift(&mut self) {
        if self.kernel.stack_check(2, "lshift") {
            self.kernel.pop2_push1(|a, b| a << b);
        }
    }

    pub fn f_rshift(&mut self) {
        if self.kernel.stack_check(2, "rshift") {
            self.kernel.pop2_push1(|a, b| ((a as u64) >> b) as i64);
        }
    }

    /// `@` ( a -- n ) loads the value at address a onto the stack.
    pub fn f_get(&mut self) {
        if self.kernel.stack_check(1, "@") {
            let addr = self.kernel.pop() as usize;
            if addr < DATA_SIZE {
                self.kernel.push(self.kernel.get(addr));
            } else {
                self.msg.error("@", "address out of range", Some(addr));
                self.f_abort();
            }
        }
    }

    /// `!` ( n a -- ) stores n at address a.
    pub fn f_store(&mut self) {
        if self.kernel.stack_check(2, "!") {
            let addr = self.kernel.pop() as usize;
            let value = self.kernel.pop();
            if addr < DATA_SIZE {
                self.kernel.set(addr, value);
            } else {
                self.msg.error("!", "address out of range", Some(addr));
                self.f_abort();
            }
        }
    }

    pub fn f_plus_store(&mut self) {
        if self.kernel.stack_check(2, "+!") {
            let addr = self.kernel.pop() as usize;
            let value = self.kernel.pop();
            if addr < DATA_SIZE {
                self.kernel.incr(addr, value);
            } else {
                self.msg.error("+!", "address out of range", Some(addr));
                self.f_abort();
            }
        }
    }

    /// `>r` ( n -- ) pops the stack, placing the value on the return stack.
    pub fn f_to_r(&mut self) {
        if self.kernel.stack_check(1, ">r") {
            let value = self.kernel.pop();
            self.kernel.return_ptr -= 1;
            self.kernel.heap[self.kernel.return_ptr] = value;
        }
    }

    /// `r>` ( -- n ) pops the return stack onto the parameter stack.
    pub fn f_r_from(&mut self) {
        let value = self.kernel.heap[self.kernel.return_ptr];
        self.kernel.return_ptr += 1;
        self.kernel.push(value);
    }

    /// `r@` ( -- n ) copies the top of the return stack onto the parameter stack.
    pub fn f_r_get(&mut self) {
        let value = self.kernel.heap[self.kernel.return_ptr];
        self.kernel.push(value);
    }

    /// `i` ( -- n ) pushes the current loop index.
    pub fn f_i(&mut self) {
        let value = self.kernel.heap[self.kernel.return_ptr];
        self.kernel.push(value);
    }

    /// `j` ( -- n ) pushes the enclosing loop's index.
    pub fn f_j(&mut self) {
        let value = self.kernel.heap[self.kernel.return_ptr + 2];
        self.kernel.push(value);
    }

    /// `unloop` ( -- ) drops the current loop's (index limit) pair from the return stack.
    pub fn f_unloop(&mut self) {
        self.kernel.return_ptr += 2;
    }

    /// `(loop)` ( -- flag ) steps the innermost DO loop's index by one; compiled by LOOP.
    /// Pushes true once the index reaches the limit, having already dropped the (index limit)
    /// pair off the return stack; pushes false while the loop should keep going.
    pub fn f_loop_p(&mut self) {
        let index = self.kernel.heap[self.kernel.return_ptr] + 1;
        let limit = self.kernel.heap[self.kernel.return_ptr + 1];
        self.kernel.heap[self.kernel.return_ptr] = index;
        if index >= limit {
            self.kernel.return_ptr += 2;
            self.kernel.push(TRUE);
        } else {
            self.kernel.push(FALSE);
        }
    }

    /// `(+loop)` ( n -- flag ) as `(loop)`, but steps the index by `n` instead of one; compiled
    /// by +LOOP. Termination is a boundary crossing, so a negative step counts down correctly.
    pub fn f_plus_loop_p(&mut self) {
        if self.kernel.stack_check(1, "(+loop)") {
            let n = self.kernel.pop();
            let old_index = self.kernel.heap[self.kernel.return_ptr];
            let limit = self.kernel.heap[self.kernel.return_ptr + 1];
            let new_index = old_index + n;
            self.kernel.heap[self.kernel.return_ptr] = new_index;
            let done = if n >= 0 {
                new_index >= limit
            } else {
                new_index < limit
            };
            if done {
                self.kernel.return_ptr += 2;
                self.kernel.push(TRUE);
            } else {
                self.kernel.push(FALSE);
            }
        }
    }

    pub fn f_depth(&mut self) {
        let depth = self.kernel.stack_len() as i64;
        self.kernel.push(depth);
    }

    /// `c@` ( s -- c ) reads a byte from string space.
    pub fn f_c_get(&mut self) {
        if self.kernel.stack_check(1, "c@") {
            let addr = self.kernel.pop() as usize;
            self.kernel.push(self.kernel.byte_get(addr) as i64);
        }
    }

    /// `c!` ( c s -- ) writes a byte to string space.
    pub fn f_c_store(&mut self) {
        if self.kernel.stack_check(2, "c!") {
            let addr = self.kernel.pop() as usize;
            let value = self.kernel.pop();
            self.kernel.byte_set(addr, value as u8);
        }
    }

    /// `s-copy` ( from to -- to ) copies a counted string from one string-space address to
    /// another, advancing the free string pointer.
    pub fn f_s_copy(&mut self) {
        if self.kernel.stack_check(2, "s-copy") {
            let dest = self.kernel.pop() as usize;
            let source = self.kernel.pop() as usize;
            let length = self.kernel.string_save(source, dest);
            let len = self.kernel.string_length(dest) + 1;
            self.kernel.string_ptr += len;
            self.kernel.push(length as i64);
        }
    }

    /// `s-create` ( from -- to ) copies a counted string into the next free string-space slot.
    pub fn f_s_create(&mut self) {
        if self.kernel.stack_check(1, "s-create") {
            let source = self.kernel.top() as usize;
            let dest = self.kernel.string_ptr as i64;
            self.kernel.push(dest);
            self.f_s_copy();
        }
    }

    pub fn f_now(&mut self) {
        self.timer = Instant::now();
    }

    pub fn f_micros(&mut self) {
        let duration = self.timer.elapsed();
        self.kernel.push(duration.as_micros() as i64);
    }

    pub fn f_millis(&mut self) {
        let duration = self.timer.elapsed();
        self.kernel.push(duration.as_millis() as i64);
    }

    pub fn f_ms(&mut self) {
        if self.kernel.stack_check(1, "ms") {
            let delay = self.kernel.pop() as u64;
            thread::sleep(Duration::from_millis(delay));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{ForthRuntime, FALSE, TRUE};

    #[test]
    fn plus_minus_times_divide() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(2);
        rt.kernel.push(3);
        rt.f_plus();
        assert_eq!(rt.kernel.pop(), 5);

        rt.kernel.push(10);
        rt.kernel.push(4);
        rt.f_minus();
        assert_eq!(rt.kernel.pop(), 6);

        rt.kernel.push(6);
        rt.kernel.push(7);
        rt.f_times();
        assert_eq!(rt.kernel.pop(), 42);

        rt.kernel.push(20);
        rt.kernel.push(4);
        rt.f_divide();
        assert_eq!(rt.kernel.pop(), 5);
    }

    #[test]
    fn dup_over_drop_identity() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(99);
        rt.f_dup();
        rt.f_over();
        rt.f_drop();
        rt.f_equal();
        assert_eq!(rt.kernel.pop(), TRUE);
    }

    #[test]
    fn swap_identity() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(1);
        rt.kernel.push(2);
        rt.f_swap();
        assert_eq!(rt.kernel.pop(), 1);
        assert_eq!(rt.kernel.pop(), 2);
    }

    #[test]
    fn invert_invert_is_identity() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(123);
        rt.f_invert();
        rt.f_invert();
        assert_eq!(rt.kernel.pop(), 123);
    }

    #[test]
    fn negate_negate_is_identity() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(-7);
        rt.f_negate();
        rt.f_negate();
        assert_eq!(rt.kernel.pop(), -7);
    }

    #[test]
    fn zero_plus_is_identity() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(55);
        rt.kernel.push(0);
        rt.f_plus();
        assert_eq!(rt.kernel.pop(), 55);
    }

    #[test]
    fn to_r_r_from_roundtrip() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(17);
        rt.f_to_r();
        rt.f_r_from();
        assert_eq!(rt.kernel.pop(), 17);
    }

    #[test]
    fn rot_rotates_three_deep() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(1);
        rt.kernel.push(2);
        rt.kernel.push(3);
        rt.f_rot();
        assert_eq!(rt.kernel.pop(), 1);
        assert_eq!(rt.kernel.pop(), 3);
        assert_eq!(rt.kernel.pop(), 2);
    }

    #[test]
    fn divide_by_zero_aborts_rather_than_panics() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(1);
        rt.kernel.push(0);
        rt.f_divide();
        assert!(rt.get_abort_flag());
    }

    #[test]
    fn loop_p_signals_done_at_limit() {
        let mut rt = ForthRuntime::new();
        rt.kernel.return_ptr -= 2;
        rt.kernel.heap[rt.kernel.return_ptr] = 4; // index
        rt.kernel.heap[rt.kernel.return_ptr + 1] = 5; // limit
        rt.f_loop_p();
        assert_eq!(rt.kernel.pop(), FALSE);
        rt.f_loop_p();
        assert_eq!(rt.kernel.pop(), TRUE);
    }

    #[test]
    fn plus_loop_p_counts_down_with_negative_step() {
        let mut rt = ForthRuntime::new();
        rt.kernel.return_ptr -= 2;
        rt.kernel.heap[rt.kernel.return_ptr] = 1; // index
        rt.kernel.heap[rt.kernel.return_ptr + 1] = 0; // limit
        rt.kernel.push(-1);
        rt.f_plus_loop_p();
        assert_eq!(rt.kernel.pop(), FALSE);
        rt.kernel.push(-1);
        rt.f_plus_loop_p();
        assert_eq!(rt.kernel.pop(), TRUE);
    }

    #[test]
    fn comparisons_return_forth_booleans() {
        let mut rt = ForthRuntime::new();
        rt.kernel.push(2);
        rt.kernel.push(3);
        rt.f_less();
        assert_eq!(rt.kernel.pop(), TRUE);

        rt.kernel.push(3);
        rt.kernel.push(2);
        rt.f_less();
        assert_eq!(rt.kernel.pop(), FALSE);
    }
}
