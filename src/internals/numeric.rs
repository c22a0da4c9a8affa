//! Pictured numeric output (`<#`, `#`, `#S`, `SIGN`, `#>`, `U.`, `.`) and number parsing
//! (`>NUMBER`, `?NUMBER`, `DIGIT?`).
//!
//! Digits are built right-to-left into the HOLD area, exactly as `original_source/forth.c`'s
//! `Fnum`/`Fnums`/`Fsign`/`Fnumgreater` do it — the teacher crate never implemented pictured
//! output at all, so this module is new, written in the teacher's one-method-per-word style.

use crate::runtime::{ForthRuntime, FALSE, HOLD_SIZE, HOLD_START, TRUE};

/// Maps a digit value (0-35) to its printable character, upper-case for bases above 10.
fn digit_char(d: i64) -> u8 {
    if d < 10 {
        b'0' + d as u8
    } else {
        b'A' + (d - 10) as u8
    }
}

/// Maps a character to its digit value in the given base, if valid.
fn char_digit(c: u8, base: i64) -> Option<i64> {
    let value = match c {
        b'0'..=b'9' => (c - b'0') as i64,
        b'A'..=b'Z' => (c - b'A') as i64 + 10,
        b'a'..=b'z' => (c - b'a') as i64 + 10,
        _ => return None,
    };
    if value < base {
        Some(value)
    } else {
        None
    }
}

impl ForthRuntime {
    fn base(&self) -> i64 {
        let b = self.kernel.get(self.base_ptr);
        if (2..=36).contains(&b) {
            b
        } else {
            10
        }
    }

    /// `<#` ( -- ) resets the hold cursor to the end of the hold area; digits are prepended as
    /// they're produced, so the area fills from the back forward.
    pub fn f_less_num(&mut self) {
        self.kernel.set(self.hld_ptr, (HOLD_START + HOLD_SIZE) as i64);
    }

    /// `hold` ( c -- ) prepends one raw character to the hold area.
    pub fn f_hold(&mut self) {
        if self.kernel.stack_check(1, "hold") {
            let c = self.kernel.pop() as u8;
            let cursor = self.kernel.get(self.hld_ptr) as usize - 1;
            self.kernel.byte_set(cursor, c);
            self.kernel.set(self.hld_ptr, cursor as i64);
        }
    }

    /// `#` ( ud -- ud ) divides the accumulator by BASE and prepends the remainder digit.
    pub fn f_num(&mut self) {
        if self.kernel.stack_check(1, "#") {
            let base = self.base();
            let ud = self.kernel.pop();
            let digit = ud.rem_euclid(base);
            let quotient = ud.div_euclid(base);
            self.kernel.push(digit);
            self.f_hold_digit();
            self.kernel.push(quotient);
        }
    }

    fn f_hold_digit(&mut self) {
        let digit = self.kernel.pop();
        self.kernel.push(digit_char(digit) as i64);
        self.f_hold();
    }

    /// `#S` ( ud -- 0 ) repeats `#` until the accumulator is exhausted.
    pub fn f_nums(&mut self) {
        loop {
            self.f_num();
            if self.kernel.top() == 0 {
                break;
            }
        }
    }

    /// `sign` ( n -- ) prepends `-` to the hold area if n is negative.
    pub fn f_sign(&mut self) {
        if self.kernel.stack_check(1, "sign") {
            let n = self.kernel.pop();
            if n < 0 {
                self.kernel.push('-' as i64);
                self.f_hold();
            }
        }
    }

    /// `#>` ( ud -- addr len ) drops the (by now zero) accumulator and returns the formatted
    /// text's bounds within the hold area.
    pub fn f_num_greater(&mut self) {
        if self.kernel.stack_check(1, "#>") {
            self.kernel.pop();
            let cursor = self.kernel.get(self.hld_ptr) as usize;
            let end = HOLD_START + HOLD_SIZE;
            self.kernel.push(cursor as i64);
            self.kernel.push((end - cursor) as i64);
        }
    }

    /// `u.` ( u -- ) prints an unsigned cell in the current base, followed by a space.
    pub fn f_u_dot(&mut self) {
        if self.kernel.stack_check(1, "u.") {
            let u = self.kernel.pop();
            self.f_less_num();
            self.kernel.push(u);
            self.f_nums();
            self.kernel.push(0);
            self.f_num_greater();
            let len = self.kernel.pop() as usize;
            let addr = self.kernel.pop() as usize;
            print!("{} ", self.kernel.string_slice(addr, len));
        }
    }

    /// `.` ( n -- ) prints a signed cell in the current base, followed by a space.
    pub fn f_dot(&mut self) {
        if self.kernel.stack_check(1, ".") {
            let n = self.kernel.pop();
            self.f_less_num();
            self.kernel.push(n.unsigned_abs() as i64);
            self.f_nums();
            self.kernel.push(n);
            self.f_sign();
            self.kernel.push(0);
            self.f_num_greater();
            let len = self.kernel.pop() as usize;
            let addr = self.kernel.pop() as usize;
            print!("{} ", self.kernel.string_slice(addr, len));
        }
    }

    /// `digit?` ( c -- n T | F ) tests whether a character is a valid digit in the current base.
    pub fn f_digit_q(&mut self) {
        if self.kernel.stack_check(1, "digit?") {
            let c = self.kernel.pop() as u8;
            match char_digit(c, self.base()) {
                Some(value) => {
                    self.kernel.push(value);
                    self.kernel.push(TRUE);
                }
                None => self.kernel.push(FALSE),
            }
        }
    }

    /// `>number` ( ud addr len -- ud addr' len' ) consumes leading digits valid in the current
    /// base, accumulating into `ud`; stops at the first non-digit.
    pub fn f_to_number(&mut self) {
        if self.kernel.stack_check(3, ">number") {
            let mut len = self.kernel.pop() as usize;
            let mut addr = self.kernel.pop() as usize;
            let mut ud = self.kernel.pop();
            let base = self.base();
            while len > 0 {
                let c = self.kernel.byte_get(addr);
                match char_digit(c, base) {
                    Some(d) => {
                        ud = ud * base + d;
                        addr += 1;
                        len -= 1;
                    }
                    None => break,
                }
            }
            self.kernel.push(ud);
            self.kernel.push(addr as i64);
            self.kernel.push(len as i64);
        }
    }

    /// `?number` ( addr len -- n T | addr F ) parses an optionally-signed integer in the current
    /// base, succeeding only if the entire token converts.
    pub fn f_q_number(&mut self) {
        if self.kernel.stack_check(2, "?number") {
            let len = self.kernel.pop() as usize;
            let addr = self.kernel.pop() as usize;
            if len == 0 {
                self.kernel.push(addr as i64);
                self.kernel.push(FALSE);
                return;
            }
            let first = self.kernel.byte_get(addr);
            let (negative, digits_addr, digits_len) = if first == b'-' {
                (true, addr + 1, len - 1)
            } else {
                (false, addr, len)
            };
            if digits_len == 0 {
                self.kernel.push(addr as i64);
                self.kernel.push(FALSE);
                return;
            }
            self.kernel.push(0);
            self.kernel.push(digits_addr as i64);
            self.kernel.push(digits_len as i64);
            self.f_to_number();
            let remaining = self.kernel.pop();
            self.kernel.pop(); // addr after conversion, unused on success path
            let ud = self.kernel.pop();
            if remaining == 0 {
                self.kernel.push(if negative { -ud } else { ud });
                self.kernel.push(TRUE);
            } else {
                self.kernel.push(addr as i64);
                self.kernel.push(FALSE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::ForthRuntime;

    #[test]
    fn dot_prints_decimal() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push(49);
        rt.f_dot();
    }

    #[test]
    fn pictured_round_trip_small_number() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.f_less_num();
        rt.kernel.push(49);
        rt.f_nums();
        rt.kernel.push(0);
        rt.f_num_greater();
        let len = rt.kernel.pop() as usize;
        let addr = rt.kernel.pop() as usize;
        assert_eq!(rt.kernel.string_slice(addr, len), "49");
    }

    #[test]
    fn q_number_parses_negative() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let addr = rt.kernel.string_new("-42");
        rt.kernel.push(addr as i64 + 1);
        rt.kernel.push(3);
        rt.f_q_number();
        assert_eq!(rt.kernel.pop(), crate::runtime::TRUE);
        assert_eq!(rt.kernel.pop(), -42);
    }

    #[test]
    fn q_number_rejects_non_numeric() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let addr = rt.kernel.string_new("FOO");
        rt.kernel.push(addr as i64 + 1);
        rt.kernel.push(3);
        rt.f_q_number();
        assert_eq!(rt.kernel.pop(), crate::runtime::FALSE);
    }

    #[test]
    fn hex_base_parses_hex_digits() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.set(rt.base_ptr, 16);
        let addr = rt.kernel.string_new("FF");
        rt.kernel.push(addr as i64 + 1);
        rt.kernel.push(2);
        rt.f_q_number();
        assert_eq!(rt.kernel.pop(), crate::runtime::TRUE);
        assert_eq!(rt.kernel.pop(), 255);
    }
}
