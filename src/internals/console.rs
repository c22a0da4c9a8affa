//! Everything that talks to the outside world: character I/O, the nested INCLUDE-FILE reader
//! stack, the OPEN-FILE/CLOSE-FILE file table, and shelling out via `(system)`.
//!
//! Input and output both go through `Msg`-reported errors rather than panics: a missing file or
//! a failed write aborts the word that asked for it, it doesn't bring the interpreter down.

use std::io::{self, Write};
use std::process::Command;

use crate::internals::files::{FType, FileHandle, FileMode};
use crate::runtime::{ForthRuntime, FALSE, TRUE};

impl ForthRuntime {
    /// `(emit)` ( c -- ) writes one character to stdout.
    pub fn f_emit_p(&mut self) {
        if self.kernel.stack_check(1, "(emit)") {
            let c = (self.kernel.pop() % 128) as u8 as char;
            print!("{c}");
        }
    }

    /// `flush` ( -- ) forces buffered stdout out immediately, so a prompt appears before the next
    /// blocking read.
    pub fn f_flush(&mut self) {
        if let Err(e) = io::stdout().flush() {
            self.msg.error("flush", &e.to_string(), None::<bool>);
        }
    }

    /// `key` ( -- c ) blocks until a character is available and returns it. Always reads the real
    /// stdin, regardless of the active INCLUDE-FILE source, since a file has no "next key typed".
    pub fn f_key(&mut self) {
        match self.reader.first().and_then(|r| r.read_char()) {
            Some(c) => self.kernel.push(c as i64),
            None => self.kernel.push(0),
        }
    }

    /// `key?` ( -- flag ) true if a keypress is waiting without blocking for it. Only meaningful
    /// in raw mode (see `internals::terminal::key_available`); otherwise always false.
    pub fn f_key_q(&mut self) {
        match crate::internals::terminal::key_available() {
            Ok(true) => self.kernel.push(TRUE),
            Ok(false) => self.kernel.push(FALSE),
            Err(e) => {
                self.msg.error("key?", &e.to_string(), None::<bool>);
                self.kernel.push(FALSE);
            }
        }
    }

    /// `include-file` ( addr -- ) pushes a new reader onto the nested-source stack, pointing at
    /// the named file, then loops QUERY/INTERPRET over it until EOF, popping the reader again.
    /// `addr` is a counted string holding the path.
    pub fn f_include_file(&mut self) {
        if !self.kernel.stack_check(1, "include-file") {
            return;
        }
        let addr = self.kernel.pop() as usize;
        let path_str = self.kernel.string_get(addr);
        let path = std::path::PathBuf::from(&path_str);
        match FileHandle::new_file(Some(&path), self.msg.clone(), FileMode::RO) {
            Some(handle) => {
                self.reader.push(handle);
                loop {
                    let line = self.reader.last_mut().and_then(|r| r.get_line());
                    match line {
                        Some(line) => {
                            let addr = self.kernel.string_new(&line) + 1;
                            self.kernel.push(addr as i64);
                            self.kernel.push(line.len() as i64);
                            self.f_evaluate();
                            if self.get_abort_flag() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                self.reader.pop();
            }
            None => self.msg.error("include-file", "unable to open file", Some(path_str)),
        }
    }

    /// `open-file` ( addr len fam -- id ior ) opens the file named by the raw string at
    /// `addr len`. `fam`: 0 read-only, 1 write-only, -1 read-write. `ior` is 0 on success.
    pub fn f_open_file(&mut self) {
        if !self.kernel.stack_check(3, "open-file") {
            return;
        }
        let fam = self.kernel.pop();
        let len = self.kernel.pop() as usize;
        let addr = self.kernel.pop() as usize;
        let path_str = self.kernel.string_slice(addr, len);
        let path = std::path::PathBuf::from(path_str);
        let mode = match fam {
            -1 => FileMode::RW,
            1 => FileMode::WO,
            _ => FileMode::RO,
        };
        match FileHandle::new_file(Some(&path), self.msg.clone(), mode) {
            Some(handle) => {
                self.files.push(Some(handle));
                self.kernel.push((self.files.len() - 1) as i64);
                self.kernel.push(0);
            }
            None => {
                self.kernel.push(0);
                self.kernel.push(TRUE);
            }
        }
    }

    /// `close-file` ( id -- ior ) releases the file handle; `id` may not be reused.
    pub fn f_close_file(&mut self) {
        if !self.kernel.stack_check(1, "close-file") {
            return;
        }
        let id = self.kernel.pop() as usize;
        match self.files.get_mut(id) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.kernel.push(0);
            }
            _ => {
                self.msg.error("close-file", "invalid file id", Some(id));
                self.kernel.push(TRUE);
            }
        }
    }

    /// `read-line` ( addr len id -- len2 flag ior ) reads one line into the buffer at `addr`,
    /// truncated to `len` bytes. `flag` is false at end of file.
    pub fn f_read_line(&mut self) {
        if !self.kernel.stack_check(3, "read-line") {
            return;
        }
        let id = self.kernel.pop() as usize;
        let max_len = self.kernel.pop() as usize;
        let addr = self.kernel.pop() as usize;
        match self.files.get_mut(id) {
            Some(Some(handle)) => match handle.get_line() {
                Some(line) => {
                    let bytes = line.as_bytes();
                    let n = bytes.len().min(max_len);
                    for (i, b) in bytes[..n].iter().enumerate() {
                        self.kernel.byte_set(addr + i, *b);
                    }
                    self.kernel.push(n as i64);
                    self.kernel.push(TRUE);
                    self.kernel.push(0);
                }
                None => {
                    self.kernel.push(0);
                    self.kernel.push(FALSE);
                    self.kernel.push(0);
                }
            },
            _ => {
                self.msg.error("read-line", "invalid file id", Some(id));
                self.kernel.push(0);
                self.kernel.push(FALSE);
                self.kernel.push(TRUE);
            }
        }
    }

    /// `write-line` ( addr len id -- ior ) writes the string plus a newline to the file.
    pub fn f_write_line(&mut self) {
        if !self.kernel.stack_check(3, "write-line") {
            return;
        }
        let id = self.kernel.pop() as usize;
        let len = self.kernel.pop() as usize;
        let addr = self.kernel.pop() as usize;
        let line = self.kernel.string_slice(addr, len);
        match self.files.get_mut(id) {
            Some(Some(handle)) => match &mut handle.source {
                FType::File(f) => {
                    let result = writeln!(f, "{line}");
                    self.kernel.push(if result.is_ok() { 0 } else { TRUE });
                }
                _ => {
                    self.msg.error("write-line", "file not open for writing", Some(id));
                    self.kernel.push(TRUE);
                }
            },
            _ => {
                self.msg.error("write-line", "invalid file id", Some(id));
                self.kernel.push(TRUE);
            }
        }
    }

    /// `file-position` ( id -- u ior )
    pub fn f_file_position(&mut self) {
        if !self.kernel.stack_check(1, "file-position") {
            return;
        }
        let id = self.kernel.pop() as usize;
        match self.files.get(id) {
            Some(Some(handle)) => {
                self.kernel.push(handle.file_position() as i64);
                self.kernel.push(0);
            }
            _ => {
                self.msg.error("file-position", "invalid file id", Some(id));
                self.kernel.push(0);
                self.kernel.push(TRUE);
            }
        }
    }

    /// `file-size` ( id -- u ior )
    pub fn f_file_size(&mut self) {
        if !self.kernel.stack_check(1, "file-size") {
            return;
        }
        let id = self.kernel.pop() as usize;
        match self.files.get(id) {
            Some(Some(handle)) => {
                self.kernel.push(handle.file_size() as i64);
                self.kernel.push(0);
            }
            _ => {
                self.msg.error("file-size", "invalid file id", Some(id));
                self.kernel.push(0);
                self.kernel.push(TRUE);
            }
        }
    }

    /// `(system)` ( addr len -- ) runs a string as a shell command, discarding its exit status
    /// beyond a warning on failure to even launch it.
    pub fn f_system_p(&mut self) {
        if !self.kernel.stack_check(2, "(system)") {
            return;
        }
        let len = self.kernel.pop() as usize;
        let addr = self.kernel.pop() as usize;
        let cmd = self.kernel.string_slice(addr, len);
        match Command::new("sh").arg("-c").arg(&cmd).status() {
            Ok(_) => {}
            Err(e) => self.msg.error("(system)", &e.to_string(), Some(cmd)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ForthRuntime;

    #[test]
    fn emit_and_flush_do_not_panic() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push('A' as i64);
        rt.f_emit_p();
        rt.f_flush();
    }

    #[test]
    fn key_q_is_false_outside_raw_mode() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.f_key_q();
        assert_eq!(rt.kernel.pop(), FALSE);
    }

    #[test]
    fn open_file_reports_error_for_missing_path() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let path = "/nonexistent/path/for/this/test.fs";
        let addr = rt.kernel.string_new(path) + 1;
        rt.kernel.push(addr as i64);
        rt.kernel.push(path.len() as i64);
        rt.kernel.push(0);
        rt.f_open_file();
        let ior = rt.kernel.pop();
        rt.kernel.pop();
        assert_eq!(ior, TRUE);
    }

    #[test]
    fn close_file_rejects_unknown_id() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push(99);
        rt.f_close_file();
        assert_eq!(rt.kernel.pop(), TRUE);
    }

    #[test]
    fn file_position_rejects_unknown_id() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push(7);
        rt.f_file_position();
        assert_eq!(rt.kernel.pop(), TRUE);
        assert_eq!(rt.kernel.pop(), 0);
    }

    #[test]
    fn system_runs_a_trivial_command() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let cmd = "true";
        let addr = rt.kernel.string_new(cmd) + 1;
        rt.kernel.push(addr as i64);
        rt.kernel.push(cmd.len() as i64);
        rt.f_system_p();
    }
}
