pub mod builtin;
pub mod compiler;
pub mod console;
pub mod debug;
pub mod dictionary;
pub mod files;
pub mod inner;
pub mod messages;
pub mod numeric;
pub mod primitives;
pub mod terminal;
pub mod tui;
