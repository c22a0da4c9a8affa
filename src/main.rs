//! A small self-hosted Forth for 32-bit microcontrollers, running here as a native interactive
//! interpreter. `main` wires `Config` to a `ForthRuntime`: parse arguments, bring the dictionary
//! up, optionally load a core library and a source file, then hand control to `QUIT`.

mod config;
mod internals;
mod kernel;
mod runtime;

use config::Config;
use runtime::ForthRuntime;

fn main() {
    let mut config = Config::new();
    config.process_args();

    let mut runtime = ForthRuntime::new();
    runtime.msg.set_level(config.debug_level);
    runtime.cold_start();

    if !config.no_core && std::path::Path::new(&config.core_file).exists() {
        let addr = runtime.kernel.string_new(&config.core_file);
        runtime.kernel.push(addr as i64);
        runtime.f_include_file();
    }

    if !config.loaded_file.is_empty() {
        let addr = runtime.kernel.string_new(&config.loaded_file);
        runtime.kernel.push(addr as i64);
        runtime.f_include_file();
    }

    if config.run {
        runtime.f_quit();
    }
}
