//! Command-line configuration: parses process arguments with `argh` into a `Config` the rest of
//! the binary reads from after `cold_start`.

use argh::FromArgs;

use crate::internals::messages::DebugLevel;

pub const VERSION: &str = "0.1.0";
pub const DEFAULT_CORE: &str = "./corelib.fs";

/// a small Forth interpreter
#[derive(FromArgs)]
struct Args {
    /// diagnostic verbosity: error, warning, info, or debug (default error)
    #[argh(option)]
    debuglevel: Option<String>,

    /// path to a core Forth library to INCLUDE-FILE at startup
    #[argh(option, short = 'l')]
    library: Option<String>,

    /// a source file to load and run instead of an interactive prompt
    #[argh(option, short = 'f')]
    file: Option<String>,

    /// skip loading the core library
    #[argh(switch, short = 'n')]
    nocore: bool,
}

pub struct Config {
    pub debug_level: DebugLevel,
    pub loaded_file: String,
    pub core_file: String,
    pub no_core: bool,
    pub run: bool,
}

impl Config {
    pub fn new() -> Config {
        Config {
            debug_level: DebugLevel::Error,
            loaded_file: String::new(),
            core_file: DEFAULT_CORE.to_owned(),
            no_core: false,
            run: true,
        }
    }

    /// Parses `std::env::args`, populating `self`. Unrecognized flags or `--help` print usage and
    /// exit the process, matching `argh`'s standard behavior.
    pub fn process_args(&mut self) -> &Config {
        let args: Args = argh::from_env();

        if let Some(level) = args.debuglevel {
            self.debug_level = match level.as_str() {
                "debug" => DebugLevel::Debug,
                "info" => DebugLevel::Info,
                "warning" => DebugLevel::Warning,
                _ => DebugLevel::Error,
            };
        }

        if let Some(library) = args.library {
            self.core_file = library;
        }

        if let Some(file) = args.file {
            self.loaded_file = file;
        }

        self.no_core = args.nocore;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
