//! Binary entrypoint for the chatshelf terminal front end.

use std::process::ExitCode;

use chatshelf::start_chatshelf;

/// Load the configuration, open the store and chat on stdin/stdout.
fn main() -> ExitCode {
    start_chatshelf::run()
}
