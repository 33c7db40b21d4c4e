//! Solace relay binary.
//! Run with: cargo run --bin solace-relay

use std::process::ExitCode;

use solace_chat::start_solace_relay;

fn main() -> ExitCode {
    start_solace_relay::run()
}
