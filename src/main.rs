use lc3_vm::config::{Config, USAGE};
use lc3_vm::host::{RawModeGuard, TerminalIo};
use lc3_vm::{execute, load, RunError, StopReason};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    let config = match Config::with(&args) {
        Ok(config) => config,
        Err(_) => {
            println!("{}", USAGE);
            process::exit(2);
        }
    };

    // Load every image, and only then take the terminal into raw mode,
    // matching the Driver's documented setup order (load, set entry
    // point, acquire the Host facade).
    let mut vm = match load(&config.image_paths, Box::new(TerminalIo::new())) {
        Ok(vm) => vm,
        Err(RunError::Load { path, .. }) => {
            println!("failed to load image: {}", path);
            process::exit(1);
        }
        Err(RunError::IllegalOpcode(_)) => {
            unreachable!("loading images cannot produce an illegal-opcode error")
        }
    };

    let raw_mode = RawModeGuard::acquire().unwrap_or_else(|err| {
        println!("failed to configure terminal: {}", err);
        process::exit(1);
    });

    // Every exit path below bypasses normal unwinding (`process::exit`,
    // `process::abort`), so `raw_mode` is dropped explicitly first to
    // guarantee the terminal is restored before the process ends.
    match execute(&mut vm) {
        Ok(StopReason::Halted) => {
            drop(raw_mode);
            process::exit(0);
        }
        Err(RunError::IllegalOpcode(_)) => {
            drop(raw_mode);
            println!("ABORTING...");
            process::abort();
        }
        Err(RunError::Load { .. }) => {
            unreachable!("the fetch-execute loop cannot produce a load error")
        }
    }
}
