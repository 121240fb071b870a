pub mod config;
pub mod cpu;
pub mod host;
pub mod image_loader;
pub mod instruction;
pub mod memory;
pub mod registers;
pub mod sign_extend;
pub mod trap;
pub mod vm;

pub use config::Config;
pub use vm::{StopReason, Vm};

use std::fmt;

/// Everything that can stop a run before the interpreter itself decides
/// to halt. The driver (`main.rs`) maps each variant to the exit-code
/// contract in the spec's external interfaces.
#[derive(Debug)]
pub enum RunError {
    Load {
        path: String,
        source: std::io::Error,
    },
    IllegalOpcode(cpu::VmError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Load { path, source } => {
                write!(f, "failed to load image {}: {}", path, source)
            }
            RunError::IllegalOpcode(cpu::VmError::IllegalOpcode(reason)) => {
                write!(f, "illegal opcode: {}", reason)
            }
        }
    }
}

impl std::error::Error for RunError {}

/// Loads every image in `image_paths`, in order, and sets the
/// conventional entry point. Split from [`execute`] so the driver can
/// acquire the Host facade's raw-mode guard only after loading has
/// succeeded, per the Driver's documented setup order: load images,
/// set `PC`/`COND`, *then* take the terminal into raw mode.
pub fn load(image_paths: &[String], io: Box<dyn host::Io>) -> Result<Vm, RunError> {
    let mut vm = Vm::new(io);

    for path in image_paths {
        vm.load_image(path).map_err(|source| RunError::Load {
            path: path.clone(),
            source,
        })?;
    }

    vm.reset_entry_point();

    Ok(vm)
}

/// Runs the fetch-execute loop to completion.
pub fn execute(vm: &mut Vm) -> Result<StopReason, RunError> {
    vm.run().map_err(RunError::IllegalOpcode)
}
