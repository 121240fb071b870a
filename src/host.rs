//! The Host facade (C6): the terminal collaborator the core consumes
//! through a trait boundary instead of calling `std::io::stdin()` directly.

use lazy_static::lazy_static;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, SetArg, Termios};
use nix::sys::{
    select::{select, FdSet},
    time::{TimeVal, TimeValLike},
};
use std::io::{self, Read, Write};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const STDIN_FD: RawFd = 0;

/// The byte I/O contract C2 (MMIO) and C5 (TRAP) consume. `TerminalIo`
/// backs it with the real terminal; `MockIo` backs it with in-memory
/// buffers for tests.
pub trait Io {
    /// Nonblocking: is at least one byte pending on stdin?
    fn key_available(&mut self) -> bool;

    /// Blocking read of a single byte, zero-extended to 16 bits. On EOF
    /// returns `0xFFFF`, mirroring C's `getchar()` returning `EOF` (-1)
    /// truncated into an unsigned 16-bit register.
    fn read_char(&mut self) -> io::Result<u16>;

    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

pub struct TerminalIo;

impl TerminalIo {
    pub fn new() -> Self {
        TerminalIo
    }
}

impl Io for TerminalIo {
    fn key_available(&mut self) -> bool {
        let mut readfds = FdSet::new();
        readfds.insert(STDIN_FD);

        match select(None, &mut readfds, None, None, &mut TimeVal::zero()) {
            Ok(count) => count == 1,
            Err(_) => false,
        }
    }

    fn read_char(&mut self) -> io::Result<u16> {
        let mut buffer = [0u8; 1];
        match io::stdin().read(&mut buffer)? {
            0 => Ok(0xFFFF),
            _ => Ok(u16::from(buffer[0])),
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        io::stdout().write_all(&[byte])
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

lazy_static! {
    static ref ORIGINAL_TERMIOS: Mutex<Option<Termios>> = Mutex::new(None);
}

/// Scoped acquisition of raw terminal mode. Released on `Drop`, and also
/// released from the `SIGINT` handler installed at acquisition time, so
/// every exit path (`HALT`, illegal-opcode abort, `SIGINT`) restores the
/// terminal exactly once.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn acquire() -> nix::Result<Self> {
        let original = termios::tcgetattr(STDIN_FD)?;
        *ORIGINAL_TERMIOS.lock().unwrap() = Some(original);

        let mut raw = termios::tcgetattr(STDIN_FD)?;
        raw.local_flags &= !(termios::LocalFlags::ICANON | termios::LocalFlags::ECHO);
        termios::tcsetattr(STDIN_FD, SetArg::TCSANOW, &raw)?;

        let action = SigAction::new(
            SigHandler::Handler(handle_sigint),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe {
            sigaction(Signal::SIGINT, &action)?;
        }

        Ok(RawModeGuard { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    if let Some(original) = ORIGINAL_TERMIOS.lock().unwrap().take() {
        let _ = termios::tcsetattr(STDIN_FD, SetArg::TCSANOW, &original);
    }
}

extern "C" fn handle_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    restore_terminal();
    std::process::exit(130);
}

/// In-memory `Io` double for tests: reads come from a fixed input
/// buffer, writes accumulate in an output buffer.
#[cfg(test)]
pub struct MockIo {
    input: std::collections::VecDeque<u8>,
    pub output: Vec<u8>,
    pub key_available: bool,
}

#[cfg(test)]
impl MockIo {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
            key_available: false,
        }
    }
}

#[cfg(test)]
impl Io for MockIo {
    fn key_available(&mut self) -> bool {
        self.key_available
    }

    fn read_char(&mut self) -> io::Result<u16> {
        match self.input.pop_front() {
            Some(byte) => Ok(u16::from(byte)),
            None => Ok(0xFFFF),
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
