//! Process stdin/stdout, with the buffering configured once at startup.
//!
//! After [`disable_buffering`], every [`Console`] write is a single `write(2)` on fd 1 and
//! every [`ConsoleIn`] read is a single `read(2)` on fd 0, so a prompt is on the terminal
//! before the process blocks, and no input beyond the current line is consumed.

use std::{
    io::{self, Read, Write},
    os::fd::AsFd,
    sync::OnceLock,
};

use crate::Error;

/// Set once by [`disable_buffering`], never cleared.
static UNBUFFERED: OnceLock<()> = OnceLock::new();

/// Switch stdin and stdout to unbuffered mode for the rest of the process.
///
/// Calling this twice is an [`Error::IllegalState`]: buffering is startup configuration.
pub fn disable_buffering() -> Result<(), Error> {
    UNBUFFERED
        .set(())
        .map_err(|()| Error::illegal_state("stream buffering has already been configured"))?;
    log::debug!("stdin and stdout are now unbuffered");
    Ok(())
}

/// Whether [`disable_buffering`] has run in this process
#[must_use]
pub fn is_unbuffered() -> bool {
    UNBUFFERED.get().is_some()
}

/// Standard output, honouring the process-wide buffering mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Console {
    /// Handle to standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self
    }
}

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if is_unbuffered() {
            let stdout = io::stdout();
            Ok(nix::unistd::write(stdout.as_fd(), buf)?)
        } else {
            io::stdout().write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Nothing is held back in unbuffered mode, but std may still hold earlier output
        io::stdout().flush()
    }
}

/// Standard input, honouring the process-wide buffering mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleIn;

impl ConsoleIn {
    /// Handle to standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self
    }
}

impl Read for ConsoleIn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if is_unbuffered() {
            Ok(nix::unistd::read(libc::STDIN_FILENO, buf)?)
        } else {
            io::stdin().read(buf)
        }
    }
}

/// Read one line, byte by byte, up to `\n` or end of input.
///
/// The newline is consumed but not returned, like `gets(3)`. There is no length limit.
/// Returns `None` when end of input is reached before any byte was read.
pub fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, Error>
where
    R: Read,
{
    let mut line = Vec::new();
    let mut byte = [0_u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                return Ok(if line.is_empty() { None } else { Some(line) });
            }
            Ok(_) if byte[0] == b'\n' => return Ok(Some(line)),
            Ok(_) => line.push(byte[0]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}
