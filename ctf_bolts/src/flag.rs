//! Flag disclosure: open the flag file, read one line, print it, close it.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, Read, Write},
    path::Path,
};

use crate::Error;

/// The default flag location, relative to the working directory
pub const FLAG_FILE: &str = "flag.txt";

/// Size of the line buffer the flag is read into, terminator included.
/// At most `FLAG_LINE_MAX - 1` bytes of the first line are kept.
pub const FLAG_LINE_MAX: usize = 256;

/// Printed before the flag line
pub const CONGRATULATIONS: &str = "Congratulations! Here's your flag:\n";

/// The first line of a flag file, newline included if it fit.
#[derive(Clone, PartialEq, Eq)]
pub struct Flag {
    line: Vec<u8>,
}

impl Flag {
    /// Raw bytes as read
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.line
    }

    /// Number of bytes read
    #[must_use]
    pub fn len(&self) -> usize {
        self.line.len()
    }

    /// Never true for a flag returned by [`read_flag`]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.line))
    }
}

// Flags are secrets, keep them out of debug logs
impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag").field("len", &self.line.len()).finish()
    }
}

/// What [`print_flag`] ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disclosure {
    /// The flag file could not be opened, an error message was printed
    Missing,
    /// The file was opened but no line could be read, nothing was printed
    Empty,
    /// The flag was printed
    Revealed,
}

/// Read up to [`FLAG_LINE_MAX`]` - 1` bytes of the first line from `reader`.
///
/// `None` if nothing could be read.
pub fn read_flag_line<R>(reader: R) -> Option<Flag>
where
    R: Read,
{
    let mut line = Vec::with_capacity(FLAG_LINE_MAX);
    let mut limited = BufReader::new(reader.take((FLAG_LINE_MAX - 1) as u64));
    match limited.read_until(b'\n', &mut line) {
        Ok(0) => None,
        Ok(_) => Some(Flag { line }),
        Err(err) => {
            log::warn!("Reading the flag failed: {err}");
            None
        }
    }
}

/// Open the flag file at `path` and read its first line.
///
/// The file is closed before this returns, whatever happened.
pub fn read_flag<P>(path: P) -> Result<Option<Flag>, Error>
where
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    Ok(read_flag_line(file))
}

/// Disclose the flag at `path` on `out`.
///
/// A missing file is reported on `out` and is not an error; only failing to write is.
pub fn print_flag<P, W>(path: P, out: &mut W) -> Result<Disclosure, Error>
where
    P: AsRef<Path>,
    W: Write,
{
    let path = path.as_ref();
    let flag = match read_flag(path) {
        Ok(Some(flag)) => flag,
        Ok(None) => {
            log::debug!("Flag file {} is empty", path.display());
            return Ok(Disclosure::Empty);
        }
        Err(Error::File(err, _)) => {
            log::info!("Could not open flag file {}: {err}", path.display());
            out.write_all(format!("Error: Could not open {}\n", path.display()).as_bytes())?;
            return Ok(Disclosure::Missing);
        }
        Err(err) => return Err(err),
    };

    let mut message = Vec::with_capacity(CONGRATULATIONS.len() + flag.len() + 1);
    message.extend_from_slice(CONGRATULATIONS.as_bytes());
    message.extend_from_slice(flag.as_bytes());
    message.push(b'\n');
    out.write_all(&message)?;
    out.flush()?;

    log::info!("Disclosed the flag from {}", path.display());
    Ok(Disclosure::Revealed)
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Cursor, path::PathBuf};

    use super::*;
    use crate::fs::{get_unique_scratch_dir, write_file_atomic};

    fn scratch(name: &str) -> PathBuf {
        let dir = get_unique_scratch_dir(name).unwrap();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_prints_exact_error() {
        let mut out = Vec::new();
        let outcome = print_flag(FLAG_FILE, &mut out);
        // The test runs in the crate directory, which has no flag file
        assert_eq!(outcome.unwrap(), Disclosure::Missing);
        assert_eq!(out, b"Error: Could not open flag.txt\n");
    }

    #[test]
    fn flag_is_printed_verbatim() {
        let dir = scratch("flag_verbatim");
        let path = dir.join(FLAG_FILE);
        write_file_atomic(&path, b"TEST{flag}\n").unwrap();

        let mut out = Vec::new();
        assert_eq!(print_flag(&path, &mut out).unwrap(), Disclosure::Revealed);
        assert_eq!(
            out,
            b"Congratulations! Here's your flag:\nTEST{flag}\n\n".to_vec()
        );

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn empty_file_prints_nothing() {
        let dir = scratch("flag_empty");
        let path = dir.join(FLAG_FILE);
        write_file_atomic(&path, b"").unwrap();

        let mut out = Vec::new();
        assert_eq!(print_flag(&path, &mut out).unwrap(), Disclosure::Empty);
        assert!(out.is_empty());
        assert!(read_flag(&path).unwrap().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn only_the_first_line_is_read() {
        let flag = read_flag_line(Cursor::new(b"CTF{one}\nCTF{two}\n".to_vec())).unwrap();
        assert_eq!(flag.as_bytes(), b"CTF{one}\n");
    }

    #[test]
    fn long_lines_are_truncated() {
        let data = vec![b'x'; 1000];
        let flag = read_flag_line(Cursor::new(data)).unwrap();
        assert_eq!(flag.len(), FLAG_LINE_MAX - 1);
    }

    #[test]
    fn missing_file_is_an_error_for_read_flag() {
        let err = read_flag("definitely/not/here/flag.txt").unwrap_err();
        assert!(matches!(err, Error::File(..)));
    }

    #[test]
    fn print_flag_discloses_what_read_flag_reads() {
        let dir = scratch("flag_read_once");
        let path = dir.join(FLAG_FILE);
        let mut data = vec![b'y'; 2 * FLAG_LINE_MAX];
        data.extend_from_slice(b"\nsecond line\n");
        write_file_atomic(&path, &data).unwrap();

        let flag = read_flag(&path).unwrap().unwrap();
        let mut out = Vec::new();
        assert_eq!(print_flag(&path, &mut out).unwrap(), Disclosure::Revealed);

        let mut want = CONGRATULATIONS.as_bytes().to_vec();
        want.extend_from_slice(flag.as_bytes());
        want.push(b'\n');
        assert_eq!(out, want);
        assert_eq!(flag.len(), FLAG_LINE_MAX - 1);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn debug_output_hides_the_flag() {
        let flag = read_flag_line(Cursor::new(b"SECRET{x}".to_vec())).unwrap();
        assert!(!format!("{flag:?}").contains("SECRET"));
        assert_eq!(flag.to_string(), "SECRET{x}");
    }
}
