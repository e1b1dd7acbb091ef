//! Filesystem helpers for payload files and scratch directories

use std::{
    env,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{current_time, Error};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[must_use]
/// Derives a scratch directory path under the system temp dir that is unique to this process
/// and call. The directory is not created.
pub fn get_unique_scratch_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!(
        "ctf_{}_{}_{}_{}",
        name,
        std::process::id(),
        current_time().as_nanos(),
        SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Like [`get_unique_scratch_path`], but fails if the path is already taken
pub fn get_unique_scratch_dir(name: &str) -> Result<PathBuf, Error> {
    let path = get_unique_scratch_path(name);
    if path.exists() {
        return Err(Error::illegal_state(format!(
            "scratch path {} already exists",
            path.display()
        )));
    }
    Ok(path)
}

/// Write a file atomically
///
/// Creates a `.{file_name}.tmp` file, and writes all bytes to it.
/// After all bytes have been written, the tmp-file is moved to it's original `path`.
/// This way, on the majority of operating systems, the final file will never be incomplete
/// or racey.
/// It will overwrite existing files with the same filename.
///
/// # Errors
/// Can error if the file doesn't exist, or if the `.{file-name}.tmp` file already exists.
pub fn write_file_atomic<P>(path: P, bytes: &[u8]) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    fn inner(path: &Path, bytes: &[u8]) -> Result<(), Error> {
        let Some(file_name) = path.file_name() else {
            return Err(Error::illegal_argument(format!(
                "{} does not name a file",
                path.display()
            )));
        };
        let mut tmpfile_name = path.to_path_buf();
        tmpfile_name.set_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

        let mut tmpfile = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmpfile_name)?;

        tmpfile.write_all(bytes)?;
        fs::rename(&tmpfile_name, path)?;
        Ok(())
    }
    inner(path.as_ref(), bytes)
}
