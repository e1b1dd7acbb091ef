//! A fixed capacity, stack allocated byte buffer holding a C string.
//!
//! Writes come in two flavours: [`StackBuf::copy_checked`] refuses anything that does not
//! fit together with its NUL terminator, [`StackBuf::copy_unchecked`] is the `gets(3)`
//! behaviour and writes as many bytes as it is handed, wherever they land.

use core::{ffi::CStr, fmt, ptr, str::FromStr};

use crate::Error;

/// How writes into a [`StackBuf`] are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum BoundsMode {
    /// Refuse oversized writes with [`Error::BoundsViolation`] (protections on)
    Checked,
    /// Write past the end of the buffer (protections off)
    Unchecked,
}

impl BoundsMode {
    /// Name as accepted on the command line and in the environment
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checked => "checked",
            Self::Unchecked => "unchecked",
        }
    }
}

impl fmt::Display for BoundsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checked" | "on" => Ok(Self::Checked),
            "unchecked" | "off" => Ok(Self::Unchecked),
            other => Err(Error::illegal_argument(format!(
                "unknown bounds mode `{other}`, expected `checked` or `unchecked`"
            ))),
        }
    }
}

/// Copy `src` followed by a NUL terminator to `dst`, `gets(3)` style.
///
/// Returns the number of bytes copied, excluding the terminator.
///
/// # Safety
/// `dst` must be valid for writes of `src.len() + 1` bytes and must not overlap `src`.
/// Nothing here checks that, which is the point.
pub unsafe fn copy_unchecked_raw(dst: *mut u8, src: &[u8]) -> usize {
    ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
    dst.add(src.len()).write(0);
    src.len()
}

/// `N` bytes on the stack, interpreted as a NUL terminated string.
#[derive(Clone)]
#[repr(transparent)]
pub struct StackBuf<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> Default for StackBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for StackBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackBuf")
            .field("capacity", &N)
            .field("contents", &String::from_utf8_lossy(self.as_c_bytes()))
            .finish()
    }
}

impl<const N: usize> StackBuf<N> {
    /// A zeroed buffer
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: [0; N] }
    }

    /// Declared capacity in bytes, terminator included
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Copy `src` and a NUL terminator, refusing anything of `N` bytes or more.
    ///
    /// Returns the number of bytes stored, excluding the terminator.
    pub fn copy_checked(&mut self, src: &[u8]) -> Result<usize, Error> {
        if src.len() >= N {
            return Err(Error::bounds_violation(src.len(), N));
        }
        self.bytes[..src.len()].copy_from_slice(src);
        self.bytes[src.len()] = 0;
        Ok(src.len())
    }

    /// Copy `src` and a NUL terminator without looking at the capacity.
    ///
    /// Returns the number of bytes stored, excluding the terminator.
    ///
    /// # Safety
    /// `src.len() + 1` bytes are written starting at the first byte of this buffer.
    /// Anything beyond `N` overwrites whatever follows the buffer in memory. The caller
    /// must either keep `src.len() < N`, or own the memory directly behind the buffer.
    pub unsafe fn copy_unchecked(&mut self, src: &[u8]) -> usize {
        copy_unchecked_raw(self.bytes.as_mut_ptr(), src)
    }

    /// Copy `src` the way `mode` prescribes.
    ///
    /// # Safety
    /// With [`BoundsMode::Unchecked`] this is [`StackBuf::copy_unchecked`] and carries its
    /// safety contract. [`BoundsMode::Checked`] is always safe.
    pub unsafe fn copy_with(&mut self, src: &[u8], mode: BoundsMode) -> Result<usize, Error> {
        match mode {
            BoundsMode::Checked => self.copy_checked(src),
            BoundsMode::Unchecked => Ok(self.copy_unchecked(src)),
        }
    }

    /// Contents up to the first NUL, never reading past the declared capacity
    #[must_use]
    pub fn as_c_bytes(&self) -> &[u8] {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        &self.bytes[..end]
    }

    /// Contents up to the first NUL, wherever it is, like `printf("%s")`.
    ///
    /// # Safety
    /// A NUL must exist at or after the start of the buffer within memory that is readable,
    /// which holds after any completed [`StackBuf::copy_unchecked`] as long as the bytes behind
    /// the buffer were not overwritten again since.
    #[must_use]
    pub unsafe fn as_c_str_unbounded(&self) -> &CStr {
        CStr::from_ptr(self.bytes.as_ptr().cast())
    }
}
