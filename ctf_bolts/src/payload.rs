//! Reference payloads for the overflow: padding up to the saved return address,
//! followed by a chain of little-endian 64 bit words.

use crate::Error;

/// Default padding byte
pub const DEFAULT_PAD: u8 = b'A';

/// Parses `0x1234` or `1234` as a hex address
pub fn parse_address(src: &str) -> Result<u64, Error> {
    let digits = src
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    if digits.is_empty() {
        return Err(Error::illegal_argument(format!(
            "`{src}` is not a hex address"
        )));
    }
    Ok(u64::from_str_radix(digits, 16)?)
}

/// Builds overflow payloads.
///
/// ```
/// use ctf_bolts::payload::PayloadBuilder;
///
/// let payload = PayloadBuilder::new(72).word(0x401196).build().unwrap();
/// assert_eq!(payload.len(), 80);
/// assert_eq!(&payload[72..], &0x401196_u64.to_le_bytes());
/// ```
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    offset: usize,
    pad: u8,
    chain: Vec<u64>,
    newline: bool,
}

impl PayloadBuilder {
    /// `offset` padding bytes before the first word
    #[must_use]
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            pad: DEFAULT_PAD,
            chain: Vec::new(),
            newline: false,
        }
    }

    /// Byte used for padding
    #[must_use]
    pub fn pad(mut self, pad: u8) -> Self {
        self.pad = pad;
        self
    }

    /// Append a word to the chain
    #[must_use]
    pub fn word(mut self, word: u64) -> Self {
        self.chain.push(word);
        self
    }

    /// Append several words to the chain
    #[must_use]
    pub fn words<I>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        self.chain.extend(words);
        self
    }

    /// Terminate the payload with `\n`, ending the target's line read
    #[must_use]
    pub fn newline(mut self, newline: bool) -> Self {
        self.newline = newline;
        self
    }

    /// Assemble the payload bytes.
    ///
    /// The line read stops at the first `\n`, so a newline in the padding is refused.
    /// A newline inside a chain word only gets a warning, since that may be intended.
    pub fn build(&self) -> Result<Vec<u8>, Error> {
        if self.pad == b'\n' {
            return Err(Error::illegal_argument(
                "padding with `\\n` would end the line read before the overflow",
            ));
        }

        let mut payload = Vec::with_capacity(self.offset + self.chain.len() * 8 + 1);
        payload.resize(self.offset, self.pad);
        for (idx, word) in self.chain.iter().enumerate() {
            let bytes = word.to_le_bytes();
            if bytes.contains(&b'\n') {
                log::warn!("Chain word {idx} ({word:#x}) contains a newline byte and will be cut");
            }
            payload.extend_from_slice(&bytes);
        }
        if self.newline {
            payload.push(b'\n');
        }
        log::debug!(
            "Built a {} byte payload: {} padding, {} words",
            payload.len(),
            self.offset,
            self.chain.len()
        );
        Ok(payload)
    }
}
