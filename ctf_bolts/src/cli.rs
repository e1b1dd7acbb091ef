//! Command line and environment configuration for the challenge and the solver.
//!
//! Options are parsed with `clap`; settings that deployments usually inject through the
//! container environment are filled in afterwards by [`parse_envs`]. A value given on the
//! command line always wins over the environment.
//!
//! ```ignore
//! use ctf_bolts::{cli::{parse_envs, ChallengeOptions}, stackbuf::BoundsMode};
//! use clap::Parser;
//!
//! let mut options = ChallengeOptions::parse();
//! let config = parse_envs(&mut options, BoundsMode::Checked)?;
//! log::info!("{config:?}");
//! ```

use std::{env, path::PathBuf};

use clap::Parser;

use crate::{
    flag::FLAG_FILE,
    payload::parse_address,
    stackbuf::BoundsMode,
    Error,
};

/// Overrides the bounds mode, `checked` or `unchecked`
pub const BOUNDS_ENV_VAR: &str = "CHALLENGE_BOUNDS";
/// Overrides the flag file location
pub const FLAG_FILE_ENV_VAR: &str = "CHALLENGE_FLAG_FILE";

/// helper function to go from a padding argument (`A`, or `0x41`) to the byte
fn parse_pad(src: &str) -> Result<u8, Error> {
    if src.len() > 2 && (src.starts_with("0x") || src.starts_with("0X")) {
        return Ok(u8::from_str_radix(&src[2..], 16)?);
    }
    match src.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(Error::illegal_argument(format!(
            "padding must be one ASCII character or a 0xNN byte, got `{src}`"
        ))),
    }
}

/// Options of the challenge binary
#[derive(Parser, Clone, Debug, Default)]
#[command(
    name = "challenge",
    about = "Stack buffer overflow CTF challenge",
    long_about = "Reads one line into a 64 byte stack buffer and echoes it. \
                  Built with the `unprotected` feature the copy is unchecked."
)]
pub struct ChallengeOptions {
    /// How the input line is copied into the stack buffer [env: CHALLENGE_BOUNDS]
    #[arg(short, long, value_enum)]
    pub bounds: Option<BoundsMode>,

    /// Where the flag is read from [env: CHALLENGE_FLAG_FILE] [default: flag.txt]
    #[arg(short, long, value_name = "PATH")]
    pub flag_file: Option<PathBuf>,

    /// Disclose the flag after the challenge ran, to verify a deployment
    #[arg(long)]
    pub check_flag: bool,
}

/// The resolved challenge configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeConfig {
    /// How the input line is copied into the stack buffer
    pub bounds: BoundsMode,
    /// Where the flag is read from
    pub flag_file: PathBuf,
    /// Whether the flag is disclosed after the challenge
    pub check_flag: bool,
}

/// Resolve `options` against the process environment.
///
/// `default_bounds` applies when neither the command line nor the environment picks a mode.
pub fn parse_envs(
    options: &mut ChallengeOptions,
    default_bounds: BoundsMode,
) -> Result<ChallengeConfig, Error> {
    parse_envs_from(options, default_bounds, |key| env::var(key).ok())
}

/// Like [`parse_envs`], reading variables through `lookup`
pub fn parse_envs_from<F>(
    options: &mut ChallengeOptions,
    default_bounds: BoundsMode,
    lookup: F,
) -> Result<ChallengeConfig, Error>
where
    F: Fn(&str) -> Option<String>,
{
    if options.bounds.is_none() {
        if let Some(value) = lookup(BOUNDS_ENV_VAR) {
            options.bounds = Some(value.parse()?);
        }
    }
    if options.flag_file.is_none() {
        options.flag_file = lookup(FLAG_FILE_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
    }

    Ok(ChallengeConfig {
        bounds: options.bounds.unwrap_or(default_bounds),
        flag_file: options
            .flag_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(FLAG_FILE)),
        check_flag: options.check_flag,
    })
}

/// Options of the reference solver
#[derive(Parser, Clone, Debug)]
#[command(
    name = "solver",
    about = "Writes an overflow payload for the challenge",
    arg_required_else_help(true)
)]
pub struct SolverOptions {
    /// Distance from the start of the buffer to the saved return address
    #[arg(short, long)]
    pub offset: usize,

    /// Words to place after the padding, in order (hex, `0x` optional)
    #[arg(short, long = "address", value_name = "HEX", value_parser = parse_address)]
    pub addresses: Vec<u64>,

    /// Padding byte, one character or `0xNN`
    #[arg(short, long, default_value = "A", value_parser = parse_pad)]
    pub pad: u8,

    /// Terminate the payload with a newline
    #[arg(short, long)]
    pub newline: bool,

    /// Write the payload to this file instead of stdout
    #[arg(short = 'O', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Whether or not to print debug info
    #[arg(short, long)]
    pub verbose: bool,
}
