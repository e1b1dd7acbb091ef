//! Runs the challenge binary end to end with piped stdio.

use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    sync::mpsc,
    thread,
    time::Duration,
};

use ctf_bolts::{
    fs::{get_unique_scratch_dir, write_file_atomic},
    BOUNDS_VIOLATION_EXIT_CODE, BUFFER_SIZE,
};
use ctf_challenge::{ECHO_PREFIX, GOODBYE, PROMPT, WELCOME};

fn scratch(name: &str) -> PathBuf {
    let dir = get_unique_scratch_dir(name).unwrap();
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn challenge(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_challenge"));
    cmd.current_dir(cwd)
        .env_remove("CHALLENGE_BOUNDS")
        .env_remove("CHALLENGE_FLAG_FILE")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

fn run_with(cwd: &Path, args: &[&str], input: &[u8]) -> Output {
    let mut child = challenge(cwd).args(args).spawn().unwrap();
    child.stdin.take().unwrap().write_all(input).unwrap();
    child.wait_with_output().unwrap()
}

fn echo_transcript(echo: &[u8]) -> Vec<u8> {
    let mut out = format!("{WELCOME}{PROMPT}{ECHO_PREFIX}").into_bytes();
    out.extend_from_slice(echo);
    out.push(b'\n');
    out
}

#[test]
fn short_input_round_trips_with_exit_zero() {
    let dir = scratch("it_short");
    let output = run_with(&dir, &[], b"hello\n");

    assert!(output.status.success());
    let mut want = echo_transcript(b"hello");
    want.extend_from_slice(GOODBYE.as_bytes());
    assert_eq!(output.stdout, want);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn missing_flag_is_reported_and_exit_is_zero() {
    let dir = scratch("it_missing_flag");
    let output = run_with(&dir, &["--check-flag"], b"hi\n");

    assert_eq!(output.status.code(), Some(0));
    let mut want = echo_transcript(b"hi");
    want.extend_from_slice(b"Error: Could not open flag.txt\n");
    want.extend_from_slice(GOODBYE.as_bytes());
    assert_eq!(output.stdout, want);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn flag_in_working_directory_is_disclosed() {
    let dir = scratch("it_flag");
    write_file_atomic(dir.join("flag.txt"), b"TEST{flag}\n").unwrap();
    let output = run_with(&dir, &["--check-flag"], b"hi\n");

    assert_eq!(output.status.code(), Some(0));
    let mut want = echo_transcript(b"hi");
    want.extend_from_slice(b"Congratulations! Here's your flag:\nTEST{flag}\n\n");
    want.extend_from_slice(GOODBYE.as_bytes());
    assert_eq!(output.stdout, want);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn flag_file_can_come_from_the_environment() {
    let dir = scratch("it_flag_env");
    write_file_atomic(dir.join("mounted_flag"), b"ENV{flag}\n").unwrap();
    let mut child = challenge(&dir)
        .arg("--check-flag")
        .env("CHALLENGE_FLAG_FILE", "mounted_flag")
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"x\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Congratulations! Here's your flag:\nENV{flag}\n"));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn checked_mode_stops_oversized_input() {
    let dir = scratch("it_checked");
    let mut line = vec![b'A'; BUFFER_SIZE];
    line.push(b'\n');
    let output = run_with(&dir, &["--bounds", "checked"], &line);

    assert_eq!(output.status.code(), Some(BOUNDS_VIOLATION_EXIT_CODE));
    assert_eq!(output.stdout, format!("{WELCOME}{PROMPT}").into_bytes());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("*** bounds violation detected ***"));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn unchecked_mode_echoes_safe_input() {
    let dir = scratch("it_unchecked_safe");
    let line = [b'B'; BUFFER_SIZE - 1];
    let mut input = line.to_vec();
    input.push(b'\n');
    let output = run_with(&dir, &["--bounds", "unchecked"], &input);

    assert!(output.status.success());
    let mut want = echo_transcript(&line);
    want.extend_from_slice(GOODBYE.as_bytes());
    assert_eq!(output.stdout, want);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn unchecked_overflow_smashes_the_frame_without_a_bounds_report() {
    let dir = scratch("it_unchecked_smash");
    let mut input = vec![b'A'; 64 * BUFFER_SIZE];
    input.push(b'\n');
    let output = run_with(&dir, &["--bounds", "unchecked"], &input);

    // The copy went through and took the return address with it: no echo, no goodbye
    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(BOUNDS_VIOLATION_EXIT_CODE));
    assert_eq!(output.stdout, format!("{WELCOME}{PROMPT}").into_bytes());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("bounds violation"));

    fs::remove_dir_all(dir).unwrap();
}

#[cfg(all(target_arch = "x86_64", frame_pointers))]
#[test]
fn unchecked_runs_log_the_return_address_offset() {
    let dir = scratch("it_stack_layout");
    let mut child = challenge(&dir)
        .args(["--bounds", "unchecked"])
        .env("RUST_LOG", "debug")
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"hi\n").unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let marker = "The saved return address is ";
    let start = stderr.find(marker).expect("no stack layout in the log") + marker.len();
    let offset: usize = stderr[start..]
        .split(' ')
        .next()
        .and_then(|digits| digits.parse().ok())
        .unwrap();
    assert!(offset >= BUFFER_SIZE + 8, "offset {offset}");

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn prompt_is_flushed_before_blocking_on_input() {
    let dir = scratch("it_prompt");
    let mut child = challenge(&dir).spawn().unwrap();
    let mut stdout = child.stdout.take().unwrap();
    let want = format!("{WELCOME}{PROMPT}").into_bytes();

    // Read the prompt while stdin is still open and empty; a buffered prompt would never arrive
    let (tx, rx) = mpsc::channel();
    let expected_len = want.len();
    thread::spawn(move || {
        let mut seen = vec![0_u8; expected_len];
        let res = stdout.read_exact(&mut seen).map(|()| seen);
        let _ = tx.send((res, stdout));
    });
    let (seen, mut stdout) = rx
        .recv_timeout(Duration::from_secs(30))
        .expect("prompt was not flushed before the read");
    assert_eq!(seen.unwrap(), want);

    child.stdin.take().unwrap().write_all(b"late\n").unwrap();
    let mut rest = Vec::new();
    stdout.read_to_end(&mut rest).unwrap();
    assert!(child.wait().unwrap().success());
    assert_eq!(rest, format!("{ECHO_PREFIX}late\n{GOODBYE}").into_bytes());

    fs::remove_dir_all(dir).unwrap();
}
