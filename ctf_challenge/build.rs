use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_ENCODED_RUSTFLAGS");
    println!("cargo:rustc-check-cfg=cfg(frame_pointers)");

    // `stack_layout` walks `rbp`, which only means something with frame pointers kept
    let rustflags = env::var("CARGO_ENCODED_RUSTFLAGS").unwrap_or_default();
    if rustflags
        .split('\x1f')
        .any(|flag| flag.ends_with("force-frame-pointers=yes"))
    {
        println!("cargo:rustc-cfg=frame_pointers");
    }

    if env::var_os("CARGO_FEATURE_UNPROTECTED").is_none() {
        return;
    }

    println!(
        "cargo:warning=building the challenge with protections off (unchecked stack copy, no PIE)"
    );
    // Fixed load address, so `print_flag` and friends sit where `nm` says they do
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("linux") {
        println!("cargo:rustc-link-arg-bins=-no-pie");
    }
}
