//! Build script for symdecode-core
//!
//! Checks the toolchain before compilation and tells dependents whether a
//! native backend exists for the target.
//!
//! ## Requirements
//!
//! - **Rust**: 1.70.0 or newer (`OnceCell`-style APIs, `Option::is_some_and`)
//! - **Linux**: `/proc/self/maps` for the module map
//! - **Other targets**: build fine, decode nothing

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 70, 0);

        if rustc_version < min_rust_version {
            panic!("symdecode-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "linux" {
        println!("cargo:warning=symdecode-core has no native backend for `{target_os}`; decoding will report nothing");
    }
}
