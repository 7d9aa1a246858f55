//! Integration test: run script files via cargo test
//!
//! Every `.emxs` file directly under `tests/scripts/` must finish without a
//! fault. Libraries they reference live in `tests/scripts/lib/`, which is not
//! scanned.
//!
//! Usage:
//!   cargo test --test integration
//!   RUST_LOG=emx_script=debug cargo test --test integration -- --nocapture

use std::path::PathBuf;

fn scripts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/scripts")
}

#[test]
fn scripts_all() {
    let dir = scripts_dir();

    if !dir.exists() {
        eprintln!("No script directory at: {}", dir.display());
        return;
    }

    emx_script::run_and_assert(dir);
}

#[test]
fn scripts_with_baseline_reference() {
    let dir = scripts_dir();
    let lib = dir.join("lib/geometry.emxs");

    // the baseline library is loaded once; the #r in references.emxs
    // names the same file and must not load it twice
    emx_script::run_and_assert_with(dir, |builder| builder.reference(lib));
}
