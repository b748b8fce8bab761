//! Embeds `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` for the
//! startup banner. Without any `rerun-if-changed` line Cargo reruns this
//! on every build.

use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_owned())
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    let built_at = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into());

    emit("GIT_HASH", git_short_hash().as_deref().unwrap_or("unknown"));
    emit("BUILD_TIMESTAMP", &built_at);
    emit("BUILD_PROFILE", &profile);
}
