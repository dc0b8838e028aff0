use std::env;
use std::process::Command;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let commit_full = env::var("GITHUB_SHA").ok().filter(|v| !v.is_empty());
    let commit_full = commit_full.or_else(|| run_git(&["rev-parse", "HEAD"]));
    let commit = commit_full
        .as_deref()
        .map(shorten_commit)
        .unwrap_or_else(|| "unknown".to_string());

    let build_date = run_git(&["log", "-1", "--format=%cI"]).unwrap_or_else(fallback_date);

    println!("cargo:rustc-env=PKTSRC_BUILD_COMMIT={}", commit);
    println!(
        "cargo:rustc-env=PKTSRC_BUILD_COMMIT_FULL={}",
        commit_full.as_deref().unwrap_or("unknown")
    );
    println!("cargo:rustc-env=PKTSRC_BUILD_DATE={}", build_date);
}

fn run_git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}

/// `SOURCE_DATE_EPOCH` when set, otherwise the time of the build.
fn fallback_date() -> String {
    let date = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);
    date.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn shorten_commit(full: &str) -> String {
    full.chars().take(7).collect()
}
