//! Outcome classification for completed tool calls.
//!
//! Error detection is a three-stage heuristic, short-circuiting on the
//! first hit:
//!
//! 1. explicit `is_error`/`interrupted` flags on the output
//! 2. a nonzero exit code extracted from stdout
//! 3. curated error-signature substrings, vetoed by a false-positive
//!    guard list ("0 errors", "error handling", ...)
//!
//! Stdout signatures apply only to shell-category tools; stderr signatures
//! apply to every tool. Everything here is total: `error_detail` always
//! returns a non-empty phrase.

use once_cell::sync::Lazy;
use regex::Regex;

use vigil_protocol::ToolOutput;

use super::tools::ToolCategory;

static RE_EXIT_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:exit code:?\s*|exited with\s+(?:code\s+)?|returned\s+)(\d+)").unwrap()
});

static RE_TEST_PASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s+(?:(?:tests?|specs?|examples?)\s+)?(?:passed|passing)").unwrap()
});

/// Substrings that mark genuinely failed output. Checked against stdout
/// for shell tools and stderr for all tools. Ordered: first match drives
/// `error_detail`.
const ERROR_SIGNATURES: &[&str] = &[
    "command not found",
    "no such file or directory",
    "enoent",
    "permission denied",
    "traceback (most recent call last)",
    "segmentation fault",
    "npm err!",
    "cannot find module",
    "panicked at",
    "compilation error",
    "failed to compile",
    "build failed",
    "syntax error",
    "assertion failed",
    "tests failed",
    "test failed",
    "unhandled exception",
    "fatal:",
];

/// Phrases that veto a stage-3 signature hit. Tool output that merely
/// talks about errors is not an error.
const FALSE_POSITIVE_GUARDS: &[&str] = &[
    "0 errors",
    "no errors",
    "error handling",
    "error-handling",
    "logger.error",
    "console.error",
    "error boundary",
    "onerror",
    "0 failed",
    "warning",
];

/// Human phrase per matched signature. First match wins; the fallback
/// keeps the mapping total.
const ERROR_DETAILS: &[(&str, &str)] = &[
    ("command not found", "command not found"),
    ("no such file or directory", "file not found"),
    ("enoent", "file not found"),
    ("permission denied", "permission denied"),
    ("traceback", "python exception"),
    ("segmentation fault", "segfault"),
    ("npm err!", "npm error"),
    ("cannot find module", "missing module"),
    ("panicked at", "rust panic"),
    ("compilation error", "build failed"),
    ("failed to compile", "build failed"),
    ("build failed", "build failed"),
    ("syntax error", "syntax error"),
    ("assertion failed", "assertion failed"),
    ("tests failed", "tests failed"),
    ("test failed", "tests failed"),
    ("unhandled exception", "unhandled exception"),
    ("timed out", "timed out"),
    ("timeout", "timed out"),
    ("fatal:", "fatal error"),
];

const GENERIC_ERROR_DETAIL: &str = "something went wrong";

const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "rate limit",
    "rate-limit",
    "rate_limit",
    "too many requests",
    "429",
    "overloaded",
    "quota exceeded",
];

/// Decides whether a completed call failed. `is_error_flag` is the
/// adapter-level verdict and wins outright.
pub fn is_error_output(category: ToolCategory, output: &ToolOutput, is_error_flag: bool) -> bool {
    // Stage 1: explicit flags.
    if is_error_flag || output.is_error || output.interrupted {
        return true;
    }

    // Stage 2: exit-code patterns in stdout.
    if let Some(code) = extract_exit_code(&output.stdout) {
        if code != 0 {
            return true;
        }
    }

    // Stage 3: curated signatures, with the false-positive guard.
    let stdout = output.stdout.to_lowercase();
    let stderr = output.stderr.to_lowercase();
    let stdout_hit =
        category == ToolCategory::Shell && ERROR_SIGNATURES.iter().any(|sig| stdout.contains(sig));
    let stderr_hit = ERROR_SIGNATURES.iter().any(|sig| stderr.contains(sig));
    if !(stdout_hit || stderr_hit) {
        return false;
    }
    let guarded = FALSE_POSITIVE_GUARDS
        .iter()
        .any(|guard| stdout.contains(guard) || stderr.contains(guard));
    !guarded
}

/// Maps failed output to a short human phrase. Total: always non-empty.
pub fn error_detail(stdout: &str, stderr: &str) -> String {
    let stdout = stdout.to_lowercase();
    let stderr = stderr.to_lowercase();
    for (signature, phrase) in ERROR_DETAILS {
        if stderr.contains(signature) || stdout.contains(signature) {
            return (*phrase).to_string();
        }
    }
    GENERIC_ERROR_DETAIL.to_string()
}

/// Rate limiting presents as its own dramatic state, not a plain error.
pub fn is_rate_limited(output: &ToolOutput) -> bool {
    let stdout = output.stdout.to_lowercase();
    let stderr = output.stderr.to_lowercase();
    RATE_LIMIT_SIGNATURES
        .iter()
        .any(|sig| stdout.contains(sig) || stderr.contains(sig))
}

/// Refined detail for shell commands whose output reports passing tests.
pub fn test_pass_detail(stdout: &str) -> Option<String> {
    let captures = RE_TEST_PASS.captures(stdout)?;
    let count: u64 = captures[1].parse().ok()?;
    Some(format!("{} tests passed", count))
}

fn extract_exit_code(stdout: &str) -> Option<i64> {
    let captures = RE_EXIT_CODE.captures(stdout)?;
    captures[1].parse().ok()
}
