//! Maps raw tool events to semantic activity states.
//!
//! `classify_start` answers "what is the assistant doing" when a tool call
//! begins; `classify_end` answers "how did it go" when one completes. Both
//! are pure and total: unknown tool names and missing fields degrade to
//! generic states, never to an error return.

pub mod detail;
pub mod outcome;
pub mod tools;

use serde::Serialize;
use serde_json::{Map, Value};

use vigil_protocol::ToolOutput;

use crate::state::SemanticState;
use detail::{basename, first_words, truncate_detail, url_host};
use tools::{categorize, ToolCategory};

const FILE_KEYS: &[&str] = &["file_path", "path", "filename", "file", "target_file", "notebook_path"];
const COMMAND_KEYS: &[&str] = &["command", "cmd", "script"];
const PATTERN_KEYS: &[&str] = &["pattern", "query", "glob", "regex", "search_term"];
const URL_KEYS: &[&str] = &["url", "uri"];
const DESCRIPTION_KEYS: &[&str] = &["description", "prompt", "task"];
const OLD_TEXT_KEYS: &[&str] = &["old_string", "old_str", "old_text", "original"];
const NEW_TEXT_KEYS: &[&str] = &["new_string", "new_str", "new_text", "content", "file_text", "code_edit"];

/// Ordered substrings that mark a shell command as a test-runner run.
const TEST_RUNNER_COMMANDS: &[&str] = &[
    "npm test",
    "npm run test",
    "yarn test",
    "pnpm test",
    "bun test",
    "cargo test",
    "cargo nextest",
    "pytest",
    "py.test",
    "go test",
    "jest",
    "vitest",
    "mocha",
    "rspec",
    "phpunit",
    "tox",
    "ctest",
    "make test",
    "mvn test",
    "gradle test",
];

/// Ordered substrings that mark a shell command as a package install.
const INSTALL_COMMANDS: &[&str] = &[
    "npm install",
    "npm i ",
    "npm ci",
    "yarn add",
    "yarn install",
    "pnpm add",
    "pnpm install",
    "bun add",
    "pip install",
    "pip3 install",
    "uv add",
    "uv pip install",
    "cargo add",
    "poetry add",
    "gem install",
    "bundle install",
    "brew install",
    "apt-get install",
    "apt install",
    "dnf install",
    "go get",
    "composer install",
];

/// Line delta of an edit, derived from before/after text length in lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffInfo {
    pub added: u32,
    pub removed: u32,
}

/// A classified event: semantic state plus a short presented detail.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub state: SemanticState,
    pub detail: String,
    pub diff_info: Option<DiffInfo>,
}

impl ClassificationResult {
    fn new(state: SemanticState, detail: impl AsRef<str>) -> Self {
        Self {
            state,
            detail: truncate_detail(detail.as_ref()),
            diff_info: None,
        }
    }
}

/// Classifies the start of a tool call.
pub fn classify_start(tool_name: &str, tool_input: &Map<String, Value>) -> ClassificationResult {
    match categorize(tool_name) {
        ToolCategory::Edit => {
            let detail = input_str(tool_input, FILE_KEYS)
                .map(|path| format!("editing {}", basename(&path)))
                .unwrap_or_else(|| "writing code".to_string());
            ClassificationResult::new(SemanticState::Coding, detail)
        }
        ToolCategory::Shell => {
            let command = input_str(tool_input, COMMAND_KEYS).unwrap_or_default();
            classify_command(&command)
        }
        ToolCategory::Read => {
            let detail = input_str(tool_input, FILE_KEYS)
                .map(|path| format!("reading {}", basename(&path)))
                .unwrap_or_else(|| "reading the code".to_string());
            ClassificationResult::new(SemanticState::Reading, detail)
        }
        ToolCategory::Search => {
            let detail = input_str(tool_input, PATTERN_KEYS)
                .map(|pattern| format!("searching {}", pattern))
                .unwrap_or_else(|| "digging around".to_string());
            ClassificationResult::new(SemanticState::Searching, detail)
        }
        ToolCategory::Web => {
            let detail = input_str(tool_input, URL_KEYS)
                .as_deref()
                .and_then(url_host)
                .map(|host| format!("browsing {}", host))
                .or_else(|| {
                    input_str(tool_input, PATTERN_KEYS)
                        .map(|query| format!("searching {}", query))
                })
                .unwrap_or_else(|| "searching the web".to_string());
            ClassificationResult::new(SemanticState::Searching, detail)
        }
        ToolCategory::Review => {
            let detail = input_str(tool_input, FILE_KEYS)
                .map(|path| format!("reviewing {}", basename(&path)))
                .unwrap_or_else(|| "reviewing changes".to_string());
            ClassificationResult::new(SemanticState::Reviewing, detail)
        }
        ToolCategory::Spawn => {
            let detail = input_str(tool_input, DESCRIPTION_KEYS)
                .map(|description| format!("delegating {}", first_words(&description, 3)))
                .unwrap_or_else(|| "delegating a task".to_string());
            ClassificationResult::new(SemanticState::Subagent, detail)
        }
        ToolCategory::Unknown => ClassificationResult::new(SemanticState::Thinking, tool_name),
    }
}

/// Classifies the completion of a tool call into a positive outcome or an
/// error/ratelimited state.
pub fn classify_end(
    tool_name: &str,
    tool_input: &Map<String, Value>,
    tool_output: &ToolOutput,
    is_error: bool,
) -> ClassificationResult {
    let category = categorize(tool_name);

    if outcome::is_error_output(category, tool_output, is_error) {
        if outcome::is_rate_limited(tool_output) {
            return ClassificationResult::new(SemanticState::Ratelimited, "rate limited");
        }
        let detail = if tool_output.interrupted {
            "interrupted".to_string()
        } else {
            outcome::error_detail(&tool_output.stdout, &tool_output.stderr)
        };
        return ClassificationResult::new(SemanticState::Error, detail);
    }

    match category {
        ToolCategory::Edit => {
            let detail = input_str(tool_input, FILE_KEYS)
                .map(|path| format!("edited {}", basename(&path)))
                .unwrap_or_else(|| "nice edit".to_string());
            let mut result = ClassificationResult::new(SemanticState::Proud, detail);
            result.diff_info = diff_from_input(tool_input);
            result
        }
        ToolCategory::Shell => {
            let detail = outcome::test_pass_detail(&tool_output.stdout)
                .unwrap_or_else(|| "command finished".to_string());
            ClassificationResult::new(SemanticState::Relieved, detail)
        }
        ToolCategory::Read => {
            let detail = input_str(tool_input, FILE_KEYS)
                .map(|path| format!("read {}", basename(&path)))
                .unwrap_or_else(|| "done reading".to_string());
            ClassificationResult::new(SemanticState::Satisfied, detail)
        }
        ToolCategory::Search | ToolCategory::Web => {
            ClassificationResult::new(SemanticState::Satisfied, "search complete")
        }
        ToolCategory::Review => ClassificationResult::new(SemanticState::Satisfied, "review complete"),
        ToolCategory::Spawn => ClassificationResult::new(SemanticState::Happy, "subagent finished"),
        ToolCategory::Unknown => ClassificationResult::new(SemanticState::Happy, "step complete"),
    }
}

/// Basename of the file an edit or read touches. Other categories pass
/// paths too (a search's directory, say), but those are not file work and
/// would skew the frequency counts.
pub fn touched_file(tool_name: &str, input: &Map<String, Value>) -> Option<String> {
    match categorize(tool_name) {
        ToolCategory::Edit | ToolCategory::Read => {
            input_str(input, FILE_KEYS).map(|path| basename(&path).to_string())
        }
        _ => None,
    }
}

/// First non-empty string value among the candidate keys.
fn input_str(input: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = input.get(*key).and_then(Value::as_str) {
            if !value.trim().is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn classify_command(command: &str) -> ClassificationResult {
    let lowered = command.to_lowercase();
    if TEST_RUNNER_COMMANDS.iter().any(|runner| lowered.contains(runner)) {
        return ClassificationResult::new(SemanticState::Testing, "running tests");
    }
    if INSTALL_COMMANDS.iter().any(|install| lowered.contains(install)) {
        return ClassificationResult::new(SemanticState::Installing, "installing dependencies");
    }
    if lowered.contains("git commit") {
        return ClassificationResult::new(SemanticState::Committing, "committing changes");
    }
    if command.trim().is_empty() {
        return ClassificationResult::new(SemanticState::Executing, "running a command");
    }
    ClassificationResult::new(SemanticState::Executing, first_words(command, 3))
}

fn diff_from_input(input: &Map<String, Value>) -> Option<DiffInfo> {
    let old_text = input_str(input, OLD_TEXT_KEYS);
    let new_text = input_str(input, NEW_TEXT_KEYS);
    if old_text.is_none() && new_text.is_none() {
        return None;
    }
    Some(DiffInfo {
        removed: old_text.as_deref().map(count_lines).unwrap_or(0),
        added: new_text.as_deref().map(count_lines).unwrap_or(0),
    })
}

fn count_lines(text: &str) -> u32 {
    if text.is_empty() {
        0
    } else {
        text.lines().count() as u32
    }
}
