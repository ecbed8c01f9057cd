//! Tool-name categorization across assistant vendors.
//!
//! Matching is an ordered list of (category, synonyms) pairs evaluated
//! top-to-bottom; new vendor tool names are additive entries, not new
//! branches. Synonyms match as whole tokens so "Editor" does not match
//! "edit" while "apply_diff" and "ApplyDiff" both do.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    Edit,
    Shell,
    Read,
    Search,
    Web,
    Review,
    Spawn,
    Unknown,
}

const CATEGORY_SYNONYMS: &[(ToolCategory, &[&str])] = &[
    (
        ToolCategory::Edit,
        &[
            "edit",
            "multi_edit",
            "apply_diff",
            "apply_patch",
            "patch",
            "write",
            "write_file",
            "write_to_file",
            "create_file",
            "notebook_edit",
            "str_replace",
        ],
    ),
    (
        ToolCategory::Shell,
        &[
            "bash",
            "shell",
            "terminal",
            "exec",
            "execute",
            "run_command",
            "run_terminal_cmd",
            "run_shell_command",
            "command",
        ],
    ),
    (
        ToolCategory::Read,
        &[
            "read",
            "read_file",
            "open_file",
            "cat",
            "view",
            "view_file",
            "load_file",
            "notebook_read",
        ],
    ),
    (
        ToolCategory::Search,
        &[
            "grep",
            "search",
            "glob",
            "find",
            "rg",
            "ripgrep",
            "codebase_search",
            "file_search",
            "search_files",
            "list_dir",
            "ls",
        ],
    ),
    (
        ToolCategory::Web,
        &["web_fetch", "web_search", "fetch", "browse", "browser"],
    ),
    (
        ToolCategory::Review,
        &["review", "pr_review", "code_review", "git_diff"],
    ),
    (
        ToolCategory::Spawn,
        &[
            "task",
            "agent",
            "subagent",
            "spawn_agent",
            "dispatch_agent",
            "delegate",
        ],
    ),
];

/// Maps a raw tool name to its category. Unmatched names are `Unknown`
/// and classify as a generic thinking state upstream.
pub fn categorize(tool_name: &str) -> ToolCategory {
    let tokens = tokenize(tool_name);
    for (category, synonyms) in CATEGORY_SYNONYMS {
        if synonyms
            .iter()
            .any(|synonym| matches_synonym(&tokens, synonym))
        {
            return *category;
        }
    }
    ToolCategory::Unknown
}

/// Splits a tool name into lowercase tokens at camelCase boundaries and
/// non-alphanumeric separators: "ApplyDiff" -> ["apply", "diff"].
fn tokenize(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_was_lower = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_was_lower && !current.is_empty() {
                tokens.push(current.to_lowercase());
                current = String::new();
            }
            prev_was_lower = ch.is_lowercase() || ch.is_ascii_digit();
            current.push(ch);
        } else {
            if !current.is_empty() {
                tokens.push(current.to_lowercase());
                current = String::new();
            }
            prev_was_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current.to_lowercase());
    }
    tokens
}

/// A multi-token synonym ("apply_diff") must appear as a contiguous token
/// run; a single-token synonym must match a whole token.
fn matches_synonym(tokens: &[String], synonym: &str) -> bool {
    let synonym_tokens: Vec<&str> = synonym.split('_').collect();
    if synonym_tokens.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(synonym_tokens.len())
        .any(|window| window.iter().map(String::as_str).eq(synonym_tokens.iter().copied()))
}
