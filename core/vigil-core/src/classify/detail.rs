//! Detail string extraction for the presented activity.
//!
//! Details are short human fragments ("editing App.tsx"), truncated to a
//! fixed character budget. Glitch flavor is cosmetic only and must never
//! influence which state is classified.

use rand::Rng;

/// Character budget for a presented detail string.
pub const DETAIL_MAX_CHARS: usize = 40;

const GLITCH_CHARS: &[char] = &['#', '%', '&', '$', '@', '?'];

/// Truncates to the detail budget, appending an ellipsis when cut.
pub fn truncate_detail(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= DETAIL_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(DETAIL_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// Last path component, tolerant of trailing separators.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|part| !part.is_empty())
        .unwrap_or(trimmed)
}

/// First `n` whitespace-separated words of a free-text description.
pub fn first_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

/// Hostname of a URL, for "browsing example.com" details.
pub fn url_host(url: &str) -> Option<&str> {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Corrupts a few characters for dramatic error flavor. Length-preserving;
/// the first character is always left intact so the detail stays legible.
pub fn glitch(text: &str, rng: &mut impl Rng) -> String {
    text.chars()
        .enumerate()
        .map(|(i, ch)| {
            if i > 0 && !ch.is_whitespace() && rng.gen_ratio(1, 8) {
                GLITCH_CHARS[rng.gen_range(0..GLITCH_CHARS.len())]
            } else {
                ch
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn short_detail_passes_through() {
        assert_eq!(truncate_detail("editing App.tsx"), "editing App.tsx");
    }

    #[test]
    fn long_detail_gets_ellipsis() {
        let long = "editing a file with an extremely long descriptive name.tsx";
        let out = truncate_detail(long);
        assert_eq!(out.chars().count(), DETAIL_MAX_CHARS);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn basename_handles_paths() {
        assert_eq!(basename("/src/App.tsx"), "App.tsx");
        assert_eq!(basename("src\\lib\\main.rs"), "main.rs");
        assert_eq!(basename("plain.txt"), "plain.txt");
        assert_eq!(basename("/trailing/dir/"), "dir");
    }

    #[test]
    fn first_words_takes_three() {
        assert_eq!(
            first_words("refactor the parser for better errors", 3),
            "refactor the parser"
        );
    }

    #[test]
    fn url_host_strips_scheme_and_path() {
        assert_eq!(url_host("https://docs.rs/regex/latest"), Some("docs.rs"));
        assert_eq!(url_host("example.com/page"), Some("example.com"));
        assert_eq!(url_host("https://"), None);
    }

    #[test]
    fn glitch_is_deterministic_with_seed() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let text = "something went wrong";
        assert_eq!(glitch(text, &mut a), glitch(text, &mut b));
    }

    #[test]
    fn glitch_preserves_length_and_first_char() {
        let mut rng = StdRng::seed_from_u64(42);
        let out = glitch("compilation error", &mut rng);
        assert_eq!(out.chars().count(), "compilation error".chars().count());
        assert_eq!(out.chars().next(), Some('c'));
    }
}
