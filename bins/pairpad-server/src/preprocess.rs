//! UI test-case preprocessing.
//!
//! The editor sends each test case as one line of comma-separated
//! `name=expr` assignments, e.g. `nums=[1,2,4,5], k=3`. Commas nested
//! inside `()`, `[]` or `{}` belong to the expression, not the separator,
//! so splitting happens only at bracket depth zero. Nothing is rejected
//! here: a syntactically broken expression simply reaches the sandbox and
//! fails there, which is the error the user wants to see anyway.

/// How tokens are rendered into the staged `input.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Keep whole `name=expr` tokens, one per line. The Python driver
    /// prepends them to the snippet as assignment statements.
    Assignments,
    /// Keep only the expression after the first `=`. Java programs read
    /// the resulting lines as a plain stdin feed.
    ValuesOnly,
}

/// Convert the raw UI string into driver-ready test-case blocks: one
/// token per line, blank line between test cases. A whitespace-only
/// input produces the empty string.
pub fn preprocess(raw: &str, mode: InputMode) -> String {
    let mut groups = Vec::new();
    for line in raw.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let rendered: Vec<String> = split_top_level(line)
            .iter()
            .map(|token| match mode {
                InputMode::Assignments => token.trim().to_string(),
                InputMode::ValuesOnly => extract_value(token).to_string(),
            })
            .collect();
        groups.push(rendered.join("\n"));
    }
    groups.join("\n\n")
}

/// Split `s` on commas at bracket depth zero, tracking `()`, `[]` and
/// `{}` together. Unbalanced input never fails: depth just goes negative
/// or stays positive and the remaining commas are kept literal.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in s.chars() {
        match ch {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// The substring after the first `=`, trimmed; the whole token when no
/// `=` is present.
fn extract_value(token: &str) -> &str {
    let token = token.trim();
    match token.find('=') {
        Some(idx) => token[idx + 1..].trim(),
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_mode_keeps_assignments() {
        let raw = "nums=[1,2,4,5], k=3\nnums=[1,2,4,9], k=6";
        let expected = "nums=[1,2,4,5]\nk=3\n\nnums=[1,2,4,9]\nk=6";
        assert_eq!(preprocess(raw, InputMode::Assignments), expected);
    }

    #[test]
    fn test_java_mode_keeps_values_only() {
        let raw = "nums=[1,2,4,5], k=3\nnums=[1,2,4,9], k=6";
        let expected = "[1,2,4,5]\n3\n\n[1,2,4,9]\n6";
        assert_eq!(preprocess(raw, InputMode::ValuesOnly), expected);
    }

    #[test]
    fn test_nested_brackets_do_not_split() {
        let parts = split_top_level("pairs=[[1,2],[3,4]], k=1");
        assert_eq!(parts, vec!["pairs=[[1,2],[3,4]]", "k=1"]);
    }

    #[test]
    fn test_all_bracket_kinds_guard_commas() {
        let parts = split_top_level("a=(1,2), b={1: 2, 3: 4}, c=[5,6]");
        assert_eq!(parts, vec!["a=(1,2)", "b={1: 2, 3: 4}", "c=[5,6]"]);
    }

    #[test]
    fn test_unbalanced_brackets_keep_commas_literal() {
        // Too many closers: depth goes negative and never returns to 0,
        // so the comma stays literal and nothing splits.
        assert_eq!(split_top_level("a=1], b=2"), vec!["a=1], b=2"]);
        // Unclosed opener: everything after it stays one token.
        assert_eq!(split_top_level("a=[1, b=2"), vec!["a=[1, b=2"]);
    }

    #[test]
    fn test_whitespace_only_input_produces_nothing() {
        assert_eq!(preprocess("", InputMode::Assignments), "");
        assert_eq!(preprocess("   \n\n  \t ", InputMode::Assignments), "");
    }

    #[test]
    fn test_blank_lines_between_cases_are_skipped() {
        let raw = "k=1\n\n\nk=2";
        assert_eq!(preprocess(raw, InputMode::Assignments), "k=1\n\nk=2");
    }

    #[test]
    fn test_tokens_are_trimmed() {
        let raw = "  nums = [1, 2] ,   k = 3  ";
        assert_eq!(preprocess(raw, InputMode::Assignments), "nums = [1, 2]\nk = 3");
        assert_eq!(preprocess(raw, InputMode::ValuesOnly), "[1, 2]\n3");
    }

    #[test]
    fn test_value_extraction_without_equals_keeps_token() {
        assert_eq!(extract_value("42"), "42");
        assert_eq!(extract_value("k=3"), "3");
        // Only the first `=` separates name from expression.
        assert_eq!(extract_value("expr=a==b"), "a==b");
    }

    #[test]
    fn test_trailing_comma_yields_no_empty_token() {
        assert_eq!(split_top_level("a=1,"), vec!["a=1"]);
        // An interior empty token is preserved literally.
        assert_eq!(split_top_level("a=1,,b=2"), vec!["a=1", "", "b=2"]);
    }

    #[test]
    fn test_preprocessing_assignments_is_a_fixed_point() {
        // Already-preprocessed Python input survives a second pass
        // unchanged (modulo trailing whitespace, which trim removes).
        let raw = "nums=[1,2,4,5], k=3\nnums=[1,2,4,9], k=6";
        let once = preprocess(raw, InputMode::Assignments);
        let twice = preprocess(&once, InputMode::Assignments);
        assert_eq!(once, twice);
    }
}
