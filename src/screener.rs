//! Static deny-list screener (spec §4.B).
//!
//! Intentionally syntactic: it matches substrings in possibly-commented-out
//! or string-literal code and will produce false positives. That's by
//! design — a weak guard, not a security boundary.

/// Returns `true` if `source`, lower-cased, contains any of `patterns`.
#[must_use]
pub fn is_dangerous(source: &str, patterns: &[String]) -> bool {
    let lower = source.to_lowercase();
    patterns.iter().any(|p| lower.contains(p.as_str()))
}

/// Screen a multi-file submission. Any single file triggering the predicate
/// rejects the whole submission (spec §4.B: "the check applies to the
/// concatenation semantic").
#[must_use]
pub fn is_dangerous_files<'a>(
    files: impl IntoIterator<Item = &'a str>,
    patterns: &[String],
) -> bool {
    files.into_iter().any(|content| is_dangerous(content, patterns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn patterns() -> Vec<String> {
        Config::default().deny_patterns
    }

    #[test]
    fn clean_code_passes() {
        let src = "#include <iostream>\nint main(){ std::cout << \"hi\"; }";
        assert!(!is_dangerous(src, &patterns()));
    }

    #[test]
    fn system_call_is_flagged() {
        let src = "int main(){ system(\"ls\"); }";
        assert!(is_dangerous(src, &patterns()));
    }

    #[test]
    fn case_insensitive() {
        let src = "int main(){ SYSTEM(\"ls\"); }";
        assert!(is_dangerous(src, &patterns()));
    }

    #[test]
    fn each_pattern_triggers() {
        for pat in patterns() {
            let src = format!("blah {pat} blah");
            assert!(is_dangerous(&src, &patterns()), "pattern {pat} did not trigger");
        }
    }

    #[test]
    fn multi_file_any_hit_rejects_whole_submission() {
        let files = vec!["void f(){}", "int main(){ system(\"ls\"); }"];
        assert!(is_dangerous_files(files, &patterns()));
    }

    #[test]
    fn multi_file_all_clean_passes() {
        let files = vec!["void f(){}", "int main(){ f(); }"];
        assert!(!is_dangerous_files(files, &patterns()));
    }
}
