/// Trim-compare: leading and trailing whitespace is ignored on both sides,
/// everything in between must match exactly.
pub fn matches(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn trailing_newline_is_ignored() {
        assert!(matches("5", "5\n"));
        assert!(matches("  5\r\n", "\t5"));
    }

    #[test]
    fn different_values_do_not_match() {
        assert!(!matches("6", "5"));
    }

    #[test]
    fn internal_whitespace_is_significant() {
        assert!(!matches("1 2", "1  2"));
        assert!(!matches("1\r\n2", "1\n2"));
        assert!(!matches("1.0", "1"));
    }

    #[test]
    fn empty_outputs_match() {
        assert!(matches("", "\n"));
    }
}
