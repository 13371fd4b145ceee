//! Uniform dedent of method source captured from an indented context.

use std::borrow::Cow;

/// Strip the leading-whitespace width of the first non-blank line from
/// every line.
///
/// This is not a strict fixed-width cut. A line indented less than that
/// width loses only the whitespace it has, never the code after it, so
/// `"    x = 1\n  y = 2"` becomes `"x = 1\ny = 2"` rather than
/// `"x = 1\n= 2"`. Blank lines are kept as is.
#[must_use]
pub fn dedent(source: &str) -> Cow<'_, str> {
    let width = source
        .lines()
        .find(|line| !line.trim().is_empty())
        .map_or(0, leading_whitespace);

    if width == 0 {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let strip = leading_whitespace(line).min(width);
        out.push_str(&line[strip..]);
    }
    Cow::Owned(out)
}

/// Byte length of the leading run of spaces and tabs.
fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unindented_is_borrowed() {
        assert!(matches!(dedent("def f(self):\n    pass\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_uniform_strip() {
        let src = "    def f(self):\n        return self.x\n";
        assert_eq!(dedent(src), "def f(self):\n    return self.x\n");
    }

    #[test]
    fn test_leading_blank_line_ignored() {
        let src = "\n  def f(self):\n      pass";
        assert_eq!(dedent(src), "\ndef f(self):\n    pass");
    }

    #[test]
    fn test_shallower_line_keeps_its_code() {
        let src = "    x = 1\n  y = 2\n";
        assert_eq!(dedent(src), "x = 1\ny = 2\n");
    }
}
