//! Indentation tracking for significant whitespace.

/// What a line's indentation does to the block structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentChange {
    /// Same level as the enclosing block.
    Unchanged,
    /// One level deeper: emit INDENT.
    Indent,
    /// Closes this many levels: emit that many DEDENTs.
    Dedent(usize),
}

/// Stack of open indentation widths.
#[derive(Debug, Clone)]
pub struct IndentStack {
    stack: Vec<usize>,
    bracket_depth: usize,
}

impl IndentStack {
    /// Create a tracker at column zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: vec![0],
            bracket_depth: 0,
        }
    }

    /// Width of the innermost open block.
    #[inline]
    #[must_use]
    pub fn current(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    /// Newlines and indentation are insignificant inside brackets.
    #[inline]
    #[must_use]
    pub const fn in_brackets(&self) -> bool {
        self.bracket_depth > 0
    }

    /// Enter `(` or `[`.
    #[inline]
    pub fn open_bracket(&mut self) {
        self.bracket_depth += 1;
    }

    /// Leave `)` or `]`.
    #[inline]
    pub fn close_bracket(&mut self) {
        self.bracket_depth = self.bracket_depth.saturating_sub(1);
    }

    /// Classify the indentation of a new logical line.
    ///
    /// # Errors
    /// Returns `Err` when a dedent does not land on an open level.
    pub fn process(&mut self, width: usize) -> Result<IndentChange, &'static str> {
        let current = self.current();
        if width > current {
            self.stack.push(width);
            return Ok(IndentChange::Indent);
        }
        if width == current {
            return Ok(IndentChange::Unchanged);
        }

        let mut closed = 0;
        while self.current() > width {
            self.stack.pop();
            closed += 1;
        }
        if self.current() != width {
            return Err("unindent does not match any outer indentation level");
        }
        Ok(IndentChange::Dedent(closed))
    }

    /// Close every open block at end of input, returning the DEDENT count.
    pub fn close_all(&mut self) -> usize {
        let open = self.stack.len().saturating_sub(1);
        self.stack.truncate(1);
        open
    }
}

impl Default for IndentStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_then_dedent() {
        let mut stack = IndentStack::new();
        assert_eq!(stack.process(4), Ok(IndentChange::Indent));
        assert_eq!(stack.process(4), Ok(IndentChange::Unchanged));
        assert_eq!(stack.process(8), Ok(IndentChange::Indent));
        assert_eq!(stack.process(0), Ok(IndentChange::Dedent(2)));
        assert_eq!(stack.current(), 0);
    }

    #[test]
    fn test_inconsistent_dedent() {
        let mut stack = IndentStack::new();
        stack.process(4).unwrap();
        assert!(stack.process(2).is_err());
    }

    #[test]
    fn test_brackets() {
        let mut stack = IndentStack::new();
        stack.open_bracket();
        assert!(stack.in_brackets());
        stack.close_bracket();
        stack.close_bracket();
        assert!(!stack.in_brackets());
    }

    #[test]
    fn test_close_all() {
        let mut stack = IndentStack::new();
        stack.process(4).unwrap();
        stack.process(8).unwrap();
        assert_eq!(stack.close_all(), 2);
        assert_eq!(stack.current(), 0);
    }
}
