/// Maps byte offsets in a source text to 1-based line and column numbers.
///
/// Line starts are computed once, so every lookup is a binary search. The stager
/// asks for a line on every diagnostic and every staged field.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// 1-based line containing `position`.
    pub fn line(&self, position: usize) -> usize {
        match self.line_starts.binary_search(&position) {
            Ok(exact) => exact + 1,
            Err(insert) => insert,
        }
    }

    /// 1-based line and byte column of `position`.
    pub fn line_and_column(&self, position: usize) -> (usize, usize) {
        let line = self.line(position);
        (line, position - self.line_starts[line - 1] + 1)
    }
}

/// Calculates the 1-based line and column number for a given byte position in the source text.
/// Intended for one-off lookups; build a [`LineIndex`] when many are needed.
pub fn get_line_and_column(source: &str, position: usize) -> (usize, usize) {
    LineIndex::new(source).line_and_column(position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_lookup() {
        let index = LineIndex::new("a\nbc\n\nd");
        assert_eq!(index.line_and_column(0), (1, 1));
        assert_eq!(index.line_and_column(2), (2, 1));
        assert_eq!(index.line_and_column(3), (2, 2));
        assert_eq!(index.line_and_column(5), (3, 1));
        assert_eq!(index.line_and_column(6), (4, 1));
    }

    #[test]
    fn test_newline_belongs_to_its_line() {
        assert_eq!(get_line_and_column("ab\ncd", 2), (1, 3));
    }
}
