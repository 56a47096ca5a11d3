//! Splits mapping text into delimiter-separated columns, one line at a time.
//!
//! Readers drive this directly instead of `str::split` so that header
//! validation fails positionally (`expect_col`) and so that a source can be
//! re-read from a checkpoint (`mark`/`reset`) when a sink demands a second
//! pass. The whole input is held in memory; the input builder is responsible
//! for spooling non-seekable streams before a reader ever sees them.

use std::borrow::Cow;

use failure_derive::Fail;

#[derive(Debug, Fail)]
#[fail(display = "line {}: expected {}, found {:?}", line, expected, found)]
pub struct SyntaxError {
    pub line: usize,
    pub expected: String,
    pub found: String,
}
impl SyntaxError {
    fn new(line: usize, expected: &str, found: &str) -> SyntaxError {
        SyntaxError {
            line,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ColState {
    /// Start of a line, nothing consumed yet
    LineStart,
    /// The previous column ended with a delimiter, so another cell follows
    /// even if it is empty
    AfterDelimiter,
    /// The previous column ran to the end of the line
    AfterCol,
}

pub struct ColumnReader<'a> {
    text: &'a str,
    delimiter: char,
    pos: usize,
    line: usize,
    state: ColState,
    marked: Option<(usize, usize, ColState)>,
}
impl<'a> ColumnReader<'a> {
    pub fn new(text: &'a str, delimiter: char) -> ColumnReader<'a> {
        ColumnReader {
            text,
            delimiter,
            pos: 0,
            line: 1,
            state: ColState::LineStart,
            marked: None,
        }
    }
    #[inline]
    pub fn tabbed(text: &'a str) -> ColumnReader<'a> {
        ColumnReader::new(text, '\t')
    }
    #[inline]
    pub fn spaced(text: &'a str) -> ColumnReader<'a> {
        ColumnReader::new(text, ' ')
    }
    #[inline]
    pub fn line_number(&self) -> usize {
        self.line
    }
    #[inline]
    pub fn at_eof(&self) -> bool {
        self.pos >= self.text.len()
    }
    /// True once the current line has no further columns
    pub fn at_eol(&self) -> bool {
        match self.peek() {
            None | Some('\n') | Some('\r') => self.state != ColState::AfterDelimiter,
            _ => false,
        }
    }
    #[inline]
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }
    fn at_line_break(&self) -> bool {
        matches!(self.peek(), None | Some('\n') | Some('\r'))
    }
    /// Checkpoint the current position for a later `reset`
    pub fn mark(&mut self) {
        self.marked = Some((self.pos, self.line, self.state));
    }
    /// Rewind to the last `mark`, or to the start of the input if none was set
    pub fn reset(&mut self) {
        match self.marked {
            Some((pos, line, state)) => {
                self.pos = pos;
                self.line = line;
                self.state = state;
            }
            None => {
                self.pos = 0;
                self.line = 1;
                self.state = ColState::LineStart;
            }
        }
    }
    pub fn next_col(&mut self) -> Option<&'a str> {
        if self.at_line_break() {
            if self.state == ColState::AfterDelimiter {
                // A trailing delimiter means a final empty cell
                self.state = ColState::AfterCol;
                return Some("");
            }
            return None;
        }
        let start = self.pos;
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            if c == b'\n' || c == b'\r' {
                break;
            }
            if c as char == self.delimiter {
                let col = &self.text[start..self.pos];
                self.pos += 1;
                self.state = ColState::AfterDelimiter;
                return Some(col);
            }
            self.pos += 1;
        }
        self.state = ColState::AfterCol;
        Some(&self.text[start..self.pos])
    }
    pub fn next_col_required(&mut self, what: &str) -> Result<&'a str, SyntaxError> {
        let line = self.line;
        self.next_col()
            .ok_or_else(|| SyntaxError::new(line, what, "end of line"))
    }
    /// Assert the next column is exactly `literal`, failing positionally
    pub fn expect_col(&mut self, literal: &str) -> Result<(), SyntaxError> {
        let line = self.line;
        match self.next_col() {
            Some(col) if col == literal => Ok(()),
            Some(col) => Err(SyntaxError::new(line, &format!("{:?}", literal), col)),
            None => Err(SyntaxError::new(line, &format!("{:?}", literal), "end of line")),
        }
    }
    pub fn next_int(&mut self, what: &str) -> Result<i32, SyntaxError> {
        let line = self.line;
        let col = self.next_col_required(what)?;
        col.parse::<i32>()
            .map_err(|_| SyntaxError::new(line, what, col))
    }
    /// Like `next_col`, but a cell opening with `"` is reassembled across
    /// delimiters until its closing quote, with `""` unescaped to `"`.
    pub fn next_quoted_col(&mut self) -> Option<Cow<'a, str>> {
        if self.peek() != Some('"') || self.at_eol() {
            return self.next_col().map(Cow::Borrowed);
        }
        self.pos += 1;
        let mut unquoted = String::new();
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            if c == b'\n' || c == b'\r' {
                break;
            }
            if c == b'"' {
                if bytes.get(self.pos + 1) == Some(&b'"') {
                    unquoted.push('"');
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                break;
            }
            let rest = &self.text[self.pos..];
            let ch = rest.chars().next().unwrap();
            unquoted.push(ch);
            self.pos += ch.len_utf8();
        }
        // Swallow the delimiter separating us from the next cell
        if self.peek() == Some(self.delimiter) {
            self.pos += 1;
            self.state = ColState::AfterDelimiter;
        } else {
            self.state = ColState::AfterCol;
        }
        Some(Cow::Owned(unquoted))
    }
    /// Everything left on the current line, delimiters included
    pub fn rest_of_line(&mut self) -> &'a str {
        let start = self.pos;
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            if c == b'\n' || c == b'\r' {
                break;
            }
            self.pos += 1;
        }
        self.state = ColState::AfterCol;
        &self.text[start..self.pos]
    }
    /// Consume through the end of the current line
    pub fn end_line(&mut self) {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        if self.pos < bytes.len() {
            self.pos += 1;
            self.line += 1;
        }
        self.state = ColState::LineStart;
    }
    /// Advance to the next line, reporting whether one exists
    pub fn next_line(&mut self) -> bool {
        self.end_line();
        !self.at_eof()
    }
    /// Count and consume the leading delimiters of the current line
    pub fn indent(&mut self) -> usize {
        debug_assert_eq!(self.state, ColState::LineStart);
        let mut count = 0;
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] as char == self.delimiter {
            self.pos += 1;
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_cols() {
        let mut reader = ColumnReader::tabbed("a\tb\tc\nsecond");
        assert_eq!(reader.next_col(), Some("a"));
        assert_eq!(reader.next_col(), Some("b"));
        assert_eq!(reader.next_col(), Some("c"));
        assert_eq!(reader.next_col(), None);
        assert!(reader.next_line());
        assert_eq!(reader.line_number(), 2);
        assert_eq!(reader.next_col(), Some("second"));
        assert_eq!(reader.next_col(), None);
        reader.end_line();
        assert!(reader.at_eof());
    }

    #[test]
    fn trailing_empty_col() {
        let mut reader = ColumnReader::tabbed("a\tb\t\n");
        assert_eq!(reader.next_col(), Some("a"));
        assert_eq!(reader.next_col(), Some("b"));
        assert_eq!(reader.next_col(), Some(""));
        assert_eq!(reader.next_col(), None);
    }

    #[test]
    fn empty_line_has_no_cols() {
        let mut reader = ColumnReader::tabbed("\nx");
        assert_eq!(reader.next_col(), None);
        assert!(reader.next_line());
        assert_eq!(reader.next_col(), Some("x"));
    }

    #[test]
    fn expect_col_positional() {
        let mut reader = ColumnReader::spaced("tsrg2 left right");
        assert!(reader.expect_col("tsrg2").is_ok());
        let err = reader.expect_col("wrong").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.found, "left");
    }

    #[test]
    fn quoted_cell_reassembly() {
        let mut reader = ColumnReader::new("\"a, b\",plain,\"he said \"\"hi\"\"\"", ',');
        assert_eq!(reader.next_quoted_col().unwrap(), "a, b");
        assert_eq!(reader.next_quoted_col().unwrap(), "plain");
        assert_eq!(reader.next_quoted_col().unwrap(), "he said \"hi\"");
        assert_eq!(reader.next_col(), None);
    }

    #[test]
    fn mark_reset_replays() {
        let mut reader = ColumnReader::tabbed("one\ntwo\nthree");
        assert_eq!(reader.next_col(), Some("one"));
        reader.next_line();
        reader.mark();
        assert_eq!(reader.next_col(), Some("two"));
        reader.next_line();
        assert_eq!(reader.next_col(), Some("three"));
        reader.reset();
        assert_eq!(reader.line_number(), 2);
        assert_eq!(reader.next_col(), Some("two"));
    }

    #[test]
    fn indent_counts_delimiters() {
        let mut reader = ColumnReader::tabbed("\t\tm\t()V\tname");
        assert_eq!(reader.indent(), 2);
        assert_eq!(reader.next_col(), Some("m"));
        assert_eq!(reader.next_col(), Some("()V"));
    }

    #[test]
    fn crlf_tolerated() {
        let mut reader = ColumnReader::tabbed("a\tb\r\nc");
        assert_eq!(reader.next_col(), Some("a"));
        assert_eq!(reader.next_col(), Some("b"));
        assert_eq!(reader.next_col(), None);
        assert!(reader.next_line());
        assert_eq!(reader.next_col(), Some("c"));
    }
}
