//! Multi-line text buffer backing the editor pane.

use unicode_width::UnicodeWidthStr;

const INDENT: &str = "    ";

/// Convert a character index (0-based) to a byte index in the given string.
/// If `n` exceeds the number of characters, returns `s.len()`.
fn char_to_byte_index(s: &str, n: usize) -> usize {
    match s.char_indices().nth(n) {
        Some((i, _)) => i,
        None => s.len(),
    }
}

/// Lines plus a cursor. The cursor column counts characters, not bytes.
#[derive(Debug, Clone)]
pub struct Editor {
    lines: Vec<String>,
    row: usize,
    col: usize,
    /// First visible line, maintained by `scroll_into_view`.
    pub scroll: usize,
}

impl Editor {
    pub fn new(text: &str) -> Self {
        let mut editor = Self { lines: Vec::new(), row: 0, col: 0, scroll: 0 };
        editor.set_text(text);
        editor
    }

    /// Replace the whole buffer and move the cursor to the start.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
        self.row = 0;
        self.col = 0;
        self.scroll = 0;
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Terminal column of the cursor, accounting for wide characters.
    pub fn cursor_display_col(&self) -> usize {
        let line = &self.lines[self.row];
        line[..char_to_byte_index(line, self.col)].width()
    }

    fn line_chars(&self, row: usize) -> usize {
        self.lines[row].chars().count()
    }

    fn byte_col(&self) -> usize {
        char_to_byte_index(&self.lines[self.row], self.col)
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_col();
        self.lines[self.row].insert(at, c);
        self.col += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            match c {
                '\n' => self.newline(),
                '\r' => {}
                '\t' => self.indent(),
                c => self.insert_char(c),
            }
        }
    }

    pub fn indent(&mut self) {
        for c in INDENT.chars() {
            self.insert_char(c);
        }
    }

    /// Split the line at the cursor, carrying the current line's leading whitespace over.
    pub fn newline(&mut self) {
        let at = self.byte_col();
        let rest = self.lines[self.row].split_off(at);
        let leading: String = self.lines[self.row]
            .chars()
            .take_while(|c| *c == ' ')
            .collect();
        self.col = leading.chars().count();
        self.row += 1;
        self.lines.insert(self.row, leading + &rest);
    }

    pub fn backspace(&mut self) {
        if self.col > 0 {
            self.col -= 1;
            let at = self.byte_col();
            self.lines[self.row].remove(at);
        } else if self.row > 0 {
            let current = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.line_chars(self.row);
            self.lines[self.row].push_str(&current);
        }
    }

    pub fn delete(&mut self) {
        if self.col < self.line_chars(self.row) {
            let at = self.byte_col();
            self.lines[self.row].remove(at);
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = self.line_chars(self.row);
        }
    }

    pub fn move_right(&mut self) {
        if self.col < self.line_chars(self.row) {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.col.min(self.line_chars(self.row));
        }
    }

    pub fn move_down(&mut self) {
        if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = self.col.min(self.line_chars(self.row));
        }
    }

    pub fn move_home(&mut self) {
        self.col = 0;
    }

    pub fn move_end(&mut self) {
        self.col = self.line_chars(self.row);
    }

    /// Adjust `scroll` so the cursor row is inside a window of `height` lines.
    pub fn scroll_into_view(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.row < self.scroll {
            self.scroll = self.row;
        } else if self.row >= self.scroll + height {
            self.scroll = self.row + 1 - height;
        }
    }
}
