//! The document being composed.
//!
//! Characters plus a cursor. Text is only ever changed through the session
//! orchestrator; the buffer itself has no notion of predictions or scanning.

/// Characters that belong to a word when looking for word boundaries.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\'' || c == '-'
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    chars: Vec<char>,
    cursor: usize,
    /// Texts cleared away during this session, oldest first.
    archive: Vec<String>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let cursor = chars.len();
        Self {
            chars,
            cursor,
            archive: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = pos.min(self.chars.len());
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.chars.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn insert(&mut self, text: &str) {
        for c in text.chars() {
            self.chars.insert(self.cursor, c);
            self.cursor += 1;
        }
    }

    /// Returns `false` when the cursor is at the start.
    pub fn delete_before_cursor(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        true
    }

    /// Text up to the cursor: what the prediction model sees.
    pub fn context(&self) -> String {
        self.chars[..self.cursor].iter().collect()
    }

    /// Start index of the word touching the cursor from the left.
    pub fn word_start(&self) -> usize {
        let mut start = self.cursor;
        while start > 0 && is_word_char(self.chars[start - 1]) {
            start -= 1;
        }
        start
    }

    /// The in-progress word left of the cursor; empty after a boundary.
    pub fn word_fragment(&self) -> String {
        self.chars[self.word_start()..self.cursor].iter().collect()
    }

    /// Replace the in-progress fragment with `word`, leaving the cursor
    /// after it.
    pub fn replace_fragment(&mut self, word: &str) {
        let start = self.word_start();
        self.chars.drain(start..self.cursor);
        self.cursor = start;
        self.insert(word);
    }

    /// Empty the buffer. Non-empty text is kept in the archive.
    pub fn clear(&mut self) {
        if !self.chars.is_empty() {
            let text = self.text();
            self.archive.push(text);
        }
        self.chars.clear();
        self.cursor = 0;
    }

    /// Replace the whole text, cursor at the end. The archive is untouched.
    pub fn replace_all(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    pub fn archive(&self) -> &[String] {
        &self.archive
    }

    /// Archived texts followed by the current text, separated by blank lines.
    pub fn document(&self) -> String {
        let current = self.text();
        let mut parts: Vec<&str> = self.archive.iter().map(String::as_str).collect();
        if !current.is_empty() {
            parts.push(&current);
        }
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_delete_at_cursor() {
        let mut b = TextBuffer::new();
        b.insert("hllo");
        b.set_cursor(1);
        b.insert("e");
        assert_eq!(b.text(), "hello");
        assert_eq!(b.cursor(), 2);
        assert!(b.delete_before_cursor());
        assert_eq!(b.text(), "hllo");
        assert_eq!(b.cursor(), 1);
    }

    #[test]
    fn delete_at_start_is_noop() {
        let mut b = TextBuffer::from_text("abc");
        b.set_cursor(0);
        assert!(!b.delete_before_cursor());
        assert_eq!(b.text(), "abc");
    }

    #[test]
    fn cursor_clamped() {
        let mut b = TextBuffer::from_text("ab");
        b.set_cursor(10);
        assert_eq!(b.cursor(), 2);
        assert!(!b.move_right());
        assert!(b.move_left());
        assert_eq!(b.cursor(), 1);
    }

    #[test]
    fn context_stops_at_cursor() {
        let mut b = TextBuffer::from_text("I like tea");
        b.set_cursor(6);
        assert_eq!(b.context(), "I like");
    }

    #[test]
    fn word_fragment() {
        assert_eq!(TextBuffer::from_text("I lik").word_fragment(), "lik");
        assert_eq!(TextBuffer::from_text("I like ").word_fragment(), "");
        assert_eq!(TextBuffer::from_text("").word_fragment(), "");
        assert_eq!(TextBuffer::from_text("don'").word_fragment(), "don'");
        assert_eq!(TextBuffer::from_text("end.").word_fragment(), "");
    }

    #[test]
    fn replace_fragment_mid_text() {
        let mut b = TextBuffer::from_text("I lik tea");
        b.set_cursor(5);
        b.replace_fragment("like");
        assert_eq!(b.text(), "I like tea");
        assert_eq!(b.cursor(), 6);
    }

    #[test]
    fn replace_empty_fragment_inserts() {
        let mut b = TextBuffer::from_text("I ");
        b.replace_fragment("like");
        assert_eq!(b.text(), "I like");
    }

    #[test]
    fn multibyte_characters() {
        let mut b = TextBuffer::from_text("zażó");
        assert_eq!(b.len(), 4);
        assert!(b.delete_before_cursor());
        assert_eq!(b.text(), "zaż");
        assert_eq!(b.word_fragment(), "zaż");
    }

    #[test]
    fn clear_archives_text() {
        let mut b = TextBuffer::from_text("first");
        b.clear();
        b.clear();
        b.insert("second");
        assert_eq!(b.archive(), &["first".to_string()]);
        assert_eq!(b.document(), "first\n\nsecond");
        assert!(!b.is_empty());
    }

    #[test]
    fn replace_all_moves_cursor_to_end() {
        let mut b = TextBuffer::from_text("old");
        b.set_cursor(0);
        b.replace_all("loaded text");
        assert_eq!(b.cursor(), 11);
        assert_eq!(b.context(), "loaded text");
    }
}
