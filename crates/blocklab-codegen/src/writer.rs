//! Indentation-aware source text buffer shared by all emitters.

/// A buffer for building source code line by line with indentation.
#[derive(Debug)]
pub struct CodeWriter {
    buffer: String,
    indent_level: usize,
    indent_str: &'static str,
}

impl CodeWriter {
    pub fn new(indent_str: &'static str) -> Self {
        CodeWriter {
            buffer: String::new(),
            indent_level: 0,
            indent_str,
        }
    }

    /// Writes one line at the current indentation. Empty lines carry no
    /// trailing whitespace.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent_level {
                self.buffer.push_str(self.indent_str);
            }
            self.buffer.push_str(text);
        }
        self.buffer.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Length in bytes of the text written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Text written since byte offset `mark` (see [`CodeWriter::len`]).
    pub fn since(&self, mark: usize) -> &str {
        &self.buffer[mark..]
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Prefixes every non-empty line of `text` with `prefix`.
pub fn prefix_lines(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if line != "\n" {
            out.push_str(prefix);
        }
        out.push_str(line);
    }
    out
}

/// Joins the definitions section and the main code the way every emitter
/// lays out a file: definitions separated by blank lines, then two blank
/// lines, then the code.
pub fn assemble(definitions: &[String], code: &str) -> String {
    let definitions: Vec<&str> = definitions
        .iter()
        .map(|d| d.trim_end_matches('\n'))
        .filter(|d| !d.is_empty())
        .collect();
    if definitions.is_empty() {
        return code.to_string();
    }
    let mut out = definitions.join("\n\n");
    out.push('\n');
    if !code.is_empty() {
        out.push_str("\n\n");
        out.push_str(code);
    }
    out
}
