//! Tokenizer for the script subset.

use super::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
    /// A line terminator separates this token from the previous one.
    pub newline_before: bool,
}

/// Longest first, so `===` wins over `==` and `=`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**=", "...", "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "+=", "-=",
    "*=", "/=", "%=", "**", "=>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*",
    "/", "%", "!", "?", ":", "=", ".",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line, self.column)
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            let newline_before = self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                    newline_before,
                });
                break;
            };
            let kind = if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                self.number()?
            } else if c == '\'' || c == '"' {
                self.string(c)?
            } else if is_ident_start(c) {
                let mut name = String::new();
                while let Some(c) = self.peek().filter(|c| is_ident_part(*c)) {
                    name.push(c);
                    self.bump();
                }
                TokenKind::Ident(name)
            } else if c == '`' {
                return Err(self.error("template literals are not supported"));
            } else {
                self.punct()?
            };
            tokens.push(Token {
                kind,
                line,
                column,
                newline_before,
            });
        }
        tracing::trace!(tokens = tokens.len(), bytes = self.source.len(), "tokenized script");
        Ok(tokens)
    }

    /// Skips whitespace and comments; reports whether a newline was crossed.
    fn skip_trivia(&mut self) -> Result<bool, SyntaxError> {
        let mut newline = false;
        while let Some(c) = self.peek() {
            match c {
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    newline = true;
                    self.bump();
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some('\n') => newline = true,
                            Some(_) => {}
                            None => {
                                return Err(SyntaxError::new("unterminated comment", line, column))
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(newline)
    }

    fn number(&mut self) -> Result<TokenKind, SyntaxError> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                digits.push(c);
                self.bump();
            }
            let value = u64::from_str_radix(&digits, 16)
                .map_err(|_| self.error("invalid hexadecimal literal"))?;
            return Ok(TokenKind::Number(value as f64));
        }
        let mut text = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '_') {
            if c != '_' {
                text.push(c);
            }
            self.bump();
        }
        if self.peek() == Some('.') {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_at(1);
            let digit_at = if matches!(sign, Some('+' | '-')) { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                text.push('e');
                self.bump();
                if digit_at == 2 {
                    text.extend(self.bump());
                }
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    text.push(c);
                    self.bump();
                }
            }
        }
        if self.peek().is_some_and(is_ident_start) {
            return Err(self.error("identifier starts immediately after numeric literal"));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error(format!("invalid number '{text}'")))
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, SyntaxError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(SyntaxError::new("unterminated string literal", line, column));
            };
            match c {
                c if c == quote => break,
                '\n' => return Err(SyntaxError::new("unterminated string literal", line, column)),
                '\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(SyntaxError::new("unterminated string literal", line, column));
                    };
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'v' => out.push('\u{b}'),
                        '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
                        'x' => out.push(self.hex_escape(2)?),
                        'u' if self.peek() == Some('{') => {
                            self.bump();
                            let mut digits = String::new();
                            while let Some(c) = self.bump() {
                                if c == '}' {
                                    break;
                                }
                                digits.push(c);
                            }
                            out.push(code_point(&digits).ok_or_else(|| self.error("invalid unicode escape"))?);
                        }
                        'u' => out.push(self.hex_escape(4)?),
                        '\n' => {}
                        '\r' => {
                            if self.peek() == Some('\n') {
                                self.bump();
                            }
                        }
                        other => out.push(other),
                    }
                }
                c => out.push(c),
            }
        }
        Ok(TokenKind::String(out))
    }

    fn hex_escape(&mut self, len: usize) -> Result<char, SyntaxError> {
        let mut digits = String::with_capacity(len);
        for _ in 0..len {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(self.error("invalid hexadecimal escape sequence")),
            }
        }
        // Lone surrogates have no `char`; substitute the replacement character.
        Ok(code_point(&digits).unwrap_or('\u{fffd}'))
    }

    fn punct(&mut self) -> Result<TokenKind, SyntaxError> {
        for p in PUNCTUATORS {
            let matches = p
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if matches {
                for _ in 0..p.chars().count() {
                    self.bump();
                }
                return Ok(TokenKind::Punct(p));
            }
        }
        let c = self.peek().unwrap_or(' ');
        Err(self.error(format!("Invalid or unexpected token '{c}'")))
    }
}

fn code_point(hex: &str) -> Option<char> {
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn punctuators_prefer_longest_match() {
        assert_eq!(
            kinds("a === b !== c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("==="),
                TokenKind::Ident("b".into()),
                TokenKind::Punct("!=="),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_in_all_forms() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 0x1F 1_000"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(31.0),
                TokenKind::Number(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb" 'A\x42'"#),
            vec![
                TokenKind::String("it's".into()),
                TokenKind::String("a\nb".into()),
                TokenKind::String("AB".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newlines_and_comments_are_tracked() {
        let tokens = tokenize("a // note\n/* x\n y */ b").unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("x = 'abc").unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));
    }
}
