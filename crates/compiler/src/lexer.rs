//! A pull-based tokenizer: one [`Token`] per call to [`Lexer::tokenize`].
//!
//! Operates on the source's raw bytes. Scanning stays byte-safe over
//! UTF-8 input because every delimiter this tokenizer looks for (quotes,
//! newlines, the ASCII punctuation set) is a single byte whose value
//! never appears as a continuation byte of a multi-byte UTF-8 sequence,
//! so slicing on those boundaries always lands on a `char` boundary.

use crate::token::{Token, TokenType};

pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    start: usize,
    current: usize,
    line: u32,
    is_blank_line: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
            is_blank_line: true,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn advance(&mut self) -> u8 {
        let byte = self.bytes[self.current];
        self.current += 1;
        byte
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.bytes.len() {
            0
        } else {
            self.bytes[self.current + 1]
        }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.bytes[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> &'src str {
        &self.source[self.start..self.current]
    }

    fn make_token(&self, kind: TokenType) -> Token<'src> {
        Token::new(kind, self.lexeme(), self.line)
    }

    fn make_error(&self, message: &'static str) -> Token<'src> {
        Token::new(TokenType::LexicalError, message, self.line)
    }

    fn is_whitespace(&self) -> bool {
        let c = self.peek();
        c == b' ' || c == b'\t' || c == b'\r' || (self.is_blank_line && c == b'\n')
    }

    fn skip_whitespace(&mut self) {
        while self.is_whitespace() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
    }

    fn is_comment(&self) -> bool {
        self.peek() == b'/' && self.peek_next() == b'/'
    }

    fn skip_comment(&mut self) {
        if !self.is_comment() {
            return;
        }
        while self.peek() != b'\n' && !self.is_at_end() {
            self.advance();
        }
        if self.peek() == b'\n' && self.is_blank_line {
            // If it's not a blank line, let `tokenize` handle the
            // significant newline instead.
            self.line += 1;
            self.advance();
        }
    }

    fn skip_insignificant(&mut self) {
        while self.is_whitespace() || self.is_comment() {
            self.skip_whitespace();
            self.skip_comment();
        }
    }

    fn consume_number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.make_token(TokenType::Number)
    }

    fn consume_text(&mut self) -> Token<'src> {
        // Track the start line separately so the token reports where the
        // text literal began, even if it spans multiple lines.
        let mut line = self.line;
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                line += 1;
            }
            self.advance();
        }

        let token = if self.is_at_end() {
            self.make_error("The text is not terminated. Use \" to terminate it.")
        } else {
            self.advance(); // the closing quote
            self.make_token(TokenType::Text)
        };
        self.line = line;
        token
    }

    fn keyword_or_identifier_type(&self) -> TokenType {
        let lexeme = self.lexeme().as_bytes();
        let check = |prefix: usize, suffix: &[u8], kind: TokenType| -> Option<TokenType> {
            let matches = lexeme.len() == prefix + suffix.len() && &lexeme[prefix..] == suffix;
            if matches { Some(kind) } else { None }
        };

        let result = match lexeme.first() {
            Some(b'@') => check(1, b"out", TokenType::Out),
            Some(b'a') => check(1, b"nd", TokenType::And),
            Some(b'b') => check(1, b"lock", TokenType::Block),
            Some(b'e') if lexeme.len() > 1 => match lexeme[1] {
                b'l' => check(2, b"se", TokenType::Else),
                b'n' => check(2, b"d", TokenType::End),
                _ => None,
            },
            Some(b'f') if lexeme.len() > 1 => match lexeme[1] {
                b'a' => check(2, b"lse", TokenType::False),
                b'o' => check(2, b"reach", TokenType::Foreach),
                _ => None,
            },
            Some(b'i') if lexeme.len() > 1 => match lexeme[1] {
                b'f' => check(2, b"", TokenType::If),
                b'n' => check(2, b"", TokenType::In),
                _ => None,
            },
            Some(b'm') => check(1, b"od", TokenType::Mod),
            Some(b'n') if lexeme.len() > 2 && lexeme[1] == b'o' => match lexeme[2] {
                b'n' => check(3, b"e", TokenType::None),
                b't' => check(3, b"", TokenType::Not),
                _ => None,
            },
            Some(b'o') => check(1, b"r", TokenType::Or),
            Some(b's') => check(1, b"tep", TokenType::Step),
            Some(b't') => check(1, b"rue", TokenType::True),
            Some(b'v') => check(1, b"ar", TokenType::Var),
            Some(b'w') => check(1, b"hile", TokenType::While),
            _ => None,
        };

        result.unwrap_or(TokenType::Identifier)
    }

    fn consume_keyword_or_identifier(&mut self) -> Token<'src> {
        while is_alphanumeric(self.peek()) {
            self.advance();
        }
        self.make_token(self.keyword_or_identifier_type())
    }

    pub fn tokenize(&mut self) -> Token<'src> {
        self.skip_insignificant();

        self.is_blank_line = false;
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenType::Eof);
        }

        let c = self.advance();
        match c {
            b'\n' => {
                let token = self.make_token(TokenType::Newline);
                self.line += 1;
                self.is_blank_line = true;
                token
            }
            b':' => self.make_token(TokenType::Colon),
            b'(' => self.make_token(TokenType::OpenParen),
            b')' => self.make_token(TokenType::CloseParen),
            b'+' => {
                if self.matches(b':') {
                    self.make_token(TokenType::PlusColon)
                } else {
                    self.make_token(TokenType::Plus)
                }
            }
            b'-' => {
                if self.matches(b':') {
                    self.make_token(TokenType::MinusColon)
                } else {
                    self.make_token(TokenType::Minus)
                }
            }
            b'*' => {
                if self.matches(b':') {
                    self.make_token(TokenType::StarColon)
                } else {
                    self.make_token(TokenType::Star)
                }
            }
            b'/' => {
                if self.matches(b':') {
                    self.make_token(TokenType::SlashColon)
                } else {
                    self.make_token(TokenType::Slash)
                }
            }
            b'=' => self.make_token(TokenType::Equals),
            b'!' => {
                if self.matches(b'=') {
                    self.make_token(TokenType::ExclamationEquals)
                } else {
                    self.make_error(
                        "You have included an illegal character: ! (This character is only allowed in `!=`. Did you mean `not`?)",
                    )
                }
            }
            b'<' => {
                if self.matches(b'=') {
                    self.make_token(TokenType::LessThanEquals)
                } else {
                    self.make_token(TokenType::LessThan)
                }
            }
            b'>' => {
                if self.matches(b'=') {
                    self.make_token(TokenType::GreaterThanEquals)
                } else {
                    self.make_token(TokenType::GreaterThan)
                }
            }
            b'"' => self.consume_text(),
            b'@' => {
                let token = self.consume_keyword_or_identifier();
                if token.kind == TokenType::Out {
                    token
                } else {
                    self.make_error("'@' is only allowed in names of the built-in functionality.")
                }
            }
            b'.' => {
                if self.matches(b'.') {
                    self.make_token(TokenType::DotDot)
                } else {
                    self.make_error(
                        "You have included an illegal character: . (This character is only allowed as `..`.)",
                    )
                }
            }
            b'{' => self.make_token(TokenType::OpenBrace),
            b'}' => self.make_token(TokenType::CloseBrace),
            _ if is_alpha(c) => self.consume_keyword_or_identifier(),
            _ if c.is_ascii_digit() => self.consume_number(),
            _ => self.make_error("You have included an illegal character."),
        }
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_alphanumeric(c: u8) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.tokenize();
            let done = token.kind == TokenType::Eof;
            out.push(token.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn blank_lines_produce_no_newline_tokens() {
        assert_eq!(kinds("\n\nvar x: 1\n"), vec![
            TokenType::Var,
            TokenType::Identifier,
            TokenType::Colon,
            TokenType::Number,
            TokenType::Newline,
            TokenType::Eof,
        ]);
    }

    #[test]
    fn augmented_assignment_operators_tokenize() {
        assert_eq!(
            kinds("x +: 1\n"),
            vec![
                TokenType::Identifier,
                TokenType::PlusColon,
                TokenType::Number,
                TokenType::Newline,
                TokenType::Eof,
            ]
        );
        assert_eq!(kinds("x -: 1\n")[1], TokenType::MinusColon);
        assert_eq!(kinds("x *: 1\n")[1], TokenType::StarColon);
        assert_eq!(kinds("x /: 1\n")[1], TokenType::SlashColon);
    }

    #[test]
    fn line_comments_are_skipped() {
        assert_eq!(
            kinds("// a comment\nvar x: 1\n"),
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Colon,
                TokenType::Number,
                TokenType::Newline,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn multiline_text_tracks_start_line() {
        let mut lexer = Lexer::new("\"a\nb\"\n");
        let text = lexer.tokenize();
        assert_eq!(text.kind, TokenType::Text);
        assert_eq!(text.line, 1);
        let newline = lexer.tokenize();
        assert_eq!(newline.kind, TokenType::Newline);
        assert_eq!(newline.line, 3);
    }

    #[test]
    fn unterminated_text_is_a_lexical_error() {
        let mut lexer = Lexer::new("\"oops");
        let token = lexer.tokenize();
        assert_eq!(token.kind, TokenType::LexicalError);
    }

    #[test]
    fn bare_at_outside_out_is_an_error() {
        let mut lexer = Lexer::new("@foo");
        let token = lexer.tokenize();
        assert_eq!(token.kind, TokenType::LexicalError);
    }

    #[test]
    fn keywords_are_recognized_and_prefixes_are_identifiers() {
        assert_eq!(kinds("foreach")[0], TokenType::Foreach);
        assert_eq!(kinds("foreacher")[0], TokenType::Identifier);
        assert_eq!(kinds("none")[0], TokenType::None);
        assert_eq!(kinds("not")[0], TokenType::Not);
        assert_eq!(kinds("not_a_keyword")[0], TokenType::Identifier);
    }
}
