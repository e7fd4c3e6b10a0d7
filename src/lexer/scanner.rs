// Foxscream Scanner (Lexer)
// Converts source code into tokens

use crate::error::{FoxError, FoxResult, Span};
use crate::lexer::token::{Token, TokenKind};

/// Scanner that tokenizes Foxscream source code
pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_column: usize,
    file: String,
}

impl Scanner {
    pub fn new(source: &str, file: impl Into<String>) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_column: 1,
            file: file.into(),
        }
    }

    /// Scan all tokens from the source
    pub fn scan_tokens(&mut self) -> FoxResult<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            "",
            Span::single(self.line, self.column, self.current),
        ));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> FoxResult<()> {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            ';' => self.add_token(TokenKind::Semicolon),
            ':' => self.add_token(TokenKind::Colon),
            '^' => self.add_token(TokenKind::Caret),
            '~' => self.add_token(TokenKind::Tilde),

            '#' => {
                while self.peek() != '\n' && !self.is_at_end() {
                    self.advance();
                }
            }

            '+' => {
                let kind = if self.match_char('=') {
                    TokenKind::PlusEqual
                } else {
                    TokenKind::Plus
                };
                self.add_token(kind);
            }
            '-' => {
                let kind = if self.match_char('=') {
                    TokenKind::MinusEqual
                } else if self.match_char('>') {
                    TokenKind::ThinArrow
                } else {
                    TokenKind::Minus
                };
                self.add_token(kind);
            }
            '*' => {
                let kind = if self.match_char('*') {
                    TokenKind::StarStar
                } else if self.match_char('=') {
                    TokenKind::StarEqual
                } else {
                    TokenKind::Star
                };
                self.add_token(kind);
            }
            '/' => {
                let kind = if self.match_char('/') {
                    if self.match_char('=') {
                        TokenKind::SlashSlashEqual
                    } else {
                        TokenKind::SlashSlash
                    }
                } else if self.match_char('=') {
                    TokenKind::SlashEqual
                } else {
                    TokenKind::Slash
                };
                self.add_token(kind);
            }
            '%' => {
                let kind = if self.match_char('=') {
                    TokenKind::PercentEqual
                } else {
                    TokenKind::Percent
                };
                self.add_token(kind);
            }

            '!' => {
                let kind = if self.match_char('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenKind::EqualEqual
                } else if self.match_char('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LessEqual
                } else if self.match_char('<') {
                    TokenKind::LessLess
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else if self.match_char('>') {
                    TokenKind::GreaterGreater
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            '&' => {
                let kind = if self.match_char('&') {
                    TokenKind::And
                } else {
                    TokenKind::Ampersand
                };
                self.add_token(kind);
            }
            '|' => {
                let kind = if self.match_char('|') {
                    TokenKind::Or
                } else {
                    TokenKind::Pipe
                };
                self.add_token(kind);
            }

            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            '"' | '\'' => self.string(c)?,

            c if c.is_ascii_digit() => self.number()?,
            c if c.is_alphabetic() || c == '_' => self.identifier(),

            _ => {
                return Err(self
                    .error(&format!("Unexpected character '{}'", c))
                    .with_help("Remove this character or check for typos"));
            }
        }

        Ok(())
    }

    fn string(&mut self, quote_char: char) -> FoxResult<()> {
        let start_line = self.line;
        let start_col = self.start_column;
        let mut raw = String::new();

        while self.peek() != quote_char && !self.is_at_end() {
            let c = self.advance();
            raw.push(c);
            if c == '\\' && !self.is_at_end() {
                raw.push(self.advance());
            } else if c == '\n' {
                self.line += 1;
                self.column = 1;
            }
        }

        if self.is_at_end() {
            let quote_name = if quote_char == '"' { "double" } else { "single" };
            return Err(FoxError::syntax_error(
                "Unterminated string",
                Span::from_positions(start_line, start_col, self.line, self.column),
                &self.file,
            )
            .with_help(format!(
                "Add a closing {} quote to terminate the string",
                quote_name
            )));
        }

        // Closing quote
        self.advance();

        let value = self.process_escapes(&raw)?;
        self.add_token_spanning(TokenKind::String(value), start_line);
        Ok(())
    }

    fn process_escapes(&self, s: &str) -> FoxResult<String> {
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '\\' {
                result.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some('\n') => {}
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let code = u8::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 2)
                        .ok_or_else(|| {
                            self.error(&format!("Invalid hex escape '\\x{}'", hex))
                                .with_help("Use \\xHH where H is 0-9, a-f, or A-F")
                        })?;
                    result.push(code as char);
                }
                Some('u') => {
                    if chars.next() != Some('{') {
                        return Err(self
                            .error("Invalid unicode escape")
                            .with_help("Use \\u{HHHH}, e.g. \\u{1F98A}"));
                    }
                    let mut hex = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(h) if h.is_ascii_hexdigit() && hex.len() < 6 => hex.push(h),
                            _ => {
                                return Err(self
                                    .error("Malformed unicode escape")
                                    .with_help("Unicode escape \\u{...} allows 1-6 hex digits"));
                            }
                        }
                    }
                    let ch = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| {
                            self.error(&format!("Invalid unicode code point '{}'", hex))
                        })?;
                    result.push(ch);
                }
                Some(other) => {
                    return Err(self
                        .error(&format!("Invalid escape sequence '\\{}'", other))
                        .with_help("Valid escapes: \\n, \\t, \\r, \\0, \\\\, \\\", \\', \\xHH, \\u{HHHH}"));
                }
                None => {
                    return Err(self.error("Unexpected end of string after '\\'"));
                }
            }
        }

        Ok(result)
    }

    fn number(&mut self) -> FoxResult<()> {
        let first = self.source[self.start];
        if first == '0' && matches!(self.peek(), 'x' | 'X' | 'o' | 'O' | 'b' | 'B') {
            let radix = match self.advance().to_ascii_lowercase() {
                'x' => 16,
                'o' => 8,
                _ => 2,
            };
            while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
                self.advance();
            }
            let lexeme: String = self.source[self.start + 2..self.current]
                .iter()
                .filter(|c| **c != '_')
                .collect();
            let value = i64::from_str_radix(&lexeme, radix).map_err(|_| {
                self.error(&format!("Invalid base-{} integer literal", radix))
            })?;
            self.add_token(TokenKind::Int(value));
            return Ok(());
        }

        self.digits();
        let mut is_float = false;

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            self.digits();
        }

        if matches!(self.peek(), 'e' | 'E') {
            let sign = matches!(self.peek_next(), '+' | '-');
            let after = self.source.get(self.current + if sign { 2 } else { 1 });
            if after.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                if sign {
                    self.advance();
                }
                self.digits();
            }
        }

        let lexeme: String = self.source[self.start..self.current]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        let kind = if is_float {
            TokenKind::Float(
                lexeme
                    .parse()
                    .map_err(|_| self.error(&format!("Invalid number '{}'", lexeme)))?,
            )
        } else {
            TokenKind::Int(lexeme.parse().map_err(|_| {
                self.error(&format!("Integer literal '{}' is out of range", lexeme))
            })?)
        };

        self.add_token(kind);
        Ok(())
    }

    fn digits(&mut self) {
        while self.peek().is_ascii_digit() || self.peek() == '_' {
            self.advance();
        }
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = Self::keyword_or_identifier(&text);
        self.add_token(kind);
    }

    fn keyword_or_identifier(text: &str) -> TokenKind {
        match text {
            "fn" => TokenKind::Fn,
            "class" => TokenKind::Class,
            "static" => TokenKind::Static,
            "trait" => TokenKind::Trait,
            "of" => TokenKind::Of,
            "has" => TokenKind::Has,
            "is" => TokenKind::Is,
            "in" => TokenKind::In,
            "not" => TokenKind::Not,
            "and" => TokenKind::AndKw,
            "or" => TokenKind::OrKw,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "match" => TokenKind::Match,
            "case" => TokenKind::Case,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "leave" => TokenKind::Leave,
            "defer" => TokenKind::Defer,
            "label" => TokenKind::Label,
            _ => TokenKind::Identifier(text.to_string()),
        }
    }

    // Helper methods
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() != expected || self.is_at_end() {
            false
        } else {
            self.current += 1;
            self.column += 1;
            true
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let span = Span::from_positions(self.line, self.start_column, self.line, self.column - 1);
        self.tokens.push(Token::new(kind, lexeme, span));
    }

    /// Tokens that may contain newlines (strings) keep their starting line
    fn add_token_spanning(&mut self, kind: TokenKind, start_line: usize) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let span =
            Span::from_positions(start_line, self.start_column, self.line, self.column - 1);
        self.tokens.push(Token::new(kind, lexeme, span));
    }

    fn error(&self, message: &str) -> FoxError {
        FoxError::syntax_error(
            message,
            Span::from_positions(self.line, self.start_column, self.line, self.column),
            &self.file,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source, "<test>")
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_scan_numbers() {
        assert_eq!(
            kinds("12 0x1F 0b1010 0o17 1_000 2.5 1e3"),
            vec![
                TokenKind::Int(12),
                TokenKind::Int(31),
                TokenKind::Int(10),
                TokenKind::Int(15),
                TokenKind::Int(1000),
                TokenKind::Float(2.5),
                TokenKind::Float(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_scan_operators() {
        assert_eq!(
            kinds("** // //= << >> -> => != &&"),
            vec![
                TokenKind::StarStar,
                TokenKind::SlashSlash,
                TokenKind::SlashSlashEqual,
                TokenKind::LessLess,
                TokenKind::GreaterGreater,
                TokenKind::ThinArrow,
                TokenKind::Arrow,
                TokenKind::BangEqual,
                TokenKind::And,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_scan_keywords_and_comments() {
        assert_eq!(
            kinds("label outer: for x in xs # trailing\n leave outer"),
            vec![
                TokenKind::Label,
                TokenKind::Identifier("outer".into()),
                TokenKind::Colon,
                TokenKind::For,
                TokenKind::Identifier("x".into()),
                TokenKind::In,
                TokenKind::Identifier("xs".into()),
                TokenKind::Leave,
                TokenKind::Identifier("outer".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_prelude_names_are_identifiers() {
        assert_eq!(
            kinds("true null"),
            vec![
                TokenKind::Identifier("true".into()),
                TokenKind::Identifier("null".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_scan_string_escapes() {
        assert_eq!(
            kinds(r#"'a\tb' "\u{41}\x42""#),
            vec![
                TokenKind::String("a\tb".into()),
                TokenKind::String("AB".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = Scanner::new("x = 'abc", "<test>").scan_tokens().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::SyntaxError);
        assert_eq!(err.message, "Unterminated string");
    }

    #[test]
    fn test_token_lines() {
        let tokens = Scanner::new("a\nb", "<test>").scan_tokens().unwrap();
        assert_eq!(tokens[0].span.start.line, 1);
        assert_eq!(tokens[1].span.start.line, 2);
    }
}
