//! The tokenizer.
//!
//! A small state machine over the source characters. Newlines are tokens
//! (they join block expressions); every token carries its 1-based source
//! position plus a `glued` flag telling the parser whether any whitespace
//! separated it from the previous token — `f(x)` is a call, `f (x)` is not.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Lower-case identifier, possibly ending in `!` or `?`.
    Word(String),
    /// Capitalised, possibly dotted module path (`Foo`, `Foo.Bar`).
    ModName(String),
    /// `:name` literal.
    SymbolLit(String),
    /// `name:` keyword-argument marker.
    KeywordIdent(String),
    Int(i64),
    Real(f64),
    Str(String),
    Newline,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `%{` opening a map literal.
    MapBrace,
    Comma,
    Semicolon,
    Op(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
    /// No whitespace between this token and the previous one.
    pub glued: bool,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    lines: Vec<&'a str>,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        lines: source.lines().collect(),
    };
    lexer.run()
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn line_text(&self, line: u32) -> String {
        self.lines
            .get(line.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("")
            .to_owned()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line, self.column, self.line_text(self.line))
    }

    fn run(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut last_end = (0u32, 0u32);
        loop {
            // Skip horizontal whitespace and comments.
            while let Some(c) = self.peek() {
                if c == ' ' || c == '\t' || c == '\r' {
                    self.advance();
                } else if c == '#' {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                } else {
                    break;
                }
            }
            let (line, column) = (self.line, self.column);
            let glued = (line, column) == last_end;
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, line, column, glued: false });
                return Ok(tokens);
            };
            let kind = self.next_kind(c)?;
            last_end = (self.line, self.column);
            tokens.push(Token { kind, line, column, glued });
        }
    }

    fn next_kind(&mut self, c: char) -> Result<TokenKind, ParseError> {
        match c {
            '\n' => {
                self.advance();
                Ok(TokenKind::Newline)
            }
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            '%' => {
                self.advance();
                if self.peek() == Some('{') {
                    self.advance();
                    Ok(TokenKind::MapBrace)
                } else {
                    Err(self.error("expected '{' after '%'"))
                }
            }
            '"' | '\'' => self.lex_string(c),
            ':' => self.lex_symbol(),
            '0'..='9' => self.lex_number(),
            'a'..='z' | '_' => self.lex_word(),
            'A'..='Z' => self.lex_modname(),
            '=' => {
                self.advance();
                match self.peek() {
                    Some('=') => self.single(TokenKind::Op("==")),
                    Some('>') => self.single(TokenKind::Op("=>")),
                    _ => Ok(TokenKind::Op("=")),
                }
            }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.single(TokenKind::Op("!="))
                } else {
                    Err(self.error("unexpected character '!'"))
                }
            }
            '+' => {
                self.advance();
                if self.peek() == Some('+') {
                    self.single(TokenKind::Op("++"))
                } else {
                    Ok(TokenKind::Op("+"))
                }
            }
            '-' => {
                self.advance();
                if self.peek() == Some('>') {
                    self.single(TokenKind::Op("->"))
                } else {
                    Ok(TokenKind::Op("-"))
                }
            }
            '|' => {
                self.advance();
                if self.peek() == Some('>') {
                    self.single(TokenKind::Op("|>"))
                } else {
                    Ok(TokenKind::Op("|"))
                }
            }
            '*' => self.single(TokenKind::Op("*")),
            '/' => self.single(TokenKind::Op("/")),
            '.' => self.single(TokenKind::Op(".")),
            '&' => self.single(TokenKind::Op("&")),
            other => Err(self.error(format!("unexpected character '{other}'"))),
        }
    }

    fn single(&mut self, kind: TokenKind) -> Result<TokenKind, ParseError> {
        self.advance();
        Ok(kind)
    }

    fn lex_string(&mut self, delim: char) -> Result<TokenKind, ParseError> {
        let (start_line, start_col) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ParseError::new(
                        "unterminated string literal",
                        start_line,
                        start_col,
                        self.line_text(start_line),
                    ));
                }
                Some(c) if c == delim => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some(escaped) => text.push(escaped),
                    None => {
                        return Err(ParseError::new(
                            "unterminated string literal",
                            start_line,
                            start_col,
                            self.line_text(start_line),
                        ));
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn is_symbol_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '!' | '?' | '@')
    }

    fn lex_symbol(&mut self) -> Result<TokenKind, ParseError> {
        self.advance();
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if Self::is_symbol_char(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error("expected symbol name after ':'"));
        }
        Ok(TokenKind::SymbolLit(name))
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        let (start_line, start_col) = (self.line, self.column);
        let mut digits = String::new();
        let radix = if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x') => 16,
                Some('c') => 8,
                Some('b') => 2,
                _ => 10,
            }
        } else {
            10
        };
        if radix != 10 {
            self.advance();
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                digits.push(c);
                self.advance();
            } else if c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        // A fractional part makes it a real (decimal only).
        if radix == 10
            && self.peek() == Some('.')
            && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            digits.push('.');
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    self.advance();
                } else if c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            return digits.parse::<f64>().map(TokenKind::Real).map_err(|_| {
                ParseError::new(
                    "invalid real literal",
                    start_line,
                    start_col,
                    self.line_text(start_line),
                )
            });
        }
        i64::from_str_radix(&digits, radix)
            .map(TokenKind::Int)
            .map_err(|_| {
                ParseError::new(
                    "invalid integer literal",
                    start_line,
                    start_col,
                    self.line_text(start_line),
                )
            })
    }

    fn lex_word(&mut self) -> Result<TokenKind, ParseError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '!' | '?') {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // `name:` is a keyword-argument marker.
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            self.advance();
            return Ok(TokenKind::KeywordIdent(name));
        }
        Ok(TokenKind::Word(name))
    }

    fn lex_modname(&mut self) -> Result<TokenKind, ParseError> {
        let mut name = String::new();
        loop {
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            // Dotted module path segments stay capitalised.
            if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_uppercase()) {
                self.advance();
                name.push('.');
            } else {
                return Ok(TokenKind::ModName(name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn words_symbols_and_numbers() {
        assert_eq!(
            kinds("foo :bar 42 3.5"),
            vec![
                TokenKind::Word("foo".into()),
                TokenKind::SymbolLit("bar".into()),
                TokenKind::Int(42),
                TokenKind::Real(3.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn integer_bases_and_separators() {
        assert_eq!(kinds("0x10")[0], TokenKind::Int(16));
        assert_eq!(kinds("0b101")[0], TokenKind::Int(5));
        assert_eq!(kinds("0c17")[0], TokenKind::Int(15));
        assert_eq!(kinds("1_000_000")[0], TokenKind::Int(1_000_000));
    }

    #[test]
    fn words_may_carry_bang_and_question_marks() {
        assert_eq!(kinds("empty?")[0], TokenKind::Word("empty?".into()));
        assert_eq!(kinds("__slot!!")[0], TokenKind::Word("__slot!!".into()));
    }

    #[test]
    fn keyword_idents() {
        assert_eq!(
            kinds("do: 1"),
            vec![
                TokenKind::KeywordIdent("do".into()),
                TokenKind::Int(1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn module_paths_stop_before_function_names() {
        assert_eq!(
            kinds("Foo.Bar.baz"),
            vec![
                TokenKind::ModName("Foo.Bar".into()),
                TokenKind::Op("."),
                TokenKind::Word("baz".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("a ++ b |> c -> d == e"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Op("++"),
                TokenKind::Word("b".into()),
                TokenKind::Op("|>"),
                TokenKind::Word("c".into()),
                TokenKind::Op("->"),
                TokenKind::Word("d".into()),
                TokenKind::Op("=="),
                TokenKind::Word("e".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn glued_tracks_adjacency() {
        let toks = tokenize("f(x) g (y)").unwrap();
        // f ( x ) g ( y ) eof
        assert!(toks[1].glued, "paren directly after callee");
        assert!(!toks[5].glued, "paren after space");
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds("'a\\nb'")[0], TokenKind::Str("a\nb".into()));
        assert_eq!(kinds("\"quote\\\"d\"")[0], TokenKind::Str("quote\"d".into()));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 # comment\n2"),
            vec![
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Int(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("'oops").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }
}
