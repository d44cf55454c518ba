//! Schema tokenizer
//!
//! Splits schema text into identifiers, integer literals, string literals and
//! single-character symbols. Whitespace, `//` line comments and `/* */` block
//! comments are skipped. Every token carries its 1-based line and column.

use crate::error::{Result, SchemaError};

/// Token category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword, may contain dots (`a.b.c`)
    Ident(String),
    /// Unsigned integer literal (decimal, hex or octal)
    Int(u64),
    /// Quoted string literal with escapes resolved
    Str(String),
    /// One of `{ } = ; < > , [ ] ( )`
    Symbol(char),
    Eof,
}

impl TokenKind {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{}'", s),
            TokenKind::Int(n) => format!("integer {}", n),
            TokenKind::Str(s) => format!("string \"{}\"", s),
            TokenKind::Symbol(c) => format!("'{}'", c),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Tokenizer over schema text
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let (line, column) = (self.line, self.column);
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.bump() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            let mut prev = '\0';
                            loop {
                                match self.bump() {
                                    Some('/') if prev == '*' => break,
                                    Some(c) => prev = c,
                                    None => {
                                        return Err(SchemaError::parse(
                                            line,
                                            column,
                                            "unterminated block comment",
                                        ))
                                    }
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);

        let c = match self.chars.peek().copied() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                })
            }
        };

        let kind = if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&c) = self.chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                    ident.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            TokenKind::Ident(ident)
        } else if c.is_ascii_digit() {
            TokenKind::Int(self.read_integer(line, column)?)
        } else if c == '"' || c == '\'' {
            TokenKind::Str(self.read_string(c, line, column)?)
        } else if "{}=;<>,[]()".contains(c) {
            self.bump();
            TokenKind::Symbol(c)
        } else {
            return Err(SchemaError::parse(
                line,
                column,
                format!("unexpected character '{}'", c),
            ));
        };

        Ok(Token { kind, line, column })
    }

    fn read_integer(&mut self, line: usize, column: usize) -> Result<u64> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16)
        } else if text.len() > 1 && text.starts_with('0') {
            u64::from_str_radix(&text[1..], 8)
        } else {
            text.parse::<u64>()
        };

        parsed.map_err(|_| SchemaError::parse(line, column, format!("malformed integer '{}'", text)))
    }

    fn read_string(&mut self, quote: char, line: usize, column: usize) -> Result<String> {
        self.bump();
        let mut result = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(result),
                Some('\\') => match self.bump() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some('0') => result.push('\0'),
                    Some(c) => result.push(c),
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => result.push(c),
            }
        }
        Err(SchemaError::parse(line, column, "unterminated string literal"))
    }
}
