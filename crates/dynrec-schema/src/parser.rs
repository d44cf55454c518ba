//! Schema parser
//!
//! Grammar:
//!
//! ```text
//! file    := syntax? package? message+
//! syntax  := "syntax" "=" STRING ";"
//! package := "package" IDENT ";"
//! message := "message" IDENT "{" field* "}"
//! field   := "optional"? SCALAR IDENT "=" INT ";"
//! ```
//!
//! Nested messages, message-typed fields, `repeated`, `oneof`, `map`, enums,
//! imports and options are rejected.

use crate::descriptor::{
    DescriptorProto, FieldDescriptorProto, FieldKind, FileDescriptorProto, Syntax,
};
use crate::error::{Result, SchemaError};
use crate::lexer::{Lexer, Token, TokenKind};
use std::collections::HashSet;

/// Parse schema text into a file-level descriptor
pub fn parse_schema(text: &str) -> Result<FileDescriptorProto> {
    let tokens = Lexer::new(text).tokenize()?;
    Parser::new(tokens).parse_file()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(token: &Token, message: impl Into<String>) -> SchemaError {
        SchemaError::parse(token.line, token.column, message)
    }

    fn unexpected(token: &Token, expected: &str) -> SchemaError {
        Self::error_at(
            token,
            format!("expected {}, found {}", expected, token.kind.describe()),
        )
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<()> {
        let token = self.advance();
        match token.kind {
            TokenKind::Symbol(c) if c == symbol => Ok(()),
            _ => Err(Self::unexpected(&token, &format!("'{}'", symbol))),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Token)> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Ident(name) => Ok((name.clone(), token.clone())),
            _ => Err(Self::unexpected(&token, what)),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(s) if s == keyword)
    }

    fn parse_file(&mut self) -> Result<FileDescriptorProto> {
        let mut file = FileDescriptorProto::default();

        if self.is_keyword("syntax") {
            file.syntax = self.parse_syntax()?;
        }

        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::Eof => break,
                TokenKind::Ident(kw) if kw == "package" => {
                    if file.package.is_some() || !file.messages.is_empty() {
                        return Err(Self::error_at(&token, "package must be declared once, before messages"));
                    }
                    self.advance();
                    let (name, _) = self.expect_ident("package name")?;
                    self.expect_symbol(';')?;
                    file.package = Some(name);
                }
                TokenKind::Ident(kw) if kw == "message" => {
                    let message = self.parse_message()?;
                    if file.messages.iter().any(|m| m.name == message.name) {
                        return Err(Self::error_at(
                            &token,
                            format!("duplicate message '{}'", message.name),
                        ));
                    }
                    file.messages.push(message);
                }
                TokenKind::Ident(kw) if kw == "syntax" => {
                    return Err(Self::error_at(&token, "syntax must be the first statement"));
                }
                TokenKind::Ident(kw)
                    if matches!(kw.as_str(), "import" | "option" | "enum" | "service") =>
                {
                    return Err(Self::error_at(&token, format!("'{}' is not supported", kw)));
                }
                TokenKind::Symbol(';') => {
                    self.advance();
                }
                _ => return Err(Self::unexpected(&token, "'message' or 'package'")),
            }
        }

        if file.messages.is_empty() {
            let token = self.peek().clone();
            return Err(Self::error_at(&token, "schema declares no message"));
        }

        Ok(file)
    }

    fn parse_syntax(&mut self) -> Result<Syntax> {
        self.advance();
        self.expect_symbol('=')?;
        let token = self.advance();
        let syntax = match &token.kind {
            TokenKind::Str(s) if s == "proto3" => Syntax::Proto3,
            TokenKind::Str(s) if s == "proto2" => Syntax::Proto2,
            TokenKind::Str(s) => {
                return Err(Self::error_at(&token, format!("unknown syntax \"{}\"", s)))
            }
            _ => return Err(Self::unexpected(&token, "syntax string")),
        };
        self.expect_symbol(';')?;
        Ok(syntax)
    }

    fn parse_message(&mut self) -> Result<DescriptorProto> {
        self.advance();
        let (name, name_token) = self.expect_ident("message name")?;
        if name.contains('.') {
            return Err(Self::error_at(&name_token, "message name must not be qualified"));
        }
        self.expect_symbol('{')?;

        let mut message = DescriptorProto {
            name,
            fields: Vec::new(),
        };
        let mut numbers = HashSet::new();
        let mut names = HashSet::new();

        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::Symbol('}') => {
                    self.advance();
                    break;
                }
                TokenKind::Symbol(';') => {
                    self.advance();
                }
                TokenKind::Eof => return Err(Self::unexpected(&token, "'}'")),
                _ => {
                    let field = self.parse_field()?;
                    if !names.insert(field.name.clone()) {
                        return Err(Self::error_at(
                            &token,
                            format!("duplicate field name '{}'", field.name),
                        ));
                    }
                    if !numbers.insert(field.number) {
                        return Err(Self::error_at(
                            &token,
                            format!("duplicate field number {}", field.number),
                        ));
                    }
                    message.fields.push(field);
                }
            }
        }

        Ok(message)
    }

    fn parse_field(&mut self) -> Result<FieldDescriptorProto> {
        let (mut type_name, mut type_token) = self.expect_ident("field type")?;

        match type_name.as_str() {
            "optional" => {
                let (next, token) = self.expect_ident("field type")?;
                type_name = next;
                type_token = token;
            }
            "repeated" | "required" | "oneof" | "map" | "message" | "enum" | "reserved"
            | "option" | "extensions" => {
                return Err(Self::error_at(
                    &type_token,
                    format!("'{}' is not supported", type_name),
                ));
            }
            _ => {}
        }

        let kind = FieldKind::from_name(&type_name).ok_or_else(|| {
            Self::error_at(
                &type_token,
                format!("unsupported field type '{}'", type_name),
            )
        })?;

        let (name, name_token) = self.expect_ident("field name")?;
        if name.contains('.') {
            return Err(Self::error_at(&name_token, "field name must not be qualified"));
        }
        self.expect_symbol('=')?;

        let number_token = self.advance();
        let number = match number_token.kind {
            TokenKind::Int(n) => n,
            _ => return Err(Self::unexpected(&number_token, "field number")),
        };
        let number = u32::try_from(number)
            .ok()
            .filter(|n| {
                (crate::descriptor::MIN_FIELD_NUMBER..=crate::descriptor::MAX_FIELD_NUMBER)
                    .contains(n)
            })
            .ok_or_else(|| {
                Self::error_at(&number_token, format!("field number {} out of range", number))
            })?;
        if crate::descriptor::RESERVED_FIELD_NUMBERS.contains(&number) {
            return Err(Self::error_at(
                &number_token,
                format!("field number {} is reserved", number),
            ));
        }

        if matches!(self.peek().kind, TokenKind::Symbol('[')) {
            let token = self.peek().clone();
            return Err(Self::error_at(&token, "field options are not supported"));
        }
        self.expect_symbol(';')?;

        Ok(FieldDescriptorProto { name, number, kind })
    }
}
