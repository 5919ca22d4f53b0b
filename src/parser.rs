use crate::ast::*;
use crate::error::{ParserError, ProtoError};
use crate::lexer::{Lexer, Token, TokenType};
use miette::NamedSource;
use std::sync::Arc;

/// Deepest element nesting a document may use.
pub const MAX_DEPTH: usize = 256;

/// A recursive descent parser for prototype markup documents.
#[derive(Debug)]
pub struct Parser<'a> {
    source: Arc<NamedSource<String>>,
    tokens: Vec<Token>,
    position: usize,
    source_text: &'a str,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source_text: &'a str) -> Result<Self, ProtoError> {
        Self::new_with_name(source_text, "source.xml".to_string())
    }

    pub fn new_with_name(source_text: &'a str, name: String) -> Result<Self, ProtoError> {
        let source = Arc::new(NamedSource::new(name, source_text.to_string()));
        let mut lexer = Lexer::new(source_text);
        let tokens: Vec<Token> = lexer
            .lex()
            .into_iter()
            .filter(|t| {
                !matches!(
                    t.ttype,
                    TokenType::Whitespace | TokenType::Comment(_) | TokenType::Declaration
                )
            })
            .collect();

        Ok(Self {
            source,
            tokens,
            position: 0,
            source_text,
            depth: 0,
        })
    }

    // === Main Parsing Methods ===

    /// Document ::= { Misc } Element { Misc }
    pub fn parse_document(&mut self) -> Result<MarkupDocument, ProtoError> {
        self.skip_blank_text()?;
        if !self.check(TokenType::TagOpen) {
            return self.err_unexpected("the root element");
        }
        let root = self.parse_element()?;
        self.skip_blank_text()?;
        self.expect(TokenType::Eof)?;
        Ok(MarkupDocument { root })
    }

    /// Element ::= "<" Name { Attribute } ( "/>" | ">" Content "</" Name ">" )
    fn parse_element(&mut self) -> Result<Element, ProtoError> {
        let start_token = self.current_token()?.clone();
        self.expect(TokenType::TagOpen)?;
        let name = self.parse_name()?;

        let mut attributes: Vec<Attribute> = Vec::new();
        while let TokenType::Name(_) = self.current_token()?.ttype {
            let attribute = self.parse_attribute()?;
            if attributes.iter().any(|a| a.name == attribute.name) {
                return Err(ParserError::DuplicateAttribute {
                    src: (*self.source).clone(),
                    span: (attribute.pos_start, attribute.pos_end - attribute.pos_start).into(),
                    name: attribute.name,
                }
                .into());
            }
            attributes.push(attribute);
        }

        if self.check(TokenType::EmptyTagClose) {
            let end_token = self.current_token()?.clone();
            self.advance();
            return Ok(Element {
                name,
                attributes,
                children: Vec::new(),
                pos_start: start_token.pos_start,
                pos_end: end_token.pos_end,
            });
        }
        self.expect(TokenType::TagClose)?;

        let children = self.parse_content()?;

        // Closing tag
        let close_token = self.current_token()?.clone();
        self.expect(TokenType::CloseTagOpen)?;
        let closing_name = self.parse_name()?;
        let end_token = self.current_token()?.clone();
        if closing_name != name {
            return Err(ParserError::MismatchedClosingTag {
                src: (*self.source).clone(),
                span: (close_token.pos_start, end_token.pos_end - close_token.pos_start).into(),
                expected: name,
                found: closing_name,
            }
            .into());
        }
        self.expect(TokenType::TagClose)?;

        Ok(Element {
            name,
            attributes,
            children,
            pos_start: start_token.pos_start,
            pos_end: end_token.pos_end,
        })
    }

    /// Content ::= { Text | CData | Element }
    fn parse_content(&mut self) -> Result<Vec<Node>, ProtoError> {
        let mut children = Vec::new();
        loop {
            let token = self.current_token()?.clone();
            match token.ttype {
                TokenType::Text(value) => {
                    self.advance();
                    children.push(Node::Text(Text {
                        value,
                        pos_start: token.pos_start,
                        cdata: false,
                    }));
                }
                TokenType::CData(value) => {
                    self.advance();
                    children.push(Node::Text(Text {
                        value,
                        pos_start: token.pos_start,
                        cdata: true,
                    }));
                }
                TokenType::TagOpen => {
                    self.depth += 1;
                    if self.depth > MAX_DEPTH {
                        return Err(ParserError::NestingTooDeep {
                            src: (*self.source).clone(),
                            span: (token.pos_start, token.pos_end - token.pos_start).into(),
                            limit: MAX_DEPTH,
                        }
                        .into());
                    }
                    children.push(Node::Element(self.parse_element()?));
                    self.depth -= 1;
                }
                TokenType::CloseTagOpen => return Ok(children),
                TokenType::Eof => {
                    return Err(ParserError::UnexpectedEof {
                        src: (*self.source).clone(),
                        span: (token.pos_start, 0).into(),
                    }
                    .into())
                }
                _ => return self.err_unexpected("text, an element or a closing tag"),
            }
        }
    }

    /// Attribute ::= Name "=" AttrValue
    fn parse_attribute(&mut self) -> Result<Attribute, ProtoError> {
        let start_token = self.current_token()?.clone();
        let name = self.parse_name()?;
        self.expect(TokenType::Equals)?;
        let value_token = self.current_token()?.clone();
        let TokenType::AttrValue(value) = value_token.ttype else {
            return self.err_unexpected("a quoted attribute value");
        };
        self.advance();
        Ok(Attribute {
            name,
            value,
            pos_start: start_token.pos_start,
            pos_end: value_token.pos_end,
        })
    }

    fn parse_name(&mut self) -> Result<String, ProtoError> {
        match &self.current_token()?.ttype {
            TokenType::Name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => self.err_unexpected("a name"),
        }
    }

    /// Whitespace-only text is allowed around the root element.
    fn skip_blank_text(&mut self) -> Result<(), ProtoError> {
        while let TokenType::Text(text) = &self.current_token()?.ttype {
            if !text.trim().is_empty() {
                return self.err_unexpected("markup, not text");
            }
            self.advance();
        }
        Ok(())
    }

    // === Tokenizer Helper Methods ===

    fn current_token(&self) -> Result<&Token, ProtoError> {
        self.tokens.get(self.position).ok_or_else(|| {
            let pos = self.source_text.len().saturating_sub(1);
            ParserError::UnexpectedEof {
                src: (*self.source).clone(),
                span: (pos, 0).into(),
            }
            .into()
        })
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: TokenType) -> Result<(), ProtoError> {
        let token = self.current_token()?.clone();
        if std::mem::discriminant(&token.ttype) == std::mem::discriminant(&expected) {
            self.advance();
            Ok(())
        } else if token.ttype == TokenType::Eof {
            Err(ParserError::UnexpectedEof {
                src: (*self.source).clone(),
                span: (token.pos_start, 0).into(),
            }
            .into())
        } else {
            self.err_unexpected(&format!("{:?}", expected))
        }
    }

    fn check(&self, ttype: TokenType) -> bool {
        if let Ok(token) = self.current_token() {
            std::mem::discriminant(&token.ttype) == std::mem::discriminant(&ttype)
        } else {
            false
        }
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, ProtoError> {
        let token = self.current_token()?;
        Err(ParserError::UnexpectedToken {
            src: (*self.source).clone(),
            span: (token.pos_start, token.pos_end - token.pos_start).into(),
            expected: expected.to_string(),
        }
        .into())
    }
}
