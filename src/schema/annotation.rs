//! Parser for binding type annotations.
//!
//! ```text
//! union := term ('|' term)*
//! term  := ident ('<' union '>')?
//! ```
//!
//! `array` without parameters means `array<any>`; `object` is an open object.

use std::sync::Arc;

use super::types::{Primitive, SchemaNode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct AnnotationError {
    pub message: String,
    pub offset: usize,
}

pub fn parse_annotation(source: &str) -> Result<Arc<SchemaNode>, AnnotationError> {
    let mut parser = Parser {
        src: source,
        pos: 0,
    };
    let node = parser.union()?;
    parser.skip_ws();
    if parser.pos < source.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(node)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn union(&mut self) -> Result<Arc<SchemaNode>, AnnotationError> {
        let mut variants = vec![self.term()?];
        loop {
            self.skip_ws();
            if self.eat('|') {
                variants.push(self.term()?);
            } else {
                break;
            }
        }
        Ok(SchemaNode::union(variants))
    }

    fn term(&mut self) -> Result<Arc<SchemaNode>, AnnotationError> {
        self.skip_ws();
        let start = self.pos;
        let ident = self.ident();
        if ident.is_empty() {
            return Err(self.error("expected a type name"));
        }
        self.skip_ws();
        if self.eat('<') {
            if ident != "array" {
                return Err(AnnotationError {
                    message: format!("type '{ident}' takes no parameters"),
                    offset: start,
                });
            }
            let items = self.union()?;
            self.skip_ws();
            if !self.eat('>') {
                return Err(self.error("expected '>'"));
            }
            return Ok(SchemaNode::array(items));
        }
        match ident {
            "any" => Ok(SchemaNode::any()),
            "array" => Ok(SchemaNode::array(SchemaNode::any())),
            "object" => Ok(SchemaNode::open_object()),
            other => Primitive::parse(other)
                .map(SchemaNode::primitive)
                .ok_or_else(|| AnnotationError {
                    message: format!("unknown type '{other}'"),
                    offset: start,
                }),
        }
    }

    fn ident(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        let len = src[start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(src.len() - start);
        self.pos += len;
        &src[start..self.pos]
    }

    fn eat(&mut self, c: char) -> bool {
        if self.src[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn error(&self, message: &str) -> AnnotationError {
        AnnotationError {
            message: message.to_string(),
            offset: self.pos,
        }
    }
}
