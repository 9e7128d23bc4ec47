//! Parse `${producer.field.path[: type]}` strings.

use super::ast::Segment;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

fn err(message: impl Into<String>, offset: usize) -> SyntaxError {
    SyntaxError {
        message: message.into(),
        offset,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBinding {
    pub producer: String,
    pub path: Vec<Segment>,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart<'a> {
    Lit(&'a str),
    /// The full `${...}` text of an embedded binding.
    Binding(&'a str),
}

/// True when the whole (trimmed) string is a single binding.
pub fn is_whole_binding(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.starts_with("${")
        && trimmed.ends_with('}')
        && trimmed.matches("${").count() == 1
        && trimmed.find('}') == Some(trimmed.len() - 1)
}

pub fn contains_binding(input: &str) -> bool {
    input.contains("${")
}

/// Parse one binding. `input` must be the full `${...}` text.
pub fn parse_binding(input: &str) -> Result<ParsedBinding, SyntaxError> {
    let trimmed = input.trim();
    let lead = input.len() - input.trim_start().len();
    let Some(body) = trimmed.strip_prefix("${") else {
        return Err(err("binding must start with '${'", lead));
    };
    let Some(body) = body.strip_suffix('}') else {
        return Err(err("binding is not closed with '}'", lead + trimmed.len()));
    };
    let base = lead + 2;

    let (path_src, annotation) = match body.find(':') {
        Some(colon) => {
            let ann = body[colon + 1..].trim();
            if ann.is_empty() {
                return Err(err("empty type annotation", base + colon + 1));
            }
            (&body[..colon], Some(ann.to_string()))
        }
        None => (body, None),
    };

    let mut cursor = Cursor {
        src: path_src,
        pos: 0,
        base,
    };
    cursor.skip_ws();
    let producer = cursor.ident()?;
    let mut path = Vec::new();
    loop {
        cursor.skip_ws();
        match cursor.peek() {
            None => break,
            Some('.') => {
                cursor.pos += 1;
                path.push(Segment::Field(cursor.ident()?));
            }
            Some('[') => {
                cursor.pos += 1;
                path.push(Segment::Index(cursor.index()?));
            }
            Some(c) => return Err(err(format!("unexpected '{c}'"), cursor.offset())),
        }
    }

    Ok(ParsedBinding {
        producer,
        path,
        annotation,
    })
}

/// Split a template string into literal text and embedded bindings.
pub fn split_template(input: &str) -> Result<Vec<TemplatePart<'_>>, SyntaxError> {
    let mut parts = Vec::new();
    let mut remaining = input;
    let mut consumed = 0;

    while let Some(start) = remaining.find("${") {
        if start > 0 {
            parts.push(TemplatePart::Lit(&remaining[..start]));
        }
        match remaining[start..].find('}') {
            Some(end) => {
                let end = start + end + 1;
                parts.push(TemplatePart::Binding(&remaining[start..end]));
                consumed += end;
                remaining = &remaining[end..];
            }
            None => return Err(err("unterminated '${'", consumed + start)),
        }
    }

    if !remaining.is_empty() {
        parts.push(TemplatePart::Lit(remaining));
    }
    Ok(parts)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// `[A-Za-z_][A-Za-z0-9_-]*`
    fn ident(&mut self) -> Result<String, SyntaxError> {
        let rest = &self.src[self.pos..];
        match rest.chars().next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(c) => return Err(err(format!("expected identifier, found '{c}'"), self.offset())),
            None => return Err(err("expected identifier", self.offset())),
        }
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    /// Digits followed by `]`; the `[` is already consumed.
    fn index(&mut self) -> Result<usize, SyntaxError> {
        let rest = &self.src[self.pos..];
        let len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if len == 0 {
            return Err(err("expected array index", self.offset()));
        }
        let value = rest[..len]
            .parse::<usize>()
            .map_err(|_| err("array index out of range", self.offset()))?;
        self.pos += len;
        if self.peek() != Some(']') {
            return Err(err("expected ']'", self.offset()));
        }
        self.pos += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_only() {
        let b = parse_binding("${plan}").unwrap();
        assert_eq!(b.producer, "plan");
        assert!(b.path.is_empty());
        assert!(b.annotation.is_none());
    }

    #[test]
    fn fields_indices_and_annotation() {
        let b = parse_binding("${p.output.items[0][2].name : array<string>}").unwrap();
        assert_eq!(b.producer, "p");
        assert_eq!(
            b.path,
            vec![
                Segment::Field("output".into()),
                Segment::Field("items".into()),
                Segment::Index(0),
                Segment::Index(2),
                Segment::Field("name".into()),
            ]
        );
        assert_eq!(b.annotation.as_deref(), Some("array<string>"));
    }

    #[test]
    fn identifiers_allow_dashes() {
        let b = parse_binding("${my-step.some_field}").unwrap();
        assert_eq!(b.producer, "my-step");
    }

    #[test]
    fn malformed() {
        for bad in [
            "${}",
            "${p.}",
            "${p..x}",
            "${p[x]}",
            "${p[1}",
            "${1abc}",
            "${p.x:}",
            "${p x}",
            "{p.x}",
        ] {
            assert!(parse_binding(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn whole_binding_detection() {
        assert!(is_whole_binding(" ${a.b} "));
        assert!(!is_whole_binding("id: ${a.b}"));
        assert!(!is_whole_binding("${a.b}-${c}"));
        assert!(!is_whole_binding("${a.b} }"));
    }

    #[test]
    fn template_parts() {
        let parts = split_template("https://x/${a.id}/s/${b}").unwrap();
        assert_eq!(
            parts,
            vec![
                TemplatePart::Lit("https://x/"),
                TemplatePart::Binding("${a.id}"),
                TemplatePart::Lit("/s/"),
                TemplatePart::Binding("${b}"),
            ]
        );
        assert!(split_template("open ${a.b").is_err());
    }
}
