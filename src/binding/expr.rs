//! Gate and condition expressions.
//!
//! ```text
//! or      := and ('||' and)*
//! and     := cmp ('&&' cmp)*
//! cmp     := operand (op operand)?
//! operand := binding | number | 'string' | "string" | true | false | null
//! ```

use std::fmt;

use serde_json::{Number, Value};

use super::parser::{ParsedBinding, SyntaxError, parse_binding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn is_ordering(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand<B> {
    Binding(B),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<B> {
    Compare {
        lhs: Operand<B>,
        op: CmpOp,
        rhs: Operand<B>,
    },
    /// A bare operand used as a condition.
    Truthy(Operand<B>),
    And(Box<Expr<B>>, Box<Expr<B>>),
    Or(Box<Expr<B>>, Box<Expr<B>>),
}

impl<B> Operand<B> {
    fn map<C>(self, f: &mut impl FnMut(B) -> C) -> Operand<C> {
        match self {
            Operand::Binding(b) => Operand::Binding(f(b)),
            Operand::Literal(v) => Operand::Literal(v),
        }
    }
}

impl<B> Expr<B> {
    pub fn map_bindings<C>(self, f: &mut impl FnMut(B) -> C) -> Expr<C> {
        match self {
            Expr::Compare { lhs, op, rhs } => Expr::Compare {
                lhs: lhs.map(f),
                op,
                rhs: rhs.map(f),
            },
            Expr::Truthy(operand) => Expr::Truthy(operand.map(f)),
            Expr::And(a, b) => {
                let a = a.map_bindings(f);
                Expr::And(Box::new(a), Box::new(b.map_bindings(f)))
            }
            Expr::Or(a, b) => {
                let a = a.map_bindings(f);
                Expr::Or(Box::new(a), Box::new(b.map_bindings(f)))
            }
        }
    }

    /// Comparison and bare-operand leaves, left to right.
    pub fn leaves(&self) -> Vec<&Expr<B>> {
        match self {
            Expr::And(a, b) | Expr::Or(a, b) => {
                let mut out = a.leaves();
                out.extend(b.leaves());
                out
            }
            leaf => vec![leaf],
        }
    }
}

pub fn parse_expr(input: &str) -> Result<Expr<ParsedBinding>, SyntaxError> {
    let mut parser = ExprParser { src: input, pos: 0 };
    let expr = parser.or()?;
    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn or(&mut self) -> Result<Expr<ParsedBinding>, SyntaxError> {
        let mut lhs = self.and()?;
        while self.eat("||") {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr<ParsedBinding>, SyntaxError> {
        let mut lhs = self.cmp()?;
        while self.eat("&&") {
            let rhs = self.cmp()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn cmp(&mut self) -> Result<Expr<ParsedBinding>, SyntaxError> {
        let lhs = self.operand()?;
        // Two-character operators first so `<=` is not read as `<`.
        let ops = [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ];
        for (token, op) in ops {
            if self.eat(token) {
                let rhs = self.operand()?;
                return Ok(Expr::Compare { lhs, op, rhs });
            }
        }
        Ok(Expr::Truthy(lhs))
    }

    fn operand(&mut self) -> Result<Operand<ParsedBinding>, SyntaxError> {
        self.skip_ws();
        let src = self.src;
        let start = self.pos;
        let rest = &src[start..];

        if rest.starts_with("${") {
            let end = rest
                .find('}')
                .ok_or_else(|| self.error("unterminated binding"))?;
            let binding = parse_binding(&rest[..=end]).map_err(|e| SyntaxError {
                message: e.message,
                offset: start + e.offset,
            })?;
            self.pos += end + 1;
            return Ok(Operand::Binding(binding));
        }

        if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
            let body = &rest[1..];
            let end = body
                .find(quote)
                .ok_or_else(|| self.error("unterminated string"))?;
            self.pos += end + 2;
            return Ok(Operand::Literal(Value::String(body[..end].to_string())));
        }

        for (word, value) in [
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            ("null", Value::Null),
        ] {
            if rest.starts_with(word)
                && !rest[word.len()..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
            {
                self.pos += word.len();
                return Ok(Operand::Literal(value));
            }
        }

        let len = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
            .map_or(rest.len(), |(i, _)| i);
        let text = &rest[..len];
        if let Ok(i) = text.parse::<i64>() {
            self.pos += len;
            return Ok(Operand::Literal(Value::Number(i.into())));
        }
        if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
            self.pos += len;
            return Ok(Operand::Literal(Value::Number(n)));
        }
        Err(self.error("expected a binding, number, string, true, false or null"))
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn error(&self, message: &str) -> SyntaxError {
        SyntaxError {
            message: message.to_string(),
            offset: self.pos,
        }
    }
}
