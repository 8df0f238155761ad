use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::ast::Node;
use crate::error::CompileError;
use crate::value::{Value, fit_decimal};

/// Byte cursor over the source text shared by the element parser and the route builder.
pub(crate) struct Lexer<'a> {
    text: &'a str,
    src: &'a [u8],
    i: usize,
}

#[inline]
pub(crate) fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

#[inline]
pub(crate) fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[inline]
fn is_structural(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')' | b'[' | b']' | b'{' | b'}' | b',' | b'.' | b'"'
            | b'+' | b'-' | b'*' | b'/' | b'%' | b'^' | b'|'
    )
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(s: &'a str) -> Self {
        Self {
            text: s,
            src: s.as_bytes(),
            i: 0,
        }
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.i
    }

    #[inline]
    pub(crate) fn reset(&mut self, pos: usize) {
        self.i = pos;
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<u8> {
        self.src.get(self.i).copied()
    }

    #[inline]
    pub(crate) fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.i + n).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<u8> {
        let ch = self.src.get(self.i).copied();
        if ch.is_some() {
            self.i += 1;
        }
        ch
    }

    pub(crate) fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.i += 1;
            } else {
                break;
            }
        }
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[start..end]
    }

    fn take_while(&mut self, f: impl Fn(u8) -> bool) -> usize {
        let start = self.i;
        while let Some(c) = self.peek() {
            if f(c) {
                self.i += 1;
            } else {
                break;
            }
        }
        self.i - start
    }

    /// Identifier at the cursor, if any.
    pub(crate) fn lex_ident(&mut self) -> Option<&'a str> {
        let start = self.i;
        match self.peek() {
            Some(c) if is_ident_start(c) => {}
            _ => return None,
        }
        self.take_while(is_ident_char);
        Some(self.slice(start, self.i))
    }

    /// Run of characters that start no known token.
    pub(crate) fn lex_unresolved(&mut self) -> Node {
        let start = self.i;
        self.bump();
        self.take_while(|c| !c.is_ascii_whitespace() && !is_ident_char(c) && !is_structural(c));
        Node::Unresolved(self.slice(start, self.i).to_string())
    }

    /// String literal; the cursor is on the opening quote.
    pub(crate) fn lex_string(&mut self) -> Result<Value, CompileError> {
        let start = self.i;
        self.bump();
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                None => return Err(CompileError::parse(start, "unterminated string literal")),
                Some(b'"') => break,
                Some(b'\\') => {
                    let esc = match self.bump() {
                        Some(b'"') => b'"',
                        Some(b'\\') => b'\\',
                        Some(b'\'') => b'\'',
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'r') => b'\r',
                        Some(b'0') => 0,
                        Some(other) => {
                            return Err(CompileError::parse(
                                self.i - 1,
                                format!("unknown escape sequence '\\{}'", other as char),
                            ));
                        }
                        None => {
                            return Err(CompileError::parse(start, "unterminated string literal"));
                        }
                    };
                    out.push(esc);
                }
                Some(c) => out.push(c),
            }
        }
        let s = String::from_utf8(out)
            .map_err(|e| CompileError::parse(start, format!("invalid string literal: {}", e)))?;
        Ok(Value::from(s))
    }

    /// Numeric literal; the cursor is on a digit or a `.`.
    ///
    /// Anything the literal grammar does not account for turns the whole token into
    /// [`Node::Unresolved`] rather than truncating it.
    pub(crate) fn lex_number(&mut self) -> Node {
        let start = self.i;
        let radix = match (self.peek(), self.peek_at(1)) {
            (Some(b'0'), Some(b'x' | b'X')) => 16,
            (Some(b'0'), Some(b'b' | b'B')) => 2,
            _ => 10,
        };
        let parsed = if radix == 10 {
            self.lex_decimal()
        } else {
            self.i += 2;
            self.lex_radix(radix)
        };
        // A literal may not run straight into an identifier (`0xFFy`, `12abc`).
        if self.take_while(is_ident_char) > 0 {
            return Node::Unresolved(self.slice(start, self.i).to_string());
        }
        match parsed {
            Some(v) => Node::Constant(v),
            None => Node::Unresolved(self.slice(start, self.i).to_string()),
        }
    }

    fn lex_radix(&mut self, radix: u32) -> Option<Value> {
        let digits_start = self.i;
        let n = if radix == 16 {
            self.take_while(|c| c.is_ascii_hexdigit())
        } else {
            self.take_while(|c| c == b'0' || c == b'1')
        };
        if n == 0 {
            return None;
        }
        let digits = self.slice(digits_start, self.i);
        let raw = u64::from_str_radix(digits, radix).ok()?;
        let suffix = self.integer_suffix();
        integer_literal(raw, suffix)
    }

    fn integer_suffix(&mut self) -> Option<u8> {
        match self.peek() {
            Some(c @ (b'l' | b'L' | b'u' | b'U')) => {
                self.i += 1;
                Some(c.to_ascii_lowercase())
            }
            _ => None,
        }
    }

    fn lex_decimal(&mut self) -> Option<Value> {
        let start = self.i;
        let mut is_float = false;
        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.i += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        if start == self.i {
            // A lone '.' that does not start a fraction.
            self.i += 1;
            return None;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.i += 1 + sign;
                self.take_while(|c| c.is_ascii_digit());
            }
        }
        let text = self.slice(start, self.i);
        let suffix = match self.peek() {
            Some(c @ (b'f' | b'F' | b'd' | b'D' | b'm' | b'M' | b'l' | b'L' | b'u' | b'U')) => {
                self.i += 1;
                Some(c.to_ascii_lowercase())
            }
            _ => None,
        };
        match suffix {
            Some(b'f') => text.parse::<f32>().ok().map(Value::F32),
            Some(b'd') => text.parse::<f64>().ok().map(Value::F64),
            Some(b'm') => BigDecimal::from_str(text)
                .ok()
                .and_then(fit_decimal)
                .map(Value::Decimal),
            None if is_float => text.parse::<f64>().ok().map(Value::F64),
            _ if is_float => None,
            suffix => integer_literal(text.parse::<u64>().ok()?, suffix),
        }
    }
}

/// Typing of integer literals: `l` is 64-bit, `u` is unsigned, otherwise the first of
/// i32, u32, i64, u64 that holds the value.
fn integer_literal(raw: u64, suffix: Option<u8>) -> Option<Value> {
    match suffix {
        Some(b'l') => i64::try_from(raw).ok().map(Value::I64),
        Some(b'u') => Some(match u32::try_from(raw) {
            Ok(v) => Value::U32(v),
            Err(_) => Value::U64(raw),
        }),
        None => Some(if let Ok(v) = i32::try_from(raw) {
            Value::I32(v)
        } else if let Ok(v) = u32::try_from(raw) {
            Value::U32(v)
        } else if let Ok(v) = i64::try_from(raw) {
            Value::I64(v)
        } else {
            Value::U64(raw)
        }),
        Some(_) => None,
    }
}
