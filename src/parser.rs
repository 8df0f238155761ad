use crate::ast::{Ast, Node, NodeId, Operator};
use crate::error::CompileError;
use crate::lexer::{Lexer, is_ident_start};

/// Element parser: turns source text into a flat, left-to-right list of nodes per block.
///
/// Precedence is not handled here; see `normalize`.
pub(crate) struct Parser<'a> {
    pub(crate) lex: Lexer<'a>,
    pub(crate) ast: Ast,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(s: &'a str, max_depth: usize) -> Self {
        Self {
            lex: Lexer::new(s),
            ast: Ast::new(),
            depth: 0,
            max_depth,
        }
    }

    /// Parse the whole input as one block.
    pub(crate) fn parse(mut self) -> Result<(Ast, NodeId), CompileError> {
        let elements = self.parse_elements()?;
        self.lex.skip_ws();
        if let Some(c) = self.lex.peek() {
            return Err(CompileError::parse(
                self.lex.pos(),
                format!("unexpected '{}'", c as char),
            ));
        }
        if elements.is_empty() {
            return Err(CompileError::parse(0, "empty expression"));
        }
        let root = self.ast.push(Node::Block(elements), 0);
        Ok((self.ast, root))
    }

    pub(crate) fn enter(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(CompileError::LimitExceeded {
                what: "nesting depth",
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Elements up to the end of input or a list terminator, which is left unconsumed.
    pub(crate) fn parse_elements(&mut self) -> Result<Vec<NodeId>, CompileError> {
        let mut out = Vec::new();
        while let Some(id) = self.next_element()? {
            out.push(id);
        }
        Ok(out)
    }

    fn next_element(&mut self) -> Result<Option<NodeId>, CompileError> {
        self.lex.skip_ws();
        let start = self.lex.pos();
        let c = match self.lex.peek() {
            None | Some(b')' | b']' | b'}' | b',') => return Ok(None),
            Some(c) => c,
        };
        let node = match c {
            b'(' => {
                self.lex.bump();
                self.enter()?;
                let children = self.parse_elements()?;
                self.lex.skip_ws();
                if !self.lex.eat(b')') {
                    return Err(CompileError::parse(start, "missing ')' for '('"));
                }
                self.leave();
                if children.is_empty() {
                    return Err(CompileError::parse(start, "empty parentheses"));
                }
                Node::Block(children)
            }
            b'"' => Node::Constant(self.lex.lex_string()?),
            c if c.is_ascii_digit() || c == b'.' => self.lex.lex_number(),
            c if is_ident_start(c) => return self.parse_route().map(Some),
            c => match Operator::from_byte(c) {
                Some(op) => {
                    self.lex.bump();
                    Node::Identifier(op)
                }
                None => self.lex.lex_unresolved(),
            },
        };
        Ok(Some(self.ast.push(node, start)))
    }

    /// Comma-separated argument list; the opening bracket is already consumed.
    ///
    /// Each argument is wrapped in its own block.
    pub(crate) fn parse_arg_list(&mut self, close: u8) -> Result<Vec<NodeId>, CompileError> {
        let open = self.lex.pos().saturating_sub(1);
        self.enter()?;
        let mut args = Vec::new();
        self.lex.skip_ws();
        if self.lex.eat(close) {
            self.leave();
            return Ok(args);
        }
        loop {
            let arg_start = self.lex.pos();
            let elements = self.parse_elements()?;
            if elements.is_empty() {
                return Err(CompileError::parse(arg_start, "missing argument"));
            }
            args.push(self.ast.push(Node::Block(elements), arg_start));
            self.lex.skip_ws();
            if self.lex.eat(b',') {
                continue;
            }
            if self.lex.eat(close) {
                break;
            }
            return Err(CompileError::parse(
                open,
                format!("missing '{}' to close the argument list", close as char),
            ));
        }
        self.leave();
        Ok(args)
    }
}
