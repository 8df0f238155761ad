use crate::ast::{Node, NodeId};
use crate::error::CompileError;
use crate::lexer::is_ident_start;
use crate::parser::Parser;
use crate::typeref::TypeRef;

impl Parser<'_> {
    /// Parse a dotted chain `a.b<T>(x)[i].c` into a single route node.
    pub(crate) fn parse_route(&mut self) -> Result<NodeId, CompileError> {
        let start = self.lex.pos();
        let mut segments = Vec::new();
        loop {
            let seg_start = self.lex.pos();
            let name = self
                .lex
                .lex_ident()
                .ok_or_else(|| CompileError::parse(seg_start, "expected identifier"))?
                .to_string();
            let generic_args = self.try_generic_args()?.unwrap_or_default();

            let segment = if self.lex.eat(b'(') {
                let args = self.parse_arg_list(b')')?;
                Node::Method {
                    name,
                    generic_args,
                    args,
                }
            } else {
                Node::Member { name, generic_args }
            };
            segments.push(self.ast.push(segment, seg_start));

            while self.lex.peek() == Some(b'[') {
                let open = self.lex.pos();
                self.lex.bump();
                let args = self.parse_arg_list(b']')?;
                if args.is_empty() {
                    return Err(CompileError::parse(open, "indexer requires an argument"));
                }
                segments.push(self.ast.push(Node::Indexer { args }, open));
            }

            if self.lex.peek() == Some(b'.') && self.lex.peek_at(1).is_some_and(is_ident_start) {
                self.lex.bump();
                continue;
            }
            break;
        }
        Ok(self.ast.push(Node::Route(segments), start))
    }

    /// `<T, U<V>>` after a name. On a malformed list the cursor is restored and `None`
    /// returned, leaving the `<` for the caller. Each list counts as one nesting level.
    pub(crate) fn try_generic_args(&mut self) -> Result<Option<Vec<TypeRef>>, CompileError> {
        if self.lex.peek() != Some(b'<') {
            return Ok(None);
        }
        let save = self.lex.pos();
        self.enter()?;
        let parsed = self.generic_list()?;
        self.leave();
        if parsed.is_none() {
            self.lex.reset(save);
        }
        Ok(parsed)
    }

    fn generic_list(&mut self) -> Result<Option<Vec<TypeRef>>, CompileError> {
        self.lex.bump();
        let mut args = Vec::new();
        loop {
            self.lex.skip_ws();
            let Some(arg) = self.type_ref()? else {
                return Ok(None);
            };
            args.push(arg);
            self.lex.skip_ws();
            if self.lex.eat(b',') {
                continue;
            }
            if self.lex.eat(b'>') {
                return Ok(Some(args));
            }
            return Ok(None);
        }
    }

    fn type_ref(&mut self) -> Result<Option<TypeRef>, CompileError> {
        let Some(first) = self.lex.lex_ident() else {
            return Ok(None);
        };
        let mut path = vec![first];
        while self.lex.peek() == Some(b'.') && self.lex.peek_at(1).is_some_and(is_ident_start) {
            self.lex.bump();
            match self.lex.lex_ident() {
                Some(name) => path.push(name),
                None => return Ok(None),
            }
        }
        let generic_args = match self.lex.peek() {
            Some(b'<') => match self.try_generic_args()? {
                Some(args) => args,
                None => return Ok(None),
            },
            _ => Vec::new(),
        };
        Ok(TypeRef::from_path(&path, generic_args))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Ast, Node, NodeId};
    use crate::error::CompileError;
    use crate::parser::Parser;

    fn parse(src: &str) -> (Ast, NodeId) {
        Parser::new(src, 64).parse().unwrap()
    }

    fn only_child(ast: &Ast, root: NodeId) -> NodeId {
        let children = ast.children(root).unwrap();
        assert_eq!(children.len(), 1);
        children[0]
    }

    #[test]
    fn route_with_generics_call_and_indexer() {
        let (ast, root) = parse("a.b.C<T>(x, y)[0]");
        let route = only_child(&ast, root);
        let Node::Route(segments) = ast.get(route) else {
            panic!("expected route");
        };
        assert_eq!(segments.len(), 4);
        assert!(matches!(ast.get(segments[0]), Node::Member { name, .. } if name == "a"));
        match ast.get(segments[2]) {
            Node::Method {
                name,
                generic_args,
                args,
            } => {
                assert_eq!(name, "C");
                assert_eq!(generic_args.len(), 1);
                assert_eq!(generic_args[0].name, "T");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(ast.get(segments[3]), Node::Indexer { args } if args.len() == 1));
        assert_eq!(ast.render(route).to_string(), "a.b.C<T>(x, y)[0]");
    }

    #[test]
    fn nested_generics_with_namespaces() {
        let (ast, root) = parse("Make<Demo.Pair<int, List<double>>>()");
        let route = only_child(&ast, root);
        let Node::Route(segments) = ast.get(route) else {
            panic!("expected route");
        };
        let Node::Method { generic_args, .. } = ast.get(segments[0]) else {
            panic!("expected method");
        };
        let pair = &generic_args[0];
        assert_eq!(pair.namespace.as_deref(), Some("Demo"));
        assert_eq!(pair.name, "Pair");
        assert_eq!(pair.generic_args[1].generic_args[0].name, "double");
    }

    #[test]
    fn unclosed_generic_list_is_left_for_the_caller() {
        let (ast, root) = parse("a < b");
        let children = ast.children(root).unwrap();
        assert_eq!(children.len(), 3);
        assert!(matches!(ast.get(children[0]), Node::Route(_)));
        assert_eq!(ast.get(children[1]), &Node::Unresolved("<".into()));
    }

    #[test]
    fn generic_lists_count_toward_nesting_depth() {
        assert!(Parser::new("Make<List<List<int>>>()", 3).parse().is_ok());
        match Parser::new("Make<List<List<List<int>>>>()", 3).parse() {
            Err(CompileError::LimitExceeded { what, limit }) => {
                assert_eq!(what, "nesting depth");
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected {:?}", other.map(|(_, root)| root)),
        }
    }
}
