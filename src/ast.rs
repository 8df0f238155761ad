use std::fmt;

use crate::typeref::TypeRef;
use crate::value::{BinaryOp, Value};

/// Index of a node inside an [`Ast`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Operator tokens. `|` is only ever a delimiter for absolute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Bar,
}

impl Operator {
    pub(crate) fn from_byte(c: u8) -> Option<Self> {
        Some(match c {
            b'+' => Operator::Add,
            b'-' => Operator::Sub,
            b'*' => Operator::Mul,
            b'/' => Operator::Div,
            b'%' => Operator::Rem,
            b'^' => Operator::Pow,
            b'|' => Operator::Bar,
            _ => return None,
        })
    }

    pub fn is_multiplicative(self) -> bool {
        matches!(self, Operator::Mul | Operator::Div | Operator::Rem)
    }

    pub fn is_sign(self) -> bool {
        matches!(self, Operator::Add | Operator::Sub)
    }

    pub fn binary(self) -> Option<BinaryOp> {
        Some(match self {
            Operator::Add => BinaryOp::Add,
            Operator::Sub => BinaryOp::Sub,
            Operator::Mul => BinaryOp::Mul,
            Operator::Div => BinaryOp::Div,
            Operator::Rem => BinaryOp::Rem,
            Operator::Pow => BinaryOp::Pow,
            Operator::Bar => return None,
        })
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Bar => '|',
            other => other.binary().map(BinaryOp::symbol).unwrap_or('?'),
        }
    }
}

/// Expression nodes. Child nodes are referenced by [`NodeId`] into the owning [`Ast`].
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Numeric or string literal.
    Constant(Value),
    /// Operator token inside a block.
    Identifier(Operator),
    /// Cast marker heading a block.
    Convert(TypeRef),
    Member {
        name: String,
        generic_args: Vec<TypeRef>,
    },
    Method {
        name: String,
        generic_args: Vec<TypeRef>,
        args: Vec<NodeId>,
    },
    /// Indexing applied to the previous route segment.
    Indexer {
        args: Vec<NodeId>,
    },
    Route(Vec<NodeId>),
    /// Route whose head always names a type, never a parameter or member.
    TypeRoute(Vec<NodeId>),
    Block(Vec<NodeId>),
    /// Raw text the parser could not classify.
    Unresolved(String),
}

/// Arena owning every node of one parsed expression.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    offsets: Vec<usize>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, node: Node, offset: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.offsets.push(offset);
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Source offset the node was parsed at.
    pub fn offset(&self, id: NodeId) -> usize {
        self.offsets[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn operator(&self, id: NodeId) -> Option<Operator> {
        match self.get(id) {
            Node::Identifier(op) => Some(*op),
            _ => None,
        }
    }

    pub fn is_operator(&self, id: NodeId) -> bool {
        self.operator(id).is_some()
    }

    pub fn children(&self, id: NodeId) -> Option<&[NodeId]> {
        match self.get(id) {
            Node::Block(children) => Some(children),
            _ => None,
        }
    }

    /// Source-like rendering, used as the name of routes and in diagnostics.
    pub fn render(&self, id: NodeId) -> Rendered<'_> {
        Rendered { ast: self, id }
    }
}

pub struct Rendered<'a> {
    ast: &'a Ast,
    id: NodeId,
}

impl Rendered<'_> {
    fn child(&self, id: NodeId) -> Self {
        Rendered { ast: self.ast, id }
    }

    fn list(&self, f: &mut fmt::Formatter<'_>, ids: &[NodeId]) -> fmt::Result {
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", self.child(*id))?;
        }
        Ok(())
    }
}

fn generics(f: &mut fmt::Formatter<'_>, args: &[TypeRef]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    f.write_str("<")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", a)?;
    }
    f.write_str(">")
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ast.get(self.id) {
            Node::Constant(Value::Str(s)) => write!(f, "{:?}", s),
            Node::Constant(v) => match v.as_f64() {
                Some(n) if v.numeric_kind().is_some() => write!(f, "{}", n),
                _ => write!(f, "{:?}", v),
            },
            Node::Identifier(op) => write!(f, "{}", op.symbol()),
            Node::Convert(ty) => write!(f, "({})", ty),
            Node::Member { name, generic_args } => {
                f.write_str(name)?;
                generics(f, generic_args)
            }
            Node::Method {
                name,
                generic_args,
                args,
            } => {
                f.write_str(name)?;
                generics(f, generic_args)?;
                f.write_str("(")?;
                self.list(f, args)?;
                f.write_str(")")
            }
            Node::Indexer { args } => {
                f.write_str("[")?;
                self.list(f, args)?;
                f.write_str("]")
            }
            Node::Route(segments) | Node::TypeRoute(segments) => {
                for (i, seg) in segments.iter().enumerate() {
                    if i > 0 && !matches!(self.ast.get(*seg), Node::Indexer { .. }) {
                        f.write_str(".")?;
                    }
                    write!(f, "{}", self.child(*seg))?;
                }
                Ok(())
            }
            Node::Block(children) => {
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match self.ast.get(*c) {
                        Node::Block(_) => write!(f, "({})", self.child(*c))?,
                        _ => write!(f, "{}", self.child(*c))?,
                    }
                }
                Ok(())
            }
            Node::Unresolved(raw) => f.write_str(raw),
        }
    }
}
