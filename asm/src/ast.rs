use crate::{expr::Expr, marker::Location, symbols::SymbolId, unit::UnitId};
use arch::{op::OpKind, reg::Reg};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Label(String),                                  // label          | name:  .local:
    Equ(String, Expr),                              // equation       | .equ NAME expr
    Org(Expr),                                      // origin         | .org 0x100
    Include(String),                                // include        | .include "path"
    Word(Vec<Expr>),                                // data           | .word 1, 2, label
    Inst(OpKind, Reg, Option<Operand>),             // instruction    | op a, b
    Macro(String, Vec<String>),                     // macro          | .macro NAME ... .endm
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub stmt: Stmt,
    pub location: Location,

    /// Global label in effect when this node appears.
    pub scope: Option<SymbolId>,
    /// Symbol this node defines.
    pub symbol: Option<SymbolId>,
    /// Unit an include node refers to.
    pub include: Option<UnitId>,

    /// Assigned by address resolution.
    pub address: Option<u16>,
    pub size: u16,
    pub inline: bool,
}

impl Node {
    pub fn new(id: NodeId, stmt: Stmt, location: Location) -> Self {
        Self {
            id,
            stmt,
            location,
            scope: None,
            symbol: None,
            include: None,
            address: None,
            size: 0,
            inline: false,
        }
    }

    /// Expressions the node evaluates into code.
    pub fn code_exprs(&self) -> Vec<&Expr> {
        match &self.stmt {
            Stmt::Word(exprs) => exprs.iter().collect(),
            Stmt::Inst(_, _, Some(Operand::Expr(expr))) => vec![expr],
            _ => Vec::new(),
        }
    }

    /// Every expression the node references, including equation bodies.
    pub fn exprs(&self) -> Vec<&Expr> {
        match &self.stmt {
            Stmt::Equ(_, expr) | Stmt::Org(expr) => vec![expr],
            _ => self.code_exprs(),
        }
    }

    pub fn code_exprs_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.stmt {
            Stmt::Word(exprs) => exprs.iter_mut().collect(),
            Stmt::Inst(_, _, Some(Operand::Expr(expr))) => vec![expr],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ast {
    pub nodes: Vec<Node>,
}

impl Ast {
    pub fn push(&mut self, stmt: Stmt, location: Location) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, stmt, location));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }
}
