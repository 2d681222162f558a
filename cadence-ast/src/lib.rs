#![forbid(unsafe_code)]

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

/// Smallest span covering both `a` and `b`.
pub fn join(a: Span, b: Span) -> Span {
    let a0: usize = a.offset();
    let b0: usize = b.offset();
    let start = a0.min(b0);
    let end = (a0 + a.len()).max(b0 + b.len());
    span_between(start, end)
}

pub type Ident = Spanned<String>;

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    Import(ImportDeclaration),
    Variable(VariableDeclaration),
    Function(FunctionDeclaration),
    Composite(CompositeDeclaration),
    Interface(InterfaceDeclaration),
    Event(EventDeclaration),
    Transaction(TransactionDeclaration),
}

impl Declaration {
    pub fn span(&self) -> Span {
        match self {
            Declaration::Import(d) => d.span,
            Declaration::Variable(d) => d.span,
            Declaration::Function(d) => d.span,
            Declaration::Composite(d) => d.span,
            Declaration::Interface(d) => d.span,
            Declaration::Event(d) => d.span,
            Declaration::Transaction(d) => d.span,
        }
    }

    /// The declared identifier, if the declaration introduces exactly one name.
    pub fn identifier(&self) -> Option<&Ident> {
        match self {
            Declaration::Import(_) | Declaration::Transaction(_) => None,
            Declaration::Variable(d) => Some(&d.name),
            Declaration::Function(d) => Some(&d.name),
            Declaration::Composite(d) => Some(&d.name),
            Declaration::Interface(d) => Some(&d.name),
            Declaration::Event(d) => Some(&d.name),
        }
    }
}

/// Access modifiers as written in source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Access {
    #[default]
    NotSpecified,
    /// `priv` / `access(self)`
    Private,
    /// `access(contract)`
    Contract,
    /// `access(account)`
    Account,
    /// `pub` / `access(all)`
    Public,
    /// `pub(set)`
    PublicSettable,
}

impl Access {
    pub fn keyword(&self) -> &'static str {
        match self {
            Access::NotSpecified => "",
            Access::Private => "priv",
            Access::Contract => "access(contract)",
            Access::Account => "access(account)",
            Access::Public => "pub",
            Access::PublicSettable => "pub(set)",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompositeKind {
    Structure,
    Resource,
    Contract,
    Event,
}

impl CompositeKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            CompositeKind::Structure => "struct",
            CompositeKind::Resource => "resource",
            CompositeKind::Contract => "contract",
            CompositeKind::Event => "event",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImportLocation {
    Address(u128),
    String(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportDeclaration {
    pub span: Span,
    pub identifiers: Vec<Ident>,
    pub location: Spanned<ImportLocation>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOp {
    /// `=`
    Copy,
    /// `<-`
    Move,
}

impl TransferOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            TransferOp::Copy => "=",
            TransferOp::Move => "<-",
        }
    }
}

pub type Transfer = Spanned<TransferOp>;

#[derive(Clone, Debug, PartialEq)]
pub struct VariableDeclaration {
    pub span: Span,
    pub access: Access,
    pub is_constant: bool,
    pub name: Ident,
    pub type_annotation: Option<TypeAnnotation>,
    pub transfer: Transfer,
    pub value: Expr,
    /// `let z <- y <- x`: the transfer and value assigned into `value`.
    pub second: Option<(Transfer, Expr)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub span: Span,
    /// Explicit argument label; `_` is represented as `Some("_")`.
    pub label: Option<Ident>,
    pub name: Ident,
    pub type_annotation: TypeAnnotation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDeclaration {
    pub span: Span,
    pub access: Access,
    pub name: Ident,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Option<Block>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialFunctionKind {
    Initializer,
    Destructor,
    Prepare,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpecialFunction {
    pub span: Span,
    pub kind: SpecialFunctionKind,
    pub params: Vec<Parameter>,
    pub body: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDeclaration {
    pub span: Span,
    pub access: Access,
    pub is_constant: bool,
    pub name: Ident,
    pub type_annotation: TypeAnnotation,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Members {
    pub fields: Vec<FieldDeclaration>,
    pub special_functions: Vec<SpecialFunction>,
    pub functions: Vec<FunctionDeclaration>,
    pub composites: Vec<CompositeDeclaration>,
    pub interfaces: Vec<InterfaceDeclaration>,
    pub events: Vec<EventDeclaration>,
}

impl Members {
    pub fn initializers(&self) -> impl Iterator<Item = &SpecialFunction> {
        self.special_functions
            .iter()
            .filter(|f| f.kind == SpecialFunctionKind::Initializer)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeDeclaration {
    pub span: Span,
    pub access: Access,
    pub kind: CompositeKind,
    pub name: Ident,
    pub conformances: Vec<Ident>,
    pub members: Members,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceDeclaration {
    pub span: Span,
    pub access: Access,
    pub kind: CompositeKind,
    pub name: Ident,
    pub members: Members,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventDeclaration {
    pub span: Span,
    pub access: Access,
    pub name: Ident,
    pub params: Vec<Parameter>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransactionDeclaration {
    pub span: Span,
    pub fields: Vec<FieldDeclaration>,
    pub prepare: Option<SpecialFunction>,
    pub execute: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAnnotation {
    pub span: Span,
    /// Written with a leading `<-`.
    pub is_resource: bool,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeExpr {
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExprKind {
    /// `R` or `C.R`
    Nominal { identifier: Ident, nested: Vec<Ident> },
    Optional(Box<TypeExpr>),
    VariableArray(Box<TypeExpr>),
    ConstantArray { element: Box<TypeExpr>, size: u64 },
    Dictionary { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Function {
        params: Vec<TypeAnnotation>,
        return_type: Box<TypeAnnotation>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Declaration(Declaration),
    Return(ReturnStmt),
    Break(Span),
    Continue(Span),
    If(IfStmt),
    While(WhileStmt),
    Assign(AssignStmt),
    Swap(SwapStmt),
    Emit(EmitStmt),
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Declaration(d) => d.span(),
            Stmt::Return(r) => r.span,
            Stmt::Break(span) | Stmt::Continue(span) => *span,
            Stmt::If(i) => i.span,
            Stmt::While(w) => w.span,
            Stmt::Assign(a) => a.span,
            Stmt::Swap(s) => s.span,
            Stmt::Emit(e) => e.span,
            Stmt::Expr(e) => e.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub span: Span,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IfTest {
    Expr(Expr),
    /// `if let x <- optional { ... }`
    Binding(Box<VariableDeclaration>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElseBranch {
    Block(Block),
    If(Box<IfStmt>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub test: IfTest,
    pub then_block: Block,
    pub else_branch: Option<ElseBranch>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub span: Span,
    pub cond: Expr,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub span: Span,
    pub target: Expr,
    pub transfer: Transfer,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwapStmt {
    pub span: Span,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmitStmt {
    pub span: Span,
    pub call: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Ident(Ident),
    Nil,
    Bool(bool),
    Int(u128),
    String(String),
    Array(Vec<Expr>),
    Dictionary(Vec<DictionaryEntry>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// `e!`
    Force(Box<Expr>),
    Member {
        base: Box<Expr>,
        member: Ident,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    Create(Box<Expr>),
    Destroy(Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DictionaryEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    pub span: Span,
    pub label: Option<Ident>,
    pub value: Expr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    /// `<-e`
    Move,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Move => "<-",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,

    NilCoalesce,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::NilCoalesce => "??",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_covers_both_spans_in_any_order() {
        let a = span(4, 3);
        let b = span(10, 2);
        assert_eq!(join(a, b), span_between(4, 12));
        assert_eq!(join(b, a), span_between(4, 12));
    }
}
