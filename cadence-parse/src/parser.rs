#![forbid(unsafe_code)]

use std::mem;

use cadence_ast::{
    join, span_between, Access, Argument, AssignStmt, BinOp, Block, CompositeDeclaration,
    CompositeKind, Declaration, DictionaryEntry, ElseBranch, EmitStmt, EventDeclaration, Expr,
    ExprKind, FieldDeclaration, FunctionDeclaration, Ident, IfStmt, IfTest, ImportDeclaration,
    ImportLocation, InterfaceDeclaration, Members, Parameter, Program, ReturnStmt, Span,
    SpecialFunction, SpecialFunctionKind, Spanned, Stmt, SwapStmt, TransactionDeclaration,
    Transfer, TransferOp, TypeAnnotation, TypeExpr, TypeExprKind, UnaryOp, VariableDeclaration,
    WhileStmt,
};
use cadence_lex::{Token, TokenKind};

use crate::error::ParseError;

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, idx: 0 }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut declarations = Vec::new();
        loop {
            self.skip_semicolons();
            if self.at(TokenKind::Eof) {
                break;
            }
            declarations.push(self.parse_declaration()?);
        }
        Ok(Program { declarations })
    }

    fn is_declaration_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::KwPub
                    | TokenKind::KwPriv
                    | TokenKind::KwAccess
                    | TokenKind::KwLet
                    | TokenKind::KwVar
                    | TokenKind::KwFun
                    | TokenKind::KwImport
                    | TokenKind::KwResource
                    | TokenKind::KwStruct
                    | TokenKind::KwContract
                    | TokenKind::KwEvent
                    | TokenKind::KwTransaction
            )
        )
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let start = self.current_span();
        let access = self.parse_access()?;
        match self.peek_kind() {
            Some(TokenKind::KwImport) if access == Access::NotSpecified => {
                Ok(Declaration::Import(self.parse_import(start)?))
            }
            Some(TokenKind::KwLet | TokenKind::KwVar) => Ok(Declaration::Variable(
                self.parse_variable_declaration(start, access)?,
            )),
            Some(TokenKind::KwFun) => Ok(Declaration::Function(
                self.parse_function_declaration(start, access)?,
            )),
            Some(TokenKind::KwResource | TokenKind::KwStruct | TokenKind::KwContract) => {
                self.parse_composite_or_interface(start, access)
            }
            Some(TokenKind::KwEvent) => Ok(Declaration::Event(self.parse_event(start, access)?)),
            Some(TokenKind::KwTransaction) if access == Access::NotSpecified => {
                Ok(Declaration::Transaction(self.parse_transaction(start)?))
            }
            _ => Err(ParseError {
                message: "expected declaration".to_string(),
                span: self.current_span(),
            }),
        }
    }

    fn parse_access(&mut self) -> Result<Access, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwPub) => {
                self.next();
                let settable = self.at(TokenKind::LParen)
                    && matches!(self.peek_kind_n(1), Some(TokenKind::Ident(s)) if s == "set");
                if settable {
                    self.next();
                    self.next();
                    self.expect(TokenKind::RParen)?;
                    Ok(Access::PublicSettable)
                } else {
                    Ok(Access::Public)
                }
            }
            Some(TokenKind::KwPriv) => {
                self.next();
                Ok(Access::Private)
            }
            Some(TokenKind::KwAccess) => {
                self.next();
                self.expect(TokenKind::LParen)?;
                let tok = self.expect_any()?;
                let access = match &tok.kind {
                    TokenKind::Ident(s) if s == "self" => Access::Private,
                    TokenKind::Ident(s) if s == "account" => Access::Account,
                    TokenKind::Ident(s) if s == "all" => Access::Public,
                    TokenKind::KwContract => Access::Contract,
                    _ => {
                        return Err(ParseError {
                            message: "expected `self`, `contract`, `account` or `all`".to_string(),
                            span: tok.span,
                        });
                    }
                };
                self.expect(TokenKind::RParen)?;
                Ok(access)
            }
            _ => Ok(Access::NotSpecified),
        }
    }

    fn parse_import(&mut self, start: Span) -> Result<ImportDeclaration, ParseError> {
        self.expect(TokenKind::KwImport)?;
        let mut identifiers = Vec::new();
        if !matches!(self.peek_kind(), Some(TokenKind::String(_) | TokenKind::Int(_))) {
            loop {
                identifiers.push(self.expect_ident()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::KwFrom)?;
        }
        let tok = self.expect_any()?;
        let location = match tok.kind {
            TokenKind::String(s) => Spanned::new(tok.span, ImportLocation::String(s)),
            TokenKind::Int(n) => Spanned::new(tok.span, ImportLocation::Address(n)),
            _ => {
                return Err(ParseError {
                    message: "expected import location".to_string(),
                    span: tok.span,
                });
            }
        };
        Ok(ImportDeclaration {
            span: join(start, location.span),
            identifiers,
            location,
        })
    }

    fn parse_variable_declaration(
        &mut self,
        start: Span,
        access: Access,
    ) -> Result<VariableDeclaration, ParseError> {
        let kw = self.expect_any()?;
        let is_constant = match kw.kind {
            TokenKind::KwLet => true,
            TokenKind::KwVar => false,
            _ => {
                return Err(ParseError {
                    message: "expected `let` or `var`".to_string(),
                    span: kw.span,
                });
            }
        };
        let name = self.expect_ident()?;
        let type_annotation = if self.eat(TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let transfer = self.parse_transfer()?;
        let value = self.parse_expr()?;
        let second = if self.at_transfer() {
            let transfer = self.parse_transfer()?;
            let value = self.parse_expr()?;
            Some((transfer, value))
        } else {
            None
        };
        let end = second.as_ref().map(|(_, v)| v.span).unwrap_or(value.span);
        Ok(VariableDeclaration {
            span: join(start, end),
            access,
            is_constant,
            name,
            type_annotation,
            transfer,
            value,
            second,
        })
    }

    fn at_transfer(&self) -> bool {
        self.at(TokenKind::Eq) || self.at(TokenKind::LeftArrow)
    }

    fn parse_transfer(&mut self) -> Result<Transfer, ParseError> {
        let tok = self.expect_any()?;
        match tok.kind {
            TokenKind::Eq => Ok(Spanned::new(tok.span, TransferOp::Copy)),
            TokenKind::LeftArrow => Ok(Spanned::new(tok.span, TransferOp::Move)),
            _ => Err(ParseError {
                message: "expected transfer operator `=` or `<-`".to_string(),
                span: tok.span,
            }),
        }
    }

    fn parse_function_declaration(
        &mut self,
        start: Span,
        access: Access,
    ) -> Result<FunctionDeclaration, ParseError> {
        self.expect(TokenKind::KwFun)?;
        let name = self.expect_ident()?;
        let params = self.parse_parameter_list()?;
        let return_type = if self.eat(TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let body = if self.at(TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(FunctionDeclaration {
            span: join(start, self.prev_span()),
            access,
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_parameter_list(&mut self) -> Result<Vec<Parameter>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            let first = self.expect_name()?;
            let (label, name) = if self.at(TokenKind::Colon) {
                (None, first)
            } else {
                let name = self.expect_name()?;
                (Some(first), name)
            };
            self.expect(TokenKind::Colon)?;
            let type_annotation = self.parse_type_annotation()?;
            let begin = label.as_ref().map(|l| l.span).unwrap_or(name.span);
            params.push(Parameter {
                span: join(begin, type_annotation.span),
                label,
                name,
                type_annotation,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_composite_or_interface(
        &mut self,
        start: Span,
        access: Access,
    ) -> Result<Declaration, ParseError> {
        let kw = self.expect_any()?;
        let kind = match kw.kind {
            TokenKind::KwResource => CompositeKind::Resource,
            TokenKind::KwStruct => CompositeKind::Structure,
            TokenKind::KwContract => CompositeKind::Contract,
            _ => {
                return Err(ParseError {
                    message: "expected `resource`, `struct` or `contract`".to_string(),
                    span: kw.span,
                });
            }
        };

        if self.eat(TokenKind::KwInterface) {
            let name = self.expect_ident()?;
            let members = self.parse_members()?;
            return Ok(Declaration::Interface(InterfaceDeclaration {
                span: join(start, self.prev_span()),
                access,
                kind,
                name,
                members,
            }));
        }

        let name = self.expect_ident()?;
        let mut conformances = Vec::new();
        if self.eat(TokenKind::Colon) {
            loop {
                conformances.push(self.expect_ident()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let members = self.parse_members()?;
        Ok(Declaration::Composite(CompositeDeclaration {
            span: join(start, self.prev_span()),
            access,
            kind,
            name,
            conformances,
            members,
        }))
    }

    fn parse_members(&mut self) -> Result<Members, ParseError> {
        let lb = self.expect(TokenKind::LBrace)?;
        let mut members = Members::default();
        loop {
            self.skip_semicolons();
            if self.eat(TokenKind::RBrace) {
                return Ok(members);
            }
            if self.at(TokenKind::Eof) {
                return Err(ParseError {
                    message: "unterminated member list; expected '}'".to_string(),
                    span: lb.span,
                });
            }

            let start = self.current_span();
            let access = self.parse_access()?;
            match self.peek_kind() {
                Some(TokenKind::KwLet | TokenKind::KwVar) => {
                    members.fields.push(self.parse_field(start, access)?);
                }
                Some(TokenKind::KwInit) => {
                    self.next();
                    let params = self.parse_parameter_list()?;
                    let body = self.parse_optional_block()?;
                    members.special_functions.push(SpecialFunction {
                        span: join(start, self.prev_span()),
                        kind: SpecialFunctionKind::Initializer,
                        params,
                        body,
                    });
                }
                Some(TokenKind::KwDestroy) => {
                    self.next();
                    let params = self.parse_parameter_list()?;
                    let body = self.parse_optional_block()?;
                    members.special_functions.push(SpecialFunction {
                        span: join(start, self.prev_span()),
                        kind: SpecialFunctionKind::Destructor,
                        params,
                        body,
                    });
                }
                Some(TokenKind::KwFun) => {
                    members
                        .functions
                        .push(self.parse_function_declaration(start, access)?);
                }
                Some(TokenKind::KwResource | TokenKind::KwStruct | TokenKind::KwContract) => {
                    match self.parse_composite_or_interface(start, access)? {
                        Declaration::Composite(c) => members.composites.push(c),
                        Declaration::Interface(i) => members.interfaces.push(i),
                        _ => {}
                    }
                }
                Some(TokenKind::KwEvent) => {
                    members.events.push(self.parse_event(start, access)?);
                }
                _ => {
                    return Err(ParseError {
                        message: "expected member declaration".to_string(),
                        span: self.current_span(),
                    });
                }
            }
        }
    }

    fn parse_field(&mut self, start: Span, access: Access) -> Result<FieldDeclaration, ParseError> {
        let kw = self.expect_any()?;
        let is_constant = matches!(kw.kind, TokenKind::KwLet);
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let type_annotation = self.parse_type_annotation()?;
        Ok(FieldDeclaration {
            span: join(start, type_annotation.span),
            access,
            is_constant,
            name,
            type_annotation,
        })
    }

    fn parse_event(&mut self, start: Span, access: Access) -> Result<EventDeclaration, ParseError> {
        self.expect(TokenKind::KwEvent)?;
        let name = self.expect_ident()?;
        let params = self.parse_parameter_list()?;
        Ok(EventDeclaration {
            span: join(start, self.prev_span()),
            access,
            name,
            params,
        })
    }

    fn parse_transaction(&mut self, start: Span) -> Result<TransactionDeclaration, ParseError> {
        self.expect(TokenKind::KwTransaction)?;
        let lb = self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        let mut prepare = None;
        let mut execute = None;
        loop {
            self.skip_semicolons();
            if self.eat(TokenKind::RBrace) {
                break;
            }
            let member_start = self.current_span();
            match self.peek_kind() {
                Some(TokenKind::KwLet | TokenKind::KwVar) => {
                    fields.push(self.parse_field(member_start, Access::NotSpecified)?);
                }
                Some(TokenKind::KwPrepare) if prepare.is_none() => {
                    self.next();
                    let params = self.parse_parameter_list()?;
                    let body = self.parse_block()?;
                    prepare = Some(SpecialFunction {
                        span: join(member_start, body.span),
                        kind: SpecialFunctionKind::Prepare,
                        params,
                        body: Some(body),
                    });
                }
                Some(TokenKind::KwExecute) if execute.is_none() => {
                    self.next();
                    execute = Some(self.parse_block()?);
                }
                Some(TokenKind::Eof) => {
                    return Err(ParseError {
                        message: "unterminated transaction; expected '}'".to_string(),
                        span: lb.span,
                    });
                }
                _ => {
                    return Err(ParseError {
                        message: "expected field, `prepare` or `execute`".to_string(),
                        span: member_start,
                    });
                }
            }
        }
        Ok(TransactionDeclaration {
            span: join(start, self.prev_span()),
            fields,
            prepare,
            execute,
        })
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, ParseError> {
        let start = self.current_span();
        let is_resource = self.eat(TokenKind::LeftArrow);
        let ty = self.parse_type()?;
        Ok(TypeAnnotation {
            span: join(start, ty.span),
            is_resource,
            ty,
        })
    }

    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        let mut ty = self.parse_primary_type()?;
        loop {
            let depth = match self.peek_kind() {
                Some(TokenKind::Question) => 1,
                Some(TokenKind::QuestionQuestion) => 2,
                _ => break,
            };
            let q = self.expect_any()?;
            for _ in 0..depth {
                ty = TypeExpr {
                    span: join(ty.span, q.span),
                    kind: TypeExprKind::Optional(Box::new(ty)),
                };
            }
        }
        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> Result<TypeExpr, ParseError> {
        let tok = self.expect_any()?;
        match tok.kind {
            TokenKind::Ident(name) => {
                let identifier = Ident {
                    span: tok.span,
                    node: name,
                };
                let mut nested = Vec::new();
                while self.eat(TokenKind::Dot) {
                    nested.push(self.expect_ident()?);
                }
                let end = nested.last().map(|n| n.span).unwrap_or(identifier.span);
                Ok(TypeExpr {
                    span: join(tok.span, end),
                    kind: TypeExprKind::Nominal { identifier, nested },
                })
            }
            TokenKind::LBracket => {
                let element = self.parse_type()?;
                if self.eat(TokenKind::Semicolon) {
                    let size_tok = self.expect_any()?;
                    let TokenKind::Int(size) = size_tok.kind else {
                        return Err(ParseError {
                            message: "expected constant array size".to_string(),
                            span: size_tok.span,
                        });
                    };
                    let size = u64::try_from(size).map_err(|_| ParseError {
                        message: "constant array size is too large".to_string(),
                        span: size_tok.span,
                    })?;
                    let rb = self.expect(TokenKind::RBracket)?;
                    return Ok(TypeExpr {
                        span: join(tok.span, rb.span),
                        kind: TypeExprKind::ConstantArray {
                            element: Box::new(element),
                            size,
                        },
                    });
                }
                let rb = self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr {
                    span: join(tok.span, rb.span),
                    kind: TypeExprKind::VariableArray(Box::new(element)),
                })
            }
            TokenKind::LBrace => {
                let key = self.parse_type()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_type()?;
                let rb = self.expect(TokenKind::RBrace)?;
                Ok(TypeExpr {
                    span: join(tok.span, rb.span),
                    kind: TypeExprKind::Dictionary {
                        key: Box::new(key),
                        value: Box::new(value),
                    },
                })
            }
            TokenKind::LParen if self.at(TokenKind::LParen) => {
                // `((P1, P2): R)`
                self.next();
                let mut params = Vec::new();
                while !self.at(TokenKind::RParen) {
                    params.push(self.parse_type_annotation()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Colon)?;
                let return_type = self.parse_type_annotation()?;
                let rp = self.expect(TokenKind::RParen)?;
                Ok(TypeExpr {
                    span: join(tok.span, rp.span),
                    kind: TypeExprKind::Function {
                        params,
                        return_type: Box::new(return_type),
                    },
                })
            }
            TokenKind::LParen => {
                let inner = self.parse_type()?;
                let rp = self.expect(TokenKind::RParen)?;
                Ok(TypeExpr {
                    span: join(tok.span, rp.span),
                    kind: inner.kind,
                })
            }
            _ => Err(ParseError {
                message: "expected type".to_string(),
                span: tok.span,
            }),
        }
    }

    fn parse_optional_block(&mut self) -> Result<Option<Block>, ParseError> {
        if self.at(TokenKind::LBrace) {
            Ok(Some(self.parse_block()?))
        } else {
            Ok(None)
        }
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let lb = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            self.skip_semicolons();
            if self.at(TokenKind::RBrace) {
                let rb = self.expect_any()?;
                return Ok(Block {
                    span: join(lb.span, rb.span),
                    stmts,
                });
            }
            if self.at(TokenKind::Eof) {
                return Err(ParseError {
                    message: "unterminated brace block; expected '}'".to_string(),
                    span: lb.span,
                });
            }
            stmts.push(self.parse_stmt()?);
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwReturn) => {
                let kw = self.expect_any()?;
                let value = if self.at_stmt_end() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let span = value.as_ref().map(|v| join(kw.span, v.span)).unwrap_or(kw.span);
                Ok(Stmt::Return(ReturnStmt { span, value }))
            }
            Some(TokenKind::KwBreak) => Ok(Stmt::Break(self.expect_any()?.span)),
            Some(TokenKind::KwContinue) => Ok(Stmt::Continue(self.expect_any()?.span)),
            Some(TokenKind::KwIf) => Ok(Stmt::If(self.parse_if_stmt()?)),
            Some(TokenKind::KwWhile) => {
                let kw = self.expect_any()?;
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::While(WhileStmt {
                    span: join(kw.span, body.span),
                    cond,
                    body,
                }))
            }
            Some(TokenKind::KwEmit) => {
                let kw = self.expect_any()?;
                let call = self.parse_expr()?;
                Ok(Stmt::Emit(EmitStmt {
                    span: join(kw.span, call.span),
                    call,
                }))
            }
            _ if self.is_declaration_start() => Ok(Stmt::Declaration(self.parse_declaration()?)),
            _ => {
                let target = self.parse_expr()?;
                if self.at_transfer() {
                    let transfer = self.parse_transfer()?;
                    let value = self.parse_expr()?;
                    return Ok(Stmt::Assign(AssignStmt {
                        span: join(target.span, value.span),
                        target,
                        transfer,
                        value,
                    }));
                }
                if self.eat(TokenKind::Swap) {
                    let right = self.parse_expr()?;
                    return Ok(Stmt::Swap(SwapStmt {
                        span: join(target.span, right.span),
                        left: target,
                        right,
                    }));
                }
                Ok(Stmt::Expr(target))
            }
        }
    }

    fn parse_if_stmt(&mut self) -> Result<IfStmt, ParseError> {
        let kw = self.expect(TokenKind::KwIf)?;
        let test = if self.at(TokenKind::KwLet) || self.at(TokenKind::KwVar) {
            let start = self.current_span();
            IfTest::Binding(Box::new(
                self.parse_variable_declaration(start, Access::NotSpecified)?,
            ))
        } else {
            IfTest::Expr(self.parse_expr()?)
        };
        let then_block = self.parse_block()?;
        let else_branch = if self.eat(TokenKind::KwElse) {
            if self.at(TokenKind::KwIf) {
                Some(ElseBranch::If(Box::new(self.parse_if_stmt()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        Ok(IfStmt {
            span: join(kw.span, self.prev_span()),
            test,
            then_block,
            else_branch,
        })
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_conditional_expr()
    }

    pub fn parse_expr_eof(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.skip_semicolons();
        if !self.at(TokenKind::Eof) {
            return Err(ParseError {
                message: "expected end of input".to_string(),
                span: self.current_span(),
            });
        }
        Ok(expr)
    }

    fn parse_conditional_expr(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_or_expr()?;
        if !self.eat(TokenKind::Question) {
            return Ok(test);
        }
        let then_expr = self.parse_conditional_expr()?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.parse_conditional_expr()?;
        Ok(Expr {
            span: join(test.span, else_expr.span),
            kind: ExprKind::Conditional {
                test: Box::new(test),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
        })
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.eat(TokenKind::OrOr) {
            let right = self.parse_and_expr()?;
            left = binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_cmp_expr()?;
        while self.eat(TokenKind::AndAnd) {
            let right = self.parse_cmp_expr()?;
            left = binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn cmp_op(&self) -> Option<BinOp> {
        match self.peek_kind() {
            Some(TokenKind::EqEq) => Some(BinOp::Eq),
            Some(TokenKind::Neq) => Some(BinOp::Ne),
            Some(TokenKind::Lt) => Some(BinOp::Lt),
            Some(TokenKind::Gt) => Some(BinOp::Gt),
            Some(TokenKind::Le) => Some(BinOp::Le),
            Some(TokenKind::Ge) => Some(BinOp::Ge),
            _ => None,
        }
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_nil_coalescing_expr()?;
        let Some(op) = self.cmp_op() else {
            return Ok(left);
        };
        self.next();
        let right = self.parse_nil_coalescing_expr()?;
        let expr = binary(left, op, right);

        // Chained comparisons like `a < b < c` need explicit parentheses.
        if self.cmp_op().is_some() {
            return Err(ParseError {
                message: "chained comparisons are not supported; use parentheses or boolean operators"
                    .to_string(),
                span: self.current_span(),
            });
        }

        Ok(expr)
    }

    fn parse_nil_coalescing_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add_expr()?;
        if !self.eat(TokenKind::QuestionQuestion) {
            return Ok(left);
        }
        // Right-associative: `a ?? b ?? c` is `a ?? (b ?? c)`.
        let right = self.parse_nil_coalescing_expr()?;
        Ok(binary(left, BinOp::NilCoalesce, right))
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.next();
            let right = self.parse_mul_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Mod,
                _ => break,
            };
            self.next();
            let right = self.parse_unary_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Bang) => Some(UnaryOp::Not),
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::LeftArrow) => Some(UnaryOp::Move),
            _ => None,
        };
        if let Some(op) = op {
            let t = self.expect_any()?;
            let expr = self.parse_unary_expr()?;
            return Ok(Expr {
                span: join(t.span, expr.span),
                kind: ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
            });
        }
        if self.at(TokenKind::KwCreate) {
            let t = self.expect_any()?;
            let expr = self.parse_postfix_expr()?;
            return Ok(Expr {
                span: join(t.span, expr.span),
                kind: ExprKind::Create(Box::new(expr)),
            });
        }
        if self.at(TokenKind::KwDestroy) {
            let t = self.expect_any()?;
            let expr = self.parse_unary_expr()?;
            return Ok(Expr {
                span: join(t.span, expr.span),
                kind: ExprKind::Destroy(Box::new(expr)),
            });
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            if self.eat(TokenKind::Dot) {
                let member = self.expect_name()?;
                expr = Expr {
                    span: join(expr.span, member.span),
                    kind: ExprKind::Member {
                        base: Box::new(expr),
                        member,
                    },
                };
                continue;
            }

            // Calls, indexing and force-unwrap must start on the same line.
            if self.line_break_before() {
                break;
            }

            if self.eat(TokenKind::LParen) {
                let args = self.parse_args()?;
                let rp = self.expect(TokenKind::RParen)?;
                expr = Expr {
                    span: join(expr.span, rp.span),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
                continue;
            }

            if self.eat(TokenKind::LBracket) {
                let index = self.parse_expr()?;
                let rb = self.expect(TokenKind::RBracket)?;
                expr = Expr {
                    span: join(expr.span, rb.span),
                    kind: ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                };
                continue;
            }

            if self.at(TokenKind::Bang) {
                let bang = self.expect_any()?;
                expr = Expr {
                    span: join(expr.span, bang.span),
                    kind: ExprKind::Force(Box::new(expr)),
                };
                continue;
            }

            break;
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Argument>, ParseError> {
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) {
            let labelled = self.peek_kind().is_some_and(is_name)
                && matches!(self.peek_kind_n(1), Some(TokenKind::Colon));
            let label = if labelled {
                let label = self.expect_name()?;
                self.expect(TokenKind::Colon)?;
                Some(label)
            } else {
                None
            };
            let value = self.parse_expr()?;
            let span = label
                .as_ref()
                .map(|l| join(l.span, value.span))
                .unwrap_or(value.span);
            args.push(Argument { span, label, value });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let tok = self.expect_any()?;
        let kind = match tok.kind {
            TokenKind::Ident(name) => ExprKind::Ident(Ident {
                span: tok.span,
                node: name,
            }),
            ref kind if kind.soft_keyword().is_some() => ExprKind::Ident(Ident {
                span: tok.span,
                node: kind.soft_keyword().unwrap_or_default().to_string(),
            }),
            TokenKind::KwTrue => ExprKind::Bool(true),
            TokenKind::KwFalse => ExprKind::Bool(false),
            TokenKind::KwNil => ExprKind::Nil,
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::String(s) => ExprKind::String(s),
            TokenKind::LBracket => {
                let mut elements = Vec::new();
                while !self.at(TokenKind::RBracket) {
                    elements.push(self.parse_expr()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let rb = self.expect(TokenKind::RBracket)?;
                return Ok(Expr {
                    span: join(tok.span, rb.span),
                    kind: ExprKind::Array(elements),
                });
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.at(TokenKind::RBrace) {
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    entries.push(DictionaryEntry { key, value });
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let rb = self.expect(TokenKind::RBrace)?;
                return Ok(Expr {
                    span: join(tok.span, rb.span),
                    kind: ExprKind::Dictionary(entries),
                });
            }
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                let rp = self.expect(TokenKind::RParen)?;
                return Ok(Expr {
                    span: join(tok.span, rp.span),
                    kind: inner.kind,
                });
            }
            _ => {
                return Err(ParseError {
                    message: "expected expression".to_string(),
                    span: tok.span,
                });
            }
        };
        Ok(Expr {
            span: tok.span,
            kind,
        })
    }

    fn at_stmt_end(&self) -> bool {
        self.at(TokenKind::RBrace)
            || self.at(TokenKind::Semicolon)
            || self.at(TokenKind::Eof)
            || self.line_break_before()
    }

    fn line_break_before(&self) -> bool {
        self.tokens
            .get(self.idx)
            .is_some_and(|t| t.line_break_before)
    }

    fn skip_semicolons(&mut self) {
        while self.at(TokenKind::Semicolon) {
            self.next();
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        let tok = self.expect_any()?;
        match tok.kind {
            TokenKind::Ident(name) => Ok(Ident {
                span: tok.span,
                node: name,
            }),
            _ => Err(ParseError {
                message: "expected identifier".to_string(),
                span: tok.span,
            }),
        }
    }

    /// Identifier, or a soft keyword in member, label or parameter position.
    fn expect_name(&mut self) -> Result<Ident, ParseError> {
        if let Some(word) = self.peek_kind().and_then(TokenKind::soft_keyword) {
            let tok = self.expect_any()?;
            return Ok(Ident {
                span: tok.span,
                node: word.to_string(),
            });
        }
        self.expect_ident()
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        let tok = self.expect_any()?;
        if mem::discriminant(&tok.kind) == mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError {
                message: format!("expected {expected:?}"),
                span: tok.span,
            })
        }
    }

    fn expect_any(&mut self) -> Result<Token, ParseError> {
        self.next().ok_or_else(|| ParseError {
            message: "unexpected end of input".to_string(),
            span: span_between(0, 0),
        })
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.next();
            true
        } else {
            false
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind()
            .is_some_and(|k| mem::discriminant(k) == mem::discriminant(&kind))
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx)?.clone();
        self.idx += 1;
        Some(tok)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx).map(|t| &t.kind)
    }

    fn peek_kind_n(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.idx + n).map(|t| &t.kind)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.idx)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(|| span_between(0, 0))
    }

    fn prev_span(&self) -> Span {
        self.idx
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_else(|| span_between(0, 0))
    }
}

fn is_name(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Ident(_)) || kind.soft_keyword().is_some()
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    Expr {
        span: join(left.span, right.span),
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
    }
}
