// Foxscream Parser
// Recursive descent parser that converts tokens into an AST

use std::rc::Rc;

use crate::ast::*;
use crate::error::{FoxError, FoxResult, Span};
use crate::lexer::{Token, TokenKind};

/// Recursive descent parser for Foxscream
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    file: String,
    source: String,
    /// Set while parsing the statements directly inside a class body
    in_class_body: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            tokens,
            current: 0,
            file: file.into(),
            source: source.into(),
            in_class_body: false,
        }
    }

    /// Parse the entire program
    pub fn parse(&mut self) -> FoxResult<Program> {
        let mut statements = Vec::new();

        self.skip_semicolons();
        while !self.is_at_end() {
            statements.push(self.statement()?);
            self.skip_semicolons();
        }

        Ok(Program::new(statements))
    }

    // ==================== Statements ====================

    fn statement(&mut self) -> FoxResult<Stmt> {
        let start = self.peek().span;

        if self.match_token(&TokenKind::Defer) {
            let expr = self.expression()?;
            let span = start.to(expr.span());
            return Ok(Stmt::Defer {
                expr: Rc::new(expr),
                span,
            });
        }

        if self.check(&TokenKind::Static) && !self.check_ahead(1, &TokenKind::Class) {
            if !self.in_class_body {
                return Err(self
                    .error("'static' members are only allowed directly inside a class body")
                    .with_help("Use 'static class Name { }' to declare a static class"));
            }
            self.advance();
            let expr = self.expression()?;
            let span = start.to(expr.span());
            return Ok(Stmt::Static { expr, span });
        }

        let expr = self.expression()?;
        let span = expr.span();
        Ok(Stmt::Expression { expr, span })
    }

    /// Parse `{ statements }` and return the statements with the full span
    fn block_statements(&mut self) -> FoxResult<(Vec<Stmt>, Span)> {
        let open = self
            .consume(&TokenKind::LeftBrace, "Expected '{' to start a block")?
            .span;
        let mut statements = Vec::new();

        self.skip_semicolons();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
            self.skip_semicolons();
        }

        let close = self
            .consume(&TokenKind::RightBrace, "Expected '}' after block")?
            .span;
        Ok((statements, open.to(close)))
    }

    fn block(&mut self) -> FoxResult<Expr> {
        let (statements, span) = self.block_statements()?;
        Ok(Expr::Block { statements, span })
    }

    fn skip_semicolons(&mut self) {
        while self.match_token(&TokenKind::Semicolon) {}
    }

    // ==================== Expressions ====================

    fn expression(&mut self) -> FoxResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> FoxResult<Expr> {
        let expr = self.or()?;

        let type_hint = if self.check(&TokenKind::Colon) && matches!(expr, Expr::Identifier { .. })
        {
            self.advance();
            let hint = self.type_expr()?;
            if !self.check(&TokenKind::Equal) {
                return Err(self
                    .error("Expected '=' after type annotation")
                    .with_help("Annotated names need a value: x: int = 1"));
            }
            Some(hint)
        } else {
            None
        };

        if let Some(op) = self.match_assign_op() {
            let value = self.assignment()?;
            let span = expr.span().to(value.span());

            if expr.is_lvalue() {
                return Ok(Expr::Assignment {
                    target: Box::new(expr),
                    op,
                    type_hint,
                    value: Box::new(value),
                    span,
                });
            }
            return Err(FoxError::syntax_error("Invalid assignment target", expr.span(), &self.file)
                .with_source(&self.source)
                .with_help("Can only assign to names, fields or indexes"));
        }

        Ok(expr)
    }

    fn match_assign_op(&mut self) -> Option<AssignOp> {
        let op = AssignOp::from_token(&self.peek().kind);
        if op.is_some() {
            self.advance();
        }
        op
    }

    fn or(&mut self) -> FoxResult<Expr> {
        let mut expr = self.and()?;

        while self.match_token(&TokenKind::Or) || self.match_token(&TokenKind::OrKw) {
            let right = self.and()?;
            expr = Self::binary(expr, BinaryOp::Or, right);
        }

        Ok(expr)
    }

    fn and(&mut self) -> FoxResult<Expr> {
        let mut expr = self.not()?;

        while self.match_token(&TokenKind::And) || self.match_token(&TokenKind::AndKw) {
            let right = self.not()?;
            expr = Self::binary(expr, BinaryOp::And, right);
        }

        Ok(expr)
    }

    fn not(&mut self) -> FoxResult<Expr> {
        if self.check(&TokenKind::Not) {
            let start = self.advance().span;
            let operand = self.not()?;
            let span = start.to(operand.span());
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                span,
            });
        }

        self.relation()
    }

    /// Comparisons, equality and the relational keywords (in, has, of, is)
    fn relation(&mut self) -> FoxResult<Expr> {
        let mut expr = self.bit_or()?;

        loop {
            let op = match self.peek().kind.clone() {
                TokenKind::EqualEqual
                | TokenKind::BangEqual
                | TokenKind::Less
                | TokenKind::LessEqual
                | TokenKind::Greater
                | TokenKind::GreaterEqual
                | TokenKind::In
                | TokenKind::Has
                | TokenKind::Of => BinaryOp::from_token(&self.advance().kind),
                TokenKind::Is => {
                    self.advance();
                    if self.match_token(&TokenKind::Not) {
                        Some(BinaryOp::IsNot)
                    } else {
                        Some(BinaryOp::Is)
                    }
                }
                TokenKind::Not
                    if self.check_ahead(1, &TokenKind::In)
                        || self.check_ahead(1, &TokenKind::Has)
                        || self.check_ahead(1, &TokenKind::Of) =>
                {
                    self.advance();
                    let op = BinaryOp::from_token(&self.peek().kind).and_then(BinaryOp::negated);
                    self.advance();
                    op
                }
                _ => None,
            };

            let Some(op) = op else { break };
            let right = self.bit_or()?;
            expr = Self::binary(expr, op, right);
        }

        Ok(expr)
    }

    fn bit_or(&mut self) -> FoxResult<Expr> {
        let mut expr = self.bit_xor()?;

        while self.match_token(&TokenKind::Pipe) {
            let right = self.bit_xor()?;
            expr = Self::binary(expr, BinaryOp::BitOr, right);
        }

        Ok(expr)
    }

    fn bit_xor(&mut self) -> FoxResult<Expr> {
        let mut expr = self.bit_and()?;

        while self.match_token(&TokenKind::Caret) {
            let right = self.bit_and()?;
            expr = Self::binary(expr, BinaryOp::BitXor, right);
        }

        Ok(expr)
    }

    fn bit_and(&mut self) -> FoxResult<Expr> {
        let mut expr = self.shift()?;

        while self.match_token(&TokenKind::Ampersand) {
            let right = self.shift()?;
            expr = Self::binary(expr, BinaryOp::BitAnd, right);
        }

        Ok(expr)
    }

    fn shift(&mut self) -> FoxResult<Expr> {
        let mut expr = self.term()?;

        while self.check(&TokenKind::LessLess) || self.check(&TokenKind::GreaterGreater) {
            let op = BinaryOp::from_token(&self.advance().kind);
            let right = self.term()?;
            if let Some(op) = op {
                expr = Self::binary(expr, op, right);
            }
        }

        Ok(expr)
    }

    fn term(&mut self) -> FoxResult<Expr> {
        let mut expr = self.factor()?;

        while self.check(&TokenKind::Plus) || self.check(&TokenKind::Minus) {
            let op = BinaryOp::from_token(&self.advance().kind);
            let right = self.factor()?;
            if let Some(op) = op {
                expr = Self::binary(expr, op, right);
            }
        }

        Ok(expr)
    }

    fn factor(&mut self) -> FoxResult<Expr> {
        let mut expr = self.unary()?;

        while self.check(&TokenKind::Star)
            || self.check(&TokenKind::Slash)
            || self.check(&TokenKind::SlashSlash)
            || self.check(&TokenKind::Percent)
        {
            let op = BinaryOp::from_token(&self.advance().kind);
            let right = self.unary()?;
            if let Some(op) = op {
                expr = Self::binary(expr, op, right);
            }
        }

        Ok(expr)
    }

    fn unary(&mut self) -> FoxResult<Expr> {
        if self.check(&TokenKind::Bang)
            || self.check(&TokenKind::Minus)
            || self.check(&TokenKind::Plus)
            || self.check(&TokenKind::Tilde)
        {
            let op_token = self.advance().clone();
            let operand = self.unary()?;
            let span = op_token.span.to(operand.span());
            if let Some(op) = UnaryOp::from_token(&op_token.kind) {
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                    span,
                });
            }
        }

        self.power()
    }

    /// `**` binds tighter than unary minus on its left and is right-associative
    fn power(&mut self) -> FoxResult<Expr> {
        let base = self.postfix()?;

        if self.match_token(&TokenKind::StarStar) {
            let exponent = self.unary()?;
            return Ok(Self::binary(base, BinaryOp::Pow, exponent));
        }

        Ok(base)
    }

    fn postfix(&mut self) -> FoxResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            // `(` and `[` only continue an expression on the same line
            let same_line = self.peek().span.start.line == self.previous().span.end.line;

            if same_line && self.match_token(&TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&TokenKind::Dot) {
                let name_token = self
                    .consume_identifier("Expected field name after '.'")?
                    .clone();
                let span = expr.span().to(name_token.span);
                expr = Expr::Field {
                    object: Box::new(expr),
                    name: name_token.lexeme,
                    span,
                };
            } else if same_line && self.match_token(&TokenKind::LeftBracket) {
                expr = self.finish_index(expr)?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> FoxResult<Expr> {
        let mut args: Vec<CallArg> = Vec::new();
        let mut seen_keyword = false;

        if !self.check(&TokenKind::RightParen) {
            loop {
                let arg_start = self.peek().span;

                if self.check_identifier() && self.check_ahead(1, &TokenKind::Equal) {
                    let name = self.advance().lexeme.clone();
                    self.advance(); // '='
                    let value = self.or()?;
                    let span = arg_start.to(value.span());
                    args.push(CallArg {
                        name: Some(name),
                        value,
                        span,
                    });
                    seen_keyword = true;
                } else {
                    if seen_keyword {
                        return Err(self
                            .error("Positional argument after keyword argument")
                            .with_help("Put positional arguments before keyword arguments"));
                    }
                    let value = self.expression()?;
                    let span = value.span();
                    args.push(CallArg {
                        name: None,
                        value,
                        span,
                    });
                }

                if !self.match_token(&TokenKind::Comma) || self.check(&TokenKind::RightParen) {
                    break;
                }
            }
        }

        let paren = self
            .consume(&TokenKind::RightParen, "Expected ')' after arguments")?
            .span;
        let span = callee.span().to(paren);

        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            span,
        })
    }

    /// Index or slice after `[`: a[i], a[s:e], a[s:e:st], a[:]
    fn finish_index(&mut self, object: Expr) -> FoxResult<Expr> {
        let start = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.or()?))
        };

        if !self.match_token(&TokenKind::Colon) {
            let bracket = self
                .consume(&TokenKind::RightBracket, "Expected ']' after index")?
                .span;
            let span = object.span().to(bracket);
            return match start {
                Some(index) => Ok(Expr::Index {
                    object: Box::new(object),
                    index,
                    span,
                }),
                None => Err(self.error("Expected index expression")),
            };
        }

        let end = if self.check(&TokenKind::Colon) || self.check(&TokenKind::RightBracket) {
            None
        } else {
            Some(Box::new(self.or()?))
        };

        let step = if self.match_token(&TokenKind::Colon) && !self.check(&TokenKind::RightBracket)
        {
            Some(Box::new(self.or()?))
        } else {
            None
        };

        let bracket = self
            .consume(&TokenKind::RightBracket, "Expected ']' after slice")?
            .span;
        let span = object.span().to(bracket);

        Ok(Expr::Slice {
            object: Box::new(object),
            start,
            end,
            step,
            span,
        })
    }

    fn primary(&mut self) -> FoxResult<Expr> {
        let token = self.peek().clone();

        match &token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Int(*n),
                    span: token.span,
                })
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Float(*n),
                    span: token.span,
                })
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Str(s.clone()),
                    span: token.span,
                })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Identifier {
                    name: name.clone(),
                    span: token.span,
                })
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(&TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.array_or_dictionary(),
            TokenKind::LeftBrace => self.block(),
            TokenKind::If => self.if_expression(),
            TokenKind::While => self.while_expression(),
            TokenKind::Do => self.do_while_expression(),
            TokenKind::For => self.for_expression(),
            TokenKind::Match => self.match_expression(),
            TokenKind::Fn => self.function(),
            TokenKind::Class | TokenKind::Static | TokenKind::Trait => self.class(),
            TokenKind::Return => self.return_expression(),
            TokenKind::Break | TokenKind::Continue | TokenKind::Leave => self.jump_expression(),
            TokenKind::Label => self.labeled_expression(),
            TokenKind::Eof => Err(self.error("Unexpected end of input")),
            other => Err(self
                .error(&format!("Unexpected token '{}'", other))
                .with_help("Expected an expression")),
        }
    }

    /// `[]`, `[:]`, `[a, b]` or `[k: v, ...]`
    fn array_or_dictionary(&mut self) -> FoxResult<Expr> {
        let open = self.advance().span;

        if self.check(&TokenKind::Colon) && self.check_ahead(1, &TokenKind::RightBracket) {
            self.advance();
            let close = self.advance().span;
            return Ok(Expr::Dictionary {
                entries: Vec::new(),
                span: open.to(close),
            });
        }

        if let Some(close) = self.match_span(&TokenKind::RightBracket) {
            return Ok(Expr::Array {
                elements: Vec::new(),
                span: open.to(close),
            });
        }

        let first = self.or()?;

        if self.match_token(&TokenKind::Colon) {
            let mut entries = vec![(first, self.expression()?)];
            while self.match_token(&TokenKind::Comma) {
                if self.check(&TokenKind::RightBracket) {
                    break;
                }
                let key = self.or()?;
                self.consume(&TokenKind::Colon, "Expected ':' after dictionary key")?;
                let value = self.expression()?;
                entries.push((key, value));
            }
            let close = self
                .consume(&TokenKind::RightBracket, "Expected ']' after dictionary entries")?
                .span;
            return Ok(Expr::Dictionary {
                entries,
                span: open.to(close),
            });
        }

        let mut elements = vec![first];
        while self.match_token(&TokenKind::Comma) {
            if self.check(&TokenKind::RightBracket) {
                break;
            }
            elements.push(self.or()?);
        }
        let close = self
            .consume(&TokenKind::RightBracket, "Expected ']' after array elements")?
            .span;

        Ok(Expr::Array {
            elements,
            span: open.to(close),
        })
    }

    fn if_expression(&mut self) -> FoxResult<Expr> {
        let start = self.advance().span; // 'if' or 'elif'
        let condition = self.expression()?;
        let then_branch = self.block()?;

        let else_branch = if self.check(&TokenKind::Elif) {
            Some(Box::new(self.if_expression()?))
        } else if self.match_token(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.if_expression()?))
            } else {
                Some(Box::new(self.block()?))
            }
        } else {
            None
        };

        let end = else_branch
            .as_ref()
            .map(|e| e.span())
            .unwrap_or_else(|| then_branch.span());

        Ok(Expr::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
            span: start.to(end),
        })
    }

    fn while_expression(&mut self) -> FoxResult<Expr> {
        let start = self.advance().span;
        let condition = self.expression()?;
        let body = self.block()?;
        let else_branch = self.loop_else()?;
        let span = start.to(self.previous().span);

        Ok(Expr::While {
            condition: Box::new(condition),
            body: Box::new(body),
            else_branch,
            span,
        })
    }

    fn do_while_expression(&mut self) -> FoxResult<Expr> {
        let start = self.advance().span;
        let body = self.block()?;
        self.consume(&TokenKind::While, "Expected 'while' after do block")?;
        let condition = self.expression()?;
        let span = start.to(condition.span());

        Ok(Expr::DoWhile {
            body: Box::new(body),
            condition: Box::new(condition),
            span,
        })
    }

    fn for_expression(&mut self) -> FoxResult<Expr> {
        let start = self.advance().span;
        let variable = self
            .consume_identifier("Expected loop variable after 'for'")?
            .lexeme
            .clone();
        self.consume(&TokenKind::In, "Expected 'in' after loop variable")?;
        let iterable = self.expression()?;
        let body = self.block()?;
        let else_branch = self.loop_else()?;
        let span = start.to(self.previous().span);

        Ok(Expr::For {
            variable,
            iterable: Box::new(iterable),
            body: Box::new(body),
            else_branch,
            span,
        })
    }

    fn loop_else(&mut self) -> FoxResult<Option<Box<Expr>>> {
        if self.match_token(&TokenKind::Else) {
            Ok(Some(Box::new(self.block()?)))
        } else {
            Ok(None)
        }
    }

    fn match_expression(&mut self) -> FoxResult<Expr> {
        let start = self.advance().span;
        let subject = self.expression()?;
        self.consume(&TokenKind::LeftBrace, "Expected '{' after match subject")?;

        let mut arms = Vec::new();
        let mut default = None;

        self.skip_semicolons();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Else) {
                if default.is_some() {
                    return Err(self.error("Duplicate 'else' arm in match"));
                }
                default = Some(Box::new(self.block()?));
            } else {
                let arm_start = self
                    .consume(&TokenKind::Case, "Expected 'case' or 'else' in match")?
                    .span;
                let mut patterns = vec![self.or()?];
                while self.match_token(&TokenKind::Comma) {
                    patterns.push(self.or()?);
                }
                let body = self.block()?;
                let span = arm_start.to(body.span());
                arms.push(MatchArm {
                    patterns,
                    body,
                    span,
                });
            }
            self.skip_semicolons();
        }

        let close = self
            .consume(&TokenKind::RightBrace, "Expected '}' after match arms")?
            .span;

        Ok(Expr::Match {
            subject: Box::new(subject),
            arms,
            default,
            span: start.to(close),
        })
    }

    fn function(&mut self) -> FoxResult<Expr> {
        let start = self.advance().span;
        let name = if self.check_identifier() {
            Some(self.advance().lexeme.clone())
        } else {
            None
        };

        self.consume(&TokenKind::LeftParen, "Expected '(' after 'fn'")?;
        let params = self.parameters()?;
        self.consume(&TokenKind::RightParen, "Expected ')' after parameters")?;

        let return_type = if self.match_token(&TokenKind::ThinArrow) {
            Some(self.type_expr()?)
        } else {
            None
        };

        let was_class_body = std::mem::replace(&mut self.in_class_body, false);
        let body = self.block_statements();
        self.in_class_body = was_class_body;
        let (body, body_span) = body?;

        Ok(Expr::Function {
            def: Rc::new(FunctionDef {
                name,
                params,
                return_type,
                body,
                span: start.to(body_span),
            }),
        })
    }

    fn parameters(&mut self) -> FoxResult<Vec<FunctionParam>> {
        let mut params: Vec<FunctionParam> = Vec::new();

        if self.check(&TokenKind::RightParen) {
            return Ok(params);
        }

        loop {
            let start = self.peek().span;
            let star = if self.match_token(&TokenKind::StarStar) {
                Some(ParamKind::VarKeyword)
            } else if self.match_token(&TokenKind::Star) {
                Some(ParamKind::VarPositional)
            } else {
                None
            };

            let name = self
                .consume_identifier("Expected parameter name")?
                .lexeme
                .clone();
            if params.iter().any(|p| p.name == name) {
                return Err(self.error_at_previous(&format!("Duplicate parameter '{}'", name)));
            }

            let type_hint = if self.match_token(&TokenKind::Colon) {
                Some(self.type_expr()?)
            } else {
                None
            };

            let kind = match star {
                Some(kind) => kind,
                None if self.match_token(&TokenKind::Equal) => ParamKind::Keyword(self.or()?),
                None => {
                    if params.iter().any(|p| !matches!(p.kind, ParamKind::Positional)) {
                        return Err(self
                            .error_at_previous("Required parameter after optional or variadic parameters")
                            .with_help("Move required parameters to the front"));
                    }
                    ParamKind::Positional
                }
            };

            let variadic_clash = match kind {
                ParamKind::VarPositional => params
                    .iter()
                    .any(|p| matches!(p.kind, ParamKind::VarPositional | ParamKind::VarKeyword)),
                ParamKind::VarKeyword => params
                    .iter()
                    .any(|p| matches!(p.kind, ParamKind::VarKeyword)),
                _ => params
                    .iter()
                    .any(|p| matches!(p.kind, ParamKind::VarKeyword)),
            };
            if variadic_clash {
                return Err(self.error_at_previous("Parameter not allowed after variadic parameters"));
            }

            params.push(FunctionParam {
                name,
                kind,
                type_hint,
                span: start.to(self.previous().span),
            });

            if !self.match_token(&TokenKind::Comma) || self.check(&TokenKind::RightParen) {
                break;
            }
        }

        Ok(params)
    }

    /// `class`, `static class` or `trait`, each with optional name, `of` and `has` lists
    fn class(&mut self) -> FoxResult<Expr> {
        let start = self.peek().span;
        let kind = if self.match_token(&TokenKind::Static) {
            self.consume(&TokenKind::Class, "Expected 'class' after 'static'")?;
            ClassKind::Static
        } else if self.match_token(&TokenKind::Trait) {
            self.match_token(&TokenKind::Class);
            ClassKind::Trait
        } else {
            self.advance();
            ClassKind::Class
        };

        let name = if self.check_identifier() {
            Some(self.advance().lexeme.clone())
        } else {
            None
        };

        let parents = if self.match_token(&TokenKind::Of) {
            self.class_list()?
        } else {
            Vec::new()
        };
        let traits = if self.match_token(&TokenKind::Has) {
            self.class_list()?
        } else {
            Vec::new()
        };

        let was_class_body = std::mem::replace(&mut self.in_class_body, true);
        let body = self.block_statements();
        self.in_class_body = was_class_body;
        let (body, body_span) = body?;

        Ok(Expr::Class {
            def: Rc::new(ClassDef {
                name,
                kind,
                parents,
                traits,
                body,
                span: start.to(body_span),
            }),
        })
    }

    fn class_list(&mut self) -> FoxResult<Vec<Expr>> {
        let mut list = vec![self.class_reference()?];
        while self.match_token(&TokenKind::Comma) {
            list.push(self.class_reference()?);
        }
        Ok(list)
    }

    /// A dotted class name: `Shape` or `geometry.Shape`
    fn class_reference(&mut self) -> FoxResult<Expr> {
        let token = self.consume_identifier("Expected class name")?.clone();
        let mut expr = Expr::Identifier {
            name: token.lexeme,
            span: token.span,
        };
        while self.match_token(&TokenKind::Dot) {
            let field = self.consume_identifier("Expected name after '.'")?.clone();
            let span = expr.span().to(field.span);
            expr = Expr::Field {
                object: Box::new(expr),
                name: field.lexeme,
                span,
            };
        }
        Ok(expr)
    }

    fn return_expression(&mut self) -> FoxResult<Expr> {
        let keyword = self.advance().span;

        let value = if self.operand_follows(keyword) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };

        let span = match &value {
            Some(v) => keyword.to(v.span()),
            None => keyword,
        };
        Ok(Expr::Return { value, span })
    }

    fn jump_expression(&mut self) -> FoxResult<Expr> {
        let token = self.advance().clone();

        let label = if self.check_identifier()
            && self.peek().span.start.line == token.span.end.line
        {
            Some(self.advance().lexeme.clone())
        } else {
            None
        };

        let span = token.span.to(self.previous().span);
        Ok(match token.kind {
            TokenKind::Break => Expr::Break { label, span },
            TokenKind::Continue => Expr::Continue { label, span },
            _ => Expr::Leave { label, span },
        })
    }

    fn labeled_expression(&mut self) -> FoxResult<Expr> {
        let start = self.advance().span;
        let label = self
            .consume_identifier("Expected label name after 'label'")?
            .lexeme
            .clone();
        self.consume(&TokenKind::Colon, "Expected ':' after label name")?;
        let body = self.expression()?;

        if !matches!(
            body,
            Expr::Block { .. }
                | Expr::While { .. }
                | Expr::DoWhile { .. }
                | Expr::For { .. }
                | Expr::If { .. }
                | Expr::Match { .. }
        ) {
            return Err(FoxError::syntax_error(
                "A label must be attached to a block, loop, if or match",
                body.span(),
                &self.file,
            )
            .with_source(&self.source));
        }

        let span = start.to(body.span());
        Ok(Expr::Labeled {
            label,
            body: Box::new(body),
            span,
        })
    }

    /// True when an operand for `return` starts on the keyword's line
    fn operand_follows(&self, keyword: Span) -> bool {
        let next = self.peek();
        next.span.start.line == keyword.end.line
            && !matches!(
                next.kind,
                TokenKind::RightBrace
                    | TokenKind::RightParen
                    | TokenKind::RightBracket
                    | TokenKind::Semicolon
                    | TokenKind::Comma
                    | TokenKind::Case
                    | TokenKind::Else
                    | TokenKind::Elif
                    | TokenKind::Eof
            )
    }

    // ==================== Types ====================

    fn type_expr(&mut self) -> FoxResult<TypeExpr> {
        let first = self.type_and()?;
        if !self.check(&TokenKind::Pipe) {
            return Ok(first);
        }

        let mut members = vec![first];
        while self.match_token(&TokenKind::Pipe) {
            members.push(self.type_and()?);
        }
        let span = members[0].span().to(self.previous().span);
        Ok(TypeExpr::Variants { members, span })
    }

    fn type_and(&mut self) -> FoxResult<TypeExpr> {
        let first = self.type_exclude()?;
        if !self.check(&TokenKind::Ampersand) {
            return Ok(first);
        }

        let mut members = vec![first];
        while self.match_token(&TokenKind::Ampersand) {
            members.push(self.type_exclude()?);
        }
        let span = members[0].span().to(self.previous().span);
        Ok(TypeExpr::Union { members, span })
    }

    fn type_exclude(&mut self) -> FoxResult<TypeExpr> {
        let base = self.type_atom()?;
        if !self.check(&TokenKind::Minus) {
            return Ok(base);
        }

        let mut excluded = Vec::new();
        while self.match_token(&TokenKind::Minus) {
            excluded.push(self.type_atom()?);
        }
        let span = base.span().to(self.previous().span);
        Ok(TypeExpr::Exclude {
            base: Box::new(base),
            excluded,
            span,
        })
    }

    fn type_atom(&mut self) -> FoxResult<TypeExpr> {
        if self.match_token(&TokenKind::LeftParen) {
            let inner = self.type_expr()?;
            self.consume(&TokenKind::RightParen, "Expected ')' after type")?;
            return Ok(inner);
        }

        if self.check(&TokenKind::LeftBrace) {
            let open = self.advance().span;
            let mut fields = Vec::new();
            while !self.check(&TokenKind::RightBrace) {
                let name = self
                    .consume_identifier("Expected field name in structural type")?
                    .lexeme
                    .clone();
                self.consume(&TokenKind::Colon, "Expected ':' after field name")?;
                fields.push((name, self.type_expr()?));
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            let close = self
                .consume(&TokenKind::RightBrace, "Expected '}' after structural type")?
                .span;
            return Ok(TypeExpr::Fields {
                fields,
                span: open.to(close),
            });
        }

        let token = self
            .consume_identifier("Expected a type name")
            .map_err(|e| e.with_help("Types are class names, {field: type}, or combinations with | & -"))?
            .clone();
        Ok(TypeExpr::Named {
            name: token.lexeme,
            span: token.span,
        })
    }

    // ==================== Helpers ====================

    fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        let span = left.span().to(right.span());
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
            span,
        }
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Identifier(_))
    }

    /// Check token at offset n ahead (0 = current, 1 = next, etc)
    fn check_ahead(&self, n: usize, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.current + n)
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_span(&mut self, kind: &TokenKind) -> Option<Span> {
        if self.check(kind) {
            Some(self.advance().span)
        } else {
            None
        }
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> FoxResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> FoxResult<&Token> {
        if self.check_identifier() {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> FoxError {
        let token = self.peek();
        FoxError::syntax_error(message, token.span, &self.file).with_source(&self.source)
    }

    fn error_at_previous(&self, message: &str) -> FoxError {
        FoxError::syntax_error(message, self.previous().span, &self.file)
            .with_source(&self.source)
    }
}

/// Scan and parse source text in one step
pub fn parse_source(source: &str, file: &str) -> FoxResult<Program> {
    let tokens = crate::lexer::Scanner::new(source, file).scan_tokens()?;
    Parser::new(tokens, file, source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        parse_source(source, "<test>").unwrap()
    }

    fn single_expr(source: &str) -> Expr {
        let mut program = parse(source);
        assert_eq!(program.statements.len(), 1);
        match program.statements.remove(0) {
            Stmt::Expression { expr, .. } => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = single_expr("1 + 2 * 3");
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary")
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_power_is_right_associative_and_binds_over_negation() {
        let expr = single_expr("-2 ** 3 ** 2");
        let Expr::Unary { op, operand, .. } = expr else {
            panic!("expected unary")
        };
        assert_eq!(op, UnaryOp::Negate);
        let Expr::Binary { op, right, .. } = *operand else {
            panic!("expected power")
        };
        assert_eq!(op, BinaryOp::Pow);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn test_negated_relations() {
        for (source, expected) in [
            ("a not in b", BinaryOp::NotIn),
            ("a is not b", BinaryOp::IsNot),
            ("a not of B", BinaryOp::NotOf),
            ("a not has b", BinaryOp::NotHas),
        ] {
            let Expr::Binary { op, .. } = single_expr(source) else {
                panic!("expected binary for {}", source)
            };
            assert_eq!(op, expected, "{}", source);
        }
    }

    #[test]
    fn test_typed_assignment() {
        let Expr::Assignment { type_hint, .. } = single_expr("n: int | float = f()") else {
            panic!("expected assignment")
        };
        assert!(matches!(type_hint, Some(TypeExpr::Variants { .. })));
    }

    #[test]
    fn test_dictionary_and_array_literals() {
        assert!(matches!(single_expr("[:]"), Expr::Dictionary { entries, .. } if entries.is_empty()));
        assert!(matches!(single_expr("[]"), Expr::Array { elements, .. } if elements.is_empty()));
        assert!(matches!(single_expr("['a': 1, 'b': 2]"), Expr::Dictionary { entries, .. } if entries.len() == 2));
        assert!(matches!(single_expr("[1, 2, 3,]"), Expr::Array { elements, .. } if elements.len() == 3));
    }

    #[test]
    fn test_slice() {
        let Expr::Slice {
            start, end, step, ..
        } = single_expr("xs[1::2]")
        else {
            panic!("expected slice")
        };
        assert!(start.is_some());
        assert!(end.is_none());
        assert!(step.is_some());
    }

    #[test]
    fn test_function_parameters() {
        let Expr::Function { def } =
            single_expr("fn f(a: int, b = 2, *rest, **opts) -> int { a }")
        else {
            panic!("expected function")
        };
        assert_eq!(def.name.as_deref(), Some("f"));
        assert_eq!(def.params.len(), 4);
        assert!(matches!(def.params[0].kind, ParamKind::Positional));
        assert!(matches!(def.params[1].kind, ParamKind::Keyword(_)));
        assert!(matches!(def.params[2].kind, ParamKind::VarPositional));
        assert!(matches!(def.params[3].kind, ParamKind::VarKeyword));
        assert!(def.return_type.is_some());
    }

    #[test]
    fn test_required_after_optional_is_error() {
        assert!(parse_source("fn f(a = 1, b) { }", "<test>").is_err());
    }

    #[test]
    fn test_class_header_and_static_members() {
        let Expr::Class { def } =
            single_expr("class C of A, B has T { static count = 0; x = 1; fn init() { } }")
        else {
            panic!("expected class")
        };
        assert_eq!(def.kind, ClassKind::Class);
        assert_eq!(def.parents.len(), 2);
        assert_eq!(def.traits.len(), 1);
        assert!(matches!(def.body[0], Stmt::Static { .. }));
        assert!(matches!(def.body[1], Stmt::Expression { .. }));
    }

    #[test]
    fn test_static_outside_class_is_error() {
        assert!(parse_source("static x = 1", "<test>").is_err());
        assert!(parse_source("class A { fn f() { static y = 1 } }", "<test>").is_err());
    }

    #[test]
    fn test_return_operand_must_be_on_same_line() {
        let Expr::Block { statements, .. } = single_expr("{ return\n 5 }") else {
            panic!("expected block")
        };
        assert_eq!(statements.len(), 2);
        let Stmt::Expression { expr, .. } = &statements[0] else {
            panic!("expected expression")
        };
        assert!(matches!(expr, Expr::Return { value: None, .. }));
    }

    #[test]
    fn test_labeled_loop_and_jumps() {
        let Expr::Labeled { label, body, .. } =
            single_expr("label outer: for i in xs { break outer }")
        else {
            panic!("expected labeled")
        };
        assert_eq!(label, "outer");
        let Expr::For { body, .. } = *body else {
            panic!("expected for")
        };
        let Expr::Block { statements, .. } = *body else {
            panic!("expected block")
        };
        let Stmt::Expression { expr, .. } = &statements[0] else {
            panic!("expected expression")
        };
        assert!(matches!(expr, Expr::Break { label: Some(l), .. } if l == "outer"));
    }

    #[test]
    fn test_if_elif_else_nests() {
        let Expr::If { else_branch, .. } = single_expr("if a { 1 } elif b { 2 } else { 3 }")
        else {
            panic!("expected if")
        };
        let else_branch = else_branch.expect("elif branch");
        assert!(matches!(*else_branch, Expr::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn test_match_arms() {
        let Expr::Match { arms, default, .. } =
            single_expr("match x { case 1, 2 { 'small' } case int { 'int' } else { 'other' } }")
        else {
            panic!("expected match")
        };
        assert_eq!(arms.len(), 2);
        assert_eq!(arms[0].patterns.len(), 2);
        assert!(default.is_some());
    }

    #[test]
    fn test_defer_statement() {
        let Expr::Block { statements, .. } = single_expr("{ defer a; defer b; c }") else {
            panic!("expected block")
        };
        assert!(matches!(statements[0], Stmt::Defer { .. }));
        assert!(matches!(statements[1], Stmt::Defer { .. }));
        assert!(matches!(statements[2], Stmt::Expression { .. }));
    }

    #[test]
    fn test_call_on_next_line_is_new_statement() {
        let program = parse("f\n(1)");
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn test_keyword_arguments() {
        let Expr::Call { args, .. } = single_expr("f(1, size=3)") else {
            panic!("expected call")
        };
        assert_eq!(args[0].name, None);
        assert_eq!(args[1].name.as_deref(), Some("size"));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_source("1 = 2", "<test>").unwrap_err();
        assert_eq!(err.message, "Invalid assignment target");
    }
}
