use crate::{
    ast::{
        Assign, BasicLit, BinaryOp, BlockStmt, ElseBranch, Expr, ExprStmt, ForStmt, FuncBody,
        FuncExpr, Ident, IfStmt, ImportExpr, Operand, OperandKind, ProgramFile, SelectorPiece,
        Stmt, StmtKind, Tail, TailKind, UnaryExpr, UnaryOp, UsingStmt, WhileStmt,
    },
    diagnostics::Diagnostic,
    lexer::{Keyword, Lexer, Token, TokenKind},
};

pub fn parse_program(source: &str) -> Result<ProgramFile, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<ProgramFile, Diagnostic> {
        let mut stmts = Vec::new();
        self.skip_eols();
        while !self.check(TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
            self.expect_statement_end()?;
        }
        Ok(ProgramFile { stmts })
    }

    fn expect_statement_end(&mut self) -> Result<(), Diagnostic> {
        if self.check(TokenKind::Eof) || self.check(TokenKind::RBrace) {
            return Ok(());
        }
        if self.matches(TokenKind::Eol) {
            self.skip_eols();
            return Ok(());
        }
        Err(self
            .peek()
            .map(|tok| self.error(tok, "expected end of statement"))
            .unwrap_or_else(|| self.error_eof("expected end of statement")))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Keyword(Keyword::If) => {
                    let start = token.span;
                    let stmt = self.parse_if()?;
                    let end = self.previous().span;
                    return Ok(Stmt {
                        kind: StmtKind::If(stmt),
                        span: start.to(end),
                    });
                }
                TokenKind::Keyword(Keyword::For) => return self.parse_for(),
                TokenKind::Keyword(Keyword::While) => return self.parse_while(),
                TokenKind::Keyword(Keyword::Return) => return self.parse_return(),
                TokenKind::Keyword(Keyword::Break) => {
                    let span = self.advance().span;
                    return Ok(Stmt {
                        kind: StmtKind::Break,
                        span,
                    });
                }
                TokenKind::Keyword(Keyword::Continue) => {
                    let span = self.advance().span;
                    return Ok(Stmt {
                        kind: StmtKind::Continue,
                        span,
                    });
                }
                TokenKind::Keyword(Keyword::Using) => return self.parse_using(),
                _ => {}
            }
        }
        self.parse_expression_statement()
    }

    fn parse_if(&mut self) -> Result<IfStmt, Diagnostic> {
        self.consume_keyword(Keyword::If)?;
        let cond = self.parse_expression()?;
        let block = self.parse_block()?;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                Some(ElseBranch::If(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        Ok(IfStmt {
            cond,
            block,
            else_branch,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::For)?.span;

        // `for v in expr`, `for k, v in expr` or `for expr` with no binds;
        // the bind list is committed only when `in` follows.
        let mark = self.current;
        let mut binds = Vec::new();
        if self.check(TokenKind::Identifier) {
            loop {
                let ident = match self.consume_identifier("expected loop binding") {
                    Ok(token) => token,
                    Err(_) => {
                        binds.clear();
                        break;
                    }
                };
                binds.push(Ident {
                    name: ident.lexeme.clone(),
                    span: ident.span,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            if binds.is_empty() || !self.matches_keyword(Keyword::In) {
                binds.clear();
                self.current = mark;
            }
        }

        let over = self.parse_expression()?;
        let block = self.parse_block()?;
        let end = block.span;
        Ok(Stmt {
            kind: StmtKind::For(ForStmt { binds, over, block }),
            span: start.to(end),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::While)?.span;
        let cond = self.parse_expression()?;
        let block = self.parse_block()?;
        let end = block.span;
        Ok(Stmt {
            kind: StmtKind::While(WhileStmt { cond, block }),
            span: start.to(end),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Return)?;
        let expr = if self.check(TokenKind::Eol)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let end = expr.as_ref().map(|e| e.span).unwrap_or(token.span);
        Ok(Stmt {
            kind: StmtKind::Return(expr),
            span: token.span.to(end),
        })
    }

    fn parse_using(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Using)?.span;
        let name_token = self.consume_identifier("expected package name after `using`")?;
        let name = Ident {
            name: name_token.lexeme.clone(),
            span: name_token.span,
        };
        // `as` is contextual, not reserved.
        let alias = if self.check(TokenKind::Identifier)
            && self.peek().map(|tok| tok.lexeme.as_str()) == Some("as")
        {
            self.advance();
            let alias_token = self.consume_identifier("expected alias after `as`")?;
            Some(Ident {
                name: alias_token.lexeme.clone(),
                span: alias_token.span,
            })
        } else {
            None
        };
        let end = alias
            .as_ref()
            .map(|ident| ident.span)
            .unwrap_or(name.span);
        Ok(Stmt {
            kind: StmtKind::Using(UsingStmt { name, alias }),
            span: start.to(end),
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let is_pub = self.matches_keyword(Keyword::Pub);
        let pub_span = if is_pub {
            Some(self.previous().span)
        } else {
            None
        };
        let expr = self.parse_expression()?;

        let assign = if let Some(op) = self.augmented_op() {
            self.advance();
            self.consume(TokenKind::Assign, "expected `=` in augmented assignment")?;
            self.skip_eols();
            let value = self.parse_expression()?;
            Some(Assign {
                op: Some(op),
                value,
            })
        } else if self.matches(TokenKind::Assign) {
            self.skip_eols();
            let value = self.parse_expression()?;
            Some(Assign { op: None, value })
        } else {
            None
        };

        let start = pub_span.unwrap_or(expr.span);
        let end = assign
            .as_ref()
            .map(|assign| assign.value.span)
            .unwrap_or(expr.span);
        Ok(Stmt {
            kind: StmtKind::Expr(ExprStmt {
                is_pub,
                expr,
                assign,
            }),
            span: start.to(end),
        })
    }

    /// An arithmetic token immediately followed by `=`, as in `a += 1`.
    fn augmented_op(&self) -> Option<BinaryOp> {
        let op = match self.peek().map(|tok| &tok.kind) {
            Some(TokenKind::Plus) => BinaryOp::Add,
            Some(TokenKind::Minus) => BinaryOp::Sub,
            Some(TokenKind::Star) => BinaryOp::Mul,
            Some(TokenKind::Slash) => BinaryOp::Div,
            Some(TokenKind::Percent) => BinaryOp::Rem,
            _ => return None,
        };
        match self.peek_ahead(1).map(|tok| &tok.kind) {
            Some(TokenKind::Assign) => Some(op),
            _ => None,
        }
    }

    fn parse_block(&mut self) -> Result<BlockStmt, Diagnostic> {
        let lbrace = self.consume(TokenKind::LBrace, "expected `{` to start block")?;
        let start = lbrace.span;
        self.skip_eols();
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
            if self.check(TokenKind::RBrace) {
                break;
            }
            if !self.matches(TokenKind::Eol) {
                return Err(self
                    .peek()
                    .map(|tok| self.error(tok, "expected newline or `}` after statement"))
                    .unwrap_or_else(|| self.error_eof("expected `}` to close block")));
            }
            self.skip_eols();
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` to close block")?;
        Ok(BlockStmt {
            stmts,
            span: start.to(rbrace.span),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        let head = self.parse_unary()?;
        let start = head.span;
        let mut end = head.span;
        let mut chain = Vec::new();
        while let Some(op) = self.binary_op() {
            self.advance();
            self.skip_eols();
            let operand = self.parse_unary()?;
            end = operand.span;
            chain.push((op, operand));
        }
        Ok(Expr {
            head,
            chain,
            span: start.to(end),
        })
    }

    /// The binary operator at the cursor, unless it begins an augmented
    /// assignment such as `+=`.
    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek().map(|tok| &tok.kind) {
            Some(TokenKind::Star) => BinaryOp::Mul,
            Some(TokenKind::Slash) => BinaryOp::Div,
            Some(TokenKind::Percent) => BinaryOp::Rem,
            Some(TokenKind::Plus) => BinaryOp::Add,
            Some(TokenKind::Minus) => BinaryOp::Sub,
            Some(TokenKind::EqualEqual) => BinaryOp::Equal,
            Some(TokenKind::BangEqual) => BinaryOp::NotEqual,
            Some(TokenKind::Less) => BinaryOp::Less,
            Some(TokenKind::LessEqual) => BinaryOp::LessEqual,
            Some(TokenKind::Greater) => BinaryOp::Greater,
            Some(TokenKind::GreaterEqual) => BinaryOp::GreaterEqual,
            Some(TokenKind::Keyword(Keyword::And)) => BinaryOp::And,
            Some(TokenKind::Keyword(Keyword::Or)) => BinaryOp::Or,
            _ => return None,
        };
        if op.is_arithmetic()
            && matches!(self.peek_ahead(1).map(|tok| &tok.kind), Some(TokenKind::Assign))
        {
            return None;
        }
        Some(op)
    }

    fn parse_unary(&mut self) -> Result<UnaryExpr, Diagnostic> {
        let (op, start) = if self.matches(TokenKind::Minus) {
            (Some(UnaryOp::Negate), Some(self.previous().span))
        } else if self.matches_keyword(Keyword::Not) {
            (Some(UnaryOp::Not), Some(self.previous().span))
        } else {
            (None, None)
        };
        let operand = self.parse_operand()?;
        let span = start.unwrap_or(operand.span).to(operand.span);
        Ok(UnaryExpr { op, operand, span })
    }

    fn parse_operand(&mut self) -> Result<Operand, Diagnostic> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error_eof("unexpected end of expression"))?;
        let start = token.span;

        let kind = match &token.kind {
            TokenKind::Keyword(Keyword::Block) => {
                self.advance();
                OperandKind::Block(self.parse_block()?)
            }
            TokenKind::Pipe => OperandKind::Func(self.parse_func()?),
            TokenKind::Keyword(Keyword::Import) => {
                self.advance();
                let path = self.consume(TokenKind::Str, "expected path string after `import`")?;
                OperandKind::Import(ImportExpr {
                    path: path.lexeme.clone(),
                    span: start.to(path.span),
                })
            }
            TokenKind::Number => {
                let tok = self.advance();
                OperandKind::Basic(BasicLit::Number(tok.lexeme.clone()))
            }
            TokenKind::Str => {
                let tok = self.advance();
                OperandKind::Basic(BasicLit::Str(tok.lexeme.clone()))
            }
            TokenKind::Keyword(Keyword::Inf) => {
                self.advance();
                OperandKind::Basic(BasicLit::Number("inf".into()))
            }
            TokenKind::Keyword(Keyword::None) => {
                self.advance();
                OperandKind::None
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                OperandKind::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                OperandKind::Bool(false)
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                OperandKind::Name(tok.lexeme.clone())
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_eols();
                let inner = self.parse_expression()?;
                self.skip_eols();
                self.consume(TokenKind::RParen, "expected `)` after expression")?;
                OperandKind::Paren(Box::new(inner))
            }
            TokenKind::LBracket => {
                self.advance();
                self.skip_eols();
                let elems = self.parse_expr_list(TokenKind::RBracket)?;
                self.skip_eols();
                self.consume(TokenKind::RBracket, "expected `]` after array literal")?;
                OperandKind::Array(elems)
            }
            TokenKind::LBrace => {
                self.advance();
                self.skip_eols();
                let items = self.parse_object_items()?;
                self.skip_eols();
                self.consume(TokenKind::RBrace, "expected `}` after object literal")?;
                OperandKind::Object(items)
            }
            _ => return Err(self.error(&token, "unexpected token in expression")),
        };

        let tails = self.parse_tails()?;
        let end = self.previous().span;
        Ok(Operand {
            kind,
            tails,
            span: start.to(end),
        })
    }

    fn parse_tails(&mut self) -> Result<Vec<Tail>, Diagnostic> {
        let mut tails = Vec::new();
        loop {
            if self.check(TokenKind::Dot) {
                let start = self.advance().span;
                let mut first = true;
                let mut pieces = Vec::new();
                while first || self.matches(TokenKind::Dot) {
                    first = false;
                    self.skip_eols();
                    let piece = self
                        .peek()
                        .cloned()
                        .ok_or_else(|| self.error_eof("expected selector after `.`"))?;
                    match piece.kind {
                        TokenKind::Identifier => {
                            self.advance();
                            pieces.push(SelectorPiece::Ident(piece.lexeme.clone()));
                        }
                        TokenKind::Str => {
                            self.advance();
                            pieces.push(SelectorPiece::Str(piece.lexeme.clone()));
                        }
                        _ => return Err(self.error(&piece, "expected selector after `.`")),
                    }
                }
                let end = self.previous().span;
                tails.push(Tail {
                    kind: TailKind::Select(pieces),
                    span: start.to(end),
                });
            } else if self.check(TokenKind::LBracket) {
                let start = self.advance().span;
                self.skip_eols();
                let index = self.parse_expr_list(TokenKind::RBracket)?;
                if index.is_empty() {
                    return Err(Diagnostic::syntax("indexer must have at least one index")
                        .with_span(start));
                }
                self.skip_eols();
                let rbracket = self.consume(TokenKind::RBracket, "expected `]` after index")?;
                tails.push(Tail {
                    kind: TailKind::Index(index),
                    span: start.to(rbracket.span),
                });
            } else if self.check(TokenKind::LParen) {
                let start = self.advance().span;
                self.skip_eols();
                let args = self.parse_expr_list(TokenKind::RParen)?;
                self.skip_eols();
                let rparen = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                tails.push(Tail {
                    kind: TailKind::Call(args),
                    span: start.to(rparen.span),
                });
            } else {
                break;
            }
        }
        Ok(tails)
    }

    fn parse_expr_list(&mut self, terminator: TokenKind) -> Result<Vec<Expr>, Diagnostic> {
        let mut elems = Vec::new();
        if self.check(terminator.clone()) {
            return Ok(elems);
        }
        loop {
            elems.push(self.parse_expression()?);
            self.skip_eols();
            if !self.matches(TokenKind::Comma) {
                break;
            }
            self.skip_eols();
            if self.check(terminator.clone()) {
                break;
            }
        }
        Ok(elems)
    }

    fn parse_object_items(&mut self) -> Result<Vec<(Expr, Expr)>, Diagnostic> {
        let mut items = Vec::new();
        if self.check(TokenKind::RBrace) {
            return Ok(items);
        }
        loop {
            let key = self.parse_expression()?;
            self.consume(TokenKind::Colon, "expected `:` in object literal")?;
            self.skip_eols();
            let value = self.parse_expression()?;
            items.push((key, value));
            self.skip_eols();
            if !self.matches(TokenKind::Comma) {
                break;
            }
            self.skip_eols();
            if self.check(TokenKind::RBrace) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_func(&mut self) -> Result<FuncExpr, Diagnostic> {
        self.consume(TokenKind::Pipe, "expected `|` to start function")?;
        self.skip_eols();
        let mut params = Vec::new();
        if !self.check(TokenKind::Pipe) {
            loop {
                let param = self.consume_identifier("expected parameter name")?;
                params.push(Ident {
                    name: param.lexeme.clone(),
                    span: param.span,
                });
                self.skip_eols();
                if !self.matches(TokenKind::Comma) {
                    break;
                }
                self.skip_eols();
                if self.check(TokenKind::Pipe) {
                    break;
                }
            }
        }
        self.skip_eols();
        self.consume(TokenKind::Pipe, "expected closing `|` in function")?;
        self.consume(TokenKind::FuncSign, "expected `=>` after function arguments")?;

        // A `{` after `=>` is usually a block body, but may be an object
        // literal; commit to whichever parses.
        let body = if self.check(TokenKind::LBrace) {
            let mark = self.current;
            match self.parse_block() {
                Ok(block) => FuncBody::Block(block),
                Err(_) => {
                    self.current = mark;
                    FuncBody::Expr(Box::new(self.parse_expression()?))
                }
            }
        } else {
            FuncBody::Expr(Box::new(self.parse_expression()?))
        };
        Ok(FuncExpr { params, body })
    }

    fn skip_eols(&mut self) {
        while self.matches(TokenKind::Eol) {}
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        if let Some(Token {
            kind: TokenKind::Keyword(k),
            ..
        }) = self.peek()
        {
            if *k == keyword {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Keyword(keyword) {
                Ok(self.advance())
            } else {
                Err(self.error(token, &format!("expected keyword `{keyword:?}`")))
            }
        } else {
            Err(self.error_eof("unexpected end of input"))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        if self.check(TokenKind::Identifier) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().map(|tok| tok.kind == kind).unwrap_or(false)
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_ahead(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::syntax(message.to_string()).with_span(token.span)
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::syntax(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{OperandKind, StmtKind, TailKind};

    fn parse(source: &str) -> ProgramFile {
        parse_program(source).expect("parse should succeed")
    }

    fn first_expr(program: &ProgramFile) -> &ExprStmt {
        match &program.stmts[0].kind {
            StmtKind::Expr(expr) => expr,
            other => panic!("expected expression statement, found {other:?}"),
        }
    }

    #[test]
    fn parses_binary_chain_flat() {
        let program = parse("1 + 2 * 3");
        let stmt = first_expr(&program);
        assert_eq!(stmt.expr.chain.len(), 2);
        assert_eq!(stmt.expr.chain[0].0, BinaryOp::Add);
        assert_eq!(stmt.expr.chain[1].0, BinaryOp::Mul);
    }

    #[test]
    fn parses_assignment_and_augmented() {
        let program = parse("a = 1\na += 2");
        assert_eq!(program.stmts.len(), 2);
        let plain = first_expr(&program);
        assert!(plain.assign.as_ref().is_some_and(|a| a.op.is_none()));
        match &program.stmts[1].kind {
            StmtKind::Expr(stmt) => {
                assert_eq!(stmt.assign.as_ref().and_then(|a| a.op), Some(BinaryOp::Add));
            }
            other => panic!("expected expression statement, found {other:?}"),
        }
    }

    #[test]
    fn parses_pub_assignment() {
        let program = parse("pub x = 10");
        let stmt = first_expr(&program);
        assert!(stmt.is_pub);
        assert!(stmt.assign.is_some());
    }

    #[test]
    fn parses_for_variants() {
        for (source, arity) in [
            ("for [1] { }", 0),
            ("for v in [1] { }", 1),
            ("for k, v in {} { }", 2),
        ] {
            let program = parse(source);
            match &program.stmts[0].kind {
                StmtKind::For(stmt) => assert_eq!(stmt.binds.len(), arity, "{source}"),
                other => panic!("expected for statement, found {other:?}"),
            }
        }
    }

    #[test]
    fn parses_else_if_chain() {
        let program = parse("if a { } else if b { } else { }");
        match &program.stmts[0].kind {
            StmtKind::If(stmt) => match &stmt.else_branch {
                Some(ElseBranch::If(nested)) => assert!(nested.else_branch.is_some()),
                other => panic!("expected nested if, found {other:?}"),
            },
            other => panic!("expected if statement, found {other:?}"),
        }
    }

    #[test]
    fn parses_function_with_expression_body() {
        let program = parse("f = |x, y| => x + y");
        let stmt = first_expr(&program);
        let assign = stmt.assign.as_ref().expect("assignment");
        match &assign.value.head.operand.kind {
            OperandKind::Func(func) => {
                assert_eq!(func.params.len(), 2);
                assert!(matches!(func.body, FuncBody::Expr(_)));
            }
            other => panic!("expected function literal, found {other:?}"),
        }
    }

    #[test]
    fn parses_selector_call_chain_across_newlines() {
        let program = parse("iter.\n    range(10).\n    list()");
        let stmt = first_expr(&program);
        let tails = &stmt.expr.head.operand.tails;
        assert!(matches!(tails[0].kind, TailKind::Select(_)));
        assert!(matches!(tails[1].kind, TailKind::Call(_)));
        assert!(matches!(tails[2].kind, TailKind::Select(_)));
        assert!(matches!(tails[3].kind, TailKind::Call(_)));
    }

    #[test]
    fn parses_string_selector_piece() {
        let program = parse(r#"obj."0key".field"#);
        let stmt = first_expr(&program);
        match &stmt.expr.head.operand.tails[0].kind {
            TailKind::Select(pieces) => {
                assert!(matches!(&pieces[0], SelectorPiece::Str(s) if s == "0key"));
                assert!(matches!(&pieces[1], SelectorPiece::Ident(s) if s == "field"));
            }
            other => panic!("expected selector, found {other:?}"),
        }
    }

    #[test]
    fn parses_object_literal_with_trailing_comma() {
        let program = parse("{\n  \"a\": 1,\n  \"b\": 2,\n}");
        let stmt = first_expr(&program);
        match &stmt.expr.head.operand.kind {
            OperandKind::Object(items) => assert_eq!(items.len(), 2),
            other => panic!("expected object literal, found {other:?}"),
        }
    }

    #[test]
    fn parses_block_expression() {
        let program = parse("a = block {\n  return 1\n}");
        let stmt = first_expr(&program);
        let assign = stmt.assign.as_ref().expect("assignment");
        assert!(matches!(
            assign.value.head.operand.kind,
            OperandKind::Block(_)
        ));
    }

    #[test]
    fn parses_import_expression() {
        let program = parse(r#"m = import "lib.el""#);
        let stmt = first_expr(&program);
        let assign = stmt.assign.as_ref().expect("assignment");
        match &assign.value.head.operand.kind {
            OperandKind::Import(import) => assert_eq!(import.path, "lib.el"),
            other => panic!("expected import, found {other:?}"),
        }
    }

    #[test]
    fn parses_using_with_alias() {
        let program = parse("using iter as it");
        match &program.stmts[0].kind {
            StmtKind::Using(stmt) => {
                assert_eq!(stmt.name.name, "iter");
                assert_eq!(stmt.alias.as_ref().map(|a| a.name.as_str()), Some("it"));
            }
            other => panic!("expected using statement, found {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_block_terminator() {
        assert!(parse_program("if a {\n").is_err());
    }

    #[test]
    fn rejects_two_statements_on_one_line() {
        assert!(parse_program("a = 1 b = 2").is_err());
    }
}
