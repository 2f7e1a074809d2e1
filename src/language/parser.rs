use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};

pub fn parse_file(source: &str) -> Result<File, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    /// Negative while parsing `if`/`for`/`switch` headers, where `T {` opens a block.
    expr_lev: i32,
}

enum SimpleStmt {
    Stmt(Stmt),
    Range {
        lhs: Vec<Expr>,
        define: bool,
        subject: Expr,
    },
}

enum ParamEntry {
    Name(Ident),
    Named(Ident, Expr),
    Type(Expr),
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            expr_lev: 0,
        }
    }

    fn parse(mut self) -> Result<File, SyntaxErrors> {
        let package = match self.parse_package_clause() {
            Ok(ident) => ident,
            Err(err) => return Err(SyntaxErrors::new(vec![err])),
        };

        let mut imports = Vec::new();
        while self.check(&TokenKind::Import) {
            match self.parse_import_decl() {
                Ok(mut specs) => imports.append(&mut specs),
                Err(err) => {
                    self.report(err);
                    self.synchronize_decl();
                }
            }
        }

        let mut decls = Vec::new();
        while !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(err) => {
                    self.report(err);
                    self.synchronize_decl();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(File {
                package,
                imports,
                decls,
            })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    // ---- token helpers -------------------------------------------------

    fn peek_kind(&self) -> &TokenKind {
        self.peek_kind_at(0)
    }

    fn peek_kind_at(&self, ahead: usize) -> &TokenKind {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn current_start(&self) -> usize {
        self.current_span().start
    }

    fn last_end(&self) -> usize {
        if self.pos == 0 {
            return 0;
        }
        self.tokens[self.pos - 1].span.end
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.last_end().max(start))
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "Expected {}, found {}",
                kind.describe(),
                self.peek_kind().describe()
            )))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<Ident, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let token = self.advance();
                Ok(Ident::new(name, token.span))
            }
            other => Err(self
                .error_here(format!("{message}, found {}", other.describe()))
                .with_label(message.to_string())),
        }
    }

    fn ident_here(&self) -> Option<String> {
        match self.peek_kind() {
            TokenKind::Identifier(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Statements and specs end with `;`, which may be omitted before `)` or `}`.
    fn expect_semi(&mut self) -> Result<(), SyntaxError> {
        match self.peek_kind() {
            TokenKind::Semi => {
                self.advance();
                Ok(())
            }
            TokenKind::RParen | TokenKind::RBrace | TokenKind::Eof => Ok(()),
            other => Err(self
                .error_here(format!(
                    "Expected newline or ';', found {}",
                    other.describe()
                ))
                .with_help("statements are terminated by a newline or ';'")),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current_span())
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn synchronize_decl(&mut self) {
        self.advance();
        while !self.is_eof() {
            if matches!(
                self.peek_kind(),
                TokenKind::Func | TokenKind::Var | TokenKind::Const | TokenKind::Type
            ) && self.pos > 0
                && matches!(self.tokens[self.pos - 1].kind, TokenKind::Semi)
            {
                return;
            }
            self.advance();
        }
    }

    /// Index of the `]` matching the `[` at `pos + ahead`.
    fn matching_bracket(&self, ahead: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut index = self.pos + ahead;
        while index < self.tokens.len() {
            match self.tokens[index].kind {
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(index);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
            index += 1;
        }
        None
    }

    fn starts_type(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Identifier(_)
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Func
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::LParen
                | TokenKind::Arrow
        )
    }

    /// `name [ ... ] T` declares `name` with an array type, while `T[args]`
    /// followed by anything else is a generic instantiation.
    fn bracket_starts_array_type(&self) -> bool {
        if matches!(self.peek_kind_at(2), TokenKind::RBracket) {
            return true;
        }
        match self.matching_bracket(1) {
            Some(close) => {
                let after = &self.tokens[(close + 1).min(self.tokens.len() - 1)].kind;
                Self::starts_type(after)
            }
            None => false,
        }
    }

    // ---- declarations --------------------------------------------------

    fn parse_package_clause(&mut self) -> Result<Ident, SyntaxError> {
        while self.matches(&TokenKind::Semi) {}
        self.expect(TokenKind::Package)
            .map_err(|err| err.with_help("every Go file starts with `package <name>`"))?;
        let name = self.expect_ident("Expected package name")?;
        self.expect_semi()?;
        Ok(name)
    }

    fn parse_import_decl(&mut self) -> Result<Vec<ImportSpec>, SyntaxError> {
        self.expect(TokenKind::Import)?;
        let mut specs = Vec::new();
        if self.matches(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.is_eof() {
                if self.matches(&TokenKind::Semi) {
                    continue;
                }
                specs.push(self.parse_import_spec()?);
                self.expect_semi()?;
            }
            self.expect(TokenKind::RParen)?;
        } else {
            specs.push(self.parse_import_spec()?);
        }
        self.expect_semi()?;
        Ok(specs)
    }

    fn parse_import_spec(&mut self) -> Result<ImportSpec, SyntaxError> {
        let start = self.current_start();
        let alias = match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let token = self.advance();
                Some(Ident::new(name, token.span))
            }
            TokenKind::Dot => {
                let token = self.advance();
                Some(Ident::new(".", token.span))
            }
            _ => None,
        };
        match self.peek_kind().clone() {
            TokenKind::String(path) => {
                self.advance();
                Ok(ImportSpec {
                    alias,
                    path,
                    span: self.span_from(start),
                })
            }
            other => Err(self.error_here(format!(
                "Expected import path string, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_decl(&mut self) -> Result<Decl, SyntaxError> {
        match self.peek_kind() {
            TokenKind::Func => self.parse_func_decl().map(Decl::Func),
            TokenKind::Var => {
                self.advance();
                let specs = self.parse_group(|p| p.parse_value_spec(false))?;
                Ok(Decl::Var(specs))
            }
            TokenKind::Const => {
                self.advance();
                let specs = self.parse_group(|p| p.parse_value_spec(true))?;
                Ok(Decl::Const(specs))
            }
            TokenKind::Type => {
                self.advance();
                let specs = self.parse_group(Parser::parse_type_spec)?;
                Ok(Decl::Type(specs))
            }
            TokenKind::Import => Err(self
                .error_here("Imports must appear before other declarations")
                .with_help("move this import next to the others at the top of the file")),
            other => Err(self.error_here(format!(
                "Expected declaration, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_group<T>(
        &mut self,
        mut spec: impl FnMut(&mut Parser) -> Result<T, SyntaxError>,
    ) -> Result<Vec<T>, SyntaxError> {
        let mut specs = Vec::new();
        if self.matches(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.is_eof() {
                if self.matches(&TokenKind::Semi) {
                    continue;
                }
                specs.push(spec(self)?);
                self.expect_semi()?;
            }
            self.expect(TokenKind::RParen)?;
        } else {
            specs.push(spec(self)?);
        }
        self.expect_semi()?;
        Ok(specs)
    }

    fn parse_value_spec(&mut self, constant: bool) -> Result<ValueSpec, SyntaxError> {
        let start = self.current_start();
        let names = self.parse_ident_list()?;
        let ty = match self.peek_kind() {
            TokenKind::Eq | TokenKind::Semi | TokenKind::RParen => None,
            _ => Some(self.parse_type()?),
        };
        let values = if self.matches(&TokenKind::Eq) {
            self.parse_expr_list()?
        } else {
            if !constant && ty.is_none() {
                return Err(self.error_here("Missing variable type or initialization"));
            }
            Vec::new()
        };
        Ok(ValueSpec {
            names,
            ty,
            values,
            span: self.span_from(start),
        })
    }

    fn parse_type_spec(&mut self) -> Result<TypeSpec, SyntaxError> {
        let start = self.current_start();
        let name = self.expect_ident("Expected type name")?;
        let mut type_params = Vec::new();
        if self.check(&TokenKind::LBracket)
            && matches!(self.peek_kind_at(1), TokenKind::Identifier(_))
            && !matches!(self.peek_kind_at(2), TokenKind::RBracket)
        {
            type_params = self.parse_type_params()?;
        }
        let alias = self.matches(&TokenKind::Eq);
        let ty = self.parse_type()?;
        Ok(TypeSpec {
            name,
            type_params,
            alias,
            ty,
            span: self.span_from(start),
        })
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl, SyntaxError> {
        let start = self.expect(TokenKind::Func)?.span.start;
        let recv = if self.check(&TokenKind::LParen) {
            let mut fields = self.parse_parameters()?;
            if fields.len() != 1 {
                return Err(SyntaxError::new(
                    "Method has multiple receivers",
                    self.span_from(start),
                ));
            }
            fields.pop()
        } else {
            None
        };
        let name = self.expect_ident("Expected function name")?;
        let type_params = if self.check(&TokenKind::LBracket) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };
        let sig = self.parse_signature()?;
        let body = if self.check(&TokenKind::LBrace) {
            Some(self.parse_body()?)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(FuncDecl {
            name,
            recv,
            type_params,
            sig,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_type_params(&mut self) -> Result<Vec<Field>, SyntaxError> {
        self.expect(TokenKind::LBracket)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_eof() {
            let start = self.current_start();
            let names = self.parse_ident_list()?;
            let ty = self.parse_constraint()?;
            fields.push(Field {
                names,
                ty,
                span: self.span_from(start),
            });
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(fields)
    }

    fn parse_constraint(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        let mut lhs = self.parse_constraint_term()?;
        while self.matches(&TokenKind::Pipe) {
            let rhs = self.parse_constraint_term()?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
        }
        Ok(lhs)
    }

    fn parse_constraint_term(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        if self.matches(&TokenKind::Tilde) {
            let operand = self.parse_type()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Tilde,
                    operand: Box::new(operand),
                },
                self.span_from(start),
            ));
        }
        self.parse_type()
    }

    fn parse_ident_list(&mut self) -> Result<Vec<Ident>, SyntaxError> {
        let mut names = vec![self.expect_ident("Expected identifier")?];
        while self.matches(&TokenKind::Comma) {
            names.push(self.expect_ident("Expected identifier")?);
        }
        Ok(names)
    }

    fn parse_signature(&mut self) -> Result<FuncType, SyntaxError> {
        let params = self.parse_parameters()?;
        let results = if self.check(&TokenKind::LParen) {
            self.parse_parameters()?
        } else if Self::starts_type(self.peek_kind()) {
            let start = self.current_start();
            let ty = self.parse_type()?;
            vec![Field {
                names: Vec::new(),
                ty,
                span: self.span_from(start),
            }]
        } else {
            Vec::new()
        };
        Ok(FuncType { params, results })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Field>, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_eof() {
            let start = self.current_start();
            let entry = self.parse_param_entry()?;
            entries.push((entry, start));
            if !self.matches(&TokenKind::Comma) {
                break;
            }
            while self.matches(&TokenKind::Semi) {}
        }
        while self.matches(&TokenKind::Semi) {}
        self.expect(TokenKind::RParen)?;
        self.group_params(entries)
    }

    fn parse_param_entry(&mut self) -> Result<ParamEntry, SyntaxError> {
        let Some(name) = self.ident_here() else {
            return self.parse_param_type().map(ParamEntry::Type);
        };
        match self.peek_kind_at(1) {
            TokenKind::Comma | TokenKind::RParen => {
                let token = self.advance();
                Ok(ParamEntry::Name(Ident::new(name, token.span)))
            }
            TokenKind::Dot => self.parse_type().map(ParamEntry::Type),
            TokenKind::LBracket if !self.bracket_starts_array_type() => {
                self.parse_type().map(ParamEntry::Type)
            }
            _ => {
                let token = self.advance();
                let ty = self.parse_param_type()?;
                Ok(ParamEntry::Named(Ident::new(name, token.span), ty))
            }
        }
    }

    fn parse_param_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        if self.matches(&TokenKind::Ellipsis) {
            let elem = self.parse_type()?;
            return Ok(Expr::new(
                ExprKind::Ellipsis(Some(Box::new(elem))),
                self.span_from(start),
            ));
        }
        self.parse_type()
    }

    fn group_params(&self, entries: Vec<(ParamEntry, usize)>) -> Result<Vec<Field>, SyntaxError> {
        let named = entries
            .iter()
            .any(|(entry, _)| matches!(entry, ParamEntry::Named(..)));
        let mut fields = Vec::new();
        if !named {
            for (entry, start) in entries {
                let ty = match entry {
                    ParamEntry::Name(ident) => {
                        let span = ident.span;
                        Expr::new(ExprKind::Ident(ident), span)
                    }
                    ParamEntry::Type(ty) | ParamEntry::Named(_, ty) => ty,
                };
                let span = Span::new(start, ty.span.end);
                fields.push(Field {
                    names: Vec::new(),
                    ty,
                    span,
                });
            }
            return Ok(fields);
        }

        let mut pending: Vec<Ident> = Vec::new();
        let mut group_start = None;
        for (entry, start) in entries {
            match entry {
                ParamEntry::Name(ident) => {
                    group_start.get_or_insert(start);
                    pending.push(ident);
                }
                ParamEntry::Named(ident, ty) => {
                    let first = group_start.take().unwrap_or(start);
                    pending.push(ident);
                    let span = Span::new(first, ty.span.end);
                    fields.push(Field {
                        names: std::mem::take(&mut pending),
                        ty,
                        span,
                    });
                }
                ParamEntry::Type(ty) => {
                    return Err(SyntaxError::new("Mixed named and unnamed parameters", ty.span)
                        .with_help("either name every parameter or none of them"));
                }
            }
        }
        if let Some(last) = pending.last() {
            return Err(SyntaxError::new("Missing parameter type", last.span));
        }
        Ok(fields)
    }

    // ---- types ---------------------------------------------------------

    fn parse_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        match self.peek_kind().clone() {
            TokenKind::Identifier(_) => self.parse_type_name(),
            TokenKind::Star => {
                self.advance();
                let inner = self.parse_type()?;
                Ok(Expr::new(
                    ExprKind::Star(Box::new(inner)),
                    self.span_from(start),
                ))
            }
            TokenKind::LBracket => self.parse_array_type(),
            TokenKind::Map => self.parse_map_type(),
            TokenKind::Chan | TokenKind::Arrow => self.parse_chan_type(),
            TokenKind::Func => {
                self.advance();
                let sig = self.parse_signature()?;
                Ok(Expr::new(ExprKind::FuncType(sig), self.span_from(start)))
            }
            TokenKind::Struct => self.parse_struct_type(),
            TokenKind::Interface => self.parse_interface_type(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::new(
                    ExprKind::Paren(Box::new(inner)),
                    self.span_from(start),
                ))
            }
            other => Err(self.error_here(format!("Expected type, found {}", other.describe()))),
        }
    }

    fn parse_type_name(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        let name = self.expect_ident("Expected type name")?;
        let span = name.span;
        let mut ty = Expr::new(ExprKind::Ident(name), span);
        if self.matches(&TokenKind::Dot) {
            let field = self.expect_ident("Expected type name after '.'")?;
            ty = Expr::new(
                ExprKind::Selector {
                    base: Box::new(ty),
                    field,
                },
                self.span_from(start),
            );
        }
        if self.check(&TokenKind::LBracket) {
            self.advance();
            let mut indices = Vec::new();
            while !self.check(&TokenKind::RBracket) && !self.is_eof() {
                indices.push(self.parse_type()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBracket)?;
            ty = Expr::new(
                ExprKind::Index {
                    base: Box::new(ty),
                    indices,
                },
                self.span_from(start),
            );
        }
        Ok(ty)
    }

    fn parse_array_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LBracket)?.span.start;
        let len = if self.matches(&TokenKind::RBracket) {
            None
        } else {
            let len = if self.check(&TokenKind::Ellipsis) {
                let token = self.advance();
                Expr::new(ExprKind::Ellipsis(None), token.span)
            } else {
                self.with_expr_lev(1, Parser::parse_expr)?
            };
            self.expect(TokenKind::RBracket)?;
            Some(Box::new(len))
        };
        let elem = self.parse_type()?;
        Ok(Expr::new(
            ExprKind::ArrayType {
                len,
                elem: Box::new(elem),
            },
            self.span_from(start),
        ))
    }

    fn parse_map_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::Map)?.span.start;
        self.expect(TokenKind::LBracket)?;
        let key = self.parse_type()?;
        self.expect(TokenKind::RBracket)?;
        let value = self.parse_type()?;
        Ok(Expr::new(
            ExprKind::MapType {
                key: Box::new(key),
                value: Box::new(value),
            },
            self.span_from(start),
        ))
    }

    fn parse_chan_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        let dir = if self.matches(&TokenKind::Arrow) {
            self.expect(TokenKind::Chan)?;
            ChanDir::Recv
        } else {
            self.expect(TokenKind::Chan)?;
            if self.matches(&TokenKind::Arrow) {
                ChanDir::Send
            } else {
                ChanDir::Both
            }
        };
        let elem = self.parse_type()?;
        Ok(Expr::new(
            ExprKind::ChanType {
                dir,
                elem: Box::new(elem),
            },
            self.span_from(start),
        ))
    }

    fn parse_struct_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::Struct)?.span.start;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            fields.push(self.parse_struct_field()?);
            self.expect_semi()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::new(
            ExprKind::StructType(fields),
            self.span_from(start),
        ))
    }

    fn parse_struct_field(&mut self) -> Result<Field, SyntaxError> {
        let start = self.current_start();
        let embedded = match self.peek_kind() {
            TokenKind::Star => true,
            TokenKind::Identifier(_) => match self.peek_kind_at(1) {
                TokenKind::Dot
                | TokenKind::Semi
                | TokenKind::RBrace
                | TokenKind::String(_) => true,
                TokenKind::LBracket => !self.bracket_starts_array_type(),
                _ => false,
            },
            _ => false,
        };
        let (names, ty) = if embedded {
            (Vec::new(), self.parse_type()?)
        } else {
            let names = self.parse_ident_list()?;
            (names, self.parse_type()?)
        };
        if let TokenKind::String(_) = self.peek_kind() {
            self.advance();
        }
        Ok(Field {
            names,
            ty,
            span: self.span_from(start),
        })
    }

    fn parse_interface_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::Interface)?.span.start;
        self.expect(TokenKind::LBrace)?;
        let mut elems = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            let elem_start = self.current_start();
            let is_method = matches!(self.peek_kind(), TokenKind::Identifier(_))
                && matches!(self.peek_kind_at(1), TokenKind::LParen);
            if is_method {
                let name = self.expect_ident("Expected method name")?;
                let sig_start = self.current_start();
                let sig = self.parse_signature()?;
                elems.push(Field {
                    names: vec![name],
                    ty: Expr::new(ExprKind::FuncType(sig), self.span_from(sig_start)),
                    span: self.span_from(elem_start),
                });
            } else {
                let ty = self.parse_constraint()?;
                elems.push(Field {
                    names: Vec::new(),
                    ty,
                    span: self.span_from(elem_start),
                });
            }
            self.expect_semi()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::new(
            ExprKind::InterfaceType(elems),
            self.span_from(start),
        ))
    }

    // ---- statements ----------------------------------------------------

    fn parse_body(&mut self) -> Result<Block, SyntaxError> {
        let saved = self.expr_lev;
        self.expr_lev = 0;
        let block = self.parse_block();
        self.expr_lev = saved;
        block
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let start = self.expect(TokenKind::LBrace)?.span.start;
        let stmts = self.parse_stmt_list()?;
        self.expect(TokenKind::RBrace)?;
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    fn parse_stmt_list(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = Vec::new();
        while !matches!(
            self.peek_kind(),
            TokenKind::RBrace | TokenKind::Case | TokenKind::Default | TokenKind::Eof
        ) {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
            if !matches!(
                self.peek_kind(),
                TokenKind::RBrace | TokenKind::Case | TokenKind::Default
            ) {
                self.expect_semi()?;
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current_start();
        match self.peek_kind() {
            TokenKind::Var => {
                self.advance();
                Ok(Stmt::Var(self.parse_decl_group(false)?))
            }
            TokenKind::Const => {
                self.advance();
                Ok(Stmt::Const(self.parse_decl_group(true)?))
            }
            TokenKind::Type => {
                self.advance();
                let specs = if self.matches(&TokenKind::LParen) {
                    let mut specs = Vec::new();
                    while !self.check(&TokenKind::RParen) && !self.is_eof() {
                        if self.matches(&TokenKind::Semi) {
                            continue;
                        }
                        specs.push(self.parse_type_spec()?);
                        self.expect_semi()?;
                    }
                    self.expect(TokenKind::RParen)?;
                    specs
                } else {
                    vec![self.parse_type_spec()?]
                };
                Ok(Stmt::Type(specs))
            }
            TokenKind::Go | TokenKind::Defer => {
                let is_go = matches!(self.advance().kind, TokenKind::Go);
                let call = self.parse_expr()?;
                if !matches!(call.unparen().kind, ExprKind::Call { .. }) {
                    let keyword = if is_go { "go" } else { "defer" };
                    return Err(SyntaxError::new(
                        format!("Expression in {keyword} must be function call"),
                        call.span,
                    ));
                }
                let stmt = GoStmt {
                    call,
                    span: self.span_from(start),
                };
                Ok(if is_go { Stmt::Go(stmt) } else { Stmt::Defer(stmt) })
            }
            TokenKind::Return => {
                self.advance();
                let results = if matches!(self.peek_kind(), TokenKind::Semi | TokenKind::RBrace) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                Ok(Stmt::Return(ReturnStmt {
                    results,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Break | TokenKind::Continue | TokenKind::Goto | TokenKind::Fallthrough => {
                let kind = match self.advance().kind {
                    TokenKind::Break => BranchKind::Break,
                    TokenKind::Continue => BranchKind::Continue,
                    TokenKind::Goto => BranchKind::Goto,
                    _ => BranchKind::Fallthrough,
                };
                let label = if kind != BranchKind::Fallthrough && self.ident_here().is_some() {
                    Some(self.expect_ident("Expected label")?)
                } else {
                    None
                };
                Ok(Stmt::Branch(BranchStmt {
                    kind,
                    label,
                    span: self.span_from(start),
                }))
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::If => self.parse_if().map(Stmt::If),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Select => self.parse_select().map(Stmt::Select),
            TokenKind::For => self.parse_for(),
            TokenKind::Semi | TokenKind::RBrace => Ok(Stmt::Empty(Span::new(start, start))),
            TokenKind::Identifier(_) if matches!(self.peek_kind_at(1), TokenKind::Colon) => {
                let label = self.expect_ident("Expected label")?;
                self.expect(TokenKind::Colon)?;
                let stmt = if matches!(self.peek_kind(), TokenKind::RBrace) {
                    Stmt::Empty(Span::new(self.current_start(), self.current_start()))
                } else {
                    self.parse_stmt()?
                };
                Ok(Stmt::Labeled(LabeledStmt {
                    label,
                    stmt: Box::new(stmt),
                    span: self.span_from(start),
                }))
            }
            _ => self.expect_simple(false),
        }
    }

    fn parse_decl_group(&mut self, constant: bool) -> Result<Vec<ValueSpec>, SyntaxError> {
        if self.matches(&TokenKind::LParen) {
            let mut specs = Vec::new();
            while !self.check(&TokenKind::RParen) && !self.is_eof() {
                if self.matches(&TokenKind::Semi) {
                    continue;
                }
                specs.push(self.parse_value_spec(constant)?);
                self.expect_semi()?;
            }
            self.expect(TokenKind::RParen)?;
            Ok(specs)
        } else {
            Ok(vec![self.parse_value_spec(constant)?])
        }
    }

    fn parse_simple_stmt(&mut self, range_ok: bool) -> Result<SimpleStmt, SyntaxError> {
        let start = self.current_start();
        if range_ok && self.matches(&TokenKind::Range) {
            let subject = self.parse_expr()?;
            return Ok(SimpleStmt::Range {
                lhs: Vec::new(),
                define: false,
                subject,
            });
        }

        let lhs = self.parse_expr_list()?;
        let op = match self.peek_kind() {
            TokenKind::Define => Some(AssignOp::Define),
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::Compound(BinaryOp::Add)),
            TokenKind::MinusEq => Some(AssignOp::Compound(BinaryOp::Sub)),
            TokenKind::StarEq => Some(AssignOp::Compound(BinaryOp::Mul)),
            TokenKind::SlashEq => Some(AssignOp::Compound(BinaryOp::Div)),
            TokenKind::PercentEq => Some(AssignOp::Compound(BinaryOp::Rem)),
            TokenKind::AmpEq => Some(AssignOp::Compound(BinaryOp::And)),
            TokenKind::PipeEq => Some(AssignOp::Compound(BinaryOp::Or)),
            TokenKind::CaretEq => Some(AssignOp::Compound(BinaryOp::Xor)),
            TokenKind::ShlEq => Some(AssignOp::Compound(BinaryOp::Shl)),
            TokenKind::ShrEq => Some(AssignOp::Compound(BinaryOp::Shr)),
            TokenKind::AndNotEq => Some(AssignOp::Compound(BinaryOp::AndNot)),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            if range_ok
                && matches!(op, AssignOp::Define | AssignOp::Assign)
                && self.matches(&TokenKind::Range)
            {
                let subject = self.parse_expr()?;
                return Ok(SimpleStmt::Range {
                    lhs,
                    define: op == AssignOp::Define,
                    subject,
                });
            }
            let rhs = self.parse_expr_list()?;
            if op == AssignOp::Define {
                if let Some(bad) = lhs.iter().find(|expr| expr.as_ident().is_none()) {
                    return Err(SyntaxError::new(
                        "Non-name on left side of :=",
                        bad.span,
                    ));
                }
            }
            return Ok(SimpleStmt::Stmt(Stmt::Assign(AssignStmt {
                lhs,
                op,
                rhs,
                span: self.span_from(start),
            })));
        }

        let mut lhs = lhs;
        if lhs.len() > 1 {
            return Err(self.error_here(format!(
                "Expected assignment after expression list, found {}",
                self.peek_kind().describe()
            )));
        }
        let expr = lhs.remove(0);

        match self.peek_kind() {
            TokenKind::Arrow => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(SimpleStmt::Stmt(Stmt::Send(SendStmt {
                    chan: expr,
                    value,
                    span: self.span_from(start),
                })))
            }
            TokenKind::Inc | TokenKind::Dec => {
                let increment = matches!(self.advance().kind, TokenKind::Inc);
                Ok(SimpleStmt::Stmt(Stmt::IncDec(IncDecStmt {
                    target: expr,
                    increment,
                    span: self.span_from(start),
                })))
            }
            _ => Ok(SimpleStmt::Stmt(Stmt::Expr(expr))),
        }
    }

    fn with_header<T>(
        &mut self,
        parse: impl FnOnce(&mut Parser) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        let saved = self.expr_lev;
        self.expr_lev = -1;
        let result = parse(self);
        self.expr_lev = saved;
        result
    }

    fn with_expr_lev<T>(
        &mut self,
        delta: i32,
        parse: impl FnOnce(&mut Parser) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        let saved = self.expr_lev;
        self.expr_lev = if saved < 0 && delta > 0 { 0 } else { saved + delta };
        let result = parse(self);
        self.expr_lev = saved;
        result
    }

    fn expect_simple(&mut self, range_ok: bool) -> Result<Stmt, SyntaxError> {
        match self.parse_simple_stmt(range_ok)? {
            SimpleStmt::Stmt(stmt) => Ok(stmt),
            SimpleStmt::Range { subject, .. } => Err(SyntaxError::new(
                "Unexpected range clause",
                subject.span,
            )),
        }
    }

    fn stmt_into_expr(&self, stmt: Stmt, what: &str) -> Result<Expr, SyntaxError> {
        match stmt {
            Stmt::Expr(expr) => Ok(expr),
            other => Err(SyntaxError::new(
                format!("Expected {what} expression"),
                stmt_span(&other),
            )),
        }
    }

    fn parse_if(&mut self) -> Result<IfStmt, SyntaxError> {
        let start = self.expect(TokenKind::If)?.span.start;
        let (init, cond) = self.with_header(|p| {
            if p.check(&TokenKind::LBrace) {
                return Err(p.error_here("Missing condition in if statement"));
            }
            let mut init = None;
            let first = if p.check(&TokenKind::Semi) {
                None
            } else {
                Some(p.expect_simple(false)?)
            };
            let cond_stmt = if p.matches(&TokenKind::Semi) {
                init = first.map(Box::new);
                p.expect_simple(false)?
            } else {
                first.ok_or_else(|| p.error_here("Missing condition in if statement"))?
            };
            let cond = p.stmt_into_expr(cond_stmt, "condition")?;
            Ok((init, cond))
        })?;
        let then = self.parse_block()?;
        let els = if self.matches(&TokenKind::Else) {
            match self.peek_kind() {
                TokenKind::If => Some(Box::new(Stmt::If(self.parse_if()?))),
                TokenKind::LBrace => Some(Box::new(Stmt::Block(self.parse_block()?))),
                other => {
                    return Err(self.error_here(format!(
                        "Expected if statement or block after else, found {}",
                        other.describe()
                    )))
                }
            }
        } else {
            None
        };
        Ok(IfStmt {
            init,
            cond,
            then,
            els,
            span: self.span_from(start),
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Switch)?.span.start;
        let (init, tag) = self.with_header(|p| {
            let mut init = None;
            let mut tag = None;
            if !p.check(&TokenKind::LBrace) {
                if !p.check(&TokenKind::Semi) {
                    tag = Some(p.expect_simple(false)?);
                }
                if p.matches(&TokenKind::Semi) {
                    init = tag.take().map(Box::new);
                    if !p.check(&TokenKind::LBrace) {
                        tag = Some(p.expect_simple(false)?);
                    }
                }
            }
            Ok((init, tag))
        })?;

        self.expect(TokenKind::LBrace)?;
        let mut clauses = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            clauses.push(self.parse_case_clause()?);
        }
        self.expect(TokenKind::RBrace)?;
        let span = self.span_from(start);

        match tag {
            Some(Stmt::Assign(assign)) => {
                let guard = assign.op == AssignOp::Define
                    && assign.lhs.len() == 1
                    && assign.rhs.len() == 1
                    && is_type_guard(&assign.rhs[0]);
                if !guard {
                    return Err(SyntaxError::new(
                        "Switch expression must be an expression or type switch guard",
                        assign.span,
                    ));
                }
                let AssignStmt { lhs, mut rhs, .. } = assign;
                let binding = lhs.into_iter().next().and_then(|expr| match expr.kind {
                    ExprKind::Ident(ident) => Some(ident),
                    _ => None,
                });
                Ok(Stmt::TypeSwitch(TypeSwitchStmt {
                    init,
                    binding,
                    subject: type_guard_subject(rhs.remove(0)),
                    clauses,
                    span,
                }))
            }
            Some(Stmt::Expr(expr)) if is_type_guard(&expr) => Ok(Stmt::TypeSwitch(TypeSwitchStmt {
                init,
                binding: None,
                subject: type_guard_subject(expr),
                clauses,
                span,
            })),
            Some(Stmt::Expr(expr)) => Ok(Stmt::Switch(SwitchStmt {
                init,
                tag: Some(expr),
                clauses,
                span,
            })),
            Some(other) => Err(SyntaxError::new(
                "Switch expression must be an expression",
                stmt_span(&other),
            )),
            None => Ok(Stmt::Switch(SwitchStmt {
                init,
                tag: None,
                clauses,
                span,
            })),
        }
    }

    fn parse_case_clause(&mut self) -> Result<CaseClause, SyntaxError> {
        let start = self.current_start();
        let exprs = if self.matches(&TokenKind::Case) {
            self.parse_expr_list()?
        } else if self.matches(&TokenKind::Default) {
            Vec::new()
        } else {
            return Err(self.error_here(format!(
                "Expected case or default, found {}",
                self.peek_kind().describe()
            )));
        };
        self.expect(TokenKind::Colon)?;
        let body = self.parse_stmt_list()?;
        Ok(CaseClause {
            exprs,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_select(&mut self) -> Result<SelectStmt, SyntaxError> {
        let start = self.expect(TokenKind::Select)?.span.start;
        self.expect(TokenKind::LBrace)?;
        let mut clauses = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            let clause_start = self.current_start();
            let comm = if self.matches(&TokenKind::Case) {
                Some(Box::new(self.expect_simple(false)?))
            } else if self.matches(&TokenKind::Default) {
                None
            } else {
                return Err(self.error_here(format!(
                    "Expected case or default, found {}",
                    self.peek_kind().describe()
                )));
            };
            self.expect(TokenKind::Colon)?;
            let body = self.parse_stmt_list()?;
            clauses.push(CommClause {
                comm,
                body,
                span: self.span_from(clause_start),
            });
        }
        self.expect(TokenKind::RBrace)?;
        Ok(SelectStmt {
            clauses,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::For)?.span.start;
        if self.check(&TokenKind::LBrace) {
            let body = self.parse_block()?;
            return Ok(Stmt::For(ForStmt {
                init: None,
                cond: None,
                post: None,
                body,
                span: self.span_from(start),
            }));
        }

        enum Header {
            Range(Vec<Expr>, bool, Expr),
            Loop(Option<Box<Stmt>>, Option<Expr>, Option<Box<Stmt>>),
        }

        let header = self.with_header(|p| {
            let first = if p.check(&TokenKind::Semi) {
                None
            } else {
                Some(p.parse_simple_stmt(true)?)
            };
            let first = match first {
                Some(SimpleStmt::Range {
                    lhs,
                    define,
                    subject,
                }) => return Ok(Header::Range(lhs, define, subject)),
                Some(SimpleStmt::Stmt(stmt)) => Some(stmt),
                None => None,
            };
            if !p.check(&TokenKind::Semi) {
                let cond = match first {
                    Some(stmt) => Some(p.stmt_into_expr(stmt, "for loop condition")?),
                    None => None,
                };
                return Ok(Header::Loop(None, cond, None));
            }
            p.expect(TokenKind::Semi)?;
            let cond = if p.check(&TokenKind::Semi) {
                None
            } else {
                let stmt = p.expect_simple(false)?;
                Some(p.stmt_into_expr(stmt, "for loop condition")?)
            };
            p.expect(TokenKind::Semi)?;
            let post = if p.check(&TokenKind::LBrace) {
                None
            } else {
                Some(Box::new(p.expect_simple(false)?))
            };
            Ok(Header::Loop(first.map(Box::new), cond, post))
        })?;

        let body = self.parse_block()?;
        let span = self.span_from(start);
        Ok(match header {
            Header::Range(lhs, define, subject) => {
                let mut lhs = lhs.into_iter();
                Stmt::Range(RangeStmt {
                    key: lhs.next(),
                    value: lhs.next(),
                    define,
                    subject,
                    body,
                    span,
                })
            }
            Header::Loop(init, cond, post) => Stmt::For(ForStmt {
                init,
                cond,
                post,
                body,
                span,
            }),
        })
    }

    // ---- expressions ---------------------------------------------------

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.matches(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek_kind() {
            TokenKind::PipePipe => BinaryOp::LogicalOr,
            TokenKind::AmpAmp => BinaryOp::LogicalAnd,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::BangEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::Ge,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Pipe => BinaryOp::Or,
            TokenKind::Caret => BinaryOp::Xor,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::Amp => BinaryOp::And,
            TokenKind::AndNot => BinaryOp::AndNot,
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            if op.precedence() < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        let op = match self.peek_kind() {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Caret => Some(UnaryOp::Xor),
            TokenKind::Amp => Some(UnaryOp::Addr),
            TokenKind::Tilde => Some(UnaryOp::Tilde),
            TokenKind::Arrow if !matches!(self.peek_kind_at(1), TokenKind::Chan) => {
                Some(UnaryOp::Recv)
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                self.span_from(start),
            ));
        }
        if self.matches(&TokenKind::Star) {
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Star(Box::new(operand)),
                self.span_from(start),
            ));
        }
        self.parse_primary()
    }

    fn parse_operand(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        let literal = match self.peek_kind() {
            TokenKind::Int(text) => Some((LitKind::Int, text.clone())),
            TokenKind::Float(text) => Some((LitKind::Float, text.clone())),
            TokenKind::Imag(text) => Some((LitKind::Imag, text.clone())),
            TokenKind::Rune(text) => Some((LitKind::Rune, text.clone())),
            TokenKind::String(text) => Some((LitKind::String, text.clone())),
            _ => None,
        };
        if let Some((kind, text)) = literal {
            let token = self.advance();
            return Ok(Expr::new(ExprKind::BasicLit(kind, text), token.span));
        }

        match self.peek_kind() {
            TokenKind::Identifier(_) => {
                let ident = self.expect_ident("Expected identifier")?;
                let span = ident.span;
                Ok(Expr::new(ExprKind::Ident(ident), span))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.with_expr_lev(1, Parser::parse_expr)?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::new(
                    ExprKind::Paren(Box::new(inner)),
                    self.span_from(start),
                ))
            }
            TokenKind::Func => {
                self.advance();
                let sig = self.parse_signature()?;
                if self.check(&TokenKind::LBrace) {
                    let body = self.parse_body()?;
                    Ok(Expr::new(
                        ExprKind::FuncLit { sig, body },
                        self.span_from(start),
                    ))
                } else {
                    Ok(Expr::new(ExprKind::FuncType(sig), self.span_from(start)))
                }
            }
            TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Struct
            | TokenKind::Interface
            | TokenKind::Arrow => self.parse_type(),
            other => Err(self.error_here(format!(
                "Expected expression, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_start();
        let mut expr = self.parse_operand()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    if self.matches(&TokenKind::LParen) {
                        let ty = if self.matches(&TokenKind::Type) {
                            None
                        } else {
                            Some(Box::new(self.parse_type()?))
                        };
                        self.expect(TokenKind::RParen)?;
                        expr = Expr::new(
                            ExprKind::TypeAssert {
                                base: Box::new(expr),
                                ty,
                            },
                            self.span_from(start),
                        );
                    } else {
                        let field = self.expect_ident("Expected selector after '.'")?;
                        expr = Expr::new(
                            ExprKind::Selector {
                                base: Box::new(expr),
                                field,
                            },
                            self.span_from(start),
                        );
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    expr = self.with_expr_lev(1, |p| p.parse_index_or_slice(expr, start))?;
                }
                TokenKind::LParen => {
                    self.advance();
                    let (args, ellipsis) = self.with_expr_lev(1, Parser::parse_call_args)?;
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            ellipsis,
                        },
                        self.span_from(start),
                    );
                }
                TokenKind::LBrace
                    if is_literal_type(&expr) && (self.expr_lev >= 0 || !is_type_name(&expr)) =>
                {
                    let elts = self.parse_literal_value()?;
                    expr = Expr::new(
                        ExprKind::CompositeLit {
                            ty: Some(Box::new(expr)),
                            elts,
                        },
                        self.span_from(start),
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_index_or_slice(&mut self, base: Expr, start: usize) -> Result<Expr, SyntaxError> {
        let mut parts: [Option<Box<Expr>>; 3] = [None, None, None];
        let mut colons = 0;
        if !self.check(&TokenKind::Colon) {
            let first = self.parse_expr()?;
            if !self.check(&TokenKind::Colon) {
                let mut indices = vec![first];
                while self.matches(&TokenKind::Comma) {
                    if self.check(&TokenKind::RBracket) {
                        break;
                    }
                    indices.push(self.parse_expr()?);
                }
                self.expect(TokenKind::RBracket)?;
                return Ok(Expr::new(
                    ExprKind::Index {
                        base: Box::new(base),
                        indices,
                    },
                    self.span_from(start),
                ));
            }
            parts[0] = Some(Box::new(first));
        }
        while self.matches(&TokenKind::Colon) {
            colons += 1;
            if colons > 2 {
                return Err(self.error_here("Too many colons in slice expression"));
            }
            if !matches!(self.peek_kind(), TokenKind::Colon | TokenKind::RBracket) {
                parts[colons] = Some(Box::new(self.parse_expr()?));
            }
        }
        self.expect(TokenKind::RBracket)?;
        let [low, high, max] = parts;
        Ok(Expr::new(
            ExprKind::Slice {
                base: Box::new(base),
                low,
                high,
                max,
            },
            self.span_from(start),
        ))
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, bool), SyntaxError> {
        let mut args = Vec::new();
        let mut ellipsis = false;
        while !self.check(&TokenKind::RParen) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            args.push(self.parse_expr()?);
            if self.matches(&TokenKind::Ellipsis) {
                ellipsis = true;
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        while self.matches(&TokenKind::Semi) {}
        self.expect(TokenKind::RParen)?;
        Ok((args, ellipsis))
    }

    fn parse_literal_value(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(TokenKind::LBrace)?;
        let saved = self.expr_lev;
        self.expr_lev = 0;
        let result = self.parse_literal_elements();
        self.expr_lev = saved;
        result
    }

    fn parse_literal_elements(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut elts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            let start = self.current_start();
            let key = self.parse_element()?;
            let elt = if self.matches(&TokenKind::Colon) {
                let value = self.parse_element()?;
                Expr::new(
                    ExprKind::KeyValue {
                        key: Box::new(key),
                        value: Box::new(value),
                    },
                    self.span_from(start),
                )
            } else {
                key
            };
            elts.push(elt);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        while self.matches(&TokenKind::Semi) {}
        self.expect(TokenKind::RBrace)?;
        Ok(elts)
    }

    fn parse_element(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(&TokenKind::LBrace) {
            let start = self.current_start();
            let elts = self.parse_literal_value()?;
            return Ok(Expr::new(
                ExprKind::CompositeLit { ty: None, elts },
                self.span_from(start),
            ));
        }
        self.parse_expr()
    }
}

fn is_type_name(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Ident(_) => true,
        ExprKind::Selector { base, .. } => matches!(base.kind, ExprKind::Ident(_)),
        _ => false,
    }
}

fn is_literal_type(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Ident(_)
        | ExprKind::ArrayType { .. }
        | ExprKind::StructType(_)
        | ExprKind::MapType { .. } => true,
        ExprKind::Selector { base, .. } => matches!(base.kind, ExprKind::Ident(_)),
        ExprKind::Index { base, .. } => is_type_name(base),
        _ => false,
    }
}

fn is_type_guard(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::TypeAssert { ty: None, .. })
}

fn type_guard_subject(expr: Expr) -> Expr {
    match expr.kind {
        ExprKind::TypeAssert { base, ty: None } => *base,
        _ => expr,
    }
}

pub fn stmt_span(stmt: &Stmt) -> Span {
    match stmt {
        Stmt::Var(specs) | Stmt::Const(specs) => specs
            .first()
            .map(|first| first.span.to(specs[specs.len() - 1].span))
            .unwrap_or_default(),
        Stmt::Type(specs) => specs
            .first()
            .map(|first| first.span.to(specs[specs.len() - 1].span))
            .unwrap_or_default(),
        Stmt::Expr(expr) => expr.span,
        Stmt::Send(stmt) => stmt.span,
        Stmt::IncDec(stmt) => stmt.span,
        Stmt::Assign(stmt) => stmt.span,
        Stmt::Go(stmt) | Stmt::Defer(stmt) => stmt.span,
        Stmt::Return(stmt) => stmt.span,
        Stmt::Branch(stmt) => stmt.span,
        Stmt::Block(block) => block.span,
        Stmt::If(stmt) => stmt.span,
        Stmt::Switch(stmt) => stmt.span,
        Stmt::TypeSwitch(stmt) => stmt.span,
        Stmt::Select(stmt) => stmt.span,
        Stmt::For(stmt) => stmt.span,
        Stmt::Range(stmt) => stmt.span,
        Stmt::Labeled(stmt) => stmt.span,
        Stmt::Empty(span) => *span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> File {
        match parse_file(source) {
            Ok(file) => file,
            Err(errs) => panic!("parse failed: {:?}", errs.errors),
        }
    }

    fn func<'a>(file: &'a File, name: &str) -> &'a FuncDecl {
        file.decls
            .iter()
            .find_map(|decl| match decl {
                Decl::Func(func) if func.name.name == name => Some(func),
                _ => None,
            })
            .expect("function present")
    }

    fn body<'a>(file: &'a File, name: &str) -> &'a [Stmt] {
        &func(file, name).body.as_ref().expect("body").stmts
    }

    #[test]
    fn parses_package_imports_and_aliases() {
        let file = parse(
            r#"package example

import "go-immutable/example/mod1"
import (
    "fmt"
    m2 "example.com/pkg/mod2"
    _ "embed"
)
"#,
        );
        assert_eq!(file.package.name, "example");
        assert_eq!(file.imports.len(), 4);
        assert_eq!(file.imports[0].path, "go-immutable/example/mod1");
        assert!(file.imports[0].alias.is_none());
        assert_eq!(file.imports[2].alias.as_ref().map(|a| a.name.as_str()), Some("m2"));
        assert_eq!(file.imports[3].alias.as_ref().map(|a| a.name.as_str()), Some("_"));
    }

    #[test]
    fn groups_parameters_by_type() {
        let file = parse("package p\nfunc f(a, mutB int, c ...string) {}\n");
        let params = &func(&file, "f").sig.params;
        assert_eq!(params.len(), 2);
        let names: Vec<_> = params[0].names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["a", "mutB"]);
        assert!(matches!(params[1].ty.kind, ExprKind::Ellipsis(Some(_))));
    }

    #[test]
    fn unnamed_parameters_and_receivers() {
        let file = parse(
            "package p\nfunc (User) Change(mutFuncVar int) {}\nfunc g(int, *pkg.T, List[int]) {}\n",
        );
        let change = func(&file, "Change");
        let recv = change.recv.as_ref().expect("receiver");
        assert!(recv.names.is_empty());
        assert!(matches!(&recv.ty.kind, ExprKind::Ident(id) if id.name == "User"));
        let g = func(&file, "g");
        assert_eq!(g.sig.params.len(), 3);
        assert!(g.sig.params.iter().all(|field| field.names.is_empty()));
        assert!(matches!(g.sig.params[2].ty.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn named_array_parameter_is_not_generic() {
        let file = parse("package p\nfunc f(buf [4]byte, xs []int) {}\n");
        let params = &func(&file, "f").sig.params;
        assert_eq!(params[0].names[0].name, "buf");
        assert!(matches!(params[0].ty.kind, ExprKind::ArrayType { len: Some(_), .. }));
        assert_eq!(params[1].names[0].name, "xs");
    }

    #[test]
    fn generic_receivers_and_type_params() {
        let file = parse(
            "package p\ntype List[T any] struct { items []T }\nfunc (l *List[T]) Push(mutV T) {}\nfunc Map[K comparable, V ~int | string](m map[K]V) {}\n",
        );
        let push = func(&file, "Push");
        let recv = push.recv.as_ref().expect("receiver");
        assert_eq!(recv.names[0].name, "l");
        assert!(matches!(recv.ty.kind, ExprKind::Star(_)));
        assert_eq!(func(&file, "Map").type_params.len(), 2);
    }

    #[test]
    fn assignments_defines_and_incdec() {
        let file = parse("package p\nfunc f() {\n x := 3\n x = 4\n a, b := 1, 2\n a += b\n x++\n}\n");
        let stmts = body(&file, "f");
        assert!(matches!(&stmts[0], Stmt::Assign(a) if a.op == AssignOp::Define));
        assert!(matches!(&stmts[1], Stmt::Assign(a) if a.op == AssignOp::Assign));
        assert!(matches!(&stmts[2], Stmt::Assign(a) if a.lhs.len() == 2));
        assert!(matches!(&stmts[3], Stmt::Assign(a) if a.op == AssignOp::Compound(BinaryOp::Add)));
        assert!(matches!(&stmts[4], Stmt::IncDec(s) if s.increment));
    }

    #[test]
    fn composite_literal_not_taken_in_if_header() {
        let file = parse(
            "package p\nfunc f() {\n if x == y {\n  u := User{name: \"a\"}\n  _ = u\n }\n for _, v := range []int{1, 2} {\n  _ = v\n }\n}\n",
        );
        let stmts = body(&file, "f");
        let Stmt::If(if_stmt) = &stmts[0] else {
            panic!("expected if");
        };
        assert!(matches!(if_stmt.cond.kind, ExprKind::Binary { .. }));
        assert_eq!(if_stmt.then.stmts.len(), 2);
        assert!(matches!(&stmts[1], Stmt::Range(r) if r.define && r.value.is_some()));
    }

    #[test]
    fn go_statement_with_closure() {
        let file = parse(
            "package p\nfunc f() {\n mutCount := 0\n go func(n int) {\n  mutCount++\n }(3)\n defer wg.Wait()\n}\n",
        );
        let stmts = body(&file, "f");
        let Stmt::Go(go) = &stmts[1] else {
            panic!("expected go");
        };
        let ExprKind::Call { func, args, .. } = &go.call.kind else {
            panic!("expected call");
        };
        assert!(matches!(func.kind, ExprKind::FuncLit { .. }));
        assert_eq!(args.len(), 1);
        assert!(matches!(&stmts[2], Stmt::Defer(_)));
    }

    #[test]
    fn switches_selects_and_labels() {
        let file = parse(
            r#"package p
func f(v interface{}, ch chan int) {
    switch x := v.(type) {
    case int, *string:
        _ = x
    default:
    }
    switch n := 3; {
    case n > 2:
        fallthrough
    case n > 1:
    }
    select {
    case got := <-ch:
        _ = got
    case ch <- 1:
    default:
    }
outer:
    for i := 0; i < 3; i++ {
        continue outer
    }
}
"#,
        );
        let stmts = body(&file, "f");
        assert!(matches!(&stmts[0], Stmt::TypeSwitch(s) if s.binding.is_some() && s.clauses.len() == 2));
        assert!(matches!(&stmts[1], Stmt::Switch(s) if s.init.is_some() && s.tag.is_none()));
        assert!(matches!(&stmts[2], Stmt::Select(s) if s.clauses.len() == 3));
        assert!(matches!(&stmts[3], Stmt::Labeled(l) if matches!(*l.stmt, Stmt::For(_))));
    }

    #[test]
    fn var_declarations_with_qualified_types() {
        let file = parse("package p\nfunc f() {\n var lol mod1.LolWhat\n var (\n  a = 1\n  b, c int\n )\n}\n");
        let stmts = body(&file, "f");
        let Stmt::Var(specs) = &stmts[0] else {
            panic!("expected var");
        };
        assert!(matches!(specs[0].ty.as_ref().map(|t| &t.kind), Some(ExprKind::Selector { .. })));
        assert!(matches!(&stmts[1], Stmt::Var(specs) if specs.len() == 2));
    }

    #[test]
    fn struct_and_interface_types() {
        let file = parse(
            "package p\ntype User struct {\n mutName string `json:\"name\"`\n mutAge, id int\n *Base\n pkg.Mixin\n}\ntype Shape interface {\n Area(scale float64) float64\n fmt.Stringer\n}\n",
        );
        let Decl::Type(specs) = &file.decls[0] else {
            panic!("expected type");
        };
        let ExprKind::StructType(fields) = &specs[0].ty.kind else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1].names.len(), 2);
        assert!(fields[2].names.is_empty());
        assert!(fields[3].names.is_empty());
        let Decl::Type(specs) = &file.decls[1] else {
            panic!("expected type");
        };
        assert!(matches!(&specs[0].ty.kind, ExprKind::InterfaceType(elems) if elems.len() == 2));
    }

    #[test]
    fn reports_syntax_errors() {
        let errs = parse_file("package p\nfunc f() {\n x := \n}\n").expect_err("should fail");
        assert!(!errs.errors.is_empty());
        let errs = parse_file("func f() {}").expect_err("missing package");
        assert!(errs.errors[0].message.contains("package"));
    }
}
