/// Recursive-descent parser with precedence climbing for expressions.
///
/// Token stream in, Item list out. Assignment and the ternary are
/// right-associative; `**` binds tighter than unary minus on its left
/// operand's right side, matching the C-flavored grammar.
use crate::ast::{DimSpec, Expr, FuncDecl, Item, Stmt, SwitchItem, UnaryKind, VarScope};
use crate::core::value::BinOp;
use crate::errors::{ParseError, Span};
use crate::lexer::{Lexer, Token};

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

/// Binary precedence table; higher binds tighter.
fn precedence(t: &Token) -> Option<(BinOp, u8)> {
    Some(match t {
        Token::Pipe => (BinOp::BitOr, 3),
        Token::Caret => (BinOp::BitXor, 4),
        Token::Amp => (BinOp::BitAnd, 5),
        Token::Eq => (BinOp::Eq, 6),
        Token::Ne => (BinOp::Ne, 6),
        Token::Lt => (BinOp::Lt, 7),
        Token::Le => (BinOp::Le, 7),
        Token::Gt => (BinOp::Gt, 7),
        Token::Ge => (BinOp::Ge, 7),
        Token::Shl => (BinOp::Shl, 8),
        Token::Shr => (BinOp::Shr, 8),
        Token::Plus => (BinOp::Add, 9),
        Token::Minus => (BinOp::Sub, 9),
        Token::Star => (BinOp::Mul, 10),
        Token::Slash => (BinOp::Div, 10),
        Token::SlashSlash => (BinOp::Quo, 10),
        Token::Percent => (BinOp::Mod, 10),
        _ => return None,
    })
}

fn assign_op(t: &Token) -> Option<Option<BinOp>> {
    Some(match t {
        Token::Assign => None,
        Token::PlusAssign => Some(BinOp::Add),
        Token::MinusAssign => Some(BinOp::Sub),
        Token::StarAssign => Some(BinOp::Mul),
        Token::SlashAssign => Some(BinOp::Div),
        Token::SlashSlashAssign => Some(BinOp::Quo),
        Token::PercentAssign => Some(BinOp::Mod),
        _ => return None,
    })
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Parser { tokens, pos: 0 })
    }

    // -----------------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn peek_nth(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].0
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].1
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn eat(&mut self, t: &Token) -> bool {
        if self.peek() == t {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: Token, what: &str) -> Result<(), ParseError> {
        if self.peek() == &t {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.at_end() {
            ParseError::UnexpectedEof {
                context: expected.into(),
                span: self.span(),
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.into(),
                found: self.peek().describe(),
                span: self.span(),
            }
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub fn parse(&mut self) -> Result<Vec<Item>, ParseError> {
        let mut items = Vec::new();
        while !self.at_end() {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            if matches!(self.peek(), Token::Define) {
                items.push(Item::Func(self.parse_define()?));
            } else {
                items.push(Item::Stmt(self.parse_stmt()?));
            }
        }
        Ok(items)
    }

    fn parse_define(&mut self) -> Result<FuncDecl, ParseError> {
        let start = self.span();
        self.advance(); // define
        let name = self.ident("function name")?;
        self.expect(Token::LParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                let p = self.ident("parameter name")?;
                if params.contains(&p) {
                    return Err(ParseError::Redefinition {
                        name: p,
                        span: self.prev_span(),
                    });
                }
                params.push(p);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "')' after parameters")?;
        self.expect(Token::LBrace, "'{' to open function body")?;
        let mut body = Vec::new();
        while !matches!(self.peek(), Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("'}' to close function body"));
            }
            if self.eat(&Token::Semicolon) {
                continue;
            }
            body.push(self.parse_stmt()?);
        }
        self.advance(); // }
        Ok(FuncDecl {
            name,
            params,
            body,
            span: start.merge(self.prev_span()),
        })
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty)
            }
            Token::LBrace => self.parse_block(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::Do => self.parse_do_while(),
            Token::For => self.parse_for(),
            Token::Switch => self.parse_switch(),
            Token::Break => {
                let s = self.span();
                self.advance();
                self.terminator()?;
                Ok(Stmt::Break(s))
            }
            Token::Continue => {
                let s = self.span();
                self.advance();
                self.terminator()?;
                Ok(Stmt::Continue(s))
            }
            Token::Goto => {
                let s = self.span();
                self.advance();
                let label = self.ident("label after goto")?;
                self.terminator()?;
                Ok(Stmt::Goto(label, s))
            }
            Token::Return => {
                self.advance();
                if self.eat(&Token::Semicolon) || matches!(self.peek(), Token::RBrace) {
                    Ok(Stmt::Return(None))
                } else {
                    let e = self.parse_expr()?;
                    self.terminator()?;
                    Ok(Stmt::Return(Some(e)))
                }
            }
            Token::Print => {
                self.advance();
                let mut args = Vec::new();
                if !matches!(self.peek(), Token::Semicolon | Token::RBrace | Token::Eof) {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.terminator()?;
                Ok(Stmt::Print(args))
            }
            Token::Try => self.parse_try(),
            Token::Global | Token::Static | Token::Local => self.parse_var_decl(),
            Token::Mat => self.parse_mat(),
            Token::Obj => self.parse_obj(),
            // label: statement
            Token::Ident(_) if matches!(self.peek_nth(1), Token::Colon) => {
                let s = self.span();
                let name = self.ident("label")?;
                self.advance(); // :
                Ok(Stmt::Label(name, s))
            }
            _ => {
                let e = self.parse_expr()?;
                self.terminator()?;
                Ok(Stmt::Expr(e))
            }
        }
    }

    /// Statements end with ';' or just before a closing brace / EOF.
    fn terminator(&mut self) -> Result<(), ParseError> {
        if self.eat(&Token::Semicolon) || matches!(self.peek(), Token::RBrace | Token::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("';' after statement"))
        }
    }

    fn parse_block(&mut self) -> Result<Stmt, ParseError> {
        self.expect(Token::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !matches!(self.peek(), Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("'}' to close block"));
            }
            if self.eat(&Token::Semicolon) {
                continue;
            }
            body.push(self.parse_stmt()?);
        }
        self.advance();
        Ok(Stmt::Block(body))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // if
        self.expect(Token::LParen, "'(' after if")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "')' after condition")?;
        let then = Box::new(self.parse_stmt()?);
        let els = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If { cond, then, els })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(Token::LParen, "'(' after while")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "')' after condition")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_do_while(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // do
        let body = Box::new(self.parse_stmt()?);
        self.expect(Token::While, "'while' after do body")?;
        self.expect(Token::LParen, "'(' after while")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "')' after condition")?;
        self.terminator()?;
        Ok(Stmt::DoWhile { body, cond })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(Token::LParen, "'(' after for")?;
        let init = if matches!(self.peek(), Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon, "';' after for initializer")?;
        let cond = if matches!(self.peek(), Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon, "';' after for condition")?;
        let step = if matches!(self.peek(), Token::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::RParen, "')' after for header")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For { init, cond, step, body })
    }

    fn parse_switch(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(Token::LParen, "'(' after switch")?;
        let scrutinee = self.parse_expr()?;
        self.expect(Token::RParen, "')' after switch value")?;
        self.expect(Token::LBrace, "'{' to open switch body")?;
        let mut items = Vec::new();
        let mut seen_default = false;
        while !matches!(self.peek(), Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("'}' to close switch"));
            }
            match self.peek() {
                Token::Case => {
                    self.advance();
                    let e = self.parse_expr()?;
                    self.expect(Token::Colon, "':' after case value")?;
                    items.push(SwitchItem::Case(e));
                }
                Token::Default => {
                    if seen_default {
                        return Err(ParseError::InvalidSyntax {
                            context: "duplicate default in switch".into(),
                            span: self.span(),
                        });
                    }
                    seen_default = true;
                    self.advance();
                    self.expect(Token::Colon, "':' after default")?;
                    items.push(SwitchItem::Default);
                }
                Token::Semicolon => {
                    self.advance();
                }
                _ => items.push(SwitchItem::Stmt(self.parse_stmt()?)),
            }
        }
        self.advance(); // }
        Ok(Stmt::Switch { scrutinee, items })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // try
        let body = Box::new(self.parse_block()?);
        self.expect(Token::Catch, "'catch' after try block")?;
        let name = self.ident("name for the caught error")?;
        let handler = Box::new(self.parse_block()?);
        Ok(Stmt::Try { body, name, handler })
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, ParseError> {
        let scope = match self.advance() {
            Token::Global => VarScope::Global,
            Token::Static => VarScope::Static,
            Token::Local => VarScope::Local,
            _ => unreachable!("caller matched the keyword"),
        };
        let mut vars = Vec::new();
        loop {
            let name = self.ident("variable name")?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_ternary()?)
            } else {
                None
            };
            vars.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.terminator()?;
        Ok(Stmt::VarDecl { scope, vars })
    }

    fn parse_mat(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.advance(); // mat
        let name = self.ident("matrix name")?;
        self.expect(Token::LBracket, "'[' after matrix name")?;
        let mut dims = Vec::new();
        loop {
            let first = self.parse_expr()?;
            if self.eat(&Token::Colon) {
                let hi = self.parse_expr()?;
                dims.push(DimSpec::Range(first, hi));
            } else {
                dims.push(DimSpec::Extent(first));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBracket, "']' after matrix bounds")?;
        let init = if self.eat(&Token::Assign) {
            self.expect(Token::LBrace, "'{' to open matrix initializer")?;
            let mut vals = Vec::new();
            self.parse_matrix_inits(&mut vals)?;
            Some(vals)
        } else {
            None
        };
        self.terminator()?;
        Ok(Stmt::MatDecl {
            name,
            dims,
            init,
            span: start.merge(self.prev_span()),
        })
    }

    /// Flatten nested `{...}` initializer groups in row-major order.
    fn parse_matrix_inits(&mut self, out: &mut Vec<Expr>) -> Result<(), ParseError> {
        if !matches!(self.peek(), Token::RBrace) {
            loop {
                if self.eat(&Token::LBrace) {
                    self.parse_matrix_inits(out)?;
                } else {
                    out.push(self.parse_ternary()?);
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RBrace, "'}' to close matrix initializer")?;
        Ok(())
    }

    fn parse_obj(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.advance(); // obj
        let type_name = self.ident("object type name")?;
        if self.eat(&Token::LBrace) {
            // Type declaration: obj T { a, b }
            let mut fields = Vec::new();
            if !matches!(self.peek(), Token::RBrace) {
                loop {
                    let f = self.ident("field name")?;
                    if fields.contains(&f) {
                        return Err(ParseError::Redefinition {
                            name: f,
                            span: self.prev_span(),
                        });
                    }
                    fields.push(f);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(Token::RBrace, "'}' to close object declaration")?;
            self.terminator()?;
            Ok(Stmt::ObjDecl {
                name: type_name,
                fields,
                span: start.merge(self.prev_span()),
            })
        } else {
            // Instantiation: obj T name
            let var = self.ident("variable name after object type")?;
            self.terminator()?;
            Ok(Stmt::ObjInstance {
                type_name,
                var,
                span: start.merge(self.prev_span()),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_ternary()?;
        if let Some(op) = assign_op(self.peek()) {
            let span = self.span();
            if !target.is_lvalue() {
                return Err(ParseError::InvalidSyntax {
                    context: "assignment target is not assignable".into(),
                    span: target.span(),
                });
            }
            self.advance();
            let value = self.parse_assign()?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
                span,
            });
        }
        Ok(target)
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then = self.parse_assign()?;
            self.expect(Token::Colon, "':' in conditional expression")?;
            let els = self.parse_assign()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Or {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_binary(3)?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_binary(3)?;
            left = Expr::And {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Precedence climbing over the left-associative binary tier.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_power()?;
        while let Some((op, prec)) = precedence(self.peek()) {
            if prec < min_prec {
                break;
            }
            let span = self.span();
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    /// `**` is right-associative and binds above the binary tier.
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_unary()?;
        if matches!(self.peek(), Token::StarStar) {
            let span = self.span();
            self.advance();
            let exp = self.parse_power()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exp),
                span,
            });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        let kind = match self.peek() {
            Token::Minus => Some(UnaryKind::Neg),
            Token::Plus => Some(UnaryKind::Plus),
            Token::Not => Some(UnaryKind::Not),
            Token::Tilde => Some(UnaryKind::Comp),
            Token::PlusPlus | Token::MinusMinus => {
                let increment = matches!(self.peek(), Token::PlusPlus);
                self.advance();
                let target = self.parse_unary()?;
                if !target.is_lvalue() {
                    return Err(ParseError::InvalidSyntax {
                        context: "++/-- needs an assignable operand".into(),
                        span,
                    });
                }
                return Ok(Expr::IncDec {
                    target: Box::new(target),
                    increment,
                    prefix: true,
                    span,
                });
            }
            _ => None,
        };
        if let Some(kind) = kind {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: kind,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::LBracket => {
                    let span = self.span();
                    self.advance();
                    let mut indices = Vec::new();
                    loop {
                        indices.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::RBracket, "']' after index")?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        indices,
                        span,
                    };
                }
                Token::Dot => {
                    let span = self.span();
                    self.advance();
                    let name = self.ident("field name after '.'")?;
                    expr = Expr::Field {
                        base: Box::new(expr),
                        name,
                        span,
                    };
                }
                Token::PlusPlus | Token::MinusMinus => {
                    let span = self.span();
                    let increment = matches!(self.peek(), Token::PlusPlus);
                    if !expr.is_lvalue() {
                        break;
                    }
                    self.advance();
                    expr = Expr::IncDec {
                        target: Box::new(expr),
                        increment,
                        prefix: false,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        match self.peek().clone() {
            Token::Number(q) => {
                self.advance();
                Ok(Expr::Number(q, span))
            }
            Token::Imaginary(q) => {
                self.advance();
                Ok(Expr::Imaginary(q, span))
            }
            Token::Str(bytes) => {
                self.advance();
                Ok(Expr::Str(bytes, span))
            }
            Token::Ident(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Token::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen, "')' after arguments")?;
                    Ok(Expr::Call { name, args, span })
                } else {
                    Ok(Expr::Ident(name, span))
                }
            }
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "')' to close parenthesis")?;
                Ok(e)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<Item> {
        Parser::new(src).unwrap().parse().unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        Parser::new(src).unwrap().parse().unwrap_err()
    }

    #[test]
    fn precedence_shape() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let items = parse("1 + 2 * 3;");
        let Item::Stmt(Stmt::Expr(Expr::Binary { op, right, .. })) = &items[0] else {
            panic!("expected binary expr");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(**right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn power_is_right_associative() {
        let items = parse("2 ** 3 ** 2;");
        let Item::Stmt(Stmt::Expr(Expr::Binary { op, right, .. })) = &items[0] else {
            panic!();
        };
        assert_eq!(*op, BinOp::Pow);
        assert!(matches!(**right, Expr::Binary { op: BinOp::Pow, .. }));
    }

    #[test]
    fn assignment_chain() {
        let items = parse("x = y = 5;");
        let Item::Stmt(Stmt::Expr(Expr::Assign { value, .. })) = &items[0] else {
            panic!();
        };
        assert!(matches!(**value, Expr::Assign { .. }));
        assert!(matches!(
            parse_err("1 = 2;"),
            ParseError::InvalidSyntax { .. }
        ));
    }

    #[test]
    fn statements_parse() {
        parse("if (x > 0) { y = 1; } else y = 2;");
        parse("while (i < 10) i++;");
        parse("do { i--; } while (i);");
        parse("for (i = 0; i < 5; i++) s += i;");
        parse("switch (x) { case 1: break; default: y = 2; }");
        parse("try { 1/0; } catch e { print e; }");
        parse("goto done; done: x = 1;");
        parse("global a = 1, b;");
        parse("static s = 0;");
    }

    #[test]
    fn declarations_parse() {
        parse("define f(a, b) { return a + b; }");
        parse("obj point { x, y };");
        parse("obj point p;");
        parse("mat M[3, 3];");
        parse("mat M[1:3, -1:1] = {1, 2, 3};");
        parse("mat M[2, 2] = {{1, 2}, {3, 4}};");
    }

    #[test]
    fn duplicate_params_rejected() {
        assert!(matches!(
            parse_err("define f(a, a) { }"),
            ParseError::Redefinition { .. }
        ));
    }

    #[test]
    fn postfix_chains() {
        let items = parse("m[1, 2].x[0]++;");
        let Item::Stmt(Stmt::Expr(Expr::IncDec { target, prefix, .. })) = &items[0] else {
            panic!();
        };
        assert!(!prefix);
        assert!(matches!(**target, Expr::Index { .. }));
    }

    #[test]
    fn ternary_and_logic() {
        parse("x = a > 0 ? b : c;");
        parse("y = a && b || !c;");
    }

    #[test]
    fn eof_reports_cleanly() {
        assert!(matches!(
            parse_err("if (x"),
            ParseError::UnexpectedEof { .. } | ParseError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            parse_err("define f( {"),
            ParseError::UnexpectedToken { .. }
        ));
    }
}
