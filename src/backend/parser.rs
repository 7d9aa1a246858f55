//! Recursive-descent parser
//!
//! Statements are parsed until end of input. On a syntax error the parser
//! records a diagnostic and skips to the next `;` or `}` at the top level,
//! so one submission can report several independent errors.

use std::sync::Arc;
use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use super::Diagnostic;
use crate::stack::ensure_sufficient_stack;
use crate::unit::ScriptMode;

/// Deepest syntax nesting accepted: parentheses, blocks, `else if` chains
/// and operator chains all count against it.
pub const MAX_NESTING: usize = 1000;

const TOO_COMPLEX: &str = "An expression is too long or complex to compile";

/// Parse `source` according to `mode`.
pub fn parse(source: &str, mode: ScriptMode) -> Result<Program, Vec<Diagnostic>> {
    let tokens = tokenize(source).map_err(|d| vec![d])?;
    let mut parser = Parser { tokens, pos: 0, mode, depth: 0 };
    let stmts = match mode {
        ScriptMode::Eval => parser.eval_body().map_err(|d| vec![d])?,
        ScriptMode::Script | ScriptMode::Repl => parser.statements()?,
    };
    Ok(Program { stmts, mode })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    mode: ScriptMode,
    depth: usize,
}

type PResult<T> = Result<T, Diagnostic>;

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn here(&self) -> Pos {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Pos> {
        if self.check(&kind) {
            Ok(self.advance().pos)
        } else {
            Err(Diagnostic::new(self.here(), format!("{} expected", kind.describe())))
        }
    }

    /// Count one level of nesting, failing past [`MAX_NESTING`].
    fn deepen(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(Diagnostic::new(self.here(), TOO_COMPLEX));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `f` one nesting level down, growing the stack if needed.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let base = self.depth;
        self.deepen()?;
        let result = ensure_sufficient_stack(|| f(self));
        self.depth = base;
        result
    }

    fn ident(&mut self) -> PResult<(String, Pos)> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let pos = self.advance().pos;
                Ok((name, pos))
            }
            other => Err(Diagnostic::new(
                self.here(),
                format!("Identifier expected, found {}", other.describe()),
            )),
        }
    }

    fn eval_body(&mut self) -> PResult<Vec<Stmt>> {
        let expr = self.expression()?;
        self.eat(&TokenKind::Semi);
        if !self.check(&TokenKind::Eof) {
            return Err(Diagnostic::new(
                self.here(),
                format!("Unexpected {} after expression", self.peek().describe()),
            ));
        }
        Ok(vec![Stmt::Expr { expr, terminated: false }])
    }

    fn statements(&mut self) -> Result<Vec<Stmt>, Vec<Diagnostic>> {
        let mut stmts = Vec::new();
        let mut errors = Vec::new();
        while !self.check(&TokenKind::Eof) {
            match self.statement(true) {
                Ok(stmt) => stmts.push(stmt),
                Err(d) => {
                    errors.push(d);
                    self.depth = 0;
                    self.synchronize();
                }
            }
        }
        if errors.is_empty() {
            Ok(stmts)
        } else {
            Err(errors)
        }
    }

    /// Skip past the next `;` or `}` (or to end of input).
    fn synchronize(&mut self) {
        loop {
            match self.advance().kind {
                TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof => return,
                _ => {}
            }
        }
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.nested(Self::block_inner)
    }

    fn block_inner(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(Diagnostic::new(self.here(), "'}' expected"));
            }
            stmts.push(self.statement(false)?);
        }
        self.advance();
        Ok(stmts)
    }

    fn statement(&mut self, top_level: bool) -> PResult<Stmt> {
        match self.peek().clone() {
            TokenKind::Var => {
                let pos = self.advance().pos;
                let (name, _) = self.ident()?;
                self.expect(TokenKind::Assign)?;
                let init = self.expression()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Var { name, init, pos })
            }
            TokenKind::Fn => {
                if !top_level {
                    return Err(Diagnostic::new(self.here(), "Functions can only be declared at the top level"));
                }
                self.function()
            }
            TokenKind::Using => {
                let pos = self.advance().pos;
                let (namespace, _) = self.ident()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Using { namespace, pos })
            }
            TokenKind::Return => {
                let pos = self.advance().pos;
                let value = if self.check(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Return(value, pos))
            }
            TokenKind::If => self.if_statement(),
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.expression()?;
                self.expect(TokenKind::RParen)?;
                let body = self.block()?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::Throw => {
                let pos = self.advance().pos;
                let value = self.expression()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Throw(value, pos))
            }
            TokenKind::Ident(name) if *self.peek_at(1) == TokenKind::Assign => {
                let pos = self.advance().pos;
                self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Assign { name, value, pos })
            }
            _ => {
                let expr = self.expression()?;
                if self.eat(&TokenKind::Semi) {
                    return Ok(Stmt::Expr { expr, terminated: true });
                }
                if top_level && self.mode == ScriptMode::Repl && self.check(&TokenKind::Eof) {
                    return Ok(Stmt::Expr { expr, terminated: false });
                }
                Err(Diagnostic::new(self.here(), "';' expected"))
            }
        }
    }

    fn function(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos;
        let (name, _) = self.ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.ident()?.0);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.block()?;
        Ok(Stmt::Fn(Arc::new(FnDecl { name, params, body, pos })))
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::if_inner)
    }

    fn if_inner(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.block()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.if_statement()?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    // ── expressions, lowest precedence first ──

    fn expression(&mut self) -> PResult<Expr> {
        self.nested(Self::or)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> PResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> PResult<Expr> {
        let base = self.depth;
        let result = self.binary_chain(next, ops);
        self.depth = base;
        result
    }

    // each operator wraps the tree built so far, so a long chain nests as
    // deeply as the same number of parentheses
    fn binary_chain(
        &mut self,
        next: fn(&mut Self) -> PResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> PResult<Expr> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (kind, op) in ops {
                if self.check(kind) {
                    let pos = self.advance().pos;
                    self.deepen()?;
                    let rhs = next(self)?;
                    lhs = Expr::Binary { op: *op, lhs: Box::new(lhs), rhs: Box::new(rhs), pos };
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn or(&mut self) -> PResult<Expr> {
        self.binary_level(Self::and, &[(TokenKind::OrOr, BinaryOp::Or)])
    }

    fn and(&mut self) -> PResult<Expr> {
        self.binary_level(Self::equality, &[(TokenKind::AndAnd, BinaryOp::And)])
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary_level(Self::comparison, &[
            (TokenKind::EqEq, BinaryOp::Eq),
            (TokenKind::NotEq, BinaryOp::Ne),
        ])
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.binary_level(Self::additive, &[
            (TokenKind::Lt, BinaryOp::Lt),
            (TokenKind::Le, BinaryOp::Le),
            (TokenKind::Gt, BinaryOp::Gt),
            (TokenKind::Ge, BinaryOp::Ge),
        ])
    }

    fn additive(&mut self) -> PResult<Expr> {
        self.binary_level(Self::multiplicative, &[
            (TokenKind::Plus, BinaryOp::Add),
            (TokenKind::Minus, BinaryOp::Sub),
        ])
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        self.binary_level(Self::unary, &[
            (TokenKind::Star, BinaryOp::Mul),
            (TokenKind::Slash, BinaryOp::Div),
            (TokenKind::Percent, BinaryOp::Rem),
        ])
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        let pos = self.advance().pos;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary { op, operand: Box::new(operand), pos })
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let result = self.postfix_chain();
        self.depth = base;
        result
    }

    fn postfix_chain(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen) {
                self.deepen()?;
            }
            match self.peek() {
                TokenKind::Dot => {
                    let pos = self.advance().pos;
                    let (name, _) = self.ident()?;
                    if self.check(&TokenKind::LParen) {
                        let Expr::Ident(ns, _) = expr else {
                            return Err(Diagnostic::new(pos, "Only namespace functions can be called with '.'"));
                        };
                        let args = self.arguments()?;
                        expr = Expr::Call { callee: Callee::Qualified(ns, name), args, pos };
                    } else {
                        expr = Expr::Field { target: Box::new(expr), name, pos };
                    }
                }
                TokenKind::LBracket => {
                    let pos = self.advance().pos;
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index { target: Box::new(expr), index: Box::new(index), pos };
                }
                TokenKind::LParen => {
                    let Expr::Ident(name, pos) = expr else {
                        return Err(Diagnostic::new(self.here(), "Method name expected"));
                    };
                    let args = self.arguments()?;
                    expr = Expr::Call { callee: Callee::Name(name), args, pos };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.advance();
        let pos = token.pos;
        let expr = match token.kind {
            TokenKind::Int(n) => Expr::Literal(Literal::Int(n), pos),
            TokenKind::Float(n) => Expr::Literal(Literal::Float(n), pos),
            TokenKind::Str(s) => Expr::Literal(Literal::Str(s), pos),
            TokenKind::True => Expr::Literal(Literal::Bool(true), pos),
            TokenKind::False => Expr::Literal(Literal::Bool(false), pos),
            TokenKind::Null => Expr::Literal(Literal::Null, pos),
            TokenKind::Ident(name) => Expr::Ident(name, pos),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                inner
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Expr::List(items, pos)
            }
            TokenKind::New => {
                self.expect(TokenKind::LBrace)?;
                let mut fields: Vec<(String, Expr)> = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let (name, name_pos) = self.ident()?;
                        if fields.iter().any(|(existing, _)| *existing == name) {
                            return Err(Diagnostic::new(
                                name_pos,
                                format!("An anonymous type cannot have multiple properties with the same name '{}'", name),
                            ));
                        }
                        self.expect(TokenKind::Assign)?;
                        fields.push((name, self.expression()?));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Expr::Record(fields, pos)
            }
            other => {
                return Err(Diagnostic::new(pos, format!("Invalid expression term {}", other.describe())));
            }
        };
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str, mode: ScriptMode) -> Program {
        parse(src, mode).unwrap()
    }

    fn parse_err(src: &str, mode: ScriptMode) -> Vec<String> {
        parse(src, mode).unwrap_err().iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_return_statement() {
        let program = parse_ok("return 42;", ScriptMode::Script);
        assert_eq!(program.stmts.len(), 1);
        assert!(matches!(program.stmts[0], Stmt::Return(Some(Expr::Literal(Literal::Int(42), _)), _)));
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("1 + 2 * 3", ScriptMode::Eval);
        let Stmt::Expr { expr: Expr::Binary { op, rhs, .. }, terminated: false } = &program.stmts[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_trailing_expression_only_in_repl() {
        let program = parse_ok("var x = 1;\nx + 1", ScriptMode::Repl);
        assert!(matches!(program.stmts[1], Stmt::Expr { terminated: false, .. }));
        assert_eq!(parse_err("x + 1", ScriptMode::Script), vec!["(1,6): ';' expected"]);
    }

    #[test]
    fn test_invalid_syntax() {
        let errors = parse_err("invalid syntax here", ScriptMode::Script);
        assert_eq!(errors, vec!["(1,9): ';' expected"]);
    }

    #[test]
    fn test_multiple_errors_reported() {
        let errors = parse_err("var = 1;\nvar y 2;", ScriptMode::Script);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("(1,5): Identifier expected"));
        assert!(errors[1].starts_with("(2,7): '=' expected"));
    }

    #[test]
    fn test_eval_requires_single_expression() {
        parse_ok("1 + 1;", ScriptMode::Eval);
        let errors = parse_err("1 2", ScriptMode::Eval);
        assert_eq!(errors, vec!["(1,3): Unexpected 2 after expression"]);
    }

    #[test]
    fn test_calls_and_members() {
        let program = parse_ok("math.max(a.b, xs[0]);", ScriptMode::Script);
        let Stmt::Expr { expr: Expr::Call { callee, args, .. }, .. } = &program.stmts[0] else {
            panic!("expected call");
        };
        assert_eq!(*callee, Callee::Qualified("math".into(), "max".into()));
        assert!(matches!(args[0], Expr::Field { .. }));
        assert!(matches!(args[1], Expr::Index { .. }));
    }

    #[test]
    fn test_function_and_control_flow() {
        let src = "fn f(n) { if (n < 2) { return n; } else if (n == 2) { return 1; } else { return f(n - 1); } }\nwhile (false) { }";
        let program = parse_ok(src, ScriptMode::Script);
        assert_eq!(program.functions().count(), 1);
        assert!(matches!(program.stmts[1], Stmt::While { .. }));
    }

    #[test]
    fn test_nested_fn_rejected() {
        let errors = parse_err("if (true) { fn g() { } }", ScriptMode::Script);
        assert_eq!(errors[0], "(1,13): Functions can only be declared at the top level");
    }

    #[test]
    fn test_deep_nesting_is_a_diagnostic() {
        let src = format!("return {}1{};", "(".repeat(100_000), ")".repeat(100_000));
        let errors = parse_err(&src, ScriptMode::Script);
        assert!(errors[0].ends_with(TOO_COMPLEX), "{:?}", errors);

        let chain = format!("return 1{};", " + 1".repeat(MAX_NESTING + 10));
        assert!(parse_err(&chain, ScriptMode::Script)[0].ends_with(TOO_COMPLEX));

        let blocks = format!("{}{}", "if (true) { ".repeat(5_000), "}".repeat(5_000));
        assert!(parse_err(&blocks, ScriptMode::Script)[0].ends_with(TOO_COMPLEX));
    }

    #[test]
    fn test_nesting_below_limit() {
        let src = format!("return {}1{};", "(".repeat(200), ")".repeat(200));
        parse_ok(&src, ScriptMode::Script);
        parse_ok(&format!("return 1{};", " + 1".repeat(500)), ScriptMode::Script);
    }

    #[test]
    fn test_record_duplicate_field() {
        let errors = parse_err("var r = new { a = 1, a = 2 };", ScriptMode::Script);
        assert!(errors[0].contains("multiple properties with the same name 'a'"));
    }
}
