//! Recursive-descent parser producing a [`Script`].
//!
//! Expressions use precedence climbing for the binary operators. Automatic
//! semicolon insertion follows the usual rule of thumb: a statement may end
//! at `;`, before `}`, at end of input, or at a line break.

use std::rc::Rc;

use super::ast::{BinaryOp, DeclKind, Expr, FunctionDef, LogicalOp, Script, Stmt, StmtKind, UnaryOp};
use super::error::SyntaxError;
use super::lexer::{tokenize, Token, TokenKind};

/// Words that can never be used as identifiers.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
    "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw", "true",
    "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Parses `source` with the given nesting limit.
pub fn parse(source: &str, max_nesting: usize) -> Result<Script, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_nesting,
        no_in: false,
    };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Script { body })
}

type PResult<T> = Result<T, SyntaxError>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_nesting: usize,
    /// Set while parsing a `for (...)` head, where `in` starts a loop.
    no_in: bool,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(w) if w == word)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.is_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> SyntaxError {
        let token = self.peek();
        let message = match &token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Number(n) => format!("Unexpected number {n}"),
            TokenKind::String(_) => "Unexpected string".to_string(),
            TokenKind::Ident(w) => format!("Unexpected token '{w}'"),
            TokenKind::Punct(p) => format!("Unexpected token '{p}'"),
        };
        SyntaxError::new(message, token.line, token.column)
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn identifier(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(w) if !RESERVED.contains(&w.as_str()) => {
                let name = w.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn consume_semicolon(&mut self) -> PResult<()> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= self.max_nesting {
            let token = self.peek();
            return Err(SyntaxError::new("Maximum nesting depth exceeded", token.line, token.column));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        let kind = match self.peek().kind.clone() {
            TokenKind::Punct("{") => StmtKind::Block(self.block()?),
            TokenKind::Punct(";") => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Ident(word) => match word.as_str() {
                "var" | "let" | "const" => {
                    let decl = self.declaration()?;
                    self.consume_semicolon()?;
                    decl
                }
                "function" => {
                    self.advance();
                    let def = self.function_rest(line, true)?;
                    StmtKind::Function(def)
                }
                "if" => {
                    self.advance();
                    self.expect_punct("(")?;
                    let test = self.expression()?;
                    self.expect_punct(")")?;
                    let then = Box::new(self.statement()?);
                    let otherwise = if self.eat_word("else") {
                        Some(Box::new(self.statement()?))
                    } else {
                        None
                    };
                    StmtKind::If {
                        test,
                        then,
                        otherwise,
                    }
                }
                "while" => {
                    self.advance();
                    self.expect_punct("(")?;
                    let test = self.expression()?;
                    self.expect_punct(")")?;
                    let body = Box::new(self.statement()?);
                    StmtKind::While { test, body }
                }
                "do" => {
                    self.advance();
                    let body = Box::new(self.statement()?);
                    if !self.eat_word("while") {
                        return Err(self.unexpected());
                    }
                    self.expect_punct("(")?;
                    let test = self.expression()?;
                    self.expect_punct(")")?;
                    self.eat_punct(";");
                    StmtKind::DoWhile { body, test }
                }
                "for" => self.for_statement()?,
                "break" => {
                    self.advance();
                    self.consume_semicolon()?;
                    StmtKind::Break
                }
                "continue" => {
                    self.advance();
                    self.consume_semicolon()?;
                    StmtKind::Continue
                }
                "return" => {
                    self.advance();
                    let value = if self.is_punct(";")
                        || self.is_punct("}")
                        || self.at_eof()
                        || self.peek().newline_before
                    {
                        None
                    } else {
                        Some(self.expression()?)
                    };
                    self.consume_semicolon()?;
                    StmtKind::Return(value)
                }
                "throw" => {
                    self.advance();
                    if self.peek().newline_before {
                        return Err(self.unexpected());
                    }
                    let value = self.expression()?;
                    self.consume_semicolon()?;
                    StmtKind::Throw(value)
                }
                "try" => self.try_statement()?,
                _ => self.expression_statement()?,
            },
            _ => self.expression_statement()?,
        };
        Ok(Stmt { kind, line })
    }

    fn expression_statement(&mut self) -> PResult<StmtKind> {
        let expr = self.expression()?;
        self.consume_semicolon()?;
        Ok(StmtKind::Expr(expr))
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn decl_kind(&mut self) -> Option<DeclKind> {
        let kind = match &self.peek().kind {
            TokenKind::Ident(w) if w == "var" => DeclKind::Var,
            TokenKind::Ident(w) if w == "let" => DeclKind::Let,
            TokenKind::Ident(w) if w == "const" => DeclKind::Const,
            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    fn declaration(&mut self) -> PResult<StmtKind> {
        let Some(kind) = self.decl_kind() else {
            return Err(self.unexpected());
        };
        let first = self.identifier()?;
        self.declarators(kind, first)
    }

    /// The rest of a declaration once its kind and first name are known.
    fn declarators(&mut self, kind: DeclKind, first: String) -> PResult<StmtKind> {
        let mut decls = Vec::new();
        let mut name = first;
        loop {
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                if kind == DeclKind::Const {
                    return Err(self.unexpected());
                }
                None
            };
            decls.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
            name = self.identifier()?;
        }
        Ok(StmtKind::Declare { kind, decls })
    }

    fn for_statement(&mut self) -> PResult<StmtKind> {
        self.advance();
        self.expect_punct("(")?;
        let head_line = self.peek().line;

        let init = if self.is_punct(";") {
            None
        } else if let Some(kind) = self.decl_kind() {
            let name = self.identifier()?;
            if let Some(of) = self.for_each_keyword() {
                return self.for_each_rest(Some(kind), name, of);
            }
            self.no_in = true;
            let decl = self.declarators(kind, name);
            self.no_in = false;
            Some(Box::new(Stmt {
                kind: decl?,
                line: head_line,
            }))
        } else {
            if let TokenKind::Ident(name) = self.peek().kind.clone() {
                let next_is_loop_word = matches!(
                    &self.peek_next().kind,
                    TokenKind::Ident(w) if w == "in" || w == "of"
                );
                if next_is_loop_word && !RESERVED.contains(&name.as_str()) {
                    self.advance();
                    let of = self.for_each_keyword().unwrap_or(false);
                    return self.for_each_rest(None, name, of);
                }
            }
            self.no_in = true;
            let expr = self.expression();
            self.no_in = false;
            Some(Box::new(Stmt {
                kind: StmtKind::Expr(expr?),
                line: head_line,
            }))
        };
        self.expect_punct(";")?;
        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    /// Consumes `in` (returns false) or `of` (returns true).
    fn for_each_keyword(&mut self) -> Option<bool> {
        if self.eat_word("in") {
            Some(false)
        } else if self.eat_word("of") {
            Some(true)
        } else {
            None
        }
    }

    fn for_each_rest(&mut self, decl: Option<DeclKind>, name: String, of: bool) -> PResult<StmtKind> {
        let subject = self.expression()?;
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(StmtKind::ForEach {
            decl,
            name,
            of,
            subject,
            body,
        })
    }

    fn try_statement(&mut self) -> PResult<StmtKind> {
        self.advance();
        let block = self.block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat_word("catch") {
            if self.eat_punct("(") {
                param = Some(self.identifier()?);
                self.expect_punct(")")?;
            }
            handler = Some(self.block()?);
        }
        let finalizer = if self.eat_word("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected());
        }
        Ok(StmtKind::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    /// Parses `name? (params) { body }` after the `function` keyword.
    fn function_rest(&mut self, line: u32, require_name: bool) -> PResult<Rc<FunctionDef>> {
        let name = if require_name || matches!(self.peek().kind, TokenKind::Ident(_)) {
            Some(self.identifier()?)
        } else {
            None
        };
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            params.push(self.identifier()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let body = self.block();
        self.no_in = saved_no_in;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: body?,
            line,
        }))
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expression(&mut self) -> PResult<Expr> {
        let first = self.assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            items.push(self.assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> PResult<Expr> {
        let target = self.conditional()?;
        let op = match &self.peek().kind {
            TokenKind::Punct("=") => None,
            TokenKind::Punct("+=") => Some(BinaryOp::Add),
            TokenKind::Punct("-=") => Some(BinaryOp::Sub),
            TokenKind::Punct("*=") => Some(BinaryOp::Mul),
            TokenKind::Punct("/=") => Some(BinaryOp::Div),
            TokenKind::Punct("%=") => Some(BinaryOp::Rem),
            TokenKind::Punct("**=") => Some(BinaryOp::Pow),
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            let token = self.peek();
            return Err(SyntaxError::new(
                "Invalid left-hand side in assignment",
                token.line,
                token.column,
            ));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let test = self.binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let then = self.assignment();
        self.no_in = saved_no_in;
        let then = then?;
        self.expect_punct(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn binary_operator(&self) -> Option<(u8, Operator)> {
        let op = match &self.peek().kind {
            TokenKind::Punct(p) => match *p {
                "??" => (1, Operator::Logical(LogicalOp::Nullish)),
                "||" => (2, Operator::Logical(LogicalOp::Or)),
                "&&" => (3, Operator::Logical(LogicalOp::And)),
                "==" => (7, Operator::Binary(BinaryOp::Eq)),
                "!=" => (7, Operator::Binary(BinaryOp::NotEq)),
                "===" => (7, Operator::Binary(BinaryOp::StrictEq)),
                "!==" => (7, Operator::Binary(BinaryOp::StrictNotEq)),
                "<" => (8, Operator::Binary(BinaryOp::Lt)),
                "<=" => (8, Operator::Binary(BinaryOp::Lte)),
                ">" => (8, Operator::Binary(BinaryOp::Gt)),
                ">=" => (8, Operator::Binary(BinaryOp::Gte)),
                "+" => (10, Operator::Binary(BinaryOp::Add)),
                "-" => (10, Operator::Binary(BinaryOp::Sub)),
                "*" => (11, Operator::Binary(BinaryOp::Mul)),
                "/" => (11, Operator::Binary(BinaryOp::Div)),
                "%" => (11, Operator::Binary(BinaryOp::Rem)),
                _ => return None,
            },
            TokenKind::Ident(w) if w == "in" && !self.no_in => (8, Operator::Binary(BinaryOp::In)),
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing over the left-associative binary operators.
    fn binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.exponent()?;
        while let Some((prec, op)) = self.binary_operator() {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.nested(|p| p.binary(prec + 1))?;
            left = match op {
                Operator::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Operator::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn exponent(&mut self) -> PResult<Expr> {
        let starts_unary = match &self.peek().kind {
            TokenKind::Punct(p) => matches!(*p, "-" | "+" | "!"),
            TokenKind::Ident(w) => w == "typeof" || w == "void",
            _ => false,
        };
        let base = self.unary()?;
        if !self.is_punct("**") {
            return Ok(base);
        }
        if starts_unary {
            let token = self.peek();
            return Err(SyntaxError::new(
                "Unary operator used immediately before exponentiation expression",
                token.line,
                token.column,
            ));
        }
        self.advance();
        let exponent = self.nested(Self::exponent)?;
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match &self.peek().kind {
            TokenKind::Punct("-") => UnaryOp::Neg,
            TokenKind::Punct("+") => UnaryOp::Plus,
            TokenKind::Punct("!") => UnaryOp::Not,
            TokenKind::Ident(w) if w == "typeof" => UnaryOp::Typeof,
            TokenKind::Ident(w) if w == "void" => UnaryOp::Void,
            TokenKind::Punct(p @ ("++" | "--")) => {
                let delta = if *p == "++" { 1.0 } else { -1.0 };
                self.advance();
                let target = self.nested(Self::unary)?;
                return self.update(delta, true, target);
            }
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn update(&self, delta: f64, prefix: bool, target: Expr) -> PResult<Expr> {
        if !target.is_assignable() {
            let token = self.peek();
            return Err(SyntaxError::new(
                "Invalid left-hand side expression in update operation",
                token.line,
                token.column,
            ));
        }
        Ok(Expr::Update {
            delta,
            prefix,
            target: Box::new(target),
        })
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let expr = self.call_chain()?;
        if self.peek().newline_before {
            return Ok(expr);
        }
        if self.eat_punct("++") {
            return self.update(1.0, false, expr);
        }
        if self.eat_punct("--") {
            return self.update(-1.0, false, expr);
        }
        Ok(expr)
    }

    fn call_chain(&mut self) -> PResult<Expr> {
        let mut expr = if self.is_word("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            if self.eat_punct(".") {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn new_expression(&mut self) -> PResult<Expr> {
        self.advance();
        let mut callee = if self.is_word("new") {
            self.nested(Self::new_expression)?
        } else {
            self.primary()?
        };
        loop {
            if self.eat_punct(".") {
                let property = self.property_name()?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                callee = Expr::Index {
                    object: Box::new(callee),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        let args = if self.is_punct("(") {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn property_name(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(w) => {
                let name = w.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect_punct("(")?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let mut args = Vec::new();
        let result = loop {
            if self.eat_punct(")") {
                break Ok(());
            }
            match self.assignment() {
                Ok(arg) => args.push(arg),
                Err(e) => break Err(e),
            }
            if !self.is_punct(")") {
                if let Err(e) = self.expect_punct(",") {
                    break Err(e);
                }
            }
        };
        self.no_in = saved_no_in;
        result.map(|()| args)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::String(Rc::from(s)))
            }
            TokenKind::Punct("(") => {
                self.advance();
                let saved_no_in = std::mem::replace(&mut self.no_in, false);
                let inner = self.expression();
                self.no_in = saved_no_in;
                let inner = inner?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.assignment()?);
                    if !self.is_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            TokenKind::Punct("{") => self.object_literal(),
            TokenKind::Ident(word) => match word.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "this" => {
                    self.advance();
                    Ok(Expr::This)
                }
                "function" => {
                    self.advance();
                    let def = self.function_rest(token.line, false)?;
                    Ok(Expr::Function(def))
                }
                _ => Ok(Expr::Ident(self.identifier()?)),
            },
            _ => Err(self.unexpected()),
        }
    }

    fn object_literal(&mut self) -> PResult<Expr> {
        self.advance();
        let mut props = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.peek().kind.clone() {
                TokenKind::Ident(name) => {
                    self.advance();
                    if !self.is_punct(":") {
                        if RESERVED.contains(&name.as_str()) {
                            return Err(self.unexpected());
                        }
                        props.push((name.clone(), Expr::Ident(name)));
                        if !self.is_punct("}") {
                            self.expect_punct(",")?;
                        }
                        continue;
                    }
                    name
                }
                TokenKind::String(s) => {
                    self.advance();
                    s
                }
                TokenKind::Number(n) => {
                    self.advance();
                    super::value::number_to_string(n)
                }
                _ => return Err(self.unexpected()),
            };
            self.expect_punct(":")?;
            let value = self.assignment()?;
            props.push((key, value));
            if !self.is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        Ok(Expr::Object(props))
    }
}

#[derive(Clone, Copy)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> StmtKind {
        let mut script = parse(source, 64).unwrap();
        assert_eq!(script.body.len(), 1, "{source}");
        script.body.remove(0).kind
    }

    fn expr(source: &str) -> Expr {
        match parse_one(source) {
            StmtKind::Expr(e) => e,
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let e = expr("1 + 2 * 3");
        let Expr::Binary { op: BinaryOp::Add, right, .. } = e else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let e = expr("10 - 4 - 3");
        let Expr::Binary { op: BinaryOp::Sub, left, right } = e else {
            panic!("expected subtraction at the root");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert_eq!(*right, Expr::Number(3.0));
    }

    #[test]
    fn exponent_is_right_associative() {
        let e = expr("2 ** 3 ** 2");
        let Expr::Binary { op: BinaryOp::Pow, right, .. } = e else {
            panic!("expected power at the root");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. }));
        assert!(parse("-2 ** 2", 64).is_err());
        assert!(parse("(-2) ** 2", 64).is_ok());
    }

    #[test]
    fn semicolons_are_optional_at_line_breaks() {
        let script = parse("var a = 1\nvar b = 2\na + b", 64).unwrap();
        assert_eq!(script.body.len(), 3);
        assert!(parse("var a = 1 var b = 2", 64).is_err());
    }

    #[test]
    fn for_in_with_var_declaration() {
        let StmtKind::ForEach { decl, name, of, .. } =
            parse_one("for (var i in list) { total += list[i]; }")
        else {
            panic!("expected for-in");
        };
        assert_eq!(decl, Some(DeclKind::Var));
        assert_eq!(name, "i");
        assert!(!of);
    }

    #[test]
    fn c_style_for_loop() {
        let StmtKind::For { init, test, update, .. } =
            parse_one("for (var count = 0; count < 3; count++) {}")
        else {
            panic!("expected for loop");
        };
        assert!(init.is_some() && test.is_some() && update.is_some());
    }

    #[test]
    fn function_expression_as_argument() {
        let e = expr("str.split(' ').map(function (word) { return word; }).join(' ')");
        assert!(matches!(e, Expr::Call { .. }));
    }

    #[test]
    fn new_error_with_message() {
        let StmtKind::Throw(Expr::New { callee, args }) = parse_one("throw new Error('boom');") else {
            panic!("expected throw new");
        };
        assert_eq!(*callee, Expr::Ident("Error".into()));
        assert_eq!(args, vec![Expr::String(Rc::from("boom"))]);
    }

    #[test]
    fn return_before_newline_has_no_value() {
        let StmtKind::Function(def) = parse_one("function f() { return\n1 }") else {
            panic!("expected function");
        };
        assert_eq!(def.body[0].kind, StmtKind::Return(None));
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&deep, 64).unwrap_err();
        assert!(err.message.contains("nesting"));
        assert!(parse("((1))", 64).is_ok());
    }

    #[test]
    fn invalid_assignment_target() {
        let err = parse("1 = 2", 64).unwrap_err();
        assert!(err.message.contains("left-hand side"));
    }

    #[test]
    fn object_literal_keys() {
        let e = expr("x = {a: 1, 'b c': 2, 3: 4}");
        let Expr::Assign { value, .. } = e else {
            panic!("expected assignment");
        };
        let Expr::Object(props) = *value else {
            panic!("expected object literal");
        };
        let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "3"]);
    }
}
