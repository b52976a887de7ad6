//! Recursive-descent parser with one token of lookahead. The grammar is
//! unprecedenced: an expression is a primary followed by at most one
//! trailing operator, so every binary operator is right-associative and all
//! operators bind equally tightly.

use super::ast::{
    Argument, Declaration, Expression, Identifier, Parameter, RecordField, Statement, TypeSig,
};
use super::token::{SourcePos, Token, TokenKind};
use crate::error::SyntaxError;

/// Lookahead filter: tokens that can begin a declaration.
fn decl_first(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Const | TokenKind::Var | TokenKind::Proc | TokenKind::Func | TokenKind::Type
    )
}

/// Lookahead filter: tokens that can begin an expression.
fn expr_first(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::IntLiteral
            | TokenKind::CharLiteral
            | TokenKind::LBrack
            | TokenKind::LBrace
            | TokenKind::LParen
            | TokenKind::Let
            | TokenKind::If
            | TokenKind::Identifier
            | TokenKind::Operator
            | TokenKind::False
            | TokenKind::True
    )
}

/// Lookahead filter: tokens that can begin a statement.
fn stmt_first(kind: TokenKind) -> bool {
    expr_first(kind)
        || matches!(
            kind,
            TokenKind::Begin
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Loop
                | TokenKind::Repeat
                | TokenKind::Identifier
        )
}

pub struct Parser {
    tokens: std::vec::IntoIter<Token>,
    next: Token,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens = tokens.into_iter();
        let next = tokens
            .next()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, SourcePos::default()));
        Parser { tokens, next }
    }

    pub fn parse_program(mut self) -> Result<Statement, SyntaxError> {
        self.parse_stmt()
    }

    /// Asserts the next token's kind, returns its position and advances.
    fn shift(&mut self, expected: TokenKind) -> Result<SourcePos, SyntaxError> {
        if self.next.kind != expected {
            return Err(SyntaxError::ExpectedToken { found: self.next.clone(), expected });
        }
        let pos = self.next.pos;
        self.advance();
        Ok(pos)
    }

    fn advance(&mut self) {
        let pos = self.next.pos;
        self.next = self
            .tokens
            .next()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, pos));
    }

    fn unexpected(&self) -> SyntaxError {
        SyntaxError::UnexpectedToken { found: self.next.clone() }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Semicolon-separated statements; a trailing semicolon is tolerated.
    fn parse_stmt_seq(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        let mut statements = vec![self.parse_stmt()?];
        while self.next.kind == TokenKind::Semicolon {
            self.shift(TokenKind::Semicolon)?;
            if stmt_first(self.next.kind) {
                statements.push(self.parse_stmt()?);
            }
        }
        Ok(statements)
    }

    fn parse_stmt(&mut self) -> Result<Statement, SyntaxError> {
        match self.next.kind {
            TokenKind::Begin => {
                let pos = self.shift(TokenKind::Begin)?;
                let statements = self.parse_stmt_seq()?;
                self.shift(TokenKind::End)?;
                Ok(Statement::Block { pos, statements })
            }
            TokenKind::Let => {
                let pos = self.shift(TokenKind::Let)?;
                let declarations = self.parse_decl_seq()?;
                self.shift(TokenKind::In)?;
                let statement = Box::new(self.parse_stmt()?);
                Ok(Statement::Let { pos, declarations, statement })
            }
            TokenKind::If => {
                let pos = self.shift(TokenKind::If)?;
                let condition = self.parse_expression()?;
                self.shift(TokenKind::Then)?;

                let consequent = if self.next.kind == TokenKind::Else {
                    None
                } else {
                    Some(Box::new(self.parse_stmt()?))
                };
                self.shift(TokenKind::Else)?;

                // the else branch may be a statement, a bare semicolon, or
                // nothing at all
                let alternative = if stmt_first(self.next.kind) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };

                Ok(Statement::If { pos, condition, consequent, alternative })
            }
            TokenKind::While => {
                let pos = self.shift(TokenKind::While)?;
                let condition = self.parse_expression()?;
                self.shift(TokenKind::Do)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Statement::While { pos, condition, body })
            }
            TokenKind::Loop => {
                let pos = self.shift(TokenKind::Loop)?;
                let loop_body = Box::new(self.parse_stmt()?);
                self.shift(TokenKind::While)?;
                let condition = self.parse_expression()?;
                self.shift(TokenKind::Do)?;
                let do_body = Box::new(self.parse_stmt()?);
                Ok(Statement::LoopWhile { pos, condition, loop_body, do_body })
            }
            TokenKind::Repeat => {
                let pos = self.shift(TokenKind::Repeat)?;
                let body = Box::new(self.parse_stmt()?);
                if self.next.kind == TokenKind::While {
                    self.shift(TokenKind::While)?;
                    let condition = self.parse_expression()?;
                    Ok(Statement::RepeatWhile { pos, condition, body })
                } else {
                    self.shift(TokenKind::Until)?;
                    let condition = self.parse_expression()?;
                    Ok(Statement::RepeatUntil { pos, condition, body })
                }
            }
            TokenKind::Identifier => {
                let identifier = self.parse_identifier()?;

                if self.next.kind == TokenKind::Becomes {
                    self.shift(TokenKind::Becomes)?;
                    let expression = self.parse_expression()?;
                    return Ok(Statement::Assign {
                        pos: identifier.pos(),
                        target: identifier,
                        expression,
                    });
                }

                // an identifier may lead into an operator application used
                // purely for its side effects
                if self.next.kind == TokenKind::Operator {
                    let operator = self.next.text.clone();
                    let pos = self.shift(TokenKind::Operator)?;

                    let expression = if expr_first(self.next.kind) {
                        let right = self.parse_expression()?;
                        Expression::BinaryOp {
                            pos,
                            operator,
                            left: Box::new(Expression::Identifier(identifier)),
                            right: Box::new(right),
                            ty: None,
                        }
                    } else {
                        Expression::UnaryOp {
                            pos,
                            operator,
                            operand: Box::new(Expression::Identifier(identifier)),
                            ty: None,
                        }
                    };
                    return Ok(Statement::Expression { pos, expression });
                }

                let expression = self.parse_if_call(identifier)?;
                Ok(Statement::Expression { pos: expression.pos(), expression })
            }
            kind if expr_first(kind) => {
                let expression = self.parse_expression()?;
                Ok(Statement::Expression { pos: expression.pos(), expression })
            }
            _ => Err(self.unexpected()),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        let first = match self.next.kind {
            TokenKind::True => {
                let pos = self.shift(TokenKind::True)?;
                Expression::LitBool { pos, value: true, ty: None }
            }
            TokenKind::False => {
                let pos = self.shift(TokenKind::False)?;
                Expression::LitBool { pos, value: false, ty: None }
            }
            TokenKind::IntLiteral => {
                let value = self.int_literal_value()?;
                let pos = self.shift(TokenKind::IntLiteral)?;
                Expression::LitInt { pos, value, ty: None }
            }
            TokenKind::CharLiteral => {
                let value = self.next.text.chars().next().unwrap_or_default();
                let pos = self.shift(TokenKind::CharLiteral)?;
                Expression::LitChar { pos, value, ty: None }
            }
            TokenKind::LBrack => {
                let pos = self.shift(TokenKind::LBrack)?;
                let elements = if self.next.kind == TokenKind::RBrack {
                    Vec::new()
                } else {
                    self.parse_array_seq()?
                };
                self.shift(TokenKind::RBrack)?;
                Expression::LitArray { pos, elements, ty: None }
            }
            TokenKind::LBrace => {
                let pos = self.shift(TokenKind::LBrace)?;
                let fields = if self.next.kind == TokenKind::RBrace {
                    Vec::new()
                } else {
                    self.parse_field_seq()?
                };
                self.shift(TokenKind::RBrace)?;
                Expression::LitRecord { pos, fields, ty: None }
            }
            TokenKind::LParen => {
                self.shift(TokenKind::LParen)?;
                let expression = self.parse_expression()?;
                self.shift(TokenKind::RParen)?;
                expression
            }
            TokenKind::Let => {
                let pos = self.shift(TokenKind::Let)?;
                let declarations = self.parse_decl_seq()?;
                self.shift(TokenKind::In)?;
                let expression = Box::new(self.parse_expression()?);
                Expression::LetExpression { pos, declarations, expression, ty: None }
            }
            TokenKind::If => {
                let pos = self.shift(TokenKind::If)?;
                let condition = Box::new(self.parse_expression()?);
                self.shift(TokenKind::Then)?;
                let consequent = Box::new(self.parse_expression()?);
                self.shift(TokenKind::Else)?;
                let alternative = Box::new(self.parse_expression()?);
                Expression::IfExpression { pos, condition, consequent, alternative, ty: None }
            }
            TokenKind::After => {
                let pos = self.shift(TokenKind::After)?;
                let statement = Box::new(self.parse_stmt()?);
                self.shift(TokenKind::Return)?;
                let expression = Box::new(self.parse_expression()?);
                Expression::Sequence { pos, statement, expression, ty: None }
            }
            TokenKind::Identifier => {
                let identifier = self.parse_identifier()?;
                self.parse_if_call(identifier)?
            }
            // unary prefix operator
            TokenKind::Operator => {
                let operator = self.next.text.clone();
                let pos = self.shift(TokenKind::Operator)?;
                let operand = Box::new(self.parse_expression()?);
                Expression::UnaryOp { pos, operator, operand, ty: None }
            }
            _ => return Err(self.unexpected()),
        };

        // at most one trailing operator; with another expression following
        // it is infix, otherwise postfix
        if self.next.kind == TokenKind::Operator {
            let operator = self.next.text.clone();
            let pos = self.shift(TokenKind::Operator)?;

            if expr_first(self.next.kind) {
                let right = Box::new(self.parse_expression()?);
                return Ok(Expression::BinaryOp {
                    pos,
                    operator,
                    left: Box::new(first),
                    right,
                    ty: None,
                });
            }

            return Ok(Expression::UnaryOp { pos, operator, operand: Box::new(first), ty: None });
        }

        Ok(first)
    }

    fn int_literal_value(&self) -> Result<i32, SyntaxError> {
        self.next
            .text
            .parse::<i32>()
            .map_err(|_| SyntaxError::LiteralOutOfRange { found: self.next.clone() })
    }

    /// `name ( . name | '[' E ']' )*`
    fn parse_identifier(&mut self) -> Result<Identifier, SyntaxError> {
        let name = self.next.text.clone();
        let pos = self.shift(TokenKind::Identifier)?;
        let mut identifier = Identifier::Basic { pos, name, ty: None };

        while matches!(self.next.kind, TokenKind::Dot | TokenKind::LBrack) {
            if self.next.kind == TokenKind::Dot {
                self.shift(TokenKind::Dot)?;
                let field = Box::new(self.parse_identifier()?);
                identifier = Identifier::RecordAccess {
                    pos,
                    record: Box::new(identifier),
                    field,
                    ty: None,
                };
            } else {
                self.shift(TokenKind::LBrack)?;
                let subscript = Box::new(self.parse_expression()?);
                self.shift(TokenKind::RBrack)?;
                identifier = Identifier::ArraySubscript {
                    pos,
                    array: Box::new(identifier),
                    subscript,
                    ty: None,
                };
            }
        }

        Ok(identifier)
    }

    /// An identifier followed by `(` is a call, but only a simple name may
    /// be called; computed callables are rejected.
    fn parse_if_call(&mut self, identifier: Identifier) -> Result<Expression, SyntaxError> {
        if self.next.kind != TokenKind::LParen {
            return Ok(Expression::Identifier(identifier));
        }

        let name = match identifier {
            Identifier::Basic { name, .. } => name,
            other => return Err(SyntaxError::ComplexCallable { pos: other.pos() }),
        };

        let pos = self.shift(TokenKind::LParen)?;
        let arguments = if self.next.kind == TokenKind::RParen {
            Vec::new()
        } else {
            self.parse_arg_seq()?
        };
        self.shift(TokenKind::RParen)?;

        Ok(Expression::FunCall { pos, callee: name, arguments, ty: None })
    }

    // ------------------------------------------------------------------
    // Type signatures
    // ------------------------------------------------------------------

    fn parse_type_sig(&mut self) -> Result<TypeSig, SyntaxError> {
        match self.next.kind {
            TokenKind::Identifier => {
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                Ok(TypeSig::Basic(name))
            }
            TokenKind::Array => {
                self.shift(TokenKind::Array)?;
                let size = self.int_literal_value()? as u32;
                self.shift(TokenKind::IntLiteral)?;
                self.shift(TokenKind::Of)?;
                let element = self.parse_type_sig()?;
                Ok(TypeSig::Array(size, Box::new(element)))
            }
            TokenKind::Record => {
                self.shift(TokenKind::Record)?;
                let fields = if self.next.kind == TokenKind::End {
                    Vec::new()
                } else {
                    self.parse_field_type_seq()?
                };
                self.shift(TokenKind::End)?;
                Ok(TypeSig::Record(fields))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_field_type_seq(&mut self) -> Result<Vec<(String, TypeSig)>, SyntaxError> {
        let mut fields = vec![self.parse_field_type()?];
        while self.next.kind == TokenKind::Comma {
            self.shift(TokenKind::Comma)?;
            fields.push(self.parse_field_type()?);
        }
        Ok(fields)
    }

    fn parse_field_type(&mut self) -> Result<(String, TypeSig), SyntaxError> {
        let name = self.next.text.clone();
        self.shift(TokenKind::Identifier)?;
        self.shift(TokenKind::Colon)?;
        let sig = self.parse_type_sig()?;
        Ok((name, sig))
    }

    // ------------------------------------------------------------------
    // Arguments
    // ------------------------------------------------------------------

    fn parse_arg_seq(&mut self) -> Result<Vec<Argument>, SyntaxError> {
        let mut arguments = vec![self.parse_arg()?];
        while self.next.kind == TokenKind::Comma {
            self.shift(TokenKind::Comma)?;
            arguments.push(self.parse_arg()?);
        }
        Ok(arguments)
    }

    fn parse_arg(&mut self) -> Result<Argument, SyntaxError> {
        match self.next.kind {
            TokenKind::Func | TokenKind::Proc => {
                let pos = self.shift(self.next.kind)?;
                let callable = self.parse_identifier()?;
                let name = match callable {
                    Identifier::Basic { name, .. } => name,
                    other => return Err(SyntaxError::ComplexCallable { pos: other.pos() }),
                };
                Ok(Argument::Func { pos, func: name, ty: None })
            }
            TokenKind::Var => {
                let pos = self.shift(TokenKind::Var)?;
                let var = self.parse_identifier()?;
                Ok(Argument::Var { pos, var, ty: None })
            }
            kind if expr_first(kind) => Ok(Argument::Expression(self.parse_expression()?)),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_seq(&mut self) -> Result<Vec<Expression>, SyntaxError> {
        let mut elements = vec![self.parse_expression()?];
        while self.next.kind == TokenKind::Comma {
            self.shift(TokenKind::Comma)?;
            elements.push(self.parse_expression()?);
        }
        Ok(elements)
    }

    fn parse_field_seq(&mut self) -> Result<Vec<RecordField>, SyntaxError> {
        let mut fields = vec![self.parse_field()?];
        while self.next.kind == TokenKind::Comma {
            self.shift(TokenKind::Comma)?;
            fields.push(self.parse_field()?);
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<RecordField, SyntaxError> {
        let name = self.next.text.clone();
        self.shift(TokenKind::Identifier)?;
        self.shift(TokenKind::Is)?;
        let value = self.parse_expression()?;
        Ok(RecordField { name, value })
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Semicolon-separated declarations; a trailing semicolon is tolerated.
    fn parse_decl_seq(&mut self) -> Result<Vec<Declaration>, SyntaxError> {
        let mut declarations = vec![self.parse_decl()?];
        while self.next.kind == TokenKind::Semicolon {
            self.shift(TokenKind::Semicolon)?;
            if decl_first(self.next.kind) {
                declarations.push(self.parse_decl()?);
            }
        }
        Ok(declarations)
    }

    fn parse_decl(&mut self) -> Result<Declaration, SyntaxError> {
        match self.next.kind {
            TokenKind::Const => {
                let pos = self.shift(TokenKind::Const)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                self.shift(TokenKind::Is)?;
                let value = self.parse_expression()?;
                Ok(Declaration::Const { pos, name, value })
            }
            TokenKind::Var => {
                let pos = self.shift(TokenKind::Var)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                self.shift(TokenKind::Colon)?;
                let sig = self.parse_type_sig()?;
                Ok(Declaration::Var { pos, name, sig, ty: None })
            }
            TokenKind::Proc => {
                let pos = self.shift(TokenKind::Proc)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                let parameters = self.parse_param_seq()?;
                self.shift(TokenKind::Is)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Declaration::Proc { pos, name, parameters, body })
            }
            TokenKind::Func => {
                let pos = self.shift(TokenKind::Func)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                let parameters = self.parse_param_seq()?;
                self.shift(TokenKind::Colon)?;
                let return_sig = self.parse_type_sig()?;
                self.shift(TokenKind::Is)?;
                let body = Box::new(self.parse_expression()?);
                Ok(Declaration::Func { pos, name, parameters, return_sig, body })
            }
            TokenKind::Type => {
                let pos = self.shift(TokenKind::Type)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                self.shift(TokenKind::Is)?;
                let sig = self.parse_type_sig()?;
                Ok(Declaration::Type { pos, name, sig })
            }
            _ => Err(self.unexpected()),
        }
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    fn parse_param_seq(&mut self) -> Result<Vec<Parameter>, SyntaxError> {
        self.shift(TokenKind::LParen)?;
        let mut parameters = Vec::new();
        if self.next.kind != TokenKind::RParen {
            parameters.push(self.parse_param()?);
            while self.next.kind == TokenKind::Comma {
                self.shift(TokenKind::Comma)?;
                parameters.push(self.parse_param()?);
            }
        }
        self.shift(TokenKind::RParen)?;
        Ok(parameters)
    }

    fn parse_param(&mut self) -> Result<Parameter, SyntaxError> {
        match self.next.kind {
            TokenKind::Identifier => {
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                self.shift(TokenKind::Colon)?;
                let sig = self.parse_type_sig()?;
                Ok(Parameter::Value { name, sig, ty: None })
            }
            TokenKind::Var => {
                self.shift(TokenKind::Var)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                self.shift(TokenKind::Colon)?;
                let sig = self.parse_type_sig()?;
                Ok(Parameter::Var { name, sig, ty: None })
            }
            TokenKind::Proc => {
                self.shift(TokenKind::Proc)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                let parameters = self.parse_param_seq()?;
                Ok(Parameter::Func { name, parameters, return_sig: TypeSig::Void, ty: None })
            }
            TokenKind::Func => {
                self.shift(TokenKind::Func)?;
                let name = self.next.text.clone();
                self.shift(TokenKind::Identifier)?;
                let parameters = self.parse_param_seq()?;
                self.shift(TokenKind::Colon)?;
                let return_sig = self.parse_type_sig()?;
                Ok(Parameter::Func { name, parameters, return_sig, ty: None })
            }
            _ => Err(self.unexpected()),
        }
    }
}
