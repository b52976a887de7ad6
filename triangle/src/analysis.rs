//! Semantic analysis: name resolution, record-type canonicalization, and
//! type checking. The checker walks the AST once, filling every type slot,
//! and accumulates errors rather than stopping. Each statement is a
//! recovery boundary; within an expression the first error aborts that
//! expression.

use crate::error::{Expected, SemanticError};
use crate::scope::SymbolTable;
use crate::stdenv;
use crate::syntax::ast::{
    Argument, Declaration, Expression, Identifier, Parameter, RecordField, Statement, TypeSig,
};
use crate::syntax::token::SourcePos;
use crate::types::{FieldType, Type};
use std::collections::HashSet;

pub struct TypeChecker {
    errors: Vec<SemanticError>,
    terms: SymbolTable<Type, ()>,
    types: SymbolTable<Type, ()>,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            errors: Vec::new(),
            terms: SymbolTable::new(stdenv::STD_TERMS.clone(), ()),
            types: SymbolTable::new(stdenv::STD_TYPES.clone(), ()),
        }
    }

    /// Checks a whole program. On success every typeable node carries its
    /// resolved type; on failure all collected diagnostics are returned.
    pub fn check(mut self, program: &mut Statement) -> Result<(), Vec<SemanticError>> {
        self.check_stmt(program);
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    // ------------------------------------------------------------------
    // Statements never propagate; failures land in the error list
    // ------------------------------------------------------------------

    fn check_stmt(&mut self, statement: &mut Statement) {
        match statement {
            Statement::Assign { target, expression, .. } => {
                let result = self
                    .check_expr(expression)
                    .and_then(|()| self.check_ident(target));
                if let Err(e) = result {
                    self.errors.push(e);
                }
            }
            Statement::Expression { expression, .. } => {
                if let Err(e) = self.check_expr(expression) {
                    self.errors.push(e);
                }
            }
            Statement::If { pos, condition, consequent, alternative } => {
                let pos = *pos;
                if let Err(e) = self.check_if_stmt(pos, condition, consequent, alternative) {
                    self.errors.push(e);
                }
            }
            Statement::Let { declarations, statement, .. } => {
                self.terms.enter_scope(());
                self.types.enter_scope(());
                for declaration in declarations.iter_mut() {
                    if let Err(e) = self.bind_decl(declaration) {
                        self.errors.push(e);
                    }
                }
                self.check_stmt(statement);
                self.types.exit_scope();
                self.terms.exit_scope();
            }
            Statement::Block { statements, .. } => {
                for s in statements.iter_mut() {
                    self.check_stmt(s);
                }
            }
            Statement::While { pos, condition, body } => {
                let pos = *pos;
                if let Err(e) = self.check_loop(pos, condition, body) {
                    self.errors.push(e);
                }
            }
            Statement::LoopWhile { pos, condition, loop_body, do_body } => {
                let pos = *pos;
                match self.check_loop(pos, condition, loop_body) {
                    Ok(()) => self.check_stmt(do_body),
                    Err(e) => self.errors.push(e),
                }
            }
            Statement::RepeatWhile { pos, condition, body }
            | Statement::RepeatUntil { pos, condition, body } => {
                let pos = *pos;
                if let Err(e) = self.check_loop(pos, condition, body) {
                    self.errors.push(e);
                }
            }
            Statement::Noop { .. } => {}
        }
    }

    fn check_if_stmt(
        &mut self,
        pos: SourcePos,
        condition: &mut Expression,
        consequent: &mut Option<Box<Statement>>,
        alternative: &mut Option<Box<Statement>>,
    ) -> Result<(), SemanticError> {
        self.check_expr(condition)?;
        if let Some(consequent) = consequent {
            self.check_stmt(consequent);
        }
        if let Some(alternative) = alternative {
            self.check_stmt(alternative);
        }

        let cond_ty = condition.ty().base_type();
        if *cond_ty != Type::Bool {
            return Err(SemanticError::TypeError {
                pos,
                got: cond_ty.clone(),
                expected: Expected::Type(Type::Bool),
            });
        }
        Ok(())
    }

    fn check_loop(
        &mut self,
        pos: SourcePos,
        condition: &mut Expression,
        body: &mut Statement,
    ) -> Result<(), SemanticError> {
        self.check_expr(condition)?;
        let cond_ty = condition.ty().base_type();
        if *cond_ty != Type::Bool {
            return Err(SemanticError::TypeError {
                pos,
                got: cond_ty.clone(),
                expected: Expected::Type(Type::Bool),
            });
        }
        self.check_stmt(body);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn check_expr(&mut self, expression: &mut Expression) -> Result<(), SemanticError> {
        match expression {
            Expression::LitBool { ty, .. } => *ty = Some(Type::Bool),
            Expression::LitInt { ty, .. } => *ty = Some(Type::Int),
            Expression::LitChar { ty, .. } => *ty = Some(Type::Char),
            Expression::LitArray { pos, elements, ty } => {
                let pos = *pos;
                let Some(first) = elements.first_mut() else {
                    return Err(SemanticError::EmptyLiteral { pos });
                };
                self.check_expr(first)?;
                let elem_ty = first.ty().base_type().clone();

                for element in elements.iter_mut() {
                    self.check_expr(element)?;
                    let got = element.ty().base_type();
                    if *got != elem_ty {
                        return Err(SemanticError::TypeError {
                            pos: element.pos(),
                            got: got.clone(),
                            expected: Expected::Type(elem_ty),
                        });
                    }
                }

                *ty = Some(Type::Array(elements.len() as u32, Box::new(elem_ty)));
            }
            Expression::LitRecord { pos, fields, ty } => {
                let pos = *pos;
                if fields.is_empty() {
                    return Err(SemanticError::EmptyLiteral { pos });
                }
                let mut field_types = Vec::new();
                for RecordField { name, value } in fields.iter_mut() {
                    self.check_expr(value)?;
                    field_types.push(FieldType::new(name.clone(), value.ty().clone()));
                }
                // canonical form: fields sorted by name
                field_types.sort_by(|a, b| a.name.cmp(&b.name));
                *ty = Some(Type::Record(field_types));
            }
            Expression::Identifier(identifier) => self.check_ident(identifier)?,
            Expression::UnaryOp { pos, operator, operand, ty } => {
                let pos = *pos;
                let op_ty = self.lookup_term(operator, pos)?;

                self.check_expr(operand)?;

                let (param_tys, ret) = match op_ty {
                    Type::Func(param_tys, ret) => (param_tys, ret),
                    other => {
                        return Err(SemanticError::TypeError {
                            pos,
                            got: other,
                            expected: Expected::Kind("function"),
                        })
                    }
                };
                let Some(expected) = param_tys.first() else {
                    return Err(SemanticError::ArityMismatch { pos, expected: 0, got: 1 });
                };

                let got = operand.ty().base_type();
                if got != expected {
                    return Err(SemanticError::TypeError {
                        pos: operand.pos(),
                        got: got.clone(),
                        expected: Expected::Type(expected.clone()),
                    });
                }

                *ty = Some(*ret);
            }
            Expression::BinaryOp { pos, operator, left, right, ty } => {
                let pos = *pos;
                let op_ty = self.lookup_term(operator, pos)?;

                self.check_expr(left)?;
                self.check_expr(right)?;

                // equality is the one polymorphic operation: any two
                // operands of equal base type
                if operator == "=" || operator == "\\=" {
                    let left_ty = left.ty().base_type();
                    let right_ty = right.ty().base_type();
                    if left_ty != right_ty {
                        return Err(SemanticError::TypeError {
                            pos,
                            got: right_ty.clone(),
                            expected: Expected::Type(left_ty.clone()),
                        });
                    }
                    *ty = Some(Type::Bool);
                } else {
                    let (param_tys, ret) = match op_ty {
                        Type::Func(param_tys, ret) => (param_tys, ret),
                        other => {
                            return Err(SemanticError::TypeError {
                                pos,
                                got: other,
                                expected: Expected::Kind("function"),
                            })
                        }
                    };
                    let Some(expected) = param_tys.first() else {
                        return Err(SemanticError::ArityMismatch { pos, expected: 0, got: 2 });
                    };

                    let left_ty = left.ty().base_type();
                    if left_ty != expected {
                        return Err(SemanticError::TypeError {
                            pos: left.pos(),
                            got: left_ty.clone(),
                            expected: Expected::Type(expected.clone()),
                        });
                    }

                    // the right operand is checked against the first
                    // parameter type
                    let right_ty = right.ty().base_type();
                    if right_ty != expected {
                        return Err(SemanticError::TypeError {
                            pos: right.pos(),
                            got: right_ty.clone(),
                            expected: Expected::Type(expected.clone()),
                        });
                    }

                    *ty = Some(*ret);
                }
            }
            Expression::IfExpression { pos, condition, consequent, alternative, ty } => {
                let pos = *pos;
                self.check_expr(condition)?;

                let cond_ty = condition.ty().base_type();
                if *cond_ty != Type::Bool {
                    return Err(SemanticError::TypeError {
                        pos,
                        got: cond_ty.clone(),
                        expected: Expected::Type(Type::Bool),
                    });
                }

                self.check_expr(consequent)?;
                self.check_expr(alternative)?;

                let then_ty = consequent.ty().base_type().clone();
                let else_ty = alternative.ty().base_type();
                if *else_ty != then_ty {
                    return Err(SemanticError::TypeError {
                        pos,
                        got: else_ty.clone(),
                        expected: Expected::Type(then_ty),
                    });
                }

                *ty = Some(then_ty);
            }
            Expression::LetExpression { declarations, expression, ty, .. } => {
                self.terms.enter_scope(());
                self.types.enter_scope(());
                let result = self.check_let_body(declarations, expression);
                self.types.exit_scope();
                self.terms.exit_scope();
                result?;

                *ty = Some(expression.ty().base_type().clone());
            }
            Expression::FunCall { pos, callee, arguments, ty } => {
                let pos = *pos;
                let callee_ty = self.lookup_term(callee, pos)?;

                let (param_tys, ret) = match callee_ty {
                    Type::Func(param_tys, ret) => (param_tys, ret),
                    other => {
                        return Err(SemanticError::TypeError {
                            pos,
                            got: other,
                            expected: Expected::Kind("function"),
                        })
                    }
                };

                if arguments.len() != param_tys.len() {
                    return Err(SemanticError::ArityMismatch {
                        pos,
                        expected: param_tys.len(),
                        got: arguments.len(),
                    });
                }

                for (argument, param_ty) in arguments.iter_mut().zip(&param_tys) {
                    self.annotate_arg(argument)?;
                    let got = argument.ty().base_type();
                    let expected = param_ty.base_type();
                    if got != expected {
                        return Err(SemanticError::TypeError {
                            pos: argument.pos(),
                            got: got.clone(),
                            expected: Expected::Type(expected.clone()),
                        });
                    }
                }

                *ty = Some(*ret);
            }
            Expression::Sequence { statement, expression, ty, .. } => {
                self.check_stmt(statement);
                self.check_expr(expression)?;
                *ty = Some(expression.ty().base_type().clone());
            }
        }

        // a function may never be produced as a value
        if matches!(expression.ty().base_type(), Type::Func(_, _)) {
            return Err(SemanticError::FunctionResult { pos: expression.pos() });
        }

        Ok(())
    }

    fn check_let_body(
        &mut self,
        declarations: &mut [Declaration],
        expression: &mut Expression,
    ) -> Result<(), SemanticError> {
        for declaration in declarations.iter_mut() {
            self.bind_decl(declaration)?;
        }
        self.check_expr(expression)
    }

    fn lookup_term(&self, name: &str, pos: SourcePos) -> Result<Type, SemanticError> {
        self.terms
            .lookup(name)
            .cloned()
            .ok_or_else(|| SemanticError::UndeclaredUse { pos, name: name.to_string() })
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    fn check_ident(&mut self, identifier: &mut Identifier) -> Result<(), SemanticError> {
        match identifier {
            Identifier::Basic { pos, name, ty } => {
                let resolved = self.lookup_term(name, *pos)?;
                *ty = Some(resolved);
            }
            Identifier::ArraySubscript { pos, array, subscript, ty } => {
                let pos = *pos;
                self.check_ident(array)?;
                self.check_expr(subscript)?;

                let array_full = array.ty();
                let (elem_ty, is_ref) = match array_full.base_type() {
                    Type::Array(_, elem) => ((**elem).clone(), array_full.is_ref()),
                    other => {
                        return Err(SemanticError::TypeError {
                            pos,
                            got: other.clone(),
                            expected: Expected::Kind("array"),
                        })
                    }
                };

                let sub_ty = subscript.ty().base_type();
                if *sub_ty != Type::Int {
                    return Err(SemanticError::TypeError {
                        pos,
                        got: sub_ty.clone(),
                        expected: Expected::Type(Type::Int),
                    });
                }

                // subscripting a reference to an array yields a reference
                // to the element, preserving mutability
                *ty = Some(if is_ref { Type::Ref(Box::new(elem_ty)) } else { elem_ty });
            }
            Identifier::RecordAccess { pos, record, field, ty } => {
                let pos = *pos;
                self.check_ident(record)?;

                let fields = match record.ty().base_type() {
                    Type::Record(fields) => fields.clone(),
                    other => {
                        return Err(SemanticError::TypeError {
                            pos,
                            got: other.clone(),
                            expected: Expected::Kind("record"),
                        })
                    }
                };

                // the field side is resolved in a scope holding only the
                // record's fields
                self.terms.enter_scope(());
                for FieldType { name, ty } in &fields {
                    self.terms.add(name.clone(), ty.clone());
                }
                let result = self.check_ident(field);
                self.terms.exit_scope();
                result?;

                *ty = Some(field.ty().base_type().clone());
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Arguments and parameters
    // ------------------------------------------------------------------

    fn annotate_arg(&mut self, argument: &mut Argument) -> Result<(), SemanticError> {
        match argument {
            Argument::Expression(expression) => self.check_expr(expression)?,
            Argument::Var { var, ty, .. } => {
                self.check_ident(var)?;
                *ty = Some(var.ty().clone());
            }
            Argument::Func { pos, func, ty } => {
                let resolved = self.lookup_term(func, *pos)?;
                *ty = Some(resolved);
            }
        }
        Ok(())
    }

    fn annotate_param(&mut self, parameter: &mut Parameter) -> Result<(), SemanticError> {
        match parameter {
            Parameter::Value { sig, ty, .. } => {
                *ty = Some(self.resolve_sig(sig)?);
            }
            Parameter::Var { sig, ty, .. } => {
                let inner = self.resolve_sig(sig)?;
                *ty = Some(Type::Ref(Box::new(inner)));
            }
            Parameter::Func { parameters, return_sig, ty, .. } => {
                let mut param_tys = Vec::new();
                for inner in parameters.iter_mut() {
                    self.annotate_param(inner)?;
                    param_tys.push(inner.ty().clone());
                }
                let ret = self.resolve_sig(return_sig)?;
                *ty = Some(Type::Func(param_tys, Box::new(ret)));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn bind_decl(&mut self, declaration: &mut Declaration) -> Result<(), SemanticError> {
        match declaration {
            Declaration::Const { name, value, .. } => {
                self.check_expr(value)?;
                self.terms.add(name.clone(), value.ty().base_type().clone());
            }
            Declaration::Var { name, sig, ty, .. } => {
                let resolved = self.resolve_sig(sig)?;
                self.terms.add(name.clone(), resolved.clone());
                *ty = Some(resolved);
            }
            Declaration::Type { name, sig, .. } => {
                let resolved = self.resolve_sig(sig)?;
                self.types.add(name.clone(), resolved);
            }
            Declaration::Func { pos, name, parameters, return_sig, body } => {
                let pos = *pos;
                let mut param_tys = Vec::new();
                for parameter in parameters.iter_mut() {
                    self.annotate_param(parameter)?;
                    param_tys.push(parameter.ty().base_type().clone());
                }

                // bind the function optimistically to its declared type
                // before the body, so recursive calls resolve
                let declared_ret = self.resolve_sig(return_sig)?;
                self.terms
                    .add(name.clone(), Type::Func(param_tys, Box::new(declared_ret.clone())));

                self.terms.enter_scope(());
                self.types.enter_scope(());
                let result = self.check_func_body(parameters, body, &declared_ret, pos);
                self.types.exit_scope();
                self.terms.exit_scope();

                // the function keeps its declared type; later declarations
                // can still be checked
                if let Err(e) = result {
                    self.errors.push(e);
                }
            }
            Declaration::Proc { name, parameters, body, .. } => {
                let mut param_tys = Vec::new();
                for parameter in parameters.iter_mut() {
                    self.annotate_param(parameter)?;
                    param_tys.push(parameter.ty().clone());
                }

                self.terms
                    .add(name.clone(), Type::Func(param_tys, Box::new(Type::Void)));

                self.terms.enter_scope(());
                self.types.enter_scope(());
                for parameter in parameters.iter() {
                    self.terms.add(parameter.name().to_string(), parameter.ty().clone());
                }
                self.check_stmt(body);
                self.types.exit_scope();
                self.terms.exit_scope();
            }
        }
        Ok(())
    }

    fn check_func_body(
        &mut self,
        parameters: &[Parameter],
        body: &mut Expression,
        declared_ret: &Type,
        pos: SourcePos,
    ) -> Result<(), SemanticError> {
        for parameter in parameters {
            self.terms
                .add(parameter.name().to_string(), parameter.ty().base_type().clone());
        }

        self.check_expr(body)?;

        let body_ty = body.ty().base_type();
        if body_ty != declared_ret {
            return Err(SemanticError::TypeError {
                pos,
                got: body_ty.clone(),
                expected: Expected::Type(declared_ret.clone()),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Type signature resolution
    // ------------------------------------------------------------------

    fn resolve_sig(&mut self, sig: &TypeSig) -> Result<Type, SemanticError> {
        match sig {
            TypeSig::Basic(name) => self
                .types
                .lookup(name)
                .cloned()
                .ok_or_else(|| SemanticError::UndeclaredType { name: name.clone() }),
            TypeSig::Array(size, element) => {
                Ok(Type::Array(*size, Box::new(self.resolve_sig(element)?)))
            }
            TypeSig::Record(fields) => {
                let mut seen = HashSet::new();
                let mut resolved = Vec::new();
                for (name, field_sig) in fields {
                    if !seen.insert(name.as_str()) {
                        return Err(SemanticError::DuplicateRecordTypeField { name: name.clone() });
                    }
                    resolved.push(FieldType::new(name.clone(), self.resolve_sig(field_sig)?));
                }
                // canonical form: fields sorted by name
                resolved.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(Type::Record(resolved))
            }
            TypeSig::Void => Ok(Type::Void),
        }
    }
}
