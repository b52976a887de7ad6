//! Lowers the typed AST to a flat pseudo-instruction stream in one forward
//! pass. All expression values live on the data stack; identifiers resolve
//! to offsets from a display register picked by lexical depth.

use super::ir::{Instruction, Label};
use crate::error::CodegenError;
use crate::scope::SymbolTable;
use crate::stdenv;
use crate::syntax::ast::{
    Argument, Declaration, Expression, Identifier, Parameter, RecordField, Statement,
};
use crate::types::{FieldType, Type};
use indexmap::IndexMap;
use tam::{Address, Primitive, Register};

/// How a callable name is reached at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Callable {
    /// User-defined routine at a known label.
    Static(Label),
    /// A `func`/`proc` parameter: a two-word closure at this stack offset.
    Dynamic(i32),
    /// A routine resident in the primitive segment.
    Primitive(Primitive),
}

/// Labels 0.. are reserved for the out-of-line builtin helpers emitted
/// after the program; user code labels start here.
const HELPER_LABELS: u32 = 3;

pub struct IrGen {
    code: Vec<Instruction>,
    /// name -> stack offset within its frame; aux is the frame's current
    /// stack top.
    vars: SymbolTable<i32, i32>,
    callables: SymbolTable<Callable, ()>,
    next_label: u32,
}

impl IrGen {
    fn new() -> Self {
        let mut builtins: IndexMap<String, Callable> = IndexMap::new();
        for (name, primitive) in stdenv::PRIMITIVES.iter() {
            builtins.insert(name.clone(), Callable::Primitive(*primitive));
        }
        builtins.insert("|".to_string(), Callable::Static(Label(0)));
        builtins.insert("++".to_string(), Callable::Static(Label(1)));
        builtins.insert("**".to_string(), Callable::Static(Label(2)));

        IrGen {
            code: Vec::new(),
            vars: SymbolTable::new(IndexMap::new(), 0),
            callables: SymbolTable::new(builtins, ()),
            next_label: HELPER_LABELS,
        }
    }

    /// Lowers a typechecked program to pseudo-instructions: the program
    /// body, a HALT, then the compiler-generated helper block.
    pub fn generate(program: &Statement) -> Result<Vec<Instruction>, CodegenError> {
        let mut gen = IrGen::new();
        gen.gen_stmt(program)?;
        gen.emit(Instruction::Tam(tam::Instruction::Halt));
        gen.gen_helpers();
        Ok(gen.code)
    }

    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    fn emit_tam(&mut self, instruction: tam::Instruction) {
        self.code.push(Instruction::Tam(instruction));
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn display_register(&self, depth: usize) -> Result<Register, CodegenError> {
        Register::display(depth).ok_or(CodegenError::NestingTooDeep { depth })
    }

    fn call_primitive(&mut self, primitive: Primitive) {
        self.emit_tam(tam::Instruction::Call {
            static_link: Register::SB,
            addr: Address::new(Register::PB, i32::from(primitive)),
        });
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn gen_stmt(&mut self, statement: &Statement) -> Result<(), CodegenError> {
        match statement {
            Statement::Block { statements, .. } => {
                for s in statements {
                    self.gen_stmt(s)?;
                }
            }
            Statement::Let { declarations, statement, .. } => {
                let saved_top = self.vars.local_aux();
                let allocated = self.allocate_declarations(declarations)?;
                self.gen_stmt(statement)?;
                if allocated > 0 {
                    self.emit_tam(tam::Instruction::Pop { n: 0, d: allocated });
                }
                self.vars.set_local_aux(saved_top);
            }
            Statement::Assign { target, expression, .. } => {
                self.gen_expr(expression)?;
                self.gen_store(target)?;
            }
            Statement::Expression { expression, .. } => {
                self.gen_expr(expression)?;
                let size = expression.ty().base_type().size();
                if size > 0 {
                    self.emit_tam(tam::Instruction::Pop { n: 0, d: size });
                }
            }
            Statement::If { condition, consequent, alternative, .. } => {
                let alt_label = self.new_label();
                let end_label = self.new_label();
                self.gen_expr(condition)?;
                self.emit(Instruction::JumpIfLabel(tam::FALSE_REP, alt_label));
                if let Some(consequent) = consequent {
                    self.gen_stmt(consequent)?;
                }
                self.emit(Instruction::JumpLabel(end_label));
                self.emit(Instruction::Label(alt_label));
                if let Some(alternative) = alternative {
                    self.gen_stmt(alternative)?;
                }
                self.emit(Instruction::Label(end_label));
            }
            Statement::While { condition, body, .. } => {
                let top_label = self.new_label();
                let exit_label = self.new_label();
                self.emit(Instruction::Label(top_label));
                self.gen_expr(condition)?;
                self.emit(Instruction::JumpIfLabel(tam::FALSE_REP, exit_label));
                self.gen_stmt(body)?;
                self.emit(Instruction::JumpLabel(top_label));
                self.emit(Instruction::Label(exit_label));
            }
            Statement::LoopWhile { condition, loop_body, do_body, .. } => {
                let top_label = self.new_label();
                let exit_label = self.new_label();
                self.emit(Instruction::Label(top_label));
                self.gen_stmt(loop_body)?;
                self.gen_expr(condition)?;
                self.emit(Instruction::JumpIfLabel(tam::FALSE_REP, exit_label));
                self.gen_stmt(do_body)?;
                self.emit(Instruction::JumpLabel(top_label));
                self.emit(Instruction::Label(exit_label));
            }
            Statement::RepeatWhile { condition, body, .. } => {
                let top_label = self.new_label();
                self.emit(Instruction::Label(top_label));
                self.gen_stmt(body)?;
                self.gen_expr(condition)?;
                self.emit(Instruction::JumpIfLabel(tam::TRUE_REP, top_label));
            }
            Statement::RepeatUntil { condition, body, .. } => {
                let top_label = self.new_label();
                self.emit(Instruction::Label(top_label));
                self.gen_stmt(body)?;
                self.gen_expr(condition)?;
                self.emit(Instruction::JumpIfLabel(tam::FALSE_REP, top_label));
            }
            Statement::Noop { .. } => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Emits allocation code for a declaration list, binding each name at
    /// its stack offset. Returns the number of words the stack grew by.
    fn allocate_declarations(&mut self, declarations: &[Declaration]) -> Result<i32, CodegenError> {
        let mut allocated = 0;
        for declaration in declarations {
            match declaration {
                Declaration::Const { name, value, .. } => {
                    self.gen_expr(value)?;
                    let size = value.ty().base_type().size();
                    let offset = self.vars.local_aux();
                    self.vars.add(name.clone(), offset);
                    self.vars.set_local_aux(offset + size);
                    allocated += size;
                }
                Declaration::Var { name, ty, .. } => {
                    let size = ty.as_ref().expect("declaration not annotated").size();
                    self.emit_tam(tam::Instruction::Push { d: size });
                    let offset = self.vars.local_aux();
                    self.vars.add(name.clone(), offset);
                    self.vars.set_local_aux(offset + size);
                    allocated += size;
                }
                Declaration::Type { .. } => {}
                Declaration::Proc { name, parameters, body, .. } => {
                    self.gen_routine(name, parameters, RoutineBody::Proc(body))?;
                }
                Declaration::Func { name, parameters, body, .. } => {
                    self.gen_routine(name, parameters, RoutineBody::Func(body))?;
                }
            }
        }
        Ok(allocated)
    }

    fn gen_routine(
        &mut self,
        name: &str,
        parameters: &[Parameter],
        body: RoutineBody<'_>,
    ) -> Result<(), CodegenError> {
        let skip_label = self.new_label();
        let entry_label = self.new_label();
        self.emit(Instruction::JumpLabel(skip_label));
        self.emit(Instruction::Label(entry_label));

        // bound before the body is lowered so recursive calls resolve
        self.callables.add(name.to_string(), Callable::Static(entry_label));

        // the frame starts past the link data; parameters sit below the
        // frame base, the last one closest to it
        self.vars.enter_scope(tam::LINK_DATA_SIZE);
        self.callables.enter_scope(());

        let mut params_size = 0;
        let mut offset = 0;
        for parameter in parameters.iter().rev() {
            let size = parameter_size(parameter);
            offset -= size;
            params_size += size;
            match parameter {
                Parameter::Value { name, .. } | Parameter::Var { name, .. } => {
                    self.vars.add(name.clone(), offset);
                }
                Parameter::Func { name, .. } => {
                    self.callables.add(name.clone(), Callable::Dynamic(offset));
                }
            }
        }

        let return_size = match body {
            RoutineBody::Func(expression) => {
                self.gen_expr(expression)?;
                expression.ty().base_type().size()
            }
            RoutineBody::Proc(statement) => {
                self.gen_stmt(statement)?;
                0
            }
        };
        self.emit_tam(tam::Instruction::Return { n: return_size, d: params_size });

        self.callables.exit_scope();
        self.vars.exit_scope();
        self.emit(Instruction::Label(skip_label));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn gen_expr(&mut self, expression: &Expression) -> Result<(), CodegenError> {
        match expression {
            Expression::LitBool { value, .. } => {
                let rep = if *value { tam::TRUE_REP } else { tam::FALSE_REP };
                self.emit_tam(tam::Instruction::LoadL { d: rep });
            }
            Expression::LitInt { value, .. } => {
                self.emit_tam(tam::Instruction::LoadL { d: *value });
            }
            Expression::LitChar { value, .. } => {
                self.emit_tam(tam::Instruction::LoadL { d: *value as i32 });
            }
            Expression::LitArray { elements, .. } => {
                for element in elements {
                    self.gen_expr(element)?;
                }
            }
            Expression::LitRecord { fields, .. } => {
                // field values are laid out in the canonical order of the
                // record type, not source order
                let mut ordered: Vec<&RecordField> = fields.iter().collect();
                ordered.sort_by(|a, b| a.name.cmp(&b.name));
                for field in ordered {
                    self.gen_expr(&field.value)?;
                }
            }
            Expression::Identifier(identifier) => self.gen_fetch(identifier)?,
            Expression::UnaryOp { operator, operand, .. } => {
                self.gen_expr(operand)?;
                self.gen_call_tail(operator, Some(operand.ty().base_type()))?;
            }
            Expression::BinaryOp { operator, left, right, .. } => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                self.gen_call_tail(operator, Some(left.ty().base_type()))?;
            }
            Expression::IfExpression { condition, consequent, alternative, .. } => {
                let alt_label = self.new_label();
                let end_label = self.new_label();
                self.gen_expr(condition)?;
                self.emit(Instruction::JumpIfLabel(tam::FALSE_REP, alt_label));
                self.gen_expr(consequent)?;
                self.emit(Instruction::JumpLabel(end_label));
                self.emit(Instruction::Label(alt_label));
                self.gen_expr(alternative)?;
                self.emit(Instruction::Label(end_label));
            }
            Expression::LetExpression { declarations, expression, .. } => {
                let saved_top = self.vars.local_aux();
                let allocated = self.allocate_declarations(declarations)?;
                self.gen_expr(expression)?;
                if allocated > 0 {
                    let result_size = expression.ty().base_type().size();
                    self.emit_tam(tam::Instruction::Pop { n: result_size, d: allocated });
                }
                self.vars.set_local_aux(saved_top);
            }
            Expression::FunCall { callee, arguments, .. } => {
                for argument in arguments {
                    self.gen_argument(argument)?;
                }
                let first_ty = arguments.first().map(|a| a.ty().base_type());
                self.gen_call_tail(callee, first_ty)?;
            }
            Expression::Sequence { statement, expression, .. } => {
                self.gen_stmt(statement)?;
                self.gen_expr(expression)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Emits the call itself; the arguments are already on the stack.
    fn gen_call_tail(
        &mut self,
        name: &str,
        first_arg: Option<&Type>,
    ) -> Result<(), CodegenError> {
        // Char and Integer share a representation, so the conversions
        // compile to nothing
        if name == "chr" || name == "ord" {
            return Ok(());
        }

        // the equality primitive takes a trailing size word invisible to
        // user code
        if name == "=" || name == "\\=" {
            let size = first_arg.map(Type::size).unwrap_or(0);
            self.emit_tam(tam::Instruction::LoadL { d: size });
        }

        let (callable, depth) = self
            .callables
            .lookup_with_depth(name)
            .map(|(callable, depth)| (*callable, depth))
            .expect("callable bound during analysis");

        match callable {
            Callable::Static(label) => {
                let static_link = self.display_register(depth)?;
                self.emit(Instruction::CallLabel(static_link, label));
            }
            Callable::Primitive(primitive) => self.call_primitive(primitive),
            Callable::Dynamic(offset) => {
                let register = self.display_register(depth)?;
                self.emit_tam(tam::Instruction::Load {
                    n: 1,
                    addr: Address::new(register, offset),
                });
                self.emit_tam(tam::Instruction::Load {
                    n: 1,
                    addr: Address::new(register, offset + 1),
                });
                self.emit_tam(tam::Instruction::CallI);
            }
        }
        Ok(())
    }

    fn gen_argument(&mut self, argument: &Argument) -> Result<(), CodegenError> {
        match argument {
            Argument::Expression(expression) => self.gen_expr(expression)?,
            Argument::Var { var, .. } => {
                // exactly one address word is passed, however the variable
                // itself is reached
                self.gen_location(var, true)?;
            }
            Argument::Func { func, .. } => {
                let (callable, depth) = self
                    .callables
                    .lookup_with_depth(func)
                    .map(|(callable, depth)| (*callable, depth))
                    .expect("callable bound during analysis");

                match callable {
                    Callable::Static(label) => {
                        let register = self.display_register(depth)?;
                        self.emit_tam(tam::Instruction::LoadA {
                            addr: Address::new(register, 0),
                        });
                        self.emit(Instruction::LoadALabel(label));
                    }
                    Callable::Primitive(primitive) => {
                        // primitives ignore their static link; any valid
                        // address will do
                        self.emit_tam(tam::Instruction::LoadA {
                            addr: Address::new(Register::LB, 0),
                        });
                        self.emit_tam(tam::Instruction::LoadA {
                            addr: Address::new(Register::PB, i32::from(primitive)),
                        });
                    }
                    Callable::Dynamic(offset) => {
                        let register = self.display_register(depth)?;
                        self.emit_tam(tam::Instruction::LoadA {
                            addr: Address::new(register, offset),
                        });
                        self.emit_tam(tam::Instruction::LoadI { n: 1 });
                        self.emit_tam(tam::Instruction::LoadA {
                            addr: Address::new(register, offset + 1),
                        });
                        self.emit_tam(tam::Instruction::LoadI { n: 1 });
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identifier access
    // ------------------------------------------------------------------

    fn lookup_var(&self, name: &str) -> (i32, usize) {
        self.vars
            .lookup_with_depth(name)
            .map(|(offset, depth)| (*offset, depth))
            .expect("variable bound during analysis")
    }

    /// Pushes the identifier's value.
    fn gen_fetch(&mut self, identifier: &Identifier) -> Result<(), CodegenError> {
        let size = identifier.ty().base_type().size();

        if let Identifier::Basic { name, .. } = identifier {
            if !identifier.ty().is_ref() {
                let (offset, depth) = self.lookup_var(name);
                let register = self.display_register(depth)?;
                self.emit_tam(tam::Instruction::Load {
                    n: size,
                    addr: Address::new(register, offset),
                });
                return Ok(());
            }
        }

        self.gen_location(identifier, true)?;
        self.emit_tam(tam::Instruction::LoadI { n: size });
        Ok(())
    }

    /// Pops a value into the identifier's location.
    fn gen_store(&mut self, identifier: &Identifier) -> Result<(), CodegenError> {
        let size = identifier.ty().base_type().size();

        if let Identifier::Basic { name, .. } = identifier {
            if !identifier.ty().is_ref() {
                let (offset, depth) = self.lookup_var(name);
                let register = self.display_register(depth)?;
                self.emit_tam(tam::Instruction::Store {
                    n: size,
                    addr: Address::new(register, offset),
                });
                return Ok(());
            }
        }

        self.gen_location(identifier, true)?;
        self.emit_tam(tam::Instruction::StoreI { n: size });
        Ok(())
    }

    /// Pushes the address of the identifier's storage. With `dereferencing`
    /// set, a reference is followed once so the address of the referred-to
    /// value is produced.
    fn gen_location(
        &mut self,
        identifier: &Identifier,
        dereferencing: bool,
    ) -> Result<(), CodegenError> {
        match identifier {
            Identifier::Basic { name, .. } => {
                let (offset, depth) = self.lookup_var(name);
                let register = self.display_register(depth)?;
                self.emit_tam(tam::Instruction::LoadA {
                    addr: Address::new(register, offset),
                });
                if dereferencing && identifier.ty().is_ref() {
                    self.emit_tam(tam::Instruction::LoadI { n: tam::ADDRESS_SIZE });
                }
            }
            Identifier::ArraySubscript { array, subscript, .. } => {
                self.gen_location(array, true)?;
                self.gen_expr(subscript)?;
                self.emit_tam(tam::Instruction::LoadL { d: element_size(array) });
                self.call_primitive(Primitive::Mult);
                self.call_primitive(Primitive::Add);
            }
            Identifier::RecordAccess { record, field, .. } => {
                self.gen_location(record, true)?;
                let fields = record_fields(record);
                self.gen_field_access(&fields, field)?;
            }
        }
        Ok(())
    }

    /// Adjusts an address already on the stack to point at `field`, working
    /// in the coordinate system of a record with the given (canonical)
    /// fields.
    fn gen_field_access(
        &mut self,
        fields: &[FieldType],
        field: &Identifier,
    ) -> Result<(), CodegenError> {
        match field {
            Identifier::Basic { name, .. } => {
                let offset = Type::field_offset(fields, name);
                if offset != 0 {
                    self.emit_tam(tam::Instruction::LoadL { d: offset });
                    self.call_primitive(Primitive::Add);
                }
            }
            Identifier::ArraySubscript { array, subscript, .. } => {
                self.gen_field_access(fields, array)?;
                self.gen_expr(subscript)?;
                self.emit_tam(tam::Instruction::LoadL { d: element_size(array) });
                self.call_primitive(Primitive::Mult);
                self.call_primitive(Primitive::Add);
            }
            Identifier::RecordAccess { record, field, .. } => {
                self.gen_field_access(fields, record)?;
                let inner_fields = record_fields(record);
                self.gen_field_access(&inner_fields, field)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Builtin helpers
    // ------------------------------------------------------------------

    /// The out-of-line bodies for the builtin callables that are not TAM
    /// primitives, at the labels reserved in the builtin table.
    fn gen_helpers(&mut self) {
        let arg = Address::new(Register::LB, -1);

        // `|` scales its argument by 100
        self.emit(Instruction::Label(Label(0)));
        self.emit_tam(tam::Instruction::Load { n: 1, addr: arg });
        self.emit_tam(tam::Instruction::LoadL { d: 100 });
        self.call_primitive(Primitive::Mult);
        self.emit_tam(tam::Instruction::Return { n: 1, d: 1 });

        // `++` increments
        self.emit(Instruction::Label(Label(1)));
        self.emit_tam(tam::Instruction::Load { n: 1, addr: arg });
        self.emit_tam(tam::Instruction::LoadL { d: 1 });
        self.call_primitive(Primitive::Add);
        self.emit_tam(tam::Instruction::Return { n: 1, d: 1 });

        // `**` squares
        self.emit(Instruction::Label(Label(2)));
        self.emit_tam(tam::Instruction::Load { n: 1, addr: arg });
        self.emit_tam(tam::Instruction::Load { n: 1, addr: arg });
        self.call_primitive(Primitive::Mult);
        self.emit_tam(tam::Instruction::Return { n: 1, d: 1 });
    }
}

enum RoutineBody<'a> {
    Func(&'a Expression),
    Proc(&'a Statement),
}

/// Words an argument for this parameter occupies in the caller's frame.
fn parameter_size(parameter: &Parameter) -> i32 {
    match parameter {
        Parameter::Value { .. } => parameter.ty().base_type().size(),
        Parameter::Var { .. } => tam::ADDRESS_SIZE,
        Parameter::Func { .. } => tam::CLOSURE_SIZE,
    }
}

fn element_size(array: &Identifier) -> i32 {
    match array.ty().base_type() {
        Type::Array(_, element) => element.size(),
        other => unreachable!("subscripted a non-array type {other}"),
    }
}

fn record_fields(record: &Identifier) -> Vec<FieldType> {
    match record.ty().base_type() {
        Type::Record(fields) => fields.clone(),
        other => unreachable!("accessed a field of non-record type {other}"),
    }
}
