pub mod analysis;
pub mod codegen;
pub mod error;
pub mod scope;
pub mod stdenv;
pub mod syntax;
pub mod types;

pub use error::Error;

use analysis::TypeChecker;
use codegen::irgen::IrGen;
use syntax::ast::Statement;
use syntax::lexer::Lexer;
use syntax::parser::Parser;

/// Runs the front end: tokens, AST, then type annotation in place.
pub fn check(source: &str) -> Result<Statement, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut program = Parser::new(tokens).parse_program()?;
    TypeChecker::new()
        .check(&mut program)
        .map_err(Error::Semantic)?;
    Ok(program)
}

/// The whole pipeline: source text to backpatched TAM instructions.
pub fn compile(source: &str) -> Result<Vec<tam::Instruction>, Error> {
    let program = check(source)?;
    let ir = IrGen::generate(&program)?;
    Ok(codegen::backpatch::backpatch(ir))
}
