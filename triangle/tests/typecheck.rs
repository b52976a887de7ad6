use triangle::analysis::TypeChecker;
use triangle::error::{Error, SemanticError};
use triangle::syntax::ast::{Declaration, Statement};
use triangle::syntax::lexer::Lexer;
use triangle::syntax::parser::Parser;
use triangle::types::Type;

fn check(source: &str) -> Result<Statement, Error> {
    triangle::check(source)
}

fn errors(source: &str) -> Vec<SemanticError> {
    match check(source) {
        Err(Error::Semantic(errors)) => errors,
        Ok(_) => panic!("expected semantic errors"),
        Err(e) => panic!("expected semantic errors, got {e}"),
    }
}

#[test]
fn record_types_are_canonicalized() {
    let program = check(
        "let type R ~ record b : Integer, a : Char end; var r : R in r.a := 'X'",
    )
    .unwrap();

    let Statement::Let { declarations, .. } = program else {
        panic!("expected a let statement");
    };
    let Declaration::Var { ty: Some(Type::Record(fields)), .. } = &declarations[1] else {
        panic!("expected an annotated var declaration");
    };

    // canonical form sorts fields by name, whatever the source order
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(fields[0].ty, Type::Char);
    assert_eq!(fields[1].ty, Type::Int);
}

#[test]
fn equivalent_records_in_different_field_order() {
    // both sides resolve to the same canonical record type, so the
    // polymorphic equality accepts them
    let source = "let
        type A ~ record x : Integer, y : Char end;
        type B ~ record y : Char, x : Integer end;
        var a : A;
        var b : B
    in while a = b do puteol()";
    assert!(check(source).is_ok());
}

#[test]
fn conditions_must_be_boolean() {
    let errs = errors("while 1 do puteol()");
    assert!(matches!(errs[0], SemanticError::TypeError { .. }));

    let errs = errors("if 'c' then puteol() else puteol()");
    assert!(matches!(errs[0], SemanticError::TypeError { .. }));
}

#[test]
fn empty_literals_are_semantic_errors() {
    let errs = errors("let var a : array 3 of Integer in a := []");
    assert!(matches!(errs[0], SemanticError::EmptyLiteral { .. }));

    let errs = errors("let type R ~ record x : Integer end; var r : R in r := {}");
    assert!(matches!(errs[0], SemanticError::EmptyLiteral { .. }));
}

#[test]
fn functions_are_not_values() {
    let errs = errors("let func f(n : Integer) : Integer is n in putint(f)");
    assert!(errs
        .iter()
        .any(|e| matches!(e, SemanticError::FunctionResult { .. })));
}

#[test]
fn recursion_resolves_through_the_optimistic_binding() {
    let source = "let func f(n : Integer) : Integer is
            if n = 0 then 1 else n * f(n - 1)
        in putint(f(5))";
    assert!(check(source).is_ok());
}

#[test]
fn duplicate_record_fields_are_rejected() {
    let errs = errors("let type R ~ record a : Integer, a : Char end; var r : R in r.a := 1");
    assert!(errs
        .iter()
        .any(|e| matches!(e, SemanticError::DuplicateRecordTypeField { .. })));
}

#[test]
fn undeclared_names_are_reported() {
    let errs = errors("putint(x)");
    assert!(matches!(errs[0], SemanticError::UndeclaredUse { ref name, .. } if name == "x"));

    let errs = errors("let var v : Mystery in v := v");
    assert!(matches!(errs[0], SemanticError::UndeclaredType { ref name } if name == "Mystery"));
}

#[test]
fn arity_is_checked_at_calls() {
    let errs = errors("putint(1, 2)");
    assert!(matches!(
        errs[0],
        SemanticError::ArityMismatch { expected: 1, got: 2, .. }
    ));
}

#[test]
fn statements_are_recovery_boundaries() {
    let errs = errors("begin putint(x); putint(y); putint(1) end");
    assert_eq!(errs.len(), 2);
}

#[test]
fn equality_is_polymorphic_over_equal_base_types() {
    assert!(check("while 1 = 2 do puteol()").is_ok());
    assert!(check("while 'a' \\= 'b' do puteol()").is_ok());

    let source = "let type P ~ record x : Integer end; var p : P; var q : P
        in while p = q do puteol()";
    assert!(check(source).is_ok());
}

#[test]
fn equality_rejects_mismatched_base_types() {
    let errs = errors("while 1 = 'c' do puteol()");
    assert!(matches!(errs[0], SemanticError::TypeError { .. }));
}

#[test]
fn if_expression_branches_must_agree() {
    let errs = errors("putint(if true then 1 else 'c')");
    assert!(matches!(errs[0], SemanticError::TypeError { .. }));
}

#[test]
fn function_bodies_must_match_their_declared_return() {
    let errs = errors("let func f(n : Integer) : Integer is 'c' in putint(f(1))");
    assert!(matches!(errs[0], SemanticError::TypeError { .. }));
}

#[test]
fn array_subscripts() {
    assert!(check("let var a : array 3 of Integer; var i : Integer in a[i] := 4").is_ok());

    let errs = errors("let var a : array 3 of Integer in a['x'] := 4");
    assert!(matches!(errs[0], SemanticError::TypeError { .. }));

    let errs = errors("let var n : Integer in n[0] := 4");
    assert!(matches!(errs[0], SemanticError::TypeError { .. }));
}

#[test]
fn var_parameters_thread_references() {
    let source = "let proc bump(var n : Integer) ~ n := n + 1; var k : Integer
        in bump(var k)";
    assert!(check(source).is_ok());
}

#[test]
fn subscripting_a_reference_preserves_mutability() {
    let source = "let proc fill(var a : array 2 of Integer) ~ a[0] := 9;
        var xs : array 2 of Integer
    in fill(var xs)";
    assert!(check(source).is_ok());
}

#[test]
fn rechecking_is_idempotent() {
    let tokens = Lexer::new("let var n : Integer in begin n := 1; putint(n * 2) end")
        .tokenize()
        .unwrap();
    let mut program = Parser::new(tokens).parse_program().unwrap();

    TypeChecker::new().check(&mut program).unwrap();
    let first = program.clone();
    TypeChecker::new().check(&mut program).unwrap();
    assert_eq!(program, first);
}

#[test]
fn every_literal_node_is_annotated() {
    let program = check("putint(1 + ord('c'))").unwrap();
    let Statement::Expression { expression, .. } = &program else {
        panic!("expected an expression statement");
    };
    // the call annotates to its return type
    assert_eq!(*expression.ty(), Type::Void);
}
