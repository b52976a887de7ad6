use tam::{Address, Instruction, Primitive, Register};
use triangle::codegen::ir;
use triangle::codegen::irgen::IrGen;
use triangle::error::{CodegenError, Error};

fn compile(source: &str) -> Vec<Instruction> {
    triangle::compile(source).unwrap()
}

fn contains_seq(haystack: &[Instruction], needle: &[Instruction]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn prim_call(primitive: Primitive) -> Instruction {
    Instruction::Call {
        static_link: Register::SB,
        addr: Address::new(Register::PB, i32::from(primitive)),
    }
}

#[test]
fn put_and_puteol() {
    let instructions = compile("begin put('A'); puteol() end");
    assert_eq!(instructions[0], Instruction::LoadL { d: 65 });
    assert_eq!(instructions[1], prim_call(Primitive::Put));
    assert_eq!(instructions[2], prim_call(Primitive::Puteol));
    assert_eq!(instructions[3], Instruction::Halt);
}

#[test]
fn chr_and_ord_compile_to_nothing() {
    let instructions = compile("put(chr(65))");
    assert_eq!(instructions[0], Instruction::LoadL { d: 65 });
    assert_eq!(instructions[1], prim_call(Primitive::Put));
    assert_eq!(instructions[2], Instruction::Halt);
}

#[test]
fn let_allocates_and_pops_its_locals() {
    let instructions = compile("let var n : Integer in putint(n)");
    assert_eq!(instructions[0], Instruction::Push { d: 1 });
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::Load { n: 1, addr: Address::new(Register::LB, 0) },
            prim_call(Primitive::Putint),
            Instruction::Pop { n: 0, d: 1 },
            Instruction::Halt,
        ]
    ));
}

#[test]
fn type_declarations_allocate_nothing() {
    let instructions = compile("let type T ~ Integer in putint(1)");
    assert!(!instructions
        .iter()
        .any(|i| matches!(i, Instruction::Push { .. } | Instruction::Pop { .. })));
}

#[test]
fn let_expression_preserves_its_result() {
    let instructions = compile("putint(let const k ~ 6 in k * 7)");
    assert!(contains_seq(
        &instructions,
        &[
            prim_call(Primitive::Mult),
            Instruction::Pop { n: 1, d: 1 },
            prim_call(Primitive::Putint),
        ]
    ));
}

#[test]
fn reading_into_a_var_argument() {
    let instructions =
        compile("let var n : Integer in begin getint(var n); putint(n * 2); puteol() end");

    // getint receives the address of n
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::LoadA { addr: Address::new(Register::LB, 0) },
            prim_call(Primitive::Getint),
        ]
    ));
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::Load { n: 1, addr: Address::new(Register::LB, 0) },
            Instruction::LoadL { d: 2 },
            prim_call(Primitive::Mult),
            prim_call(Primitive::Putint),
        ]
    ));
}

#[test]
fn parameters_sit_at_negative_offsets_in_reverse_order() {
    let instructions = compile("let proc p(a : Integer, b : Integer) ~ putint(b) in p(1, 2)");
    // the last parameter is closest to the frame base
    assert!(instructions
        .contains(&Instruction::Load { n: 1, addr: Address::new(Register::LB, -1) }));
    assert!(instructions.contains(&Instruction::Return { n: 0, d: 2 }));
}

#[test]
fn recursion_calls_through_the_enclosing_display_register() {
    let source = "let func f(n : Integer) : Integer is
            if n = 0 then 1 else n * f(n - 1)
        in putint(f(5))";
    let instructions = compile(source);

    // the recursive call sites use L1: the defining frame is one static
    // level out from the body
    assert!(instructions.iter().any(|i| matches!(
        i,
        Instruction::Call { static_link: Register::L1, addr } if addr.r == Register::CB
    )));
    assert_eq!(
        instructions.iter().filter(|i| matches!(i, Instruction::Halt)).count(),
        1
    );
}

#[test]
fn code_addresses_stay_in_range() {
    let source = "let func f(n : Integer) : Integer is
            if n = 0 then 1 else n * f(n - 1)
        in putint(f(5))";
    let instructions = compile(source);
    let len = instructions.len() as i32;

    for instruction in &instructions {
        let addr = match instruction {
            Instruction::Jump { addr }
            | Instruction::JumpIf { addr, .. }
            | Instruction::Call { addr, .. }
            | Instruction::LoadA { addr } => addr,
            _ => continue,
        };
        if addr.r == Register::CB {
            assert!(addr.d >= 0 && addr.d < len, "address {addr} out of range");
        }
    }
}

#[test]
fn equality_passes_a_size_word() {
    let instructions = compile("while [1, 2] = [3, 4] do puteol()");
    assert!(contains_seq(
        &instructions,
        &[Instruction::LoadL { d: 2 }, prim_call(Primitive::Eq)]
    ));
}

#[test]
fn record_fields_are_stored_in_canonical_order() {
    let source = "let type R ~ record b : Integer, a : Char end; var r : R in
        begin r.a := 'X'; r.b := 7; put(r.a); putint(r.b) end";
    let instructions = compile(source);

    assert_eq!(instructions[0], Instruction::Push { d: 2 });
    // field a lives at offset 0: a direct store through the record base
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::LoadA { addr: Address::new(Register::LB, 0) },
            Instruction::StoreI { n: 1 },
        ]
    ));
    // field b lives at offset 1 even though it is declared first
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::LoadL { d: 1 },
            prim_call(Primitive::Add),
            Instruction::StoreI { n: 1 },
        ]
    ));
}

#[test]
fn var_arguments_pass_one_address_word() {
    let source = "let proc swap(var x : Integer, var y : Integer) ~
            let var t : Integer in begin t := x; x := y; y := t end;
        var a : Integer; var b : Integer in
        begin a := 1; b := 2; swap(var a, var b); putint(a); putint(b) end";
    let instructions = compile(source);

    // the call site pushes the addresses of a and b
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::LoadA { addr: Address::new(Register::LB, 0) },
            Instruction::LoadA { addr: Address::new(Register::LB, 1) },
        ]
    ));
    // inside swap, reading x follows the reference: address at -2[LB],
    // dereference, then load the value
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::LoadA { addr: Address::new(Register::LB, -2) },
            Instruction::LoadI { n: 1 },
            Instruction::LoadI { n: 1 },
        ]
    ));
    // t is the first local, just past the link data
    assert!(instructions
        .contains(&Instruction::Store { n: 1, addr: Address::new(Register::LB, 3) }));
}

#[test]
fn callable_parameters_are_two_word_closures() {
    let source = "let
        func g(n : Integer) : Integer is n;
        func apply(func h(n : Integer) : Integer) : Integer is h(1)
    in putint(apply(func g))";
    let instructions = compile(source);

    // the closure for g: current frame as static link, code address
    assert!(contains_seq(
        &instructions,
        &[Instruction::LoadA { addr: Address::new(Register::LB, 0) }],
    ));
    assert!(instructions.iter().any(|i| matches!(
        i,
        Instruction::LoadA { addr } if addr.r == Register::CB
    )));
    // calling h loads both closure words and calls indirectly
    assert!(contains_seq(
        &instructions,
        &[
            Instruction::Load { n: 1, addr: Address::new(Register::LB, -2) },
            Instruction::Load { n: 1, addr: Address::new(Register::LB, -1) },
            Instruction::CallI,
        ]
    ));
}

#[test]
fn array_subscripts_scale_by_element_size() {
    let source = "let var a : array 3 of Integer; var i : Integer in
        begin i := 1; a[i] := 42; putint(a[1]) end";
    let instructions = compile(source);

    assert!(contains_seq(
        &instructions,
        &[
            Instruction::LoadL { d: 1 },
            prim_call(Primitive::Mult),
            prim_call(Primitive::Add),
            Instruction::StoreI { n: 1 },
        ]
    ));
}

#[test]
fn nesting_up_to_the_display_reach_compiles() {
    let source = "let
        var x : Integer;
        proc p1() ~
        let proc p2() ~
        let proc p3() ~
        let proc p4() ~
        let proc p5() ~
        let proc p6() ~ x := 1
        in p6()
        in p5()
        in p4()
        in p3()
        in p2()
    in p1()";
    let instructions = compile(source);
    assert!(instructions
        .contains(&Instruction::Store { n: 1, addr: Address::new(Register::L6, 0) }));
}

#[test]
fn nesting_past_the_display_reach_is_rejected() {
    let source = "let
        var x : Integer;
        proc p1() ~
        let proc p2() ~
        let proc p3() ~
        let proc p4() ~
        let proc p5() ~
        let proc p6() ~
        let proc p7() ~ x := 1
        in p7()
        in p6()
        in p5()
        in p4()
        in p3()
        in p2()
    in p1()";
    let result = triangle::compile(source);
    assert!(matches!(
        result,
        Err(Error::Codegen(CodegenError::NestingTooDeep { .. }))
    ));
}

#[test]
fn helper_labels_precede_user_labels() {
    let program = triangle::check("while 1 < 2 do putint(1)").unwrap();
    let pseudo = IrGen::generate(&program).unwrap();

    let halt_at = pseudo
        .iter()
        .position(|i| matches!(i, ir::Instruction::Tam(Instruction::Halt)))
        .unwrap();

    for (index, instruction) in pseudo.iter().enumerate() {
        if let ir::Instruction::Label(label) = instruction {
            if label.0 < 3 {
                assert!(index > halt_at, "helper label {label} before HALT");
            } else {
                assert!(index < halt_at, "user label {label} after HALT");
            }
        }
    }
}

#[test]
fn backpatching_drops_exactly_the_labels() {
    let program = triangle::check("while 1 < 2 do putint(1)").unwrap();
    let pseudo = IrGen::generate(&program).unwrap();
    let labels = pseudo
        .iter()
        .filter(|i| matches!(i, ir::Instruction::Label(_)))
        .count();
    let patched = triangle::codegen::backpatch::backpatch(pseudo.clone());
    assert_eq!(patched.len(), pseudo.len() - labels);
}

#[test]
fn builtin_helpers_live_past_the_halt() {
    let instructions = compile("putint(| 5)");

    // `|` is an out-of-line helper, not a primitive: the call targets the
    // code segment
    assert!(instructions.iter().any(|i| matches!(
        i,
        Instruction::Call { static_link: Register::LB, addr } if addr.r == Register::CB
    )));

    // its body sits after the HALT: load the argument, scale, return
    let halt_at = instructions
        .iter()
        .position(|i| matches!(i, Instruction::Halt))
        .unwrap();
    assert!(contains_seq(
        &instructions[halt_at..],
        &[
            Instruction::Load { n: 1, addr: Address::new(Register::LB, -1) },
            Instruction::LoadL { d: 100 },
            prim_call(Primitive::Mult),
            Instruction::Return { n: 1, d: 1 },
        ]
    ));
}

#[test]
fn expression_statements_pop_their_result() {
    // `n + 1` as a statement computes one word and discards it
    let instructions = compile("let var n : Integer in begin n := 1; n + 1 end");
    assert!(contains_seq(
        &instructions,
        &[prim_call(Primitive::Add), Instruction::Pop { n: 0, d: 1 }]
    ));
}

#[test]
fn loop_forms() {
    let instructions = compile("let var n : Integer in repeat n := n + 1 until n = 10");
    // the backward branch tests against false
    assert!(instructions.iter().any(|i| matches!(
        i,
        Instruction::JumpIf { n: 0, addr } if addr.r == Register::CB
    )));

    let instructions = compile("let var n : Integer in repeat n := n + 1 while n < 10");
    assert!(instructions.iter().any(|i| matches!(
        i,
        Instruction::JumpIf { n: 1, addr } if addr.r == Register::CB
    )));
}
