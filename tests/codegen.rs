use novum::codegen::Codegen;
use novum::ir::{BinaryOp, Function, InstrKind, IrType, Module};
use novum::lexer::Lexer;
use novum::parser::{ast::Item, Parser};
use novum::{compile, Config, Error};

fn unoptimized() -> Config {
    Config {
        optimize: false,
        ..Config::default()
    }
}

fn compile_raw(src: &str) -> Result<Module, Error> {
    compile(src, "test", &unoptimized())
}

fn function<'a>(module: &'a Module, name: &str) -> &'a Function {
    module
        .get_function(name)
        .unwrap_or_else(|| panic!("no function '{}' in module", name))
}

fn instructions(function: &Function) -> Vec<&InstrKind> {
    function
        .body
        .as_ref()
        .map(|body| {
            body.blocks
                .iter()
                .flat_map(|block| block.instructions.iter().map(|instr| &instr.kind))
                .collect()
        })
        .unwrap_or_default()
}

fn calls_to<'a>(function: &'a Function, callee: &str) -> Vec<&'a InstrKind> {
    instructions(function)
        .into_iter()
        .filter(|kind| matches!(kind, InstrKind::Call { callee: c, .. } if c == callee))
        .collect()
}

#[test]
fn undeclared_variable_leaves_function_without_body() {
    let items = Parser::new(Lexer::new("fun f() int { return y }"))
        .parse()
        .unwrap();
    let Item::Function(f) = &items[0] else {
        panic!("expected a function");
    };

    let mut codegen = Codegen::new("test", unoptimized());
    codegen.declare(&f.proto).unwrap();
    assert_eq!(
        codegen.define(f),
        Err(Error::UndefinedSymbol { name: "y".into() })
    );
    assert!(codegen.module().get_function("f").unwrap().body.is_none());
}

#[test]
fn undeclared_variable_aborts_compilation() {
    assert_eq!(
        compile_raw("fun f() int { return y }"),
        Err(Error::UndefinedSymbol { name: "y".into() })
    );
}

#[test]
fn calls_need_exact_arity() {
    let def = "fun add(a int, b int) int { return a + b }\n";

    assert_eq!(
        compile_raw(&format!("{}add(1)", def)),
        Err(Error::ArityMismatch {
            callee: "add".into(),
            expected: 2,
            found: 1,
        })
    );
    assert_eq!(
        compile_raw(&format!("{}add(1, 2, 3)", def)),
        Err(Error::ArityMismatch {
            callee: "add".into(),
            expected: 2,
            found: 3,
        })
    );

    let module = compile_raw(&format!("{}add(1, 2)", def)).unwrap();
    let calls = calls_to(function(&module, "__toplevel"), "add");
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], InstrKind::Call { args, .. } if args.len() == 2));
}

#[test]
fn calling_unknown_function_is_undefined() {
    assert_eq!(
        compile_raw("nowhere(1)"),
        Err(Error::UndefinedSymbol {
            name: "nowhere".into()
        })
    );
}

#[test]
fn argument_kinds_must_match() {
    let err = compile_raw("fun f(a int) int { return a }\nf(1.5)").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn binary_overload_intercepts_float_addition() {
    let module = compile_raw(
        "fun binary + (a float, b float) float { return a }\n\
         fun f(x float, y float) float { return x + y }",
    )
    .unwrap();

    let f = function(&module, "f");
    assert_eq!(calls_to(f, "binary_+").len(), 1);
    assert!(!instructions(f)
        .iter()
        .any(|kind| matches!(kind, InstrKind::Binary { op: BinaryOp::FAdd, .. })));
}

#[test]
fn builtin_operators_apply_when_overload_does_not_match() {
    let module = compile_raw(
        "fun binary + (a float, b float) float { return a }\n\
         fun g(x int, y int) int { return x + y }",
    )
    .unwrap();

    let g = function(&module, "g");
    assert!(calls_to(g, "binary_+").is_empty());
    assert!(instructions(g)
        .iter()
        .any(|kind| matches!(kind, InstrKind::Binary { op: BinaryOp::Add, .. })));
}

#[test]
fn mismatched_overload_is_reported_as_missing() {
    let err = compile_raw(
        "fun binary + (a float, b float) float { return a }\n\
         fun g(s string, t string) string { return s + t }",
    )
    .unwrap_err();
    assert!(matches!(err, Error::MissingOverload { ref name, .. } if name == "binary_+"));
}

#[test]
fn string_concatenation_is_rejected() {
    assert_eq!(
        compile_raw("fun g(s string, t string) string { return s + t }"),
        Err(Error::TypeMismatch {
            message: "string concatenation is not supported".into()
        })
    );
}

#[test]
fn operands_of_different_kinds_are_rejected() {
    let err = compile_raw("fun g(a int, b float) float { return b * a }").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn unary_operators_resolve_to_functions() {
    let module = compile_raw(
        "fun unary - (x float) float { return 0.0 - x }\n\
         fun neg(y float) float { return -y }",
    )
    .unwrap();
    assert_eq!(calls_to(function(&module, "neg"), "unary_-").len(), 1);

    let err = compile_raw("fun neg(y int) int { return -y }").unwrap_err();
    assert!(matches!(err, Error::MissingOverload { ref name, .. } if name == "unary_-"));
}

#[test]
fn return_kind_must_match() {
    let err = compile_raw("fun f() int { return 1.5 }").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));

    let err = compile_raw("fun f() int { return }").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn unknown_type_names_are_unsupported() {
    assert_eq!(
        compile_raw("fun f(c char) int { return 1 }"),
        Err(Error::UnsupportedType {
            name: "char".into()
        })
    );
}

#[test]
fn declare_then_define_keeps_one_function() {
    let module = compile_raw(
        "@ fun f(a int) int\n\
         fun f(a int) int { return a }\n\
         f(1)",
    )
    .unwrap();

    assert_eq!(module.functions.iter().filter(|f| f.name == "f").count(), 1);
    assert!(function(&module, "f").body.is_some());
}

#[test]
fn conflicting_declarations_are_redefinitions() {
    assert_eq!(
        compile_raw("@ f(a int) int\nfun f(a float) int { return 1 }"),
        Err(Error::Redefinition { name: "f".into() })
    );
    assert_eq!(
        compile_raw("fun f() int { return 1 }\nfun f() int { return 2 }"),
        Err(Error::Redefinition { name: "f".into() })
    );
}

#[test]
fn runtime_names_must_keep_their_signatures() {
    assert_eq!(
        compile_raw("fun abort() int { return 1 }\nfun d(a float, b float) float { return a / b }"),
        Err(Error::Redefinition {
            name: "abort".into()
        })
    );
    assert_eq!(
        compile_raw("@ puts(x int) int"),
        Err(Error::Redefinition {
            name: "puts".into()
        })
    );

    let module = compile_raw(
        "@ puts(s string) int\n\
         fun d(a float, b float) float { puts(\"dividing\") return a / b }",
    )
    .unwrap();
    assert_eq!(module.functions.len(), 2);
}

#[test]
fn runtime_routines_are_not_user_functions() {
    let module = compile_raw("fun d(a float, b float) float { return a / b }").unwrap();
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.runtime.len(), 2);
}

#[test]
fn string_literals_are_interned_with_newlines() {
    let module = compile_raw(
        r#"@ say(s string) int
say("hi\n")
say("hi\n")
say("bye")"#,
    )
    .unwrap();

    assert_eq!(module.strings, vec!["hi\n".to_owned(), "bye".to_owned()]);
}

#[test]
fn top_level_statements_share_one_function() {
    let module = compile_raw("@ put(x int) int\nput(1)\nput(2)").unwrap();
    let toplevel = function(&module, "__toplevel");

    assert_eq!(toplevel.ret, IrType::Void);
    assert_eq!(calls_to(toplevel, "put").len(), 2);
}

#[test]
fn sequence_literals_must_be_homogeneous() {
    let err = compile_raw("@ put(x int) int\nfor x in [1, 2.5] { put(x) }").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}
