//! End-to-end runs through the builder surface: forward references, duplicates, cycles and
//! the undefined check.

use cilasm::prelude::*;

fn location(line: u32) -> Location {
    Location::new(line, 1).in_file("test.il")
}

fn errors_with(output: &AssemblyOutput, code: DiagnosticCode) -> usize {
    output.diagnostics.by_code(code).len()
}

#[test]
fn reference_and_definition_share_one_token() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);
    let early = asm.local_type("Foo", Some(location(3)));

    asm.begin_method(MethodDefinition::new("Touch", void).with_flags(MethodAttributes::STATIC))
        .unwrap();
    asm.emit("ldtoken", Operand::Token(TokenOperand::Type(early)))
        .unwrap();
    asm.emit("pop", Operand::None).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    asm.begin_class(TypeDefinition::new("Foo").at_location(location(9)))
        .unwrap();
    asm.end_class().unwrap();
    assert_eq!(asm.local_type("Foo", None), early);

    let output = asm.assemble();
    assert!(output.is_success(), "{}", output.diagnostics.summary());
    let module = output.module.unwrap();
    assert_eq!(module.tables.type_def.len(), 2);

    // ldtoken 0x02000002, pop, ret
    let body = &module.bodies[0];
    assert_eq!(body.code, vec![0xD0, 0x02, 0x00, 0x00, 0x02, 0x26, 0x2A]);
    assert!(body.is_tiny());
}

#[test]
fn field_used_before_its_declaration() {
    let mut asm = ModuleAssembler::default();
    let int32 = asm.primitive(PrimitiveType::I4);

    asm.begin_class(TypeDefinition::new("Counter")).unwrap();
    let owner = asm.local_type("Counter", None);
    let count = asm.field_ref(owner, FieldRefSignature::new("count", int32), Some(location(4)));
    asm.begin_method(MethodDefinition::new("Get", int32).with_flags(MethodAttributes::STATIC))
        .unwrap();
    asm.emit("ldsfld", Operand::Field(count)).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();
    asm.add_field(FieldDefinition::new("count", int32).with_flags(FieldAttributes::STATIC))
        .unwrap();
    asm.end_class().unwrap();

    let module = asm.assemble().into_result().unwrap();
    assert_eq!(module.tables.field.len(), 1);
    assert!(module.tables.member_ref.is_empty());
    assert_eq!(module.bodies[0].code, vec![0x7E, 0x01, 0x00, 0x00, 0x04, 0x2A]);
}

#[test]
fn duplicate_class_keeps_the_first() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);

    asm.begin_class(TypeDefinition::new("Foo").at_location(location(1)))
        .unwrap();
    asm.end_class().unwrap();

    let second = asm.begin_class(TypeDefinition::new("Foo").at_location(location(5)));
    assert!(matches!(second, Err(Error::DuplicateDefinition { kind: SymbolKind::Type, .. })));
    asm.begin_method(MethodDefinition::new("M", void)).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();
    asm.end_class().unwrap();

    let definitions = asm.context().definitions();
    assert_eq!(definitions.types.len(), 2);
    assert_eq!(definitions.discarded.len(), 1);
    assert_eq!(definitions.discarded[0].methods.len(), 1);
    let foo = definitions.type_def(definitions.find_type("Foo").unwrap()).unwrap();
    assert!(foo.methods.is_empty());

    let output = asm.assemble();
    assert_eq!(output.diagnostics.error_count(), 1);
    assert_eq!(errors_with(&output, DiagnosticCode::DuplicateDefinition), 1);
    let duplicate = output.diagnostics.errors()[0];
    assert_eq!(duplicate.locations, vec![location(5)]);
}

#[test]
fn nested_class_of_a_duplicate_is_dropped() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);

    asm.begin_class(TypeDefinition::new("Outer")).unwrap();
    asm.end_class().unwrap();

    assert!(asm.begin_class(TypeDefinition::new("Outer")).is_err());
    let inner = asm.begin_class(TypeDefinition::new("Inner"));
    assert!(matches!(
        inner,
        Err(Error::DuplicateDefinition { kind: SymbolKind::Type, ref name }) if name == "Outer"
    ));
    assert_eq!(asm.current_target(), None);
    asm.begin_method(MethodDefinition::new("M", void)).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();
    asm.end_class().unwrap();
    asm.end_class().unwrap();

    let definitions = asm.context().definitions();
    assert_eq!(definitions.find_type("Outer/Inner"), None);
    assert_eq!(definitions.discarded.len(), 2);
    assert_eq!(definitions.discarded[1].full_name, "Outer/Inner");
    assert_eq!(definitions.discarded[1].methods.len(), 1);

    let output = asm.assemble();
    assert_eq!(output.diagnostics.error_count(), 1);
    assert_eq!(errors_with(&output, DiagnosticCode::DuplicateDefinition), 1);
    assert!(output.module.is_none());
}

#[test]
fn class_extending_itself_is_circular() {
    let mut asm = ModuleAssembler::default();
    let this = asm.local_type("Loop", None);
    asm.begin_class(TypeDefinition::new("Loop").extends(this).at_location(location(2)))
        .unwrap();
    asm.end_class().unwrap();

    let output = asm.assemble();
    assert!(!output.is_success());
    assert_eq!(output.diagnostics.error_count(), 1);
    assert_eq!(errors_with(&output, DiagnosticCode::CircularDefinition), 1);
}

#[test]
fn mutual_inheritance_is_reported_once() {
    let mut asm = ModuleAssembler::default();
    let a = asm.local_type("A", None);
    let b = asm.local_type("B", None);
    asm.begin_class(TypeDefinition::new("A").extends(b)).unwrap();
    asm.end_class().unwrap();
    asm.begin_class(TypeDefinition::new("B").extends(a)).unwrap();
    asm.end_class().unwrap();

    let output = asm.assemble();
    assert_eq!(errors_with(&output, DiagnosticCode::CircularDefinition), 1);
    assert!(!output.is_success());
}

#[test]
fn every_undefined_symbol_is_reported_with_all_locations() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);

    asm.local_type("Missing", Some(location(2)));
    asm.local_type("Missing", Some(location(7)));

    asm.begin_class(TypeDefinition::new("Foo")).unwrap();
    asm.end_class().unwrap();
    let foo = asm.local_type("Foo", None);
    asm.method_ref(foo, MethodRefSignature::new("Gone", void, Vec::new()), Some(location(11)));

    let output = asm.assemble();
    assert_eq!(output.diagnostics.error_count(), 2);
    assert_eq!(errors_with(&output, DiagnosticCode::UndefinedSymbol), 2);

    let errors = output.diagnostics.errors();
    let missing = errors
        .iter()
        .find(|error| error.message.ends_with("Missing"))
        .unwrap();
    assert_eq!(missing.locations, vec![location(2), location(7)]);
    let gone = errors
        .iter()
        .find(|error| error.message.contains("Foo::"))
        .unwrap();
    assert!(gone.message.contains("Gone"));
    assert_eq!(gone.locations, vec![location(11)]);
}

#[test]
fn vararg_call_site_becomes_member_ref_on_the_definition() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);
    let int32 = asm.primitive(PrimitiveType::I4);
    let float64 = asm.primitive(PrimitiveType::R8);

    asm.begin_method(
        MethodDefinition::new("Log", void)
            .with_flags(MethodAttributes::STATIC)
            .with_param(ParamDefinition::named("count", int32))
            .vararg(),
    )
    .unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let module_type = asm.module_type();
    let call = MethodRefSignature::new("Log", void, vec![int32]).with_vararg_tail(vec![float64; 3]);
    let log = asm.method_ref(module_type, call, None);
    let plain = asm.method_ref(
        module_type,
        MethodRefSignature::new("Log", void, vec![int32]).vararg(),
        None,
    );
    assert_ne!(log, plain);

    asm.begin_method(MethodDefinition::new("Main", void).with_flags(MethodAttributes::STATIC))
        .unwrap();
    asm.entry_point().unwrap();
    asm.emit("ldc.i4.3", Operand::None).unwrap();
    for value in [1.0, 2.0, 3.0] {
        asm.emit("ldc.r8", Operand::Real(value)).unwrap();
    }
    asm.emit("call", Operand::Method(log)).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let output = asm.assemble();
    assert!(output.is_success(), "{}", output.diagnostics.summary());
    let module = output.module.unwrap();

    assert_eq!(module.tables.method_def.len(), 2);
    assert_eq!(module.tables.member_ref.len(), 1);
    let row = &module.tables.member_ref[0];
    assert_eq!(row.class, Token::new(0x0600_0001));
    assert_eq!(
        module.tables.blobs.get(row.signature).unwrap(),
        &[0x05, 0x04, 0x01, 0x08, 0x41, 0x0D, 0x0D, 0x0D]
    );
    assert_eq!(module.entry_point, Some(Token::new(0x0600_0002)));
}

#[test]
fn strict_mode_needs_declared_externals() {
    let mut asm = ModuleAssembler::new(AssemblerConfig::strict());
    asm.begin_class(TypeDefinition::new("Foo")).unwrap();
    asm.end_class().unwrap();

    let output = asm.assemble();
    assert_eq!(errors_with(&output, DiagnosticCode::UnknownExternal), 1);

    let mut asm = ModuleAssembler::new(AssemblerConfig::strict());
    asm.assembly_extern(&ExternAssembly::new("mscorlib").with_version(4, 0, 0, 0));
    asm.begin_class(TypeDefinition::new("Foo")).unwrap();
    asm.end_class().unwrap();

    let module = asm.assemble().into_result().unwrap();
    assert_eq!(module.tables.assembly_ref.len(), 1);
    assert_eq!(module.tables.type_ref.len(), 1);
}

#[test]
fn failures_are_independent() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);

    asm.begin_class(TypeDefinition::new("Good")).unwrap();
    asm.begin_method(MethodDefinition::new("Jump", void).with_flags(MethodAttributes::STATIC))
        .unwrap();
    let nowhere = asm.label("NOWHERE").unwrap();
    asm.emit("br", Operand::Label(nowhere)).unwrap();
    asm.end_method().unwrap();
    asm.end_class().unwrap();

    asm.local_type("Unknown", Some(location(30)));

    let output = asm.assemble();
    assert_eq!(output.diagnostics.error_count(), 2);
    assert_eq!(errors_with(&output, DiagnosticCode::UndefinedLabel), 1);
    assert_eq!(errors_with(&output, DiagnosticCode::UndefinedSymbol), 1);
    assert!(matches!(output.into_result(), Err(Error::AssemblyFailed(2))));
}

#[test]
fn empty_body_gets_a_ret_when_lenient() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);
    asm.begin_method(MethodDefinition::new("Nothing", void).with_flags(MethodAttributes::STATIC))
        .unwrap();
    asm.end_method().unwrap();

    let output = asm.assemble();
    assert!(output.is_success(), "{}", output.diagnostics.summary());
    assert_eq!(output.diagnostics.warning_count(), 1);
    assert!(output.diagnostics.warnings()[0].message.contains("Nothing"));
    let module = output.module.unwrap();
    assert_eq!(module.bodies[0].code, vec![0x2A]);
}

#[test]
fn empty_body_is_malformed_when_strict() {
    let mut asm = ModuleAssembler::new(AssemblerConfig::strict());
    let void = asm.primitive(PrimitiveType::Void);
    asm.begin_method(
        MethodDefinition::new("Nothing", void)
            .with_flags(MethodAttributes::STATIC)
            .at_location(location(4)),
    )
    .unwrap();
    asm.end_method().unwrap();

    let output = asm.assemble();
    assert!(!output.is_success());
    let malformed = output.diagnostics.by_code(DiagnosticCode::MalformedBody);
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].locations, vec![location(4)]);
    assert_eq!(output.diagnostics.warning_count(), 0);
}

#[test]
fn static_and_instance_overloads_are_distinct() {
    let mut asm = ModuleAssembler::default();
    let void = asm.primitive(PrimitiveType::Void);

    asm.begin_class(TypeDefinition::new("Foo")).unwrap();
    let foo = asm.local_type("Foo", None);
    for flags in [MethodAttributes::empty(), MethodAttributes::STATIC] {
        asm.begin_method(MethodDefinition::new("M", void).with_flags(flags))
            .unwrap();
        asm.emit("ret", Operand::None).unwrap();
        asm.end_method().unwrap();
    }
    let shape = MethodRefSignature::new("M", void, vec![]);
    let on_instance = asm.method_ref(foo, shape.clone().instance(), None);
    let on_type = asm.method_ref(foo, shape, None);

    asm.begin_method(MethodDefinition::new("Main", void).with_flags(MethodAttributes::STATIC))
        .unwrap();
    asm.emit("ldnull", Operand::None).unwrap();
    asm.emit("call", Operand::Method(on_instance)).unwrap();
    asm.emit("call", Operand::Method(on_type)).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();
    asm.end_class().unwrap();

    let output = asm.assemble();
    assert!(output.is_success(), "{}", output.diagnostics.summary());
    let module = output.module.unwrap();
    assert_eq!(module.tables.method_def.len(), 3);
    assert!(module.tables.member_ref.is_empty());
    let main = module.body(Token::new(0x0600_0003)).unwrap();
    assert_eq!(
        main.code,
        vec![0x14, 0x28, 0x01, 0x00, 0x00, 0x06, 0x28, 0x02, 0x00, 0x00, 0x06, 0x2A]
    );
}
