//! Label and exception region resolution in method bodies.

use cilasm::prelude::*;

fn open_static(asm: &mut ModuleAssembler, name: &str) {
    let void = asm.primitive(PrimitiveType::Void);
    asm.begin_method(MethodDefinition::new(name, void).with_flags(MethodAttributes::STATIC))
        .unwrap();
}

fn assemble_body(asm: ModuleAssembler) -> MethodBody {
    let output = asm.assemble();
    assert!(output.is_success(), "{}", output.diagnostics.summary());
    output.module.unwrap().bodies.remove(0)
}

#[test]
fn forward_and_backward_branches() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Loop");

    let top = asm.define_label("TOP").unwrap();
    asm.emit("nop", Operand::None).unwrap();
    let end = asm.label("END").unwrap();
    asm.emit("br.s", Operand::Label(end)).unwrap();
    asm.emit("br.s", Operand::Label(top)).unwrap();
    assert_eq!(asm.define_label("END").unwrap(), end);
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let body = assemble_body(asm);
    // nop; br.s +2; br.s -5; ret
    assert_eq!(body.code, vec![0x00, 0x2B, 0x02, 0x2B, 0xFB, 0x2A]);
}

#[test]
fn labels_at_one_offset_collapse() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Twice");
    asm.emit("nop", Operand::None).unwrap();
    asm.define_label("A").unwrap();
    asm.define_label("B").unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let body = assemble_body(asm);
    assert_eq!(body.labels.len(), 1);
    assert_eq!(body.labels[0].offset, 1);
    assert_eq!(body.labels[0].names, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn switch_targets_are_relative_to_the_end() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Dispatch");
    let a = asm.label("A").unwrap();
    let b = asm.label("B").unwrap();
    asm.emit("ldc.i4.0", Operand::None).unwrap();
    asm.emit("switch", Operand::Switch(vec![a, b])).unwrap();
    asm.define_label("A").unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.define_label("B").unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let body = assemble_body(asm);
    assert_eq!(
        body.code,
        vec![0x16, 0x45, 2, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0x2A, 0x2A]
    );
}

#[test]
fn offset_labels_must_hit_an_instruction() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Raw");
    let body = asm.body_mut().unwrap();
    let target = body.offset_label(5);
    body.emit("br", Operand::Label(target)).unwrap();
    body.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();
    let code = assemble_body(asm).code;
    assert_eq!(code, vec![0x38, 0, 0, 0, 0, 0x2A]);

    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Misaligned");
    let body = asm.body_mut().unwrap();
    let target = body.offset_label(3);
    body.emit("br", Operand::Label(target)).unwrap();
    body.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();
    let output = asm.assemble();
    assert_eq!(output.diagnostics.error_count(), 1);
}

#[test]
fn undefined_label_names_the_label() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Lost");
    let nowhere = asm.label("NOWHERE").unwrap();
    asm.emit("brtrue", Operand::Label(nowhere)).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let output = asm.assemble();
    let errors = output.diagnostics.by_code(DiagnosticCode::UndefinedLabel);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("NOWHERE"));
    assert!(!output.is_success());
}

#[test]
fn duplicate_label_is_rejected() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Again");
    asm.define_label("L").unwrap();
    asm.emit("nop", Operand::None).unwrap();
    assert!(matches!(asm.define_label("L"), Err(Error::DuplicateLabel(_))));
    assert_eq!(asm.diagnostics().error_count(), 1);
}

#[test]
fn short_branch_out_of_range() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Far");
    let far = asm.label("FAR").unwrap();
    asm.emit("br.s", Operand::Label(far)).unwrap();
    for _ in 0..200 {
        asm.emit("nop", Operand::None).unwrap();
    }
    asm.define_label("FAR").unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let output = asm.assemble();
    assert_eq!(output.diagnostics.by_code(DiagnosticCode::Encoding).len(), 1);
}

#[test]
fn scoped_try_catch_clause() {
    let mut asm = ModuleAssembler::default();
    let exception = asm.external_type(
        ExternalScope::Assembly("mscorlib".into()),
        "System.Exception",
        false,
    );
    open_static(&mut asm, "Guarded");
    let end = asm.label("END").unwrap();
    {
        let body = asm.body_mut().unwrap();
        body.begin_try();
        body.emit("nop", Operand::None).unwrap();
        body.emit("leave.s", Operand::Label(end)).unwrap();
        body.end_try().unwrap();
        body.begin_catch(exception).unwrap();
        body.emit("pop", Operand::None).unwrap();
        body.emit("leave.s", Operand::Label(end)).unwrap();
        body.end_handler().unwrap();
        body.close_try().unwrap();
    }
    asm.define_label("END").unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let body = assemble_body(asm);
    assert_eq!(body.code, vec![0x00, 0xDE, 0x03, 0x26, 0xDE, 0x00, 0x2A]);
    assert!(!body.is_tiny());
    assert_eq!(body.exception_clauses.len(), 1);

    let clause = &body.exception_clauses[0];
    assert_eq!(clause.flags, ExceptionHandlerFlags::EXCEPTION);
    assert_eq!((clause.try_offset, clause.try_length), (0, 3));
    assert_eq!((clause.handler_offset, clause.handler_length), (3, 3));
    assert_eq!(clause.class_token, Some(Token::new(0x0100_0001)));
    assert_eq!(clause.filter_offset, None);
}

#[test]
fn finally_and_fault_clauses() {
    for (fault, flags) in [
        (false, ExceptionHandlerFlags::FINALLY),
        (true, ExceptionHandlerFlags::FAULT),
    ] {
        let mut asm = ModuleAssembler::default();
        open_static(&mut asm, "Cleanup");
        let end = asm.label("END").unwrap();
        {
            let body = asm.body_mut().unwrap();
            body.begin_try();
            body.emit("nop", Operand::None).unwrap();
            body.emit("leave.s", Operand::Label(end)).unwrap();
            body.end_try().unwrap();
            if fault {
                body.begin_fault().unwrap();
                body.emit("endfault", Operand::None).unwrap();
            } else {
                body.begin_finally().unwrap();
                body.emit("endfinally", Operand::None).unwrap();
            }
            body.end_handler().unwrap();
            body.close_try().unwrap();
        }
        asm.define_label("END").unwrap();
        asm.emit("ret", Operand::None).unwrap();
        asm.end_method().unwrap();

        let body = assemble_body(asm);
        assert_eq!(body.code, vec![0x00, 0xDE, 0x01, 0xDC, 0x2A]);
        assert_eq!(body.exception_clauses.len(), 1);
        let clause = &body.exception_clauses[0];
        assert_eq!(clause.flags, flags);
        assert_eq!((clause.try_offset, clause.try_length), (0, 3));
        assert_eq!((clause.handler_offset, clause.handler_length), (3, 1));
        assert_eq!(clause.class_token, None);
        assert_eq!(clause.filter_offset, None);
    }
}

#[test]
fn filter_clause_records_the_filter_start() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Filtered");
    let end = asm.label("END").unwrap();
    {
        let body = asm.body_mut().unwrap();
        body.begin_try();
        body.emit("nop", Operand::None).unwrap();
        body.emit("leave.s", Operand::Label(end)).unwrap();
        body.end_try().unwrap();
        body.begin_filter().unwrap();
        body.emit("pop", Operand::None).unwrap();
        body.emit("ldc.i4.1", Operand::None).unwrap();
        body.emit("endfilter", Operand::None).unwrap();
        body.begin_filter_handler().unwrap();
        body.emit("pop", Operand::None).unwrap();
        body.emit("leave.s", Operand::Label(end)).unwrap();
        body.end_handler().unwrap();
        body.close_try().unwrap();
    }
    asm.define_label("END").unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let body = assemble_body(asm);
    assert_eq!(
        body.code,
        vec![0x00, 0xDE, 0x07, 0x26, 0x17, 0xFE, 0x11, 0x26, 0xDE, 0x00, 0x2A]
    );
    let clause = &body.exception_clauses[0];
    assert_eq!(clause.flags, ExceptionHandlerFlags::FILTER);
    assert_eq!((clause.try_offset, clause.try_length), (0, 3));
    assert_eq!(clause.filter_offset, Some(3));
    assert_eq!((clause.handler_offset, clause.handler_length), (7, 3));
    assert_eq!(clause.class_token, None);
}

#[test]
fn label_of_another_method_is_an_error() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "First");
    asm.define_label("A").unwrap();
    asm.emit("nop", Operand::None).unwrap();
    let b = asm.define_label("B").unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    open_static(&mut asm, "Second");
    asm.emit("br.s", Operand::Label(b)).unwrap();
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let output = asm.assemble();
    assert_eq!(output.diagnostics.error_count(), 1);
    assert_eq!(output.diagnostics.by_code(DiagnosticCode::InvalidReference).len(), 1);
    assert!(output.module.is_none());
}

#[test]
fn unterminated_try_is_malformed() {
    let mut asm = ModuleAssembler::default();
    open_static(&mut asm, "Open");
    {
        let body = asm.body_mut().unwrap();
        body.begin_try();
        body.emit("nop", Operand::None).unwrap();
    }
    asm.emit("ret", Operand::None).unwrap();
    asm.end_method().unwrap();

    let output = asm.assemble();
    assert_eq!(output.diagnostics.by_code(DiagnosticCode::MalformedBody).len(), 1);
}
