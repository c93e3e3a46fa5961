mod support;

use itxn_check::Checker;
use itxn_check::checks::CheckSettings;
use itxn_check::config::EffectsConfig;
use itxn_check::diagnostics::Span;
use itxn_check::fields::TxnField;
use itxn_check::ir::Expr;
use regex::Regex;
use std::collections::BTreeMap;
use support::cfg_builder::*;

fn related_rows(report: &itxn_check::report::RoutineReport, idx: usize) -> Vec<usize> {
    report.diagnostics[idx]
        .related
        .iter()
        .map(|r| r.span.start.row)
        .collect()
}

#[test]
fn read_after_second_submit_is_stale() {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    let early = r.eval(b, log(read("h", TxnField::Logs)));
    let invalidated = r.eval(b, submit(vec![params()]));
    let late = r.eval(b, log(read("h", TxnField::Logs)));

    let report = check_one(r.build());
    assert_eq!(codes(&report), ["stale_array_read"]);
    assert_eq!(report.diagnostics[0].span.start.row, late);
    assert_eq!(related_rows(&report, 0), [invalidated]);

    assert_eq!(report.resolved_reads.len(), 1);
    assert_eq!(report.resolved_reads[0].span.start.row, early);
}

#[test]
fn stale_message_names_binding_and_asks_to_move_the_read() {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["pay"], submit(vec![params()]));
    r.eval(b, submit(vec![params()]));
    r.eval(b, log(read("pay", TxnField::ApplicationArgs)));

    let report = check_one(r.build());
    let re = Regex::new(
        r"^array field `ApplicationArgs` of inner transaction `pay` is read after `pay` may have been overwritten .*; move this read before ",
    )
    .unwrap();
    assert!(re.is_match(&report.diagnostics[0].message));
    assert_eq!(
        report.diagnostics[0].related[0].message,
        "`pay` may be overwritten by this submit"
    );
}

#[test]
fn scalar_reads_are_never_stale() {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    r.eval(b, submit(vec![params()]));
    r.eval(
        b,
        log(Expr::field_read(
            var("h"),
            TxnField::CreatedApplicationID,
            None,
            Span::default(),
        )),
    );

    let report = check_one(r.build());
    assert!(report.diagnostics.is_empty());
    assert!(report.resolved_reads.is_empty());
}

#[test]
fn call_to_submitting_routine_invalidates() {
    let mut helper = RoutineBuilder::new("pay_fee");
    let hb = helper.entry();
    helper.eval(hb, submit(vec![params()]));

    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    let call_row = r.eval(b, call("pay_fee", Vec::new()));
    r.eval(b, log(read("h", TxnField::Logs)));

    let report = check(vec![r.build(), helper.build()]);
    let main = &report.routines[0];
    assert_eq!(codes(main), ["stale_array_read"]);
    assert_eq!(related_rows(main, 0), [call_row]);
    assert!(main.diagnostics[0].related[0].message.contains("call to `pay_fee`"));
}

#[test]
fn transitive_callers_invalidate() {
    let mut leaf = RoutineBuilder::new("leaf");
    let lb = leaf.entry();
    leaf.eval(lb, submit(vec![params()]));
    let mut middle = RoutineBuilder::new("middle");
    let mb = middle.entry();
    middle.eval(mb, call("leaf", Vec::new()));

    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    r.eval(b, call("middle", Vec::new()));
    r.eval(b, log(read("h", TxnField::Logs)));

    let report = check(vec![r.build(), middle.build(), leaf.build()]);
    assert_eq!(codes(&report.routines[0]), ["stale_array_read"]);
}

#[test]
fn pure_calls_do_not_invalidate() {
    let mut helper = RoutineBuilder::new("math");
    let hb = helper.entry();
    helper.ret(hb, Some(lit("42")));

    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    r.eval(b, log(call("math", vec![lit("1")])));
    r.eval(b, log(read("h", TxnField::Logs)));

    let report = check(vec![r.build(), helper.build()]);
    assert!(report.routines[0].diagnostics.is_empty());
    assert_eq!(report.routines[0].resolved_reads.len(), 1);
}

fn external_call_routine() -> itxn_check::ir::Routine {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    r.eval(b, log(call("lib.sqrt", vec![lit("9")])));
    r.eval(b, log(read("h", TxnField::Logs)));
    r.build()
}

#[test]
fn unknown_callees_may_submit_by_default() {
    let report = check_one(external_call_routine());
    assert_eq!(codes(&report), ["stale_array_read"]);
}

#[test]
fn configured_pure_external_does_not_invalidate() {
    let effects = EffectsConfig {
        unknown_calls_may_submit: true,
        may_submit: BTreeMap::from([("lib.sqrt".to_string(), false)]),
    };
    let checker = Checker::new(CheckSettings::default(), effects);
    let report = checker
        .check_program(&program(vec![external_call_routine()]))
        .unwrap();
    assert!(report.routines[0].diagnostics.is_empty());

    let optimistic = EffectsConfig {
        unknown_calls_may_submit: false,
        may_submit: BTreeMap::new(),
    };
    let checker = Checker::new(CheckSettings::default(), optimistic);
    let report = checker
        .check_program(&program(vec![external_call_routine()]))
        .unwrap();
    assert!(report.routines[0].diagnostics.is_empty());
}

#[test]
fn input_summary_pins_may_submit() {
    let mut prog = program(vec![external_call_routine()]);
    prog.may_submit = Some(BTreeMap::from([("lib.sqrt".to_string(), false)]));
    let report = Checker::default().check_program(&prog).unwrap();
    assert!(report.routines[0].diagnostics.is_empty());
}

#[test]
fn fresh_reassignment_in_one_branch_merges_fresh() {
    let mut r = RoutineBuilder::new("main");
    let entry = r.entry();
    let then_block = r.block();
    let else_block = r.block();
    let join = r.block();

    r.assign(entry, &["h"], submit(vec![params()]));
    r.branch(entry, then_block, else_block);
    r.assign(then_block, &["h"], submit(vec![params()]));
    r.goto(then_block, join);
    r.goto(else_block, join);
    let ok = r.eval(join, log(read("h", TxnField::Logs)));
    let invalidated = r.eval(join, submit(vec![params()]));
    let bad = r.eval(join, log(read("h", TxnField::Logs)));

    let report = check_one(r.build());
    assert_eq!(codes(&report), ["stale_array_read"]);
    assert_eq!(report.diagnostics[0].span.start.row, bad);
    assert_eq!(related_rows(&report, 0), [invalidated]);
    assert_eq!(report.resolved_reads.len(), 1);
    assert_eq!(report.resolved_reads[0].span.start.row, ok);
}

#[test]
fn stale_on_any_incoming_path_is_stale() {
    let mut r = RoutineBuilder::new("main");
    let entry = r.entry();
    let then_block = r.block();
    let else_block = r.block();
    let join = r.block();

    r.assign(entry, &["h"], submit(vec![params()]));
    r.branch(entry, then_block, else_block);
    let left = r.eval(then_block, submit(vec![params()]));
    r.goto(then_block, join);
    let right = r.eval(else_block, call("lib.notify", Vec::new()));
    r.goto(else_block, join);
    r.eval(join, log(read("h", TxnField::Logs)));

    let report = check_one(r.build());
    assert_eq!(codes(&report), ["stale_array_read"]);
    assert_eq!(related_rows(&report, 0), [left, right]);
}

#[test]
fn loop_back_edge_makes_reads_stale() {
    let mut r = RoutineBuilder::new("main");
    let entry = r.entry();
    let header = r.block();
    let body = r.block();
    let exit = r.block();

    r.assign(entry, &["h"], submit(vec![params()]));
    r.goto(entry, header);
    r.branch(header, body, exit);
    let body_read = r.eval(body, log(read("h", TxnField::Logs)));
    let body_submit = r.eval(body, submit(vec![params()]));
    r.goto(body, header);
    let exit_read = r.eval(exit, log(read("h", TxnField::Logs)));

    let report = check_one(r.build());
    assert_eq!(codes(&report), ["stale_array_read", "stale_array_read"]);
    assert_eq!(report.diagnostics[0].span.start.row, body_read);
    assert_eq!(report.diagnostics[1].span.start.row, exit_read);
    assert_eq!(related_rows(&report, 0), [body_submit]);
    assert_eq!(related_rows(&report, 1), [body_submit]);
}

#[test]
fn redefinition_resets_staleness() {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    r.eval(b, submit(vec![params()]));
    r.assign(b, &["h"], submit(vec![params()]));
    r.eval(b, log(read("h", TxnField::Logs)));

    let report = check_one(r.build());
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.resolved_reads.len(), 1);
}

#[test]
fn reads_in_call_arguments_happen_before_the_call() {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(b, &["h"], submit(vec![params()]));
    r.eval(b, call("lib.forward", vec![read("h", TxnField::Logs)]));

    let report = check_one(r.build());
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.resolved_reads.len(), 1);
}

#[test]
fn later_submit_in_a_destructured_tuple_invalidates_earlier_elements() {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    let row = r.assign(
        b,
        &["a", "c"],
        tuple(vec![submit(vec![params()]), submit(vec![params()])]),
    );
    let stale = r.eval(b, log(read("a", TxnField::Logs)));
    let fresh = r.eval(b, log(read("c", TxnField::Logs)));

    let report = check_one(r.build());
    assert_eq!(codes(&report), ["stale_array_read"]);
    assert_eq!(report.diagnostics[0].span.start.row, stale);
    assert_eq!(related_rows(&report, 0), [row]);

    assert_eq!(report.resolved_reads.len(), 1);
    assert_eq!(report.resolved_reads[0].span.start.row, fresh);
    assert_eq!(report.resolved_reads[0].binding.as_deref(), Some("c"));
}

#[test]
fn submitting_call_later_in_a_destructured_tuple_invalidates() {
    let mut r = RoutineBuilder::new("main");
    let b = r.entry();
    r.assign(
        b,
        &["a", "n"],
        tuple(vec![submit(vec![params()]), call("lib.fetch", Vec::new())]),
    );
    r.eval(b, log(read("a", TxnField::Logs)));

    let report = check_one(r.build());
    assert_eq!(codes(&report), ["stale_array_read"]);
    assert!(report.diagnostics[0].related[0].message.contains("call to `lib.fetch`"));
}
