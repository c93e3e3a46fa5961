//! Print each routine's blocks, edges and evaluation-order effects.
//!
//! Usage:
//!   cargo run --bin dump_cfg -- program.json

use itxn_check::Checker;
use itxn_check::cfg::Cfg;
use itxn_check::classify::BindingTable;
use itxn_check::effects::{BlockEffects, Effect, Origin};
use itxn_check::escape::Demotions;
use itxn_check::load_program;
use itertools::Itertools;
use std::env;
use std::path::Path;

fn describe(effect: &Effect<'_>) -> String {
    match effect {
        Effect::ArrayRead {
            binding,
            field,
            span,
        } => format!("read    {binding}.{field} @ {span}"),
        Effect::InlineArrayRead { field, span } => format!("read    <submit>.{field} @ {span}"),
        Effect::Submit { span } => format!("submit  @ {span}"),
        Effect::Call { target, span } => format!("call    {target} (may submit) @ {span}"),
        Effect::Define { name, span, origin } => match origin {
            Origin::Submission {
                site,
                position,
                group_size,
            } => format!("define  {name} = slot {position}/{group_size} of submit @ {site} ({span})"),
            Origin::Other => format!("define  {name} = <other> @ {span}"),
        },
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: dump_cfg <program.json>");
        std::process::exit(1);
    }

    let file_path = &args[1];
    let program = load_program(Path::new(file_path)).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", file_path, e);
        std::process::exit(1);
    });

    let summary = Checker::default().summarize(&program);
    println!("may submit (unknown callees: {}):", summary.unknown_may_submit());
    for (name, submits) in summary.iter() {
        println!("  {name}: {submits}");
    }

    for routine in &program.routines {
        println!("routine {}", routine.name);
        let cfg = match Cfg::new(routine) {
            Ok(cfg) => cfg,
            Err(e) => {
                println!("  error: {e}");
                continue;
            }
        };
        let bindings = BindingTable::build(routine);
        println!("  handles: [{}]", bindings.handle_names().join(", "));

        let effects = BlockEffects::compute(&cfg, &bindings, &summary, &Demotions::default());
        for block in &routine.blocks {
            let reachable = if cfg.is_reachable(block.id) {
                ""
            } else {
                " (unreachable)"
            };
            println!(
                "  block {}{}  preds [{}]  succs [{}]  stmts {}",
                block.id.index(),
                reachable,
                cfg.predecessors(block.id).iter().map(|p| p.index()).join(", "),
                cfg.successors(block.id).iter().map(|s| s.index()).join(", "),
                block.stmts.len()
            );
            for effect in effects.of(block.id) {
                println!("    {}", describe(effect));
            }
        }
    }
}
