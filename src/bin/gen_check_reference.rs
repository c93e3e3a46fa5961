//! Generate `docs/CHECK_REFERENCE.md` from the check registry.
//!
//! Usage:
//!   cargo run --bin gen_check_reference > docs/CHECK_REFERENCE.md

use itxn_check::checks::all_checks;
use itxn_check::config::DEFAULT_CONFIG_FILE_NAME;

fn escape_md_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn main() {
    let mut rows: Vec<_> = all_checks().to_vec();
    rows.sort_by_key(|d| (d.category, d.name));

    let total = rows.len();
    let fatal = rows.iter().filter(|d| d.fatal).count();

    println!("# itxn-check Check Reference\n");
    println!("**Status:** Generated (do not edit by hand)\n");
    println!("Regenerate with:\n");
    println!("```bash");
    println!("cargo run --bin gen_check_reference > docs/CHECK_REFERENCE.md");
    println!("```\n");

    println!("## Summary\n");
    println!("- Total: {total}");
    println!("- Fatal: {fatal}");
    println!("- Configurable: {}\n", total - fatal);
    println!(
        "Fatal checks always fail compilation. Configurable checks accept `allow`, `warn` or `error` under `[checks]` in `{DEFAULT_CONFIG_FILE_NAME}`.\n"
    );

    println!("## Checks\n");
    println!("| Check | Category | Analysis | Severity | Fatal | Description |");
    println!("|-------|----------|----------|----------|-------|-------------|");
    for d in rows {
        println!(
            "| `{}` | {} | {} | {} | {} | {} |",
            d.name,
            d.category.as_str(),
            d.analysis.as_str(),
            d.severity.as_str(),
            if d.fatal { "yes" } else { "no" },
            escape_md_cell(d.description)
        );
    }
}
