//! Plan and refresh display

use colored::{ColoredString, Colorize};
use reconcile::FieldChange;
use serde_json::Value;
use std::collections::BTreeMap;

use super::planner::{Action, Plan, RefreshReport};

/// Display a plan grouped by resource kind
pub fn display_plan(plan: &Plan) {
    if !plan.has_changes() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    let mut by_kind: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for change in plan.pending() {
        by_kind
            .entry(change.address.kind.as_str())
            .or_default()
            .push(change);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (kind, changes) in &by_kind {
        println!("│ {}", kind.bold());

        for change in changes {
            println!(
                "│   {} {:<30} {}",
                symbol(&change.action),
                change.address.name,
                describe(&change.action).dimmed()
            );
            if let Action::Update(fields) | Action::Replace(fields) = &change.action {
                for field in fields {
                    println!("│       {}", field_line(field).dimmed());
                }
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to replace, {} to delete",
        plan.count(|a| matches!(a, Action::Create)).to_string().green(),
        plan.count(|a| matches!(a, Action::Update(_))).to_string().yellow(),
        plan.count(|a| matches!(a, Action::Replace(_))).to_string().magenta(),
        plan.count(|a| matches!(a, Action::Delete)).to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display what a refresh found
pub fn display_refresh(report: &RefreshReport) {
    println!();
    println!(
        "  {} Refreshed {} tracked resources",
        "✓".green(),
        report.refreshed
    );
    for address in &report.vanished {
        println!(
            "    {} {} {}",
            "-".red(),
            address,
            "(deleted outside idsync, dropped from state)".dimmed()
        );
    }
    for (address, fields) in &report.drifted {
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        println!(
            "    {} {} {}",
            "~".yellow(),
            address,
            format!("(changed remotely: {})", fields.join(", ")).dimmed()
        );
    }
}

fn symbol(action: &Action) -> ColoredString {
    match action {
        Action::Create => "+".green(),
        Action::Update(_) => "~".yellow(),
        Action::Replace(_) => "±".magenta(),
        Action::Delete => "-".red(),
        Action::NoChange => "○".dimmed(),
    }
}

fn describe(action: &Action) -> &'static str {
    match action {
        Action::Create => "(will create)",
        Action::Update(_) => "(will update in place)",
        Action::Replace(_) => "(will delete and recreate)",
        Action::Delete => "(will delete)",
        Action::NoChange => "",
    }
}

/// `field: old → new`, marking fields that force a replace
pub fn field_line(change: &FieldChange) -> String {
    let line = format!(
        "{}: {} → {}",
        change.field,
        render(change.from.as_ref()),
        render(change.to.as_ref())
    );
    if change.requires_replace {
        format!("{line} (forces replacement)")
    } else {
        line
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "(none)".to_string(),
        Some(Value::String(s)) => format!("\"{s}\""),
        Some(other) => other.to_string(),
    }
}
