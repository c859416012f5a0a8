use colored::Colorize;

use crate::params::{MetadataTable, Parameter, Phase};
use crate::state::models::{StateLogEntry, StateRecord};
use crate::state::{StateData, StateStatus};

/// Keys whose values are never printed.
const SENSITIVE_KEYS: &[&str] = &["MasterUserPassword", "AuthToken"];

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg.red());
}

fn status_colored(status: StateStatus) -> String {
    let s = status.as_str();
    match status {
        StateStatus::ProvisionSucceeded | StateStatus::UpdateSucceeded => s.green().to_string(),
        StateStatus::Provisioning | StateStatus::Updating => s.yellow().to_string(),
        StateStatus::ProvisionFailed => s.red().to_string(),
    }
}

fn display_value(param: &Parameter) -> String {
    match param.get_value_opt() {
        Some(_) if SENSITIVE_KEYS.contains(&param.key()) => "(sensitive)".dimmed().to_string(),
        Some(value) => value,
        None => "-".dimmed().to_string(),
    }
}

/// Print the stored states, one row per id.
pub fn print_state_list(records: &[StateRecord]) {
    if records.is_empty() {
        println!("{}", "No states stored.".dimmed());
        return;
    }

    println!();
    println!("{}", "States".bold().cyan());
    println!("{}", "─".repeat(80));
    println!(
        "  {:<32} {:<14} {:<9} {}",
        "ID".bold(),
        "PROVISIONER".bold(),
        "REVISION".bold(),
        "UPDATED".bold()
    );
    println!("{}", "─".repeat(80));

    for record in records {
        println!(
            "  {:<32} {:<14} {:<9} {}",
            record.id,
            record.provisioner,
            record.revision,
            record.updated_at.dimmed()
        );
    }

    println!();
    println!("  {} state(s) total.", records.len());
    println!();
}

/// Print one state with all of its parameters.
pub fn print_state_detail(state: &StateData) {
    println!();
    println!("{} {}", "State:".bold().cyan(), state.id.bold());
    println!("{}", "─".repeat(60));
    println!("  {:<12} {}", "Status:".bold(), status_colored(state.status));
    println!("  {:<12} {}", "Revision:".bold(), state.revision);
    println!("  {:<12} {}", "Imported:".bold(), state.imported);
    if !state.host.is_empty() {
        println!("  {:<12} {}", "Host:".bold(), state.host);
    }
    if state.locked {
        println!(
            "  {:<12} {} ({})",
            "Locked:".bold(),
            "yes".yellow(),
            state.locked_reason
        );
    }

    println!();
    println!("  {}:", "Parameters".bold());
    for param in state.parameters() {
        let mut flags = Vec::new();
        if param.meta().immutable {
            flags.push("immutable");
        }
        if param.meta().updates_with_interruption {
            flags.push("interrupts");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", ")).dimmed().to_string()
        };
        println!("    {:<30} = {}{}", param.key(), display_value(param), flags);
    }

    println!("{}", "─".repeat(60));
    println!();
}

pub fn print_logs(id: &str, entries: &[StateLogEntry]) {
    if entries.is_empty() {
        println!("{}", format!("No log entries for {}.", id).dimmed());
        return;
    }
    for entry in entries {
        println!("  {} {}", entry.created_at.dimmed(), entry.message);
    }
}

/// Print the metadata table one resource kind uses in one phase.
pub fn print_metadata_table(kind: &str, phase: Phase, table: &MetadataTable) {
    println!();
    println!("{} {} ({})", "Parameters:".bold().cyan(), kind.bold(), phase);
    println!("{}", "─".repeat(80));
    println!(
        "  {:<32} {:<7} {:<9} {:<10} {}",
        "KEY".bold(),
        "KIND".bold(),
        "REQUIRED".bold(),
        "IMMUTABLE".bold(),
        "DEFAULT".bold()
    );
    println!("{}", "─".repeat(80));

    for (key, meta) in table {
        let required = if meta.required {
            "yes".yellow().to_string()
        } else {
            "no".dimmed().to_string()
        };
        let immutable = if meta.immutable { "yes" } else { "no" };
        println!(
            "  {:<32} {:<7} {:<9} {:<10} {}",
            key,
            meta.kind.to_string(),
            required,
            immutable,
            meta.default.as_deref().unwrap_or("")
        );
    }
    println!();
}

/// Print the parameter set an install would start from.
pub fn print_plan(kind: &str, params: &[Parameter]) {
    println!();
    println!("{} {}", "Install plan:".bold().cyan(), kind.bold());
    println!("{}", "─".repeat(60));
    for param in params.iter().filter(|p| !p.is_empty()) {
        println!("  {:<30} = {}", param.key(), display_value(param));
    }
    println!("{}", "─".repeat(60));
    println!();
}
