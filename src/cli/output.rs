// Output formatting utilities

use crate::models::{Company, Dealer, FieldDisplay, Lot, Section, Stage, User};
use chrono::Local;
use std::collections::{BTreeMap, HashMap};
use std::io::IsTerminal;

// ANSI escape codes for terminal formatting
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_YELLOW: &str = "\x1b[33m";

const MARK_COMPLETE: &str = "✓";
const MARK_PENDING: &str = "○";

/// Widest funnel bar on the dashboard
const FUNNEL_BAR_WIDTH: usize = 30;

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate for reliable detection, with fallback to
/// COLUMNS environment variable and a sensible default.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    120
}

/// Apply bold formatting if in TTY mode
fn bold_if_tty(text: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", ANSI_BOLD, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

fn color_if_tty(text: &str, color: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", color, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

/// Truncate to `width` characters, marking the cut with ".."
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(2)).collect();
        format!("{}..", kept)
    }
}

/// Format timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    use chrono::TimeZone;
    Local.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Format date for display (date only, no time)
pub fn format_date(ts: i64) -> String {
    use chrono::TimeZone;
    Local.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Turn a camelCase field name into a label ("lotWeightKg" -> "Lot Weight Kg")
pub fn format_field_name(name: &str) -> String {
    let mut label = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            label.push(' ');
            label.push(c);
        } else {
            label.push(c);
        }
    }
    label
}

/// Render a list of rows as a left-aligned table with a dashed separator
fn render_table(headers: &[&str], rows: &[Vec<String>], max_widths: &[usize]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count().min(max_widths[i]));
        }
    }

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", truncate(cell, widths[i]), width = widths[i]))
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    output.push_str(&line(headers.iter().map(|h| h.to_string()).collect()));
    output.push('\n');
    let total_width = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
    output.push_str(&"-".repeat(total_width));
    output.push('\n');
    for row in rows {
        output.push_str(&line(row.clone()));
        output.push('\n');
    }
    output
}

/// Companies table
pub fn format_company_table(companies: &[Company]) -> String {
    if companies.is_empty() {
        return "No companies found.".to_string();
    }
    let rows: Vec<Vec<String>> = companies
        .iter()
        .map(|c| {
            vec![
                c.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
                c.name.clone(),
                format_date(c.created_ts),
            ]
        })
        .collect();
    render_table(&["ID", "Name", "Created"], &rows, &[6, 40, 10])
}

/// Dealers table; `company_names` maps company id to name
pub fn format_dealer_table(dealers: &[Dealer], company_names: &HashMap<i64, String>) -> String {
    if dealers.is_empty() {
        return "No dealers found.".to_string();
    }
    let rows: Vec<Vec<String>> = dealers
        .iter()
        .map(|d| {
            vec![
                d.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
                d.name.clone(),
                company_names
                    .get(&d.company_id)
                    .cloned()
                    .unwrap_or_else(|| format!("[{}]", d.company_id)),
                d.email.clone(),
                d.phone.clone().unwrap_or_default(),
                d.address.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(
        &["ID", "Name", "Company", "Email", "Phone", "Address"],
        &rows,
        &[6, 30, 25, 30, 16, 40],
    )
}

/// Users table; `dealer_names` maps dealer id to name
pub fn format_user_table(users: &[User], dealer_names: &HashMap<i64, String>) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| {
            vec![
                u.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
                u.name.clone(),
                u.email.clone(),
                u.role.as_str().to_string(),
                u.dealer_id
                    .map(|id| dealer_names.get(&id).cloned().unwrap_or_else(|| format!("[{}]", id)))
                    .unwrap_or_default(),
                u.phone.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(
        &["ID", "Name", "Email", "Role", "Dealer", "Phone"],
        &rows,
        &[6, 30, 30, 6, 25, 16],
    )
}

/// Lots table
pub fn format_lot_table(
    lots: &[Lot],
    company_names: &HashMap<i64, String>,
    dealer_names: &HashMap<i64, String>,
) -> String {
    if lots.is_empty() {
        return "No lots found.".to_string();
    }
    let rows: Vec<Vec<String>> = lots
        .iter()
        .map(|lot| {
            vec![
                lot.lot_code.clone(),
                company_names
                    .get(&lot.company_id)
                    .cloned()
                    .unwrap_or_else(|| format!("[{}]", lot.company_id)),
                dealer_names
                    .get(&lot.dealer_id)
                    .cloned()
                    .unwrap_or_else(|| format!("[{}]", lot.dealer_id)),
                lot.stage.label().to_string(),
                lot.status().as_str().to_string(),
                format_date(lot.modified_ts),
            ]
        })
        .collect();
    render_table(
        &["Lot", "Company", "Dealer", "Stage", "Status", "Updated"],
        &rows,
        &[16, 25, 25, 16, 10, 10],
    )
}

/// Stage progress list: one line per stage with a complete/pending marker
pub fn format_stage_progress(lot: &Lot, use_color: bool) -> String {
    let mut output = String::new();
    for (stage, complete) in lot.completion_status() {
        let mark = if complete {
            color_if_tty(MARK_COMPLETE, ANSI_FG_GREEN, use_color)
        } else {
            color_if_tty(MARK_PENDING, ANSI_FG_YELLOW, use_color)
        };
        let current = if stage == lot.stage { "  (current)" } else { "" };
        output.push_str(&format!("  {} {}{}\n", mark, stage.label(), current));
    }
    output
}

/// Field list for one stage of a lot
pub fn format_stage_details(stage: Stage, fields: &[(&'static str, FieldDisplay)], width: usize) -> String {
    let labels: Vec<String> = fields.iter().map(|(name, _)| format_field_name(name)).collect();
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 1;
    let value_width = width.saturating_sub(label_width + 4).max(20);

    let mut output = format!("{}\n", stage.label());
    if fields.is_empty() {
        output.push_str("  (no fields for this stage)\n");
    }
    for (label, (_, value)) in labels.iter().zip(fields) {
        output.push_str(&format!(
            "  {:<lw$} {}\n",
            format!("{}:", label),
            truncate(&value.to_string(), value_width),
            lw = label_width
        ));
    }
    output
}

/// Header, progress and stage details for `lots show`
pub fn format_lot_detail(
    lot: &Lot,
    company_name: &str,
    dealer_name: &str,
    detail_stage: Stage,
    fields: &[(&'static str, FieldDisplay)],
) -> String {
    let tty = is_tty();
    let mut output = String::new();
    output.push_str(&bold_if_tty(&format!("Lot {}", lot.lot_code), tty));
    output.push('\n');
    output.push_str(&format!("  {:<15} {}\n", "Company:", company_name));
    output.push_str(&format!("  {:<15} {}\n", "Dealer:", dealer_name));
    output.push_str(&format!("  {:<15} {}\n", "Current Stage:", lot.stage.label()));
    output.push_str(&format!("  {:<15} {}\n", "Status:", lot.status().as_str()));
    output.push_str(&format!("  {:<15} {}\n", "Created:", format_timestamp(lot.created_ts)));
    output.push('\n');
    output.push_str(&bold_if_tty("Stage Progress", tty));
    output.push('\n');
    output.push_str(&format_stage_progress(lot, tty));
    output.push('\n');
    output.push_str(&format_stage_details(detail_stage, fields, get_terminal_width()));
    output
}

/// Dashboard: totals and a per-stage funnel
pub fn format_dashboard(total: usize, completed: usize, counts: &BTreeMap<Stage, usize>) -> String {
    let mut output = format!("Lots: {} total, {} completed\n\n", total, completed);
    output.push_str("Pipeline\n");

    let max_count = counts.values().copied().max().unwrap_or(0);
    let label_width = Stage::ALL.iter().map(|s| s.label().len()).max().unwrap_or(0);
    for (stage, count) in counts {
        let bar_len = if max_count == 0 { 0 } else { count * FUNNEL_BAR_WIDTH / max_count };
        output.push_str(&format!(
            "  {:<lw$} {:>4} {}\n",
            stage.label(),
            count,
            "#".repeat(bar_len),
            lw = label_width
        ));
    }
    output
}

/// Menu of sections visible to a role
pub fn format_menu(sections: &[Section]) -> String {
    let mut output = String::new();
    for section in sections {
        output.push_str(&format!("  {:<10} lotledger {}\n", section.label(), section.command()));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Role};

    #[test]
    fn test_format_field_name() {
        assert_eq!(format_field_name("lotWeightKg"), "Lot Weight Kg");
        assert_eq!(format_field_name("notes"), "Notes");
        assert_eq!(format_field_name("dispatchNo"), "Dispatch No");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long company name", 8), "a long..");
    }

    #[test]
    fn test_stage_progress_marks() {
        let mut lot = Lot::new("LOT001".to_string(), 1, 1);
        lot.stage = Stage::Warehouse;
        let output = format_stage_progress(&lot, false);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "  ✓ Request");
        assert_eq!(lines[1], "  ✓ Security Check");
        assert_eq!(lines[2], "  ○ Warehouse  (current)");
        assert_eq!(lines[7], "  ○ Request Complete");
    }

    #[test]
    fn test_stage_details() {
        let fields = vec![
            ("lotWeightKg", FieldDisplay::Value(FieldValue::Number(12.5))),
            ("clientApproved", FieldDisplay::NotApplicable),
        ];
        let output = format_stage_details(Stage::Warehouse, &fields, 80);
        assert!(output.starts_with("Warehouse\n"));
        assert!(output.contains("Lot Weight Kg:"));
        assert!(output.contains("12.5"));
        assert!(output.contains("N/A"));
    }

    #[test]
    fn test_dashboard_funnel() {
        let mut counts: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
        counts.insert(Stage::Request, 2);
        counts.insert(Stage::Vault, 1);
        let output = format_dashboard(3, 0, &counts);
        assert!(output.starts_with("Lots: 3 total, 0 completed"));
        let request_line = output.lines().find(|l| l.trim_start().starts_with("Request ")).unwrap();
        assert!(request_line.ends_with(&"#".repeat(FUNNEL_BAR_WIDTH)));
        let vault_line = output.lines().find(|l| l.trim_start().starts_with("Vault")).unwrap();
        assert!(vault_line.ends_with(&"#".repeat(FUNNEL_BAR_WIDTH / 2)));
    }

    #[test]
    fn test_empty_tables() {
        assert_eq!(format_company_table(&[]), "No companies found.");
        assert_eq!(format_lot_table(&[], &HashMap::new(), &HashMap::new()), "No lots found.");
    }

    #[test]
    fn test_menu_for_user_role() {
        let output = format_menu(&Section::visible_to(Role::User));
        assert!(output.contains("Dashboard"));
        assert!(output.contains("lotledger dealers"));
        assert!(!output.contains("Company"));
    }
}
