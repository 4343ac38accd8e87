//! Plain-text rendering of the core's views.

use std::fmt::Write as _;

use estimator_core::screen::{CardView, DialogView};
use estimator_core::{Card, DashboardView, ScreenView};

pub fn screen(view: &ScreenView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.heading);
    if let Some(error) = &view.error {
        let _ = writeln!(out, "error: {error}");
    }
    if view.loading {
        let _ = writeln!(out, "{}", view.loading_text);
        return out;
    }
    if view.cards.is_empty() {
        out.push_str("(none)\n");
    }
    for card_view in &view.cards {
        out.push('\n');
        out.push_str(&card_with_action(card_view));
    }
    out
}

fn card_with_action(view: &CardView) -> String {
    let mut out = card(&view.card);
    if let Some(action) = &view.action {
        let state = if action.enabled { "" } else { " (busy)" };
        let _ = writeln!(out, "  [{}]{state}", action.label);
    }
    out
}

pub fn card(card: &Card) -> String {
    let mut out = String::new();
    match &card.badge {
        Some(badge) => {
            let _ = writeln!(out, "{}  [{badge}]", card.title);
        }
        None => {
            let _ = writeln!(out, "{}", card.title);
        }
    }
    let _ = writeln!(out, "  id: {}", card.id);
    for line in card.lines.iter().filter(|l| !l.is_empty()) {
        let _ = writeln!(out, "  {line}");
    }
    out
}

/// Field list of an open dialog, used to explain `--set` keys.
pub fn dialog(view: &DialogView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    for field in &view.fields {
        let _ = write!(out, "  {} ({}): {}", field.spec.name, field.spec.label, field.value);
        if !field.options.is_empty() {
            let choices: Vec<String> = field
                .options
                .iter()
                .map(|o| format!("{}={}", o.label, o.value))
                .collect();
            let _ = write!(out, "  [{}]", choices.join(", "));
        }
        out.push('\n');
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "error: {error}");
    }
    out
}

pub fn dashboard(view: &DashboardView) -> String {
    let mut out = String::from("Dashboard\n");
    for stat in &view.stats {
        let value = if view.loading {
            "...".to_string()
        } else {
            stat.value.to_string()
        };
        let _ = writeln!(out, "  {:<16} {value:>6}  {}", stat.title, stat.description);
    }
    out
}
