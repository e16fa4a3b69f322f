//! Output formatting helpers for CLI commands

use crate::model::PolicySet;
use crate::reconciler::{Applied, ChangeKind, Diagnostics, Plan, PlannedChange, Severity};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

/// View model for one policy of a policy set
#[derive(Debug, Clone, Serialize)]
pub struct PolicyView {
    pub priority: usize,
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub settings: Vec<String>,
    pub filters: Vec<String>,
}

/// View model for policy set display
#[derive(Debug, Clone, Serialize)]
pub struct PolicySetView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_set_type: String,
    pub description: String,
    pub assigned: bool,
    pub scopes: Vec<String>,
    pub delivery_groups: Vec<String>,
    pub policies: Vec<PolicyView>,
}

impl From<&PolicySet> for PolicySetView {
    fn from(set: &PolicySet) -> Self {
        Self {
            id: set.id.clone(),
            name: set.name.clone(),
            policy_set_type: set.policy_set_type.to_string(),
            description: set.description.clone(),
            assigned: set.assigned(),
            scopes: set.scopes.iter().cloned().collect(),
            delivery_groups: set.delivery_groups.iter().cloned().collect(),
            policies: set
                .policies
                .iter()
                .enumerate()
                .map(|(i, p)| PolicyView {
                    priority: i + 1,
                    id: p.id.clone(),
                    name: p.name.clone(),
                    enabled: p.enabled,
                    settings: p.settings.iter().map(|s| s.name.clone()).collect(),
                    filters: p.filters.iter().map(|f| f.kind().to_string()).collect(),
                })
                .collect(),
        }
    }
}

fn colored_kind(kind: ChangeKind) -> String {
    let label = kind.to_string();
    match kind {
        ChangeKind::Create | ChangeKind::Associate => label.green().to_string(),
        ChangeKind::Update | ChangeKind::Rename | ChangeKind::Reorder => {
            label.yellow().to_string()
        }
        ChangeKind::Delete | ChangeKind::Dissociate => label.red().to_string(),
    }
}

/// Format a plan as a table
pub fn format_plan_table(plan: &Plan) -> String {
    let changes = plan.changes();
    if changes.is_empty() {
        return format!(
            "{} Policy set '{}' is up to date",
            "✓".green(),
            plan.name
        );
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Action", "Resource", "Target", "Detail"]);

    for c in &changes {
        table.add_row(vec![
            Cell::new(colored_kind(c.kind)),
            Cell::new(&c.resource),
            Cell::new(&c.target),
            Cell::new(&c.detail),
        ]);
    }

    format!("{}\n{} change(s) planned", table, changes.len())
}

/// Format a plan as JSON
pub fn format_plan_json(plan: &Plan, warnings: &Diagnostics) -> serde_json::Result<String> {
    let changes: Vec<PlannedChange> = plan.changes();
    serde_json::to_string_pretty(&json!({
        "policy_set": plan.name,
        "policy_set_id": plan.policy_set_id,
        "up_to_date": plan.is_empty(),
        "changes": changes,
        "warnings": warnings,
    }))
}

/// Format a policy set as a table
pub fn format_policy_set_table(view: &PolicySetView) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Priority", "Policy", "Enabled", "Settings", "Filters"]);

    for p in &view.policies {
        let enabled = if p.enabled {
            "yes".green().to_string()
        } else {
            "no".red().to_string()
        };
        table.add_row(vec![
            Cell::new(p.priority),
            Cell::new(&p.name),
            Cell::new(enabled),
            Cell::new(p.settings.join(", ")),
            Cell::new(p.filters.join(", ")),
        ]);
    }

    let groups = if view.delivery_groups.is_empty() {
        "none".to_string()
    } else {
        view.delivery_groups.join(", ")
    };
    format!(
        "{} ({}, {})\nDelivery groups: {}\n{}",
        view.name.bold(),
        view.policy_set_type,
        view.id,
        groups,
        table
    )
}

/// Format a policy set as JSON
pub fn format_policy_set_json(view: &PolicySetView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({ "policy_set": view }))
}

/// Format the outcome of an apply as JSON
pub fn format_applied_json(applied: &Applied) -> serde_json::Result<String> {
    let batches: Vec<_> = applied
        .batches
        .iter()
        .map(|b| {
            json!({
                "step": b.step.as_str(),
                "items": b.outcome.total,
                "succeeded": b.outcome.success_count,
                "transaction_id": b.outcome.transaction_id,
            })
        })
        .collect();
    serde_json::to_string_pretty(&json!({
        "policy_set": PolicySetView::from(&applied.state),
        "changes": applied.plan.changes(),
        "batches": batches,
        "ranked": applied.ranked,
        "completed_at": applied.completed_at.to_rfc3339(),
        "warnings": applied.warnings,
    }))
}

/// Format diagnostics for a terminal, one per line
pub fn format_diagnostics(diagnostics: &Diagnostics) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let label = match d.severity {
                Severity::Warning => "warning".yellow().bold().to_string(),
                Severity::Error => "error".red().bold().to_string(),
            };
            let mut line = format!("{}: {}", label, d.summary);
            if !d.detail.is_empty() {
                line.push_str(&format!("\n  {}", d.detail));
            }
            if let Some(id) = &d.transaction_id {
                line.push_str(&format!("\n  transaction: {}", id));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
