//! Reconciliation Planning
//!
//! The diff engine: compares desired configuration against a fetched
//! snapshot and produces the ordered plan of operations that converges
//! the two. Everything here is pure and deterministic, which is what
//! makes `plan` output trustworthy as a preview of `apply`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::config::{
    normalize_color, BranchProtectionConfig, LabelConfig, Policies, RepoConfig, SecretConfig,
    SettingsConfig, ValueSource,
};
use crate::github::{BranchProtection, CurrentState, RepoLabel, RepoSettings, SecretInfo};

/// The kinds of entity the engine reconciles, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    Settings,
    Label,
    BranchProtection,
    Topics,
    Secret,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Settings => "settings",
            EntityKind::Label => "label",
            EntityKind::BranchProtection => "branch protection",
            EntityKind::Topics => "topics",
            EntityKind::Secret => "secret",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    Skip,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Skip => "skip",
        })
    }
}

/// Payload for a label create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPayload {
    pub name: String,

    /// Normalized color, no leading #
    pub color: String,

    pub description: Option<String>,

    /// Current name the update is addressed to, when it differs from
    /// `name` (an old_name rename or a case change)
    pub rename_from: Option<String>,
}

/// Payload for a secret upload. Carries the source, never the plaintext;
/// resolution and sealing happen at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPayload {
    pub name: String,
    pub value_source: ValueSource,
}

/// What an operation sends to the remote
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Label(LabelPayload),
    Protection(BranchProtection),
    Topics(Vec<String>),
    Secret(SecretPayload),
    Settings(SettingsConfig),
}

/// One step of a reconciliation plan
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: EntityKind,
    pub action: Action,

    /// Identity of the entity within its kind
    pub target: String,

    pub payload: Payload,

    /// Human-readable field-level changes or skip reason
    pub notes: Vec<String>,
}

impl Operation {
    fn skip(kind: EntityKind, target: &str, note: &str) -> Self {
        Self {
            kind,
            action: Action::Skip,
            target: target.to_string(),
            payload: Payload::None,
            notes: vec![note.to_string()],
        }
    }
}

/// Tallies of a plan's actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub skips: usize,
}

/// An ordered sequence of operations converging current state on
/// desired state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub operations: Vec<Operation>,
}

impl ReconciliationPlan {
    /// Whether applying this plan would change nothing
    pub fn is_noop(&self) -> bool {
        self.operations.iter().all(|op| op.action == Action::Skip)
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for op in &self.operations {
            match op.action {
                Action::Create => counts.creates += 1,
                Action::Update => counts.updates += 1,
                Action::Delete => counts.deletes += 1,
                Action::Skip => counts.skips += 1,
            }
        }
        counts
    }
}

/// Compute the reconciliation plan for one repository.
///
/// Operations are grouped by kind in a fixed sequence (settings, labels,
/// branch protection, topics, secrets) and ordered lexicographically by
/// target within each kind, so identical inputs always produce identical
/// plans.
pub fn diff(desired: &RepoConfig, current: &CurrentState) -> ReconciliationPlan {
    let mut operations = Vec::new();

    operations.extend(diff_settings(desired.settings.as_ref(), &current.settings));
    operations.extend(diff_labels(
        desired.labels.as_deref(),
        &current.labels,
        &desired.policies,
    ));
    operations.extend(diff_protections(
        desired.branch_protection.as_deref(),
        &current.protections,
    ));
    operations.extend(diff_topics(desired.topics.as_deref(), &current.topics));
    operations.extend(diff_secrets(
        desired.secrets.as_deref(),
        &current.secrets,
        &desired.policies,
    ));

    ReconciliationPlan { operations }
}

fn diff_settings(desired: Option<&SettingsConfig>, current: &RepoSettings) -> Vec<Operation> {
    let Some(settings) = desired else {
        return Vec::new();
    };
    if settings.is_empty() {
        return Vec::new();
    }

    let mut notes = Vec::new();

    if let Some(description) = &settings.description {
        if current.description.as_deref() != Some(description.as_str()) {
            notes.push(format!(
                "description: {} -> {}",
                current.description.as_deref().unwrap_or("(none)"),
                description
            ));
        }
    }
    if let Some(homepage) = &settings.homepage {
        if current.homepage.as_deref() != Some(homepage.as_str()) {
            notes.push(format!(
                "homepage: {} -> {}",
                current.homepage.as_deref().unwrap_or("(none)"),
                homepage
            ));
        }
    }

    let mut flag = |name: &str, desired: Option<bool>, current: bool| {
        if let Some(value) = desired {
            if value != current {
                notes.push(format!("{name}: {current} -> {value}"));
            }
        }
    };
    flag("has_issues", settings.has_issues, current.has_issues);
    flag("has_wiki", settings.has_wiki, current.has_wiki);
    flag("has_projects", settings.has_projects, current.has_projects);
    flag(
        "allow_squash_merge",
        settings.allow_squash_merge,
        current.allow_squash_merge,
    );
    flag(
        "allow_merge_commit",
        settings.allow_merge_commit,
        current.allow_merge_commit,
    );
    flag(
        "allow_rebase_merge",
        settings.allow_rebase_merge,
        current.allow_rebase_merge,
    );
    flag(
        "delete_branch_on_merge",
        settings.delete_branch_on_merge,
        current.delete_branch_on_merge,
    );

    if notes.is_empty() {
        vec![Operation::skip(
            EntityKind::Settings,
            "repository",
            "up to date",
        )]
    } else {
        vec![Operation {
            kind: EntityKind::Settings,
            action: Action::Update,
            target: "repository".to_string(),
            payload: Payload::Settings(settings.clone()),
            notes,
        }]
    }
}

fn diff_labels(
    desired: Option<&[LabelConfig]>,
    current: &[RepoLabel],
    policies: &Policies,
) -> Vec<Operation> {
    let Some(desired) = desired else {
        return Vec::new();
    };

    // Label identity is case-insensitive on GitHub
    let current_by_key: HashMap<String, &RepoLabel> = current
        .iter()
        .map(|label| (label.name.to_lowercase(), label))
        .collect();
    let mut matched: HashSet<String> = HashSet::new();
    let mut operations = Vec::new();

    for label in desired {
        let color = label.normalized_color();

        if let Some(existing) = current_by_key.get(&label.name.to_lowercase()) {
            matched.insert(label.name.to_lowercase());

            let mut notes = Vec::new();
            if existing.name != label.name {
                notes.push(format!("name: {} -> {}", existing.name, label.name));
            }
            if normalize_color(&existing.color) != color {
                notes.push(format!(
                    "color: {} -> {}",
                    normalize_color(&existing.color),
                    color
                ));
            }
            if existing.description != label.description {
                notes.push(format!(
                    "description: {} -> {}",
                    existing.description.as_deref().unwrap_or("(none)"),
                    label.description.as_deref().unwrap_or("(none)")
                ));
            }

            if notes.is_empty() {
                operations.push(Operation::skip(EntityKind::Label, &label.name, "up to date"));
            } else {
                let rename_from = (existing.name != label.name).then(|| existing.name.clone());
                operations.push(Operation {
                    kind: EntityKind::Label,
                    action: Action::Update,
                    target: label.name.clone(),
                    payload: Payload::Label(LabelPayload {
                        name: label.name.clone(),
                        color,
                        description: label.description.clone(),
                        rename_from,
                    }),
                    notes,
                });
            }
        } else if let Some(existing) = label
            .old_name
            .as_ref()
            .and_then(|old| current_by_key.get(&old.to_lowercase()))
        {
            matched.insert(existing.name.to_lowercase());

            let mut notes = vec![format!("rename: {} -> {}", existing.name, label.name)];
            if normalize_color(&existing.color) != color {
                notes.push(format!(
                    "color: {} -> {}",
                    normalize_color(&existing.color),
                    color
                ));
            }
            if existing.description != label.description {
                notes.push(format!(
                    "description: {} -> {}",
                    existing.description.as_deref().unwrap_or("(none)"),
                    label.description.as_deref().unwrap_or("(none)")
                ));
            }

            operations.push(Operation {
                kind: EntityKind::Label,
                action: Action::Update,
                target: label.name.clone(),
                payload: Payload::Label(LabelPayload {
                    name: label.name.clone(),
                    color,
                    description: label.description.clone(),
                    rename_from: Some(existing.name.clone()),
                }),
                notes,
            });
        } else {
            operations.push(Operation {
                kind: EntityKind::Label,
                action: Action::Create,
                target: label.name.clone(),
                payload: Payload::Label(LabelPayload {
                    name: label.name.clone(),
                    color,
                    description: label.description.clone(),
                    rename_from: None,
                }),
                notes: Vec::new(),
            });
        }
    }

    for label in current {
        if matched.contains(&label.name.to_lowercase()) {
            continue;
        }
        if policies.preserve_unmanaged_labels {
            operations.push(Operation::skip(
                EntityKind::Label,
                &label.name,
                "unmanaged, preserved by policy",
            ));
        } else {
            operations.push(Operation {
                kind: EntityKind::Label,
                action: Action::Delete,
                target: label.name.clone(),
                payload: Payload::None,
                notes: vec!["not in configuration".to_string()],
            });
        }
    }

    operations.sort_by(|a, b| a.target.cmp(&b.target));
    operations
}

/// Field-by-field merge: fields the configuration sets win, everything
/// else keeps the base value. The base is the current remote rule, or
/// the defaults for a create or full replacement.
fn merge_protection(config: &BranchProtectionConfig, base: &BranchProtection) -> BranchProtection {
    let mut required_checks = config
        .required_checks
        .clone()
        .unwrap_or_else(|| base.required_checks.clone());
    required_checks.sort();
    required_checks.dedup();

    BranchProtection {
        required_checks,
        strict: config.strict.unwrap_or(base.strict),
        required_reviews: config.required_reviews.unwrap_or(base.required_reviews),
        dismiss_stale_reviews: config
            .dismiss_stale_reviews
            .unwrap_or(base.dismiss_stale_reviews),
        require_code_owner_reviews: config
            .require_code_owner_reviews
            .unwrap_or(base.require_code_owner_reviews),
        enforce_admins: config.enforce_admins.unwrap_or(base.enforce_admins),
    }
}

fn protection_notes(current: &BranchProtection, merged: &BranchProtection) -> Vec<String> {
    let mut notes = Vec::new();
    if current.required_checks != merged.required_checks {
        notes.push(format!(
            "required checks: [{}] -> [{}]",
            current.required_checks.join(", "),
            merged.required_checks.join(", ")
        ));
    }
    if current.strict != merged.strict {
        notes.push(format!("strict: {} -> {}", current.strict, merged.strict));
    }
    if current.required_reviews != merged.required_reviews {
        notes.push(format!(
            "required reviews: {} -> {}",
            current.required_reviews, merged.required_reviews
        ));
    }
    if current.dismiss_stale_reviews != merged.dismiss_stale_reviews {
        notes.push(format!(
            "dismiss stale reviews: {} -> {}",
            current.dismiss_stale_reviews, merged.dismiss_stale_reviews
        ));
    }
    if current.require_code_owner_reviews != merged.require_code_owner_reviews {
        notes.push(format!(
            "require code owner reviews: {} -> {}",
            current.require_code_owner_reviews, merged.require_code_owner_reviews
        ));
    }
    if current.enforce_admins != merged.enforce_admins {
        notes.push(format!(
            "enforce admins: {} -> {}",
            current.enforce_admins, merged.enforce_admins
        ));
    }
    notes
}

fn diff_protections(
    desired: Option<&[BranchProtectionConfig]>,
    current: &HashMap<String, BranchProtection>,
) -> Vec<Operation> {
    let Some(rules) = desired else {
        return Vec::new();
    };

    let mut operations = Vec::new();

    for rule in rules {
        let existing = current.get(&rule.pattern);

        let op = if rule.absent {
            // Deletion only ever happens through the explicit marker;
            // rules present only remotely are never touched
            match existing {
                Some(_) => Operation {
                    kind: EntityKind::BranchProtection,
                    action: Action::Delete,
                    target: rule.pattern.clone(),
                    payload: Payload::None,
                    notes: vec!["marked absent in configuration".to_string()],
                },
                None => Operation::skip(
                    EntityKind::BranchProtection,
                    &rule.pattern,
                    "already unprotected",
                ),
            }
        } else {
            match existing {
                None => Operation {
                    kind: EntityKind::BranchProtection,
                    action: Action::Create,
                    target: rule.pattern.clone(),
                    payload: Payload::Protection(merge_protection(
                        rule,
                        &BranchProtection::default(),
                    )),
                    notes: Vec::new(),
                },
                Some(existing) => {
                    let base = if rule.replace {
                        BranchProtection::default()
                    } else {
                        existing.clone()
                    };
                    let merged = merge_protection(rule, &base);

                    if merged == *existing {
                        Operation::skip(EntityKind::BranchProtection, &rule.pattern, "up to date")
                    } else {
                        let notes = protection_notes(existing, &merged);
                        Operation {
                            kind: EntityKind::BranchProtection,
                            action: Action::Update,
                            target: rule.pattern.clone(),
                            payload: Payload::Protection(merged),
                            notes,
                        }
                    }
                }
            }
        };

        operations.push(op);
    }

    operations.sort_by(|a, b| a.target.cmp(&b.target));
    operations
}

fn diff_topics(desired: Option<&[String]>, current: &[String]) -> Vec<Operation> {
    let Some(topics) = desired else {
        return Vec::new();
    };

    let desired_set: BTreeSet<String> = topics.iter().map(|t| t.to_lowercase()).collect();
    let current_set: BTreeSet<String> = current.iter().map(|t| t.to_lowercase()).collect();

    if desired_set == current_set {
        return vec![Operation::skip(EntityKind::Topics, "topics", "up to date")];
    }

    let added: Vec<String> = desired_set.difference(&current_set).cloned().collect();
    let removed: Vec<String> = current_set.difference(&desired_set).cloned().collect();
    let mut notes = Vec::new();
    if !added.is_empty() {
        notes.push(format!("add: {}", added.join(", ")));
    }
    if !removed.is_empty() {
        notes.push(format!("remove: {}", removed.join(", ")));
    }

    // The API only supports whole-set replacement
    vec![Operation {
        kind: EntityKind::Topics,
        action: Action::Update,
        target: "topics".to_string(),
        payload: Payload::Topics(desired_set.into_iter().collect()),
        notes,
    }]
}

fn diff_secrets(
    desired: Option<&[SecretConfig]>,
    current: &[SecretInfo],
    policies: &Policies,
) -> Vec<Operation> {
    let Some(secrets) = desired else {
        return Vec::new();
    };

    let current_names: HashSet<&str> = current.iter().map(|s| s.name.as_str()).collect();
    let mut managed: HashSet<String> = HashSet::new();
    let mut operations = Vec::new();

    for secret in secrets {
        let name = secret.normalized_name();
        managed.insert(name.clone());
        let exists = current_names.contains(name.as_str());

        if exists && policies.secret_create_only {
            operations.push(Operation::skip(
                EntityKind::Secret,
                &name,
                "exists, create-only policy",
            ));
        } else {
            // Stored values are never readable, so an upload is issued
            // whenever policy allows; the endpoint is an idempotent upsert
            let note = format!("seal from {} and upload", secret.value_source);
            operations.push(Operation {
                kind: EntityKind::Secret,
                action: Action::Update,
                target: name.clone(),
                payload: Payload::Secret(SecretPayload {
                    name,
                    value_source: secret.value_source.clone(),
                }),
                notes: vec![note],
            });
        }
    }

    for secret in current {
        if managed.contains(&secret.name) {
            continue;
        }
        if policies.prune_secrets {
            operations.push(Operation {
                kind: EntityKind::Secret,
                action: Action::Delete,
                target: secret.name.clone(),
                payload: Payload::None,
                notes: vec!["not in configuration".to_string()],
            });
        } else {
            operations.push(Operation::skip(
                EntityKind::Secret,
                &secret.name,
                "unmanaged, preserved",
            ));
        }
    }

    operations.sort_by(|a, b| a.target.cmp(&b.target));
    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Policies, RepoConfig, SecretConfig, ValueSource};

    fn desired_label(name: &str, color: &str) -> LabelConfig {
        LabelConfig {
            name: name.to_string(),
            color: color.to_string(),
            description: None,
            old_name: None,
        }
    }

    fn current_label(name: &str, color: &str) -> RepoLabel {
        RepoLabel {
            name: name.to_string(),
            color: color.to_string(),
            description: None,
        }
    }

    fn secret(name: &str) -> SecretConfig {
        SecretConfig {
            name: name.to_string(),
            value_source: ValueSource::Env(name.to_string()),
        }
    }

    fn secret_info(name: &str) -> SecretInfo {
        SecretInfo {
            name: name.to_string(),
            updated_at: None,
        }
    }

    fn actions(plan: &ReconciliationPlan) -> Vec<(EntityKind, Action, &str)> {
        plan.operations
            .iter()
            .map(|op| (op.kind, op.action, op.target.as_str()))
            .collect()
    }

    #[test]
    fn test_identical_states_produce_only_skips() {
        let desired = RepoConfig {
            labels: Some(vec![desired_label("bug", "d73a4a")]),
            topics: Some(vec!["rust".to_string()]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            labels: vec![current_label("bug", "d73a4a")],
            topics: vec!["rust".to_string()],
            ..CurrentState::default()
        };

        let plan = diff(&desired, &current);
        assert!(plan.is_noop());
        assert_eq!(plan.counts().skips, 2);
    }

    #[test]
    fn test_create_then_skip_is_idempotent() {
        let desired = RepoConfig {
            labels: Some(vec![desired_label("bug", "d73a4a")]),
            ..RepoConfig::default()
        };

        // First run: label missing remotely
        let plan = diff(&desired, &CurrentState::default());
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Label, Action::Create, "bug")]
        );

        // Second run: the create has been applied
        let converged = CurrentState {
            labels: vec![current_label("bug", "d73a4a")],
            ..CurrentState::default()
        };
        let plan = diff(&desired, &converged);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Label, Action::Skip, "bug")]
        );
    }

    #[test]
    fn test_label_update_on_color_change() {
        let desired = RepoConfig {
            labels: Some(vec![desired_label("bug", "#ff0000")]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            labels: vec![current_label("bug", "d73a4a")],
            ..CurrentState::default()
        };

        let plan = diff(&desired, &current);
        let op = &plan.operations[0];
        assert_eq!(op.action, Action::Update);
        assert_eq!(op.notes, vec!["color: d73a4a -> ff0000"]);
        match &op.payload {
            Payload::Label(payload) => {
                assert_eq!(payload.color, "ff0000");
                assert_eq!(payload.rename_from, None);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_label_match_is_case_insensitive() {
        let desired = RepoConfig {
            labels: Some(vec![desired_label("Bug", "d73a4a")]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            labels: vec![current_label("bug", "d73a4a")],
            ..CurrentState::default()
        };

        // Same identity, different casing: one update, no create/delete
        let plan = diff(&desired, &current);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Label, Action::Update, "Bug")]
        );
        match &plan.operations[0].payload {
            Payload::Label(payload) => {
                assert_eq!(payload.rename_from.as_deref(), Some("bug"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_label_rename_via_old_name() {
        let desired = RepoConfig {
            labels: Some(vec![LabelConfig {
                name: "defect".to_string(),
                color: "d73a4a".to_string(),
                description: None,
                old_name: Some("bug".to_string()),
            }]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            labels: vec![current_label("bug", "d73a4a")],
            ..CurrentState::default()
        };

        // A rename, not a create + delete pair
        let plan = diff(&desired, &current);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Label, Action::Update, "defect")]
        );
        match &plan.operations[0].payload {
            Payload::Label(payload) => {
                assert_eq!(payload.rename_from.as_deref(), Some("bug"));
                assert_eq!(payload.name, "defect");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_old_name_ignored_when_name_matches_directly() {
        let desired = RepoConfig {
            labels: Some(vec![LabelConfig {
                name: "bug".to_string(),
                color: "d73a4a".to_string(),
                description: None,
                old_name: Some("defect".to_string()),
            }]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            labels: vec![
                current_label("bug", "d73a4a"),
                current_label("defect", "d73a4a"),
            ],
            ..CurrentState::default()
        };

        let plan = diff(&desired, &current);
        // "bug" matches directly; "defect" is an unmanaged leftover
        assert_eq!(
            actions(&plan),
            vec![
                (EntityKind::Label, Action::Skip, "bug"),
                (EntityKind::Label, Action::Delete, "defect"),
            ]
        );
    }

    #[test]
    fn test_unmanaged_labels_deleted_or_preserved_by_policy() {
        let desired = RepoConfig {
            labels: Some(vec![desired_label("bug", "d73a4a")]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            labels: vec![
                current_label("bug", "d73a4a"),
                current_label("wontfix", "ffffff"),
            ],
            ..CurrentState::default()
        };

        let plan = diff(&desired, &current);
        assert_eq!(
            actions(&plan),
            vec![
                (EntityKind::Label, Action::Skip, "bug"),
                (EntityKind::Label, Action::Delete, "wontfix"),
            ]
        );

        let preserved = RepoConfig {
            policies: Policies {
                preserve_unmanaged_labels: true,
                ..Policies::default()
            },
            ..desired
        };
        let plan = diff(&preserved, &current);
        assert_eq!(
            actions(&plan),
            vec![
                (EntityKind::Label, Action::Skip, "bug"),
                (EntityKind::Label, Action::Skip, "wontfix"),
            ]
        );
    }

    #[test]
    fn test_protection_create_when_absent_remotely() {
        let desired = RepoConfig {
            branch_protection: Some(vec![BranchProtectionConfig {
                pattern: "main".to_string(),
                required_checks: Some(vec!["ci/test".to_string()]),
                required_reviews: Some(2),
                ..BranchProtectionConfig::default()
            }]),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &CurrentState::default());
        let op = &plan.operations[0];
        assert_eq!(op.action, Action::Create);
        match &op.payload {
            Payload::Protection(rule) => {
                assert_eq!(rule.required_checks, vec!["ci/test"]);
                assert_eq!(rule.required_reviews, 2);
                // Unset fields take defaults on create
                assert!(!rule.dismiss_stale_reviews);
                assert!(!rule.enforce_admins);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_protection_merge_keeps_unset_fields() {
        let mut protections = HashMap::new();
        protections.insert(
            "main".to_string(),
            BranchProtection {
                required_reviews: 1,
                dismiss_stale_reviews: false,
                ..BranchProtection::default()
            },
        );
        let current = CurrentState {
            protections,
            ..CurrentState::default()
        };

        let desired = RepoConfig {
            branch_protection: Some(vec![BranchProtectionConfig {
                pattern: "main".to_string(),
                required_reviews: Some(2),
                ..BranchProtectionConfig::default()
            }]),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &current);
        let op = &plan.operations[0];
        assert_eq!(op.action, Action::Update);
        match &op.payload {
            Payload::Protection(merged) => {
                assert_eq!(merged.required_reviews, 2);
                // dismiss_stale_reviews was unset in config: current value kept
                assert!(!merged.dismiss_stale_reviews);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(op.notes, vec!["required reviews: 1 -> 2"]);
    }

    #[test]
    fn test_protection_merge_skips_when_converged() {
        let mut protections = HashMap::new();
        protections.insert(
            "main".to_string(),
            BranchProtection {
                required_reviews: 2,
                enforce_admins: true,
                ..BranchProtection::default()
            },
        );
        let current = CurrentState {
            protections,
            ..CurrentState::default()
        };

        let desired = RepoConfig {
            branch_protection: Some(vec![BranchProtectionConfig {
                pattern: "main".to_string(),
                required_reviews: Some(2),
                ..BranchProtectionConfig::default()
            }]),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &current);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_protection_replace_resets_unset_fields() {
        let mut protections = HashMap::new();
        protections.insert(
            "main".to_string(),
            BranchProtection {
                required_reviews: 2,
                enforce_admins: true,
                ..BranchProtection::default()
            },
        );
        let current = CurrentState {
            protections,
            ..CurrentState::default()
        };

        let desired = RepoConfig {
            branch_protection: Some(vec![BranchProtectionConfig {
                pattern: "main".to_string(),
                required_reviews: Some(2),
                replace: true,
                ..BranchProtectionConfig::default()
            }]),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &current);
        let op = &plan.operations[0];
        assert_eq!(op.action, Action::Update);
        match &op.payload {
            // enforce_admins was unset, so replacement resets it
            Payload::Protection(merged) => assert!(!merged.enforce_admins),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_protection_absent_marker() {
        let mut protections = HashMap::new();
        protections.insert("legacy".to_string(), BranchProtection::default());
        let current = CurrentState {
            protections,
            ..CurrentState::default()
        };

        let absent_rule = |pattern: &str| BranchProtectionConfig {
            pattern: pattern.to_string(),
            absent: true,
            ..BranchProtectionConfig::default()
        };
        let desired = RepoConfig {
            branch_protection: Some(vec![absent_rule("legacy"), absent_rule("gone")]),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &current);
        assert_eq!(
            actions(&plan),
            vec![
                (EntityKind::BranchProtection, Action::Skip, "gone"),
                (EntityKind::BranchProtection, Action::Delete, "legacy"),
            ]
        );
    }

    #[test]
    fn test_remote_only_protection_left_untouched() {
        let mut protections = HashMap::new();
        protections.insert("release".to_string(), BranchProtection::default());
        let current = CurrentState {
            protections,
            ..CurrentState::default()
        };

        // "release" is not in the configuration at all
        let desired = RepoConfig {
            branch_protection: Some(vec![BranchProtectionConfig {
                pattern: "main".to_string(),
                required_reviews: Some(1),
                ..BranchProtectionConfig::default()
            }]),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &current);
        assert!(!plan
            .operations
            .iter()
            .any(|op| op.target == "release"));
    }

    #[test]
    fn test_topics_compared_as_sets() {
        let desired = RepoConfig {
            topics: Some(vec!["CLI".to_string(), "rust".to_string()]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            topics: vec!["rust".to_string(), "cli".to_string()],
            ..CurrentState::default()
        };

        let plan = diff(&desired, &current);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_topics_replaced_as_whole_set() {
        let desired = RepoConfig {
            topics: Some(vec!["rust".to_string(), "sync".to_string()]),
            ..RepoConfig::default()
        };
        let current = CurrentState {
            topics: vec!["rust".to_string(), "python".to_string()],
            ..CurrentState::default()
        };

        let plan = diff(&desired, &current);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Topics, Action::Update, "topics")]
        );
        match &plan.operations[0].payload {
            Payload::Topics(names) => assert_eq!(names, &["rust", "sync"]),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(
            plan.operations[0].notes,
            vec!["add: sync", "remove: python"]
        );
    }

    #[test]
    fn test_secret_create_only_policy() {
        let current = CurrentState {
            secrets: vec![secret_info("API_KEY")],
            ..CurrentState::default()
        };

        let create_only = RepoConfig {
            secrets: Some(vec![secret("API_KEY")]),
            policies: Policies {
                secret_create_only: true,
                ..Policies::default()
            },
            ..RepoConfig::default()
        };
        let plan = diff(&create_only, &current);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Secret, Action::Skip, "API_KEY")]
        );

        let always_update = RepoConfig {
            secrets: Some(vec![secret("API_KEY")]),
            ..RepoConfig::default()
        };
        let plan = diff(&always_update, &current);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Secret, Action::Update, "API_KEY")]
        );
    }

    #[test]
    fn test_secret_upload_regardless_of_existence_without_policy() {
        let desired = RepoConfig {
            secrets: Some(vec![secret("api_key")]),
            ..RepoConfig::default()
        };

        // Missing remotely: still an update (the endpoint is an upsert)
        let plan = diff(&desired, &CurrentState::default());
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Secret, Action::Update, "API_KEY")]
        );
    }

    #[test]
    fn test_unmanaged_secrets_pruned_only_by_policy() {
        let current = CurrentState {
            secrets: vec![secret_info("DEPLOY_KEY")],
            ..CurrentState::default()
        };

        let no_prune = RepoConfig {
            secrets: Some(vec![]),
            ..RepoConfig::default()
        };
        let plan = diff(&no_prune, &current);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Secret, Action::Skip, "DEPLOY_KEY")]
        );

        let prune = RepoConfig {
            secrets: Some(vec![]),
            policies: Policies {
                prune_secrets: true,
                ..Policies::default()
            },
            ..RepoConfig::default()
        };
        let plan = diff(&prune, &current);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Secret, Action::Delete, "DEPLOY_KEY")]
        );
    }

    #[test]
    fn test_secret_payload_never_carries_plaintext() {
        let desired = RepoConfig {
            secrets: Some(vec![SecretConfig {
                name: "API_KEY".to_string(),
                value_source: ValueSource::Literal("hunter2".to_string()),
            }]),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &CurrentState::default());
        for note in &plan.operations[0].notes {
            assert!(!note.contains("hunter2"));
        }
    }

    #[test]
    fn test_settings_update_only_on_differences() {
        let desired = RepoConfig {
            settings: Some(SettingsConfig {
                description: Some("a tool".to_string()),
                allow_merge_commit: Some(false),
                ..SettingsConfig::default()
            }),
            ..RepoConfig::default()
        };

        let current = CurrentState {
            settings: RepoSettings {
                description: Some("a tool".to_string()),
                allow_merge_commit: false,
                ..RepoSettings::default()
            },
            ..CurrentState::default()
        };
        assert!(diff(&desired, &current).is_noop());

        let drifted = CurrentState::default();
        let plan = diff(&desired, &drifted);
        assert_eq!(
            actions(&plan),
            vec![(EntityKind::Settings, Action::Update, "repository")]
        );
        assert_eq!(plan.operations[0].notes.len(), 2);
    }

    #[test]
    fn test_omitted_sections_are_unmanaged() {
        let current = CurrentState {
            labels: vec![current_label("bug", "d73a4a")],
            secrets: vec![secret_info("API_KEY")],
            topics: vec!["rust".to_string()],
            ..CurrentState::default()
        };

        let plan = diff(&RepoConfig::default(), &current);
        assert!(plan.operations.is_empty());
    }

    #[test]
    fn test_kind_ordering_is_fixed() {
        let desired = RepoConfig {
            labels: Some(vec![desired_label("bug", "d73a4a")]),
            branch_protection: Some(vec![BranchProtectionConfig {
                pattern: "main".to_string(),
                required_reviews: Some(1),
                ..BranchProtectionConfig::default()
            }]),
            secrets: Some(vec![secret("API_KEY")]),
            topics: Some(vec!["rust".to_string()]),
            settings: Some(SettingsConfig {
                description: Some("a tool".to_string()),
                ..SettingsConfig::default()
            }),
            ..RepoConfig::default()
        };

        let plan = diff(&desired, &CurrentState::default());
        let kinds: Vec<EntityKind> = plan.operations.iter().map(|op| op.kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
        assert_eq!(kinds.first(), Some(&EntityKind::Settings));
        assert_eq!(kinds.last(), Some(&EntityKind::Secret));
    }

    #[test]
    fn test_plans_are_deterministic_for_reordered_input() {
        let current = CurrentState {
            labels: vec![
                current_label("zeta", "000000"),
                current_label("alpha", "111111"),
            ],
            ..CurrentState::default()
        };

        let forward = RepoConfig {
            labels: Some(vec![
                desired_label("beta", "222222"),
                desired_label("alpha", "111111"),
            ]),
            ..RepoConfig::default()
        };
        let reversed = RepoConfig {
            labels: Some(vec![
                desired_label("alpha", "111111"),
                desired_label("beta", "222222"),
            ]),
            ..RepoConfig::default()
        };

        let a = diff(&forward, &current);
        let b = diff(&reversed, &current);
        assert_eq!(a, b);

        let targets: Vec<&str> = a.operations.iter().map(|op| op.target.as_str()).collect();
        assert_eq!(targets, vec!["alpha", "beta", "zeta"]);
    }
}
