//! Configuration Management
//!
//! Desired-state configuration: entity definitions, validation and file loading

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Convention-based configuration file names searched in order
pub const CONVENTION_CONFIG_FILES: &[&str] = &[
    ".gh-reposync.yml",
    ".gh-reposync.yaml",
    ".gh-reposync.json",
    ".github/reposync.yml",
    ".github/reposync.yaml",
    ".github/reposync.json",
];

/// A target repository, identified by owner and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    /// Parse an "owner/repo" string
    ///
    /// # Errors
    /// Returns an error if the format is invalid
    pub fn parse(repo: &str) -> Result<Self> {
        let parts: Vec<&str> = repo.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::InvalidRepositoryFormat(repo.to_string()));
        }
        Ok(Self {
            owner: parts[0].to_string(),
            name: parts[1].to_string(),
        })
    }
}

impl FromStr for RepositoryRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Label Configuration
///
/// Represents a desired GitHub label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelConfig {
    /// Label name (matched case-insensitively against the repository)
    pub name: String,

    /// Label color (6-digit hex code, leading # optional)
    pub color: String,

    /// Label description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Previous name of this label; a current label with this name is
    /// renamed rather than deleted and recreated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,
}

impl LabelConfig {
    /// Validate label configuration
    ///
    /// # Errors
    /// - If the name is empty
    /// - If the color format is invalid
    /// - If `old_name` is empty or equal to the name
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("label name cannot be empty"));
        }

        if !is_valid_hex_color(&self.normalized_color()) {
            return Err(Error::InvalidLabelColor(self.color.clone()));
        }

        if let Some(old_name) = &self.old_name {
            if old_name.trim().is_empty() {
                return Err(Error::config(format!(
                    "label {:?}: old_name cannot be empty",
                    self.name
                )));
            }
            if old_name.eq_ignore_ascii_case(&self.name) {
                return Err(Error::config(format!(
                    "label {:?}: old_name equals the label name",
                    self.name
                )));
            }
        }

        Ok(())
    }

    /// Color with the leading # stripped, lowercased (the form the API uses)
    pub fn normalized_color(&self) -> String {
        normalize_color(&self.color)
    }
}

/// Normalize a color (remove # and convert to lowercase)
pub fn normalize_color(color: &str) -> String {
    color.trim_start_matches('#').to_lowercase()
}

/// Branch Protection Configuration
///
/// A desired branch protection rule. Unset fields keep their current
/// remote value when the rule already exists; `replace` turns the
/// field-by-field merge into a full replacement, and `absent` requests
/// deletion of the rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BranchProtectionConfig {
    /// Branch name pattern the rule applies to
    pub pattern: String,

    /// Required status check contexts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_checks: Option<Vec<String>>,

    /// Require branches to be up to date before merging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Required approving review count (0 disables the review requirement)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_reviews: Option<u32>,

    /// Dismiss stale reviews when new commits are pushed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismiss_stale_reviews: Option<bool>,

    /// Require a review from a code owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_code_owner_reviews: Option<bool>,

    /// Enforce the rule for repository administrators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_admins: Option<bool>,

    /// Replace the remote rule wholesale instead of merging field-by-field
    #[serde(default)]
    pub replace: bool,

    /// Delete the remote rule. This is the only way a rule is ever removed.
    #[serde(default)]
    pub absent: bool,
}

impl BranchProtectionConfig {
    /// Whether any protection field is explicitly set
    pub fn has_fields(&self) -> bool {
        self.required_checks.is_some()
            || self.strict.is_some()
            || self.required_reviews.is_some()
            || self.dismiss_stale_reviews.is_some()
            || self.require_code_owner_reviews.is_some()
            || self.enforce_admins.is_some()
    }

    /// Validate branch protection configuration
    ///
    /// # Errors
    /// - If the pattern is empty
    /// - If `absent` is combined with `replace` or protection fields
    /// - If the review count is out of the API's 0..=6 range
    pub fn validate(&self) -> Result<()> {
        if self.pattern.trim().is_empty() {
            return Err(Error::config("branch protection pattern cannot be empty"));
        }

        if self.absent && (self.replace || self.has_fields()) {
            return Err(Error::config(format!(
                "branch protection {:?}: absent cannot be combined with other fields",
                self.pattern
            )));
        }

        if let Some(reviews) = self.required_reviews {
            if reviews > 6 {
                return Err(Error::config(format!(
                    "branch protection {:?}: required_reviews must be 0..=6, got {}",
                    self.pattern, reviews
                )));
            }
        }

        Ok(())
    }
}

/// Where a secret's plaintext comes from.
///
/// Written in configuration as a prefixed string: `env:VAR`, `file:PATH`
/// or `literal:VALUE`. Resolution happens at execution time only, so the
/// plaintext never appears in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueSource {
    /// Read from an environment variable
    Env(String),

    /// Read from a file (trailing newline trimmed)
    File(String),

    /// Use the given value directly
    Literal(String),
}

impl TryFrom<String> for ValueSource {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        if let Some(var) = value.strip_prefix("env:") {
            if var.is_empty() {
                return Err(Error::config("value_source env: variable name is empty"));
            }
            Ok(ValueSource::Env(var.to_string()))
        } else if let Some(path) = value.strip_prefix("file:") {
            if path.is_empty() {
                return Err(Error::config("value_source file: path is empty"));
            }
            Ok(ValueSource::File(path.to_string()))
        } else if let Some(literal) = value.strip_prefix("literal:") {
            Ok(ValueSource::Literal(literal.to_string()))
        } else {
            Err(Error::config(format!(
                "value_source {value:?} must start with 'env:', 'file:' or 'literal:'"
            )))
        }
    }
}

impl From<ValueSource> for String {
    fn from(source: ValueSource) -> Self {
        match source {
            ValueSource::Env(var) => format!("env:{var}"),
            ValueSource::File(path) => format!("file:{path}"),
            ValueSource::Literal(value) => format!("literal:{value}"),
        }
    }
}

impl fmt::Display for ValueSource {
    /// Literal values are redacted; this is what plan output shows
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Env(var) => write!(f, "env:{var}"),
            ValueSource::File(path) => write!(f, "file:{path}"),
            ValueSource::Literal(_) => write!(f, "literal:***"),
        }
    }
}

/// Secret Configuration
///
/// A desired GitHub Actions secret
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretConfig {
    /// Secret name (normalized to uppercase)
    pub name: String,

    /// Where the plaintext comes from
    pub value_source: ValueSource,
}

impl SecretConfig {
    /// Uppercase-normalized secret name, the identity used for matching
    pub fn normalized_name(&self) -> String {
        self.name.to_uppercase()
    }

    /// Validate secret configuration
    ///
    /// # Errors
    /// If the name is empty, contains invalid characters, starts with a
    /// digit, or uses the reserved `GITHUB_` prefix
    pub fn validate(&self) -> Result<()> {
        let name = self.normalized_name();

        if name.is_empty() {
            return Err(Error::config("secret name cannot be empty"));
        }

        if !name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            return Err(Error::config(format!(
                "secret {:?}: name may only contain letters, digits and underscores",
                self.name
            )));
        }

        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::config(format!(
                "secret {:?}: name cannot start with a digit",
                self.name
            )));
        }

        if name.starts_with("GITHUB_") {
            return Err(Error::config(format!(
                "secret {:?}: the GITHUB_ prefix is reserved",
                self.name
            )));
        }

        Ok(())
    }
}

/// Repository Settings Configuration
///
/// Basic repository settings. Only explicitly set fields are compared and
/// sent; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SettingsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_issues: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_wiki: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_projects: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_squash_merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_merge_commit: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_rebase_merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_branch_on_merge: Option<bool>,
}

impl SettingsConfig {
    /// Whether no field is set at all (an empty section manages nothing)
    pub fn is_empty(&self) -> bool {
        *self == SettingsConfig::default()
    }
}

/// Reconciliation policies
///
/// All destructive behavior is opt-in; the defaults never delete
/// anything that is not explicitly managed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policies {
    /// Keep repository labels that are not in the configuration
    #[serde(default)]
    pub preserve_unmanaged_labels: bool,

    /// Delete remote secrets that are not in the configuration
    #[serde(default)]
    pub prune_secrets: bool,

    /// Never overwrite a secret that already exists remotely
    #[serde(default)]
    pub secret_create_only: bool,
}

/// Repository Configuration
///
/// The full desired state for one repository. Omitted sections leave the
/// corresponding kind unmanaged: no operations are planned for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LabelConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_protection: Option<Vec<BranchProtectionConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<SecretConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsConfig>,

    #[serde(default)]
    pub policies: Policies,
}

impl RepoConfig {
    /// Validate the whole configuration
    ///
    /// # Errors
    /// Returns the first problem found, naming the offending entity
    pub fn validate(&self) -> Result<()> {
        if let Some(labels) = &self.labels {
            let mut seen = std::collections::HashSet::new();
            let mut seen_old = std::collections::HashSet::new();
            for label in labels {
                label.validate()?;
                if !seen.insert(label.name.to_lowercase()) {
                    return Err(Error::config(format!(
                        "duplicate label name {:?}",
                        label.name
                    )));
                }
                if let Some(old_name) = &label.old_name {
                    if !seen_old.insert(old_name.to_lowercase()) {
                        return Err(Error::config(format!(
                            "old_name {old_name:?} is claimed by more than one label"
                        )));
                    }
                }
            }
        }

        if let Some(rules) = &self.branch_protection {
            let mut seen = std::collections::HashSet::new();
            for rule in rules {
                rule.validate()?;
                if !seen.insert(rule.pattern.clone()) {
                    return Err(Error::config(format!(
                        "duplicate branch protection pattern {:?}",
                        rule.pattern
                    )));
                }
            }
        }

        if let Some(secrets) = &self.secrets {
            let mut seen = std::collections::HashSet::new();
            for secret in secrets {
                secret.validate()?;
                if !seen.insert(secret.normalized_name()) {
                    return Err(Error::config(format!(
                        "duplicate secret name {:?}",
                        secret.normalized_name()
                    )));
                }
            }
        }

        if let Some(topics) = &self.topics {
            let mut seen = std::collections::HashSet::new();
            for topic in topics {
                let normalized = topic.to_lowercase();
                if normalized.is_empty() || normalized.len() > 50 {
                    return Err(Error::config(format!(
                        "topic {topic:?} must be 1..=50 characters"
                    )));
                }
                if !normalized
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                {
                    return Err(Error::config(format!(
                        "topic {topic:?} may only contain letters, digits and hyphens"
                    )));
                }
                if !seen.insert(normalized) {
                    return Err(Error::config(format!("duplicate topic {topic:?}")));
                }
            }
        }

        Ok(())
    }

    /// Branch name patterns the fetcher needs current protection state for,
    /// including ones marked absent (to decide delete vs. skip)
    pub fn protection_patterns(&self) -> Vec<String> {
        self.branch_protection
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|rule| rule.pattern.clone())
            .collect()
    }
}

/// Load configuration from a YAML or JSON file, detecting format by extension
///
/// # Errors
/// If the file is missing, fails to parse, or fails validation
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RepoConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("configuration file not found: {}", path.display()),
        )
        .into());
    }

    let content = std::fs::read_to_string(path)?;
    let config: RepoConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        _ => {
            return Err(Error::config(
                "configuration file must be .json, .yaml, or .yml",
            ))
        }
    };

    config.validate()?;
    Ok(config)
}

/// Search for a convention-based configuration file in the current directory
///
/// # Returns
/// The path to the first matching file, or `None` if no file is found
pub fn find_convention_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_convention_config_in(&cwd)
}

/// Search for a convention-based configuration file in the given directory
pub fn find_convention_config_in(dir: &Path) -> Option<PathBuf> {
    for filename in CONVENTION_CONFIG_FILES {
        let path = dir.join(filename);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Generate a starter configuration
///
/// GitHub's standard label set plus a conservative protection rule for
/// the default branch; secrets and topics are left for the user to fill in.
pub fn default_config() -> RepoConfig {
    let label = |name: &str, color: &str, description: &str, old_name: Option<&str>| LabelConfig {
        name: name.to_string(),
        color: color.to_string(),
        description: Some(description.to_string()),
        old_name: old_name.map(str::to_string),
    };

    RepoConfig {
        labels: Some(vec![
            label("bug", "d73a4a", "Something isn't working", Some("defect")),
            label("enhancement", "a2eeef", "New feature or request", Some("feature")),
            label(
                "documentation",
                "0075ca",
                "Improvements or additions to documentation",
                None,
            ),
            label(
                "duplicate",
                "cfd3d7",
                "This issue or pull request already exists",
                None,
            ),
            label("good first issue", "7057ff", "Good for newcomers", None),
            label("help wanted", "008672", "Extra attention is needed", None),
        ]),
        branch_protection: Some(vec![BranchProtectionConfig {
            pattern: "main".to_string(),
            required_reviews: Some(1),
            ..BranchProtectionConfig::default()
        }]),
        secrets: None,
        topics: None,
        settings: None,
        policies: Policies::default(),
    }
}

/// Validate hex color code (6 hex digits, no #)
fn is_valid_hex_color(color: &str) -> bool {
    color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit())
}
