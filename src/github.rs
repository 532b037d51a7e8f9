//! GitHub API Client
//!
//! Module for managing interactions with the GitHub API. Labels and
//! identity go through octocrab; branch protection, secrets, topics and
//! repository settings use typed wrappers over the REST endpoints that
//! octocrab does not cover.

use std::collections::HashMap;

use octocrab::Octocrab;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::{RepositoryRef, SettingsConfig};
use crate::error::{Error, Result};
use crate::plan::LabelPayload;
use crate::seal::SealedSecret;

const API_ROOT: &str = "https://api.github.com";

/// Encode a string for use in URL path segments (RFC 3986 with UTF-8 support)
///
/// Only unreserved characters (A-Z, a-z, 0-9, -, ., _, ~) are left unencoded.
fn encode_path_segment(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~' => c.to_string(),
            _ => c
                .to_string()
                .bytes()
                .map(|b| format!("%{:02X}", b))
                .collect::<String>(),
        })
        .collect()
}

/// A label as it exists in the repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoLabel {
    pub name: String,

    /// 6-digit hexadecimal, without #
    pub color: String,

    pub description: Option<String>,
}

/// A concrete branch protection rule.
///
/// Used both for the current remote state and as the merged payload the
/// engine produces; the defaults are what an unset field means on a
/// freshly created rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchProtection {
    /// Required status check contexts, sorted and deduplicated
    pub required_checks: Vec<String>,

    /// Require branches to be up to date before merging
    pub strict: bool,

    /// Required approving review count (0 = no review requirement)
    pub required_reviews: u32,

    pub dismiss_stale_reviews: bool,

    pub require_code_owner_reviews: bool,

    pub enforce_admins: bool,
}

/// Metadata for a secret; the API never exposes values
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SecretInfo {
    pub name: String,

    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Current repository settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSettings {
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub has_issues: bool,
    pub has_wiki: bool,
    pub has_projects: bool,
    pub allow_squash_merge: bool,
    pub allow_merge_commit: bool,
    pub allow_rebase_merge: bool,
    pub delete_branch_on_merge: bool,
}

impl Default for RepoSettings {
    /// GitHub's defaults for a new repository
    fn default() -> Self {
        Self {
            description: None,
            homepage: None,
            has_issues: true,
            has_wiki: true,
            has_projects: true,
            allow_squash_merge: true,
            allow_merge_commit: true,
            allow_rebase_merge: true,
            delete_branch_on_merge: false,
        }
    }
}

/// A complete snapshot of the remote state the engine diffs against
#[derive(Debug, Clone, Default)]
pub struct CurrentState {
    pub labels: Vec<RepoLabel>,

    /// Protection rules for the requested patterns; a missing entry means
    /// the branch is not protected
    pub protections: HashMap<String, BranchProtection>,

    pub secrets: Vec<SecretInfo>,

    pub topics: Vec<String>,

    pub settings: RepoSettings,
}

/// The public key secrets are sealed with before upload
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsPublicKey {
    pub key_id: String,

    /// Base64-encoded 32-byte key
    pub key: String,
}

/// Rate limit information
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Hourly limit
    pub limit: u32,

    /// Remaining usage count
    pub remaining: u32,

    /// Reset time
    pub reset_at: chrono::DateTime<chrono::Utc>,
}

// ---------------------------------------------------------------------------
// Wire models. Partial on purpose: fields the engine does not need are
// ignored on responses and never sent on requests.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RepositoryWire {
    description: Option<String>,
    homepage: Option<String>,
    has_issues: Option<bool>,
    has_wiki: Option<bool>,
    has_projects: Option<bool>,
    allow_squash_merge: Option<bool>,
    allow_merge_commit: Option<bool>,
    allow_rebase_merge: Option<bool>,
    delete_branch_on_merge: Option<bool>,
    topics: Option<Vec<String>>,
}

impl RepositoryWire {
    fn into_settings(self) -> RepoSettings {
        let defaults = RepoSettings::default();
        RepoSettings {
            description: self.description,
            homepage: self.homepage.filter(|h| !h.is_empty()),
            has_issues: self.has_issues.unwrap_or(defaults.has_issues),
            has_wiki: self.has_wiki.unwrap_or(defaults.has_wiki),
            has_projects: self.has_projects.unwrap_or(defaults.has_projects),
            allow_squash_merge: self.allow_squash_merge.unwrap_or(defaults.allow_squash_merge),
            allow_merge_commit: self.allow_merge_commit.unwrap_or(defaults.allow_merge_commit),
            allow_rebase_merge: self.allow_rebase_merge.unwrap_or(defaults.allow_rebase_merge),
            delete_branch_on_merge: self
                .delete_branch_on_merge
                .unwrap_or(defaults.delete_branch_on_merge),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusChecksWire {
    strict: bool,
    contexts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EnabledWire {
    enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewsResponseWire {
    #[serde(default)]
    dismiss_stale_reviews: bool,
    #[serde(default)]
    require_code_owner_reviews: bool,
    #[serde(default)]
    required_approving_review_count: u32,
}

#[derive(Debug, Deserialize)]
struct ProtectionResponseWire {
    required_status_checks: Option<StatusChecksWire>,
    enforce_admins: Option<EnabledWire>,
    required_pull_request_reviews: Option<ReviewsResponseWire>,
}

impl From<ProtectionResponseWire> for BranchProtection {
    fn from(wire: ProtectionResponseWire) -> Self {
        let (strict, mut contexts) = wire
            .required_status_checks
            .map(|c| (c.strict, c.contexts))
            .unwrap_or((false, Vec::new()));
        contexts.sort();
        contexts.dedup();

        let reviews = wire.required_pull_request_reviews.unwrap_or_default();

        BranchProtection {
            required_checks: contexts,
            strict,
            required_reviews: reviews.required_approving_review_count,
            dismiss_stale_reviews: reviews.dismiss_stale_reviews,
            require_code_owner_reviews: reviews.require_code_owner_reviews,
            enforce_admins: wire.enforce_admins.map(|e| e.enabled).unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReviewsRequestWire {
    dismiss_stale_reviews: bool,
    require_code_owner_reviews: bool,
    required_approving_review_count: u32,
}

/// PUT protection body; the endpoint requires all four keys, with null
/// for requirements that should not apply
#[derive(Debug, Serialize)]
struct ProtectionRequestWire {
    required_status_checks: Option<StatusChecksWire>,
    enforce_admins: bool,
    required_pull_request_reviews: Option<ReviewsRequestWire>,
    restrictions: Option<()>,
}

impl From<&BranchProtection> for ProtectionRequestWire {
    fn from(rule: &BranchProtection) -> Self {
        let required_status_checks = if rule.required_checks.is_empty() && !rule.strict {
            None
        } else {
            Some(StatusChecksWire {
                strict: rule.strict,
                contexts: rule.required_checks.clone(),
            })
        };

        let required_pull_request_reviews = if rule.required_reviews == 0
            && !rule.dismiss_stale_reviews
            && !rule.require_code_owner_reviews
        {
            None
        } else {
            Some(ReviewsRequestWire {
                dismiss_stale_reviews: rule.dismiss_stale_reviews,
                require_code_owner_reviews: rule.require_code_owner_reviews,
                required_approving_review_count: rule.required_reviews,
            })
        };

        Self {
            required_status_checks,
            enforce_admins: rule.enforce_admins,
            required_pull_request_reviews,
            restrictions: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SecretsPageWire {
    total_count: u64,
    secrets: Vec<SecretInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TopicsWire {
    names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LabelUpdateWire<'a> {
    new_name: &'a str,
    color: &'a str,
    description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorWire {
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Mutating operations the plan executor needs.
///
/// [`GitHubClient`] is the production implementation; executor tests use
/// an in-memory double.
#[allow(async_fn_in_trait)]
pub trait RemoteOps {
    async fn create_label(&self, label: &LabelPayload) -> Result<()>;
    async fn update_label(&self, from: &str, label: &LabelPayload) -> Result<()>;
    async fn delete_label(&self, name: &str) -> Result<()>;
    async fn put_protection(&self, pattern: &str, rule: &BranchProtection) -> Result<()>;
    async fn delete_protection(&self, pattern: &str) -> Result<()>;
    async fn replace_topics(&self, names: &[String]) -> Result<()>;
    async fn update_settings(&self, settings: &SettingsConfig) -> Result<()>;
    async fn secrets_public_key(&self) -> Result<SecretsPublicKey>;
    async fn put_secret(&self, name: &str, sealed: &SealedSecret) -> Result<()>;
    async fn delete_secret(&self, name: &str) -> Result<()>;
}

/// GitHub API Client
///
/// Client responsible for interactions with the GitHub API for one
/// repository. Holds the credential; nothing else in the crate sees it.
pub struct GitHubClient {
    octocrab: Octocrab,
    http: reqwest::Client,
    repo: RepositoryRef,
}

impl GitHubClient {
    /// Create a new GitHub client and verify the credential.
    ///
    /// # Errors
    /// Returns [`Error::Auth`] if the token is rejected
    pub async fn new(access_token: &str, repo: RepositoryRef) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(access_token.to_string())
            .build()
            .map_err(Error::GitHubApi)?;

        // Authentication test
        octocrab.current().user().await.map_err(|_| Error::Auth)?;

        let mut headers = HeaderMap::new();
        let mut auth =
            HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|_| Error::Auth)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!("gh-reposync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            octocrab,
            http,
            repo,
        })
    }

    /// The repository this client operates on
    pub fn repository(&self) -> &RepositoryRef {
        &self.repo
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{API_ROOT}/repos/{}/{}{tail}", self.repo.owner, self.repo.name)
    }

    /// Fetch the complete current state of the repository.
    ///
    /// `patterns` lists the branch name patterns the configuration
    /// references; protection state is only inspected for those.
    ///
    /// # Errors
    /// Fails as a whole on the first problem; a partial snapshot is
    /// never returned.
    pub async fn fetch_state(&self, patterns: &[String]) -> Result<CurrentState> {
        let repository = self.fetch_repository().await?;
        let labels = self.fetch_labels().await?;

        let mut protections = HashMap::new();
        for pattern in patterns {
            if let Some(rule) = self.fetch_protection(pattern).await? {
                protections.insert(pattern.clone(), rule);
            }
        }

        let secrets = self.fetch_secrets().await?;

        let mut topics = repository.topics.clone().unwrap_or_default();
        topics.sort();

        Ok(CurrentState {
            labels,
            protections,
            secrets,
            topics,
            settings: repository.into_settings(),
        })
    }

    async fn fetch_repository(&self) -> Result<RepositoryWire> {
        let response = self.http.get(self.repo_url("")).send().await?;
        let response = self.check_fetch(response).await?;
        Ok(response.json().await?)
    }

    /// Get all labels from the repository, paging through the full set
    async fn fetch_labels(&self) -> Result<Vec<RepoLabel>> {
        let mut labels = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .octocrab
                .issues(&self.repo.owner, &self.repo.name)
                .list_labels_for_repo()
                .page(page)
                .per_page(100)
                .send()
                .await
                .map_err(|e| self.map_octocrab_fetch(e))?;

            if response.items.is_empty() {
                break;
            }

            for label in response.items {
                labels.push(RepoLabel {
                    name: label.name,
                    color: label.color,
                    description: label.description,
                });
            }

            page += 1;
        }

        Ok(labels)
    }

    /// Get the protection rule for one branch pattern, or `None` if the
    /// branch is not protected
    async fn fetch_protection(&self, pattern: &str) -> Result<Option<BranchProtection>> {
        let url = self.repo_url(&format!(
            "/branches/{}/protection",
            encode_path_segment(pattern)
        ));
        let response = self.http.get(url).send().await?;

        // 404 means "branch not protected" here, not a missing repository
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = self.check_fetch(response).await?;
        let wire: ProtectionResponseWire = response.json().await?;
        Ok(Some(wire.into()))
    }

    /// List secret names and timestamps, paging through the full set
    async fn fetch_secrets(&self) -> Result<Vec<SecretInfo>> {
        let mut secrets = Vec::new();
        let mut page = 1u32;

        loop {
            let url = self.repo_url(&format!("/actions/secrets?per_page=100&page={page}"));
            let response = self.http.get(url).send().await?;
            let response = self.check_fetch(response).await?;
            let wire: SecretsPageWire = response.json().await?;

            let total = wire.total_count as usize;
            if wire.secrets.is_empty() {
                break;
            }
            secrets.extend(wire.secrets);
            if secrets.len() >= total {
                break;
            }
            page += 1;
        }

        Ok(secrets)
    }

    /// Get rate limit information
    pub async fn rate_limit(&self) -> Result<RateLimitInfo> {
        let rate_limit = self
            .octocrab
            .ratelimit()
            .get()
            .await
            .map_err(Error::GitHubApi)?;

        Ok(RateLimitInfo {
            limit: rate_limit.resources.core.limit as u32,
            remaining: rate_limit.resources.core.remaining as u32,
            reset_at: chrono::DateTime::from_timestamp(rate_limit.resources.core.reset as i64, 0)
                .unwrap_or_else(chrono::Utc::now),
        })
    }

    // -- response handling --------------------------------------------------

    fn rate_limited(response: &reqwest::Response) -> bool {
        response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0")
    }

    async fn body_message(response: reqwest::Response) -> String {
        match response.json::<ApiErrorWire>().await {
            Ok(wire) => wire.message.unwrap_or_else(|| "no error message".to_string()),
            Err(_) => "no error message".to_string(),
        }
    }

    /// Map a fetch-phase response; any failure here aborts the whole run
    async fn check_fetch(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(match status {
            StatusCode::UNAUTHORIZED => Error::Auth,
            StatusCode::FORBIDDEN if Self::rate_limited(&response) => Error::RateLimit,
            StatusCode::FORBIDDEN => Error::Auth,
            StatusCode::NOT_FOUND => Error::RepositoryNotFound(self.repo.to_string()),
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimit,
            _ => Error::UnexpectedStatus {
                status: status.as_u16(),
                context: format!("fetching state of {}", self.repo),
            },
        })
    }

    /// Map a mutation response; 4xx failures isolate to the operation
    async fn check_op(&self, response: reqwest::Response, entity: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        Err(match status {
            StatusCode::UNAUTHORIZED => Error::Auth,
            StatusCode::FORBIDDEN if Self::rate_limited(&response) => Error::RateLimit,
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimit,
            s if s.is_client_error() => {
                Error::validation(entity, Self::body_message(response).await)
            }
            _ => Error::UnexpectedStatus {
                status: status.as_u16(),
                context: entity.to_string(),
            },
        })
    }

    fn map_octocrab_fetch(&self, error: octocrab::Error) -> Error {
        match &error {
            octocrab::Error::GitHub { source, .. } => match source.status_code.as_u16() {
                401 | 403 => Error::Auth,
                404 => Error::RepositoryNotFound(self.repo.to_string()),
                429 => Error::RateLimit,
                _ => Error::GitHubApi(error),
            },
            _ => Error::GitHubApi(error),
        }
    }

    fn map_octocrab_op(&self, error: octocrab::Error, entity: &str) -> Error {
        match &error {
            octocrab::Error::GitHub { source, .. } => match source.status_code.as_u16() {
                401 => Error::Auth,
                429 => Error::RateLimit,
                s if (400..500).contains(&s) => Error::validation(entity, source.message.clone()),
                _ => Error::GitHubApi(error),
            },
            _ => Error::GitHubApi(error),
        }
    }
}

impl RemoteOps for GitHubClient {
    async fn create_label(&self, label: &LabelPayload) -> Result<()> {
        self.octocrab
            .issues(&self.repo.owner, &self.repo.name)
            .create_label(
                &label.name,
                &label.color,
                label.description.as_deref().unwrap_or(""),
            )
            .await
            .map_err(|e| self.map_octocrab_op(e, &format!("label {:?}", label.name)))?;
        Ok(())
    }

    async fn update_label(&self, from: &str, label: &LabelPayload) -> Result<()> {
        let url = self.repo_url(&format!("/labels/{}", encode_path_segment(from)));
        let body = LabelUpdateWire {
            new_name: &label.name,
            color: &label.color,
            description: label.description.as_deref(),
        };
        let response = self.http.patch(url).json(&body).send().await?;
        self.check_op(response, &format!("label {from:?}")).await
    }

    async fn delete_label(&self, name: &str) -> Result<()> {
        self.octocrab
            .issues(&self.repo.owner, &self.repo.name)
            .delete_label(&encode_path_segment(name))
            .await
            .map_err(|e| self.map_octocrab_op(e, &format!("label {name:?}")))?;
        Ok(())
    }

    async fn put_protection(&self, pattern: &str, rule: &BranchProtection) -> Result<()> {
        let url = self.repo_url(&format!(
            "/branches/{}/protection",
            encode_path_segment(pattern)
        ));
        let body = ProtectionRequestWire::from(rule);
        let response = self.http.put(url).json(&body).send().await?;
        self.check_op(response, &format!("branch protection {pattern:?}"))
            .await
    }

    async fn delete_protection(&self, pattern: &str) -> Result<()> {
        let url = self.repo_url(&format!(
            "/branches/{}/protection",
            encode_path_segment(pattern)
        ));
        let response = self.http.delete(url).send().await?;
        self.check_op(response, &format!("branch protection {pattern:?}"))
            .await
    }

    async fn replace_topics(&self, names: &[String]) -> Result<()> {
        let url = self.repo_url("/topics");
        let body = TopicsWire {
            names: names.to_vec(),
        };
        let response = self.http.put(url).json(&body).send().await?;
        self.check_op(response, "topics").await
    }

    async fn update_settings(&self, settings: &SettingsConfig) -> Result<()> {
        let response = self
            .http
            .patch(self.repo_url(""))
            .json(settings)
            .send()
            .await?;
        self.check_op(response, "repository settings").await
    }

    async fn secrets_public_key(&self) -> Result<SecretsPublicKey> {
        let url = self.repo_url("/actions/secrets/public-key");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth,
                _ => Error::UnexpectedStatus {
                    status: status.as_u16(),
                    context: "secrets public key".to_string(),
                },
            });
        }
        Ok(response.json().await?)
    }

    async fn put_secret(&self, name: &str, sealed: &SealedSecret) -> Result<()> {
        let url = self.repo_url(&format!("/actions/secrets/{}", encode_path_segment(name)));
        let response = self.http.put(url).json(sealed).send().await?;
        self.check_op(response, &format!("secret {name}")).await
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        let url = self.repo_url(&format!("/actions/secrets/{}", encode_path_segment(name)));
        let response = self.http.delete(url).send().await?;
        self.check_op(response, &format!("secret {name}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("bug"), "bug");
        assert_eq!(encode_path_segment("feature-request"), "feature-request");

        assert_eq!(
            encode_path_segment("good first issue"),
            "good%20first%20issue"
        );

        assert_eq!(encode_path_segment("バグ"), "%E3%83%90%E3%82%B0");

        assert_eq!(
            encode_path_segment("test-label_v1.2~alpha"),
            "test-label_v1.2~alpha"
        );
        assert_eq!(encode_path_segment("release/*"), "release%2F%2A");
    }

    #[test]
    fn test_protection_response_parsing() {
        let json = r##"{
            "required_status_checks": {"strict": true, "contexts": ["ci/test", "ci/build", "ci/test"]},
            "enforce_admins": {"enabled": true},
            "required_pull_request_reviews": {
                "dismiss_stale_reviews": true,
                "require_code_owner_reviews": false,
                "required_approving_review_count": 2
            }
        }"##;

        let wire: ProtectionResponseWire = serde_json::from_str(json).unwrap();
        let rule = BranchProtection::from(wire);

        // Contexts come back sorted and deduplicated
        assert_eq!(rule.required_checks, vec!["ci/build", "ci/test"]);
        assert!(rule.strict);
        assert_eq!(rule.required_reviews, 2);
        assert!(rule.dismiss_stale_reviews);
        assert!(!rule.require_code_owner_reviews);
        assert!(rule.enforce_admins);
    }

    #[test]
    fn test_protection_response_parsing_minimal() {
        let json = r##"{
            "required_status_checks": null,
            "enforce_admins": null,
            "required_pull_request_reviews": null
        }"##;

        let wire: ProtectionResponseWire = serde_json::from_str(json).unwrap();
        let rule = BranchProtection::from(wire);
        assert_eq!(rule, BranchProtection::default());
    }

    #[test]
    fn test_protection_request_nulls_unused_requirements() {
        let rule = BranchProtection {
            enforce_admins: true,
            ..BranchProtection::default()
        };
        let wire = ProtectionRequestWire::from(&rule);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["required_status_checks"], serde_json::Value::Null);
        assert_eq!(
            json["required_pull_request_reviews"],
            serde_json::Value::Null
        );
        assert_eq!(json["restrictions"], serde_json::Value::Null);
        assert_eq!(json["enforce_admins"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_protection_request_carries_set_requirements() {
        let rule = BranchProtection {
            required_checks: vec!["ci/test".to_string()],
            strict: true,
            required_reviews: 1,
            dismiss_stale_reviews: true,
            ..BranchProtection::default()
        };
        let wire = ProtectionRequestWire::from(&rule);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["required_status_checks"]["strict"], true);
        assert_eq!(json["required_status_checks"]["contexts"][0], "ci/test");
        assert_eq!(
            json["required_pull_request_reviews"]["required_approving_review_count"],
            1
        );
        assert_eq!(
            json["required_pull_request_reviews"]["dismiss_stale_reviews"],
            true
        );
    }

    #[test]
    fn test_repository_wire_settings_defaults() {
        let json = r##"{"description": "a tool", "topics": ["rust"]}"##;
        let wire: RepositoryWire = serde_json::from_str(json).unwrap();
        let settings = wire.into_settings();

        assert_eq!(settings.description.as_deref(), Some("a tool"));
        assert!(settings.has_issues);
        assert!(settings.allow_merge_commit);
        assert!(!settings.delete_branch_on_merge);
    }

    #[test]
    fn test_repository_wire_empty_homepage_is_none() {
        let json = r##"{"homepage": ""}"##;
        let wire: RepositoryWire = serde_json::from_str(json).unwrap();
        assert_eq!(wire.into_settings().homepage, None);
    }

    #[test]
    fn test_secrets_page_parsing() {
        let json = r##"{
            "total_count": 2,
            "secrets": [
                {"name": "PYPI_TOKEN", "created_at": "2020-01-10T14:59:22Z", "updated_at": "2020-01-11T11:59:22Z"},
                {"name": "ANACONDA_TOKEN", "updated_at": null}
            ]
        }"##;

        let page: SecretsPageWire = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.secrets[0].name, "PYPI_TOKEN");
        assert!(page.secrets[0].updated_at.is_some());
        assert!(page.secrets[1].updated_at.is_none());
    }
}
