//! GitHub deployment environment variables as a source.
//!
//! Addressed as `github://<owner>/<repo>#<environment>`. Only plain
//! variables are handled; secrets cannot be read back through the API.

use crate::config::{Filter, FlatMap, Source, SourceCache, retain_included, value_to_text};
use crate::error::{ConfettiError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Parsed `github://owner/repo#environment` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubTarget {
    pub owner: String,
    pub repo: String,
    pub environment: String,
}

impl GitHubTarget {
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = || {
            ConfettiError::configuration(format!(
                "Invalid GitHub URI '{}', expected github://owner/repo#environment",
                uri
            ))
        };
        let rest = uri.strip_prefix("github://").ok_or_else(invalid)?;
        let (repo_path, environment) = rest.split_once('#').ok_or_else(invalid)?;
        let (owner, repo) = repo_path.split_once('/').ok_or_else(invalid)?;
        let repo = repo.trim_end_matches('/');
        if owner.is_empty() || repo.is_empty() || repo.contains('/') || environment.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            environment: environment.to_string(),
        })
    }
}

impl std::fmt::Display for GitHubTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.environment)
    }
}

#[derive(Debug, Deserialize)]
struct VariablesPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    variables: Vec<RemoteVariable>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RemoteVariable {
    name: String,
    value: String,
}

#[derive(Debug)]
pub struct GitHubEnvSource {
    target: GitHubTarget,
    id: String,
    name: String,
    api_url: String,
    client: Client,
    cache: SourceCache,
}

impl GitHubEnvSource {
    /// Build a source for `uri`. The token comes from `token` or, failing
    /// that, from `GITHUB_TOKEN`.
    pub fn new(uri: &str, token: Option<&str>) -> Result<Self> {
        let target = GitHubTarget::parse(uri)?;
        let token = token
            .map(str::to_string)
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ConfettiError::configuration(format!(
                    "No GitHub token for {}: pass one or set GITHUB_TOKEN",
                    target
                ))
            })?;

        let id = target.to_string();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| ConfettiError::configuration("GitHub token contains invalid characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(concat!("confetti/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfettiError::remote(&id, e))?;

        Ok(Self {
            name: format!("github:{}", id),
            id,
            target,
            api_url: DEFAULT_API_URL.to_string(),
            client,
            cache: SourceCache::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Point at a different API root, e.g. GitHub Enterprise.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn target(&self) -> &GitHubTarget {
        &self.target
    }

    fn variables_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/environments/{}/variables",
            self.api_url,
            urlencoding::encode(&self.target.owner),
            urlencoding::encode(&self.target.repo),
            urlencoding::encode(&self.target.environment)
        )
    }

    fn variable_url(&self, name: &str) -> String {
        format!("{}/{}", self.variables_url(), urlencoding::encode(name))
    }

    fn send(&self, request: RequestBuilder) -> Result<reqwest::blocking::Response> {
        request
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| ConfettiError::remote(&self.id, e))
    }

    fn fetch_all(&self) -> Result<BTreeMap<String, String>> {
        let url = self.variables_url();
        let mut variables = BTreeMap::new();
        let mut page = 1;
        loop {
            let response = self.send(
                self.client
                    .get(&url)
                    .query(&[("per_page", PER_PAGE), ("page", page)]),
            )?;
            let body: VariablesPage = response
                .json()
                .map_err(|e| ConfettiError::remote(&self.id, e))?;
            let received = body.variables.len();
            variables.extend(body.variables.into_iter().map(|v| (v.name, v.value)));
            if received < PER_PAGE || variables.len() >= body.total_count {
                break;
            }
            page += 1;
        }
        debug!(source_id = %self.id, keys = variables.len(), "Fetched GitHub variables");
        Ok(variables)
    }
}

impl Source for GitHubEnvSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> Option<&str> {
        None
    }

    fn load(&mut self, filter: Option<&Filter>, _depth: Option<i64>) -> Result<FlatMap> {
        let values: FlatMap = self
            .fetch_all()?
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        self.cache.replace(values.clone());
        Ok(retain_included(values, filter))
    }

    fn save(&mut self) -> Result<()> {
        let existing = self.fetch_all()?;
        let mut applied = 0;
        for (key, value) in self.cache.staged() {
            match value {
                Some(value) => {
                    let body = RemoteVariable {
                        name: key.clone(),
                        value: value_to_text(value),
                    };
                    if existing.contains_key(key) {
                        self.send(self.client.patch(self.variable_url(key)).json(&body))?;
                    } else {
                        self.send(self.client.post(self.variables_url()).json(&body))?;
                    }
                }
                None => {
                    if !existing.contains_key(key) {
                        continue;
                    }
                    self.send(self.client.delete(self.variable_url(key)))?;
                }
            }
            applied += 1;
        }
        info!(source_id = %self.id, changes = applied, "Pushed GitHub variables");
        self.cache.clear_staged();
        self.reload()
    }

    fn reload(&mut self) -> Result<()> {
        let values = self
            .fetch_all()?
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        self.cache.replace(values);
        Ok(())
    }

    fn cache(&self) -> &SourceCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut SourceCache {
        &mut self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_target() {
        let target = GitHubTarget::parse("github://acme/web#production").unwrap();
        assert_eq!(target.owner, "acme");
        assert_eq!(target.repo, "web");
        assert_eq!(target.environment, "production");
        assert_eq!(target.to_string(), "acme/web#production");
    }

    #[test]
    fn test_parse_rejects_malformed_uris() {
        for uri in [
            "acme/web#production",
            "github://acme/web",
            "github://acme#production",
            "github:///web#production",
            "github://acme/web#",
            "github://acme/web/extra#production",
        ] {
            let err = GitHubTarget::parse(uri).unwrap_err();
            assert_eq!(err.code(), ErrorCode::Configuration, "{}", uri);
        }
    }

    #[test]
    fn test_explicit_token_builds_source() {
        let source = GitHubEnvSource::new("github://acme/web#staging env", Some("t0ken")).unwrap();
        assert_eq!(source.id(), "acme/web#staging env");
        assert_eq!(source.name(), "github:acme/web#staging env");
        assert_eq!(source.extension(), None);
        assert_eq!(
            source.variables_url(),
            "https://api.github.com/repos/acme/web/environments/staging%20env/variables"
        );
        let source = source.with_api_url("https://ghe.example.com/api/v3/");
        assert_eq!(
            source.variable_url("API_URL"),
            "https://ghe.example.com/api/v3/repos/acme/web/environments/staging%20env/variables/API_URL"
        );
    }

    #[test]
    fn test_blank_token_is_configuration_error() {
        let err = GitHubEnvSource::new("github://acme/web#prod", Some("  ")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Configuration);
    }
}
