use crate::config::GithubConfig;
use crate::domain::{Commit, Issue, PullRequest};
use crate::error::{HostErrorKind, ReleaseError, Result};
use crate::host::{AssetUpload, CreatedRelease, IssueTracker, RefUpdate, ReleaseRecord, VcsHost};
use crate::retry::{with_retry, RetryPolicy};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const PAGE_SIZE: usize = 100;

/// GitHub REST backend for both host traits.
///
/// Each instance is bound to one repository. Every request goes through a
/// single retrying transport, so transient failures (timeouts, rate limits,
/// 5xx) are retried with backoff while definitive answers surface
/// immediately.
pub struct GithubHost {
    client: Client,
    api_url: String,
    upload_url: String,
    repo: String,
    token: String,
    retry: RetryPolicy,
}

impl GithubHost {
    pub fn new(
        repo: impl Into<String>,
        token: impl Into<String>,
        github: &GithubConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let repo = repo.into();
        if repo.is_empty() {
            return Err(ReleaseError::config("repository name cannot be empty"));
        }
        let token = token.into();
        if token.is_empty() {
            return Err(ReleaseError::config("access token cannot be empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReleaseError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(GithubHost {
            client,
            api_url: github.api_url.trim_end_matches('/').to_string(),
            upload_url: github.upload_url.trim_end_matches('/').to_string(),
            repo,
            token,
            retry,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.api_url, self.repo, path)
    }

    fn classify(status: StatusCode) -> HostErrorKind {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => HostErrorKind::Auth,
            StatusCode::NOT_FOUND => HostErrorKind::NotFound,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => HostErrorKind::Transient,
            s if s.is_server_error() => HostErrorKind::Transient,
            _ => HostErrorKind::Permanent,
        }
    }

    /// One retried request, returning the response body as text.
    fn send(
        &self,
        op: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
        accept: &str,
    ) -> Result<String> {
        with_retry(&self.retry, op, || {
            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&self.token)
                .header(USER_AGENT, "relbot")
                .header(ACCEPT, accept);
            if let Some(value) = body {
                request = request.json(value);
            }
            let response = request
                .send()
                .map_err(|e| ReleaseError::transient(op, e.to_string()))?;
            let status = response.status();
            let text = response
                .text()
                .map_err(|e| ReleaseError::transient(op, e.to_string()))?;
            if status.is_success() {
                Ok(text)
            } else {
                Err(ReleaseError::host(
                    op,
                    Self::classify(status),
                    format!("{}: {}", status, text.trim()),
                ))
            }
        })
    }

    fn send_json(
        &self,
        op: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let text = self.send(op, method, url, body, JSON_MEDIA_TYPE)?;
        serde_json::from_str(&text).map_err(|e| {
            ReleaseError::host(
                op,
                HostErrorKind::Permanent,
                format!("unexpected response payload: {}", e),
            )
        })
    }

    fn get_json(&self, op: &str, url: &str) -> Result<Value> {
        self.send_json(op, Method::GET, url, None)
    }

    /// Resolve the commit sha a tag points at. Falls back to the release's
    /// target field when the tag ref is not there yet (e.g. draft releases).
    fn tag_sha(&self, tag: &str, fallback: &str) -> Result<String> {
        match self.get_json("tag_sha", &self.api(&format!("/git/refs/tags/{}", tag))) {
            Ok(value) => Ok(json_str("tag_sha", &value, "/object/sha")?.to_string()),
            Err(err) if err.is_not_found() => Ok(fallback.to_string()),
            Err(err) => Err(err),
        }
    }

    fn release_record(&self, op: &str, value: &Value) -> Result<ReleaseRecord> {
        let tag = json_str(op, value, "/tag_name")?.to_string();
        let url = json_str(op, value, "/html_url")?.to_string();
        let fallback = value
            .pointer("/target_commitish")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let sha = self.tag_sha(&tag, fallback)?;
        Ok(ReleaseRecord { tag, sha, url })
    }

    fn release_id(&self, op: &str, tag: &str) -> Result<u64> {
        let value = self.get_json(op, &self.api(&format!("/releases/tags/{}", tag)))?;
        json_u64(op, &value, "/id")
    }
}

/// Map a not-found error to `None`, passing everything else through.
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

fn json_str<'v>(op: &str, value: &'v Value, pointer: &str) -> Result<&'v str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ReleaseError::host(
                op,
                HostErrorKind::Permanent,
                format!("missing '{}' in response payload", pointer),
            )
        })
}

fn json_u64(op: &str, value: &Value, pointer: &str) -> Result<u64> {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            ReleaseError::host(
                op,
                HostErrorKind::Permanent,
                format!("missing '{}' in response payload", pointer),
            )
        })
}

fn parse_date(op: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| {
            ReleaseError::host(
                op,
                HostErrorKind::Permanent,
                format!("unparsable timestamp '{}': {}", raw, e),
            )
        })
}

fn parse_commit(op: &str, value: &Value) -> Result<Commit> {
    let sha = json_str(op, value, "/sha")?.to_string();
    let message = json_str(op, value, "/commit/message")?.to_string();
    let date = parse_date(op, json_str(op, value, "/commit/author/date")?)?;
    let parents = value
        .pointer("/parents")
        .and_then(Value::as_array)
        .map(|parents| {
            parents
                .iter()
                .filter_map(|p| p.pointer("/sha").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    Ok(Commit::new(sha, message, parents, date))
}

fn parse_issue(op: &str, value: &Value) -> Result<Issue> {
    let labels = value
        .pointer("/labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|l| l.pointer("/name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    Ok(Issue {
        number: json_u64(op, value, "/number")?,
        title: json_str(op, value, "/title")?.to_string(),
        labels,
        created_at: parse_date(op, json_str(op, value, "/created_at")?)?,
        closed: value.pointer("/state").and_then(Value::as_str) == Some("closed"),
        url: json_str(op, value, "/html_url")?.to_string(),
    })
}

impl VcsHost for GithubHost {
    fn get_commit(&self, sha: &str) -> Result<Commit> {
        let value = self.get_json("get_commit", &self.api(&format!("/commits/{}", sha)))?;
        parse_commit("get_commit", &value)
    }

    fn branch_head(&self, branch: &str) -> Result<String> {
        let value = self.get_json(
            "branch_head",
            &self.api(&format!("/git/refs/heads/{}", branch)),
        )?;
        Ok(json_str("branch_head", &value, "/object/sha")?.to_string())
    }

    fn get_file(&self, reference: &str, path: &str) -> Result<String> {
        self.send(
            "get_file",
            Method::GET,
            &self.api(&format!("/contents/{}?ref={}", path, reference)),
            None,
            RAW_MEDIA_TYPE,
        )
    }

    fn create_commit(
        &self,
        parent_sha: &str,
        path: &str,
        contents: &str,
        message: &str,
    ) -> Result<Commit> {
        let op = "create_commit";

        let parent = self.get_json(op, &self.api(&format!("/git/commits/{}", parent_sha)))?;
        let base_tree = json_str(op, &parent, "/tree/sha")?;

        let tree = self.send_json(
            op,
            Method::POST,
            &self.api("/git/trees"),
            Some(&json!({
                "base_tree": base_tree,
                "tree": [{
                    "path": path,
                    "mode": "100644",
                    "type": "blob",
                    "content": contents,
                }],
            })),
        )?;
        let tree_sha = json_str(op, &tree, "/sha")?;

        let created = self.send_json(
            op,
            Method::POST,
            &self.api("/git/commits"),
            Some(&json!({
                "message": message,
                "tree": tree_sha,
                "parents": [parent_sha],
            })),
        )?;

        let date = match created.pointer("/author/date").and_then(Value::as_str) {
            Some(raw) => parse_date(op, raw)?,
            None => Utc::now(),
        };
        Ok(Commit::new(
            json_str(op, &created, "/sha")?.to_string(),
            message,
            vec![parent_sha.to_string()],
            date,
        ))
    }

    fn update_ref(&self, branch: &str, sha: &str, fast_forward_only: bool) -> Result<RefUpdate> {
        let op = "update_ref";
        let result = self.send_json(
            op,
            Method::PATCH,
            &self.api(&format!("/git/refs/heads/{}", branch)),
            Some(&json!({ "sha": sha, "force": !fast_forward_only })),
        );
        match result {
            Ok(_) => Ok(RefUpdate::Updated),
            Err(ReleaseError::Host { message, .. }) if message.contains("not a fast forward") => {
                Ok(RefUpdate::Rejected)
            }
            Err(err)
                if err.is_not_found()
                    || matches!(&err, ReleaseError::Host { message, .. }
                        if message.contains("Reference does not exist")) =>
            {
                self.send_json(
                    op,
                    Method::POST,
                    &self.api("/git/refs"),
                    Some(&json!({
                        "ref": format!("refs/heads/{}", branch),
                        "sha": sha,
                    })),
                )?;
                Ok(RefUpdate::Updated)
            }
            Err(err) => Err(err),
        }
    }

    fn list_releases(&self) -> Result<Vec<ReleaseRecord>> {
        let op = "list_releases";
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let value = self.get_json(
                op,
                &self.api(&format!("/releases?per_page={}&page={}", PAGE_SIZE, page)),
            )?;
            let releases = value.as_array().cloned().unwrap_or_default();
            let count = releases.len();
            for release in &releases {
                records.push(self.release_record(op, release)?);
            }
            if count < PAGE_SIZE {
                return Ok(records);
            }
            page += 1;
        }
    }

    fn get_release(&self, tag: &str) -> Result<Option<ReleaseRecord>> {
        let result = self.get_json("get_release", &self.api(&format!("/releases/tags/{}", tag)));
        match optional(result)? {
            Some(value) => Ok(Some(self.release_record("get_release", &value)?)),
            None => Ok(None),
        }
    }

    fn create_release(&self, tag: &str, sha: &str, notes: &str) -> Result<CreatedRelease> {
        let op = "create_release";
        let result = self.send_json(
            op,
            Method::POST,
            &self.api("/releases"),
            Some(&json!({
                "tag_name": tag,
                "target_commitish": sha,
                "name": tag,
                "body": notes,
                "draft": false,
                "prerelease": false,
            })),
        );
        match result {
            Ok(value) => Ok(CreatedRelease::Created(self.release_record(op, &value)?)),
            Err(ReleaseError::Host { message, .. }) if message.contains("already_exists") => {
                match self.get_release(tag)? {
                    Some(record) => Ok(CreatedRelease::AlreadyExists(record)),
                    None => Err(ReleaseError::host(
                        op,
                        HostErrorKind::Permanent,
                        format!("release {} reported existing but could not be fetched", tag),
                    )),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn update_release_notes(&self, tag: &str, notes: &str) -> Result<()> {
        let op = "update_release_notes";
        let id = self.release_id(op, tag)?;
        self.send_json(
            op,
            Method::PATCH,
            &self.api(&format!("/releases/{}", id)),
            Some(&json!({ "body": notes })),
        )?;
        Ok(())
    }

    fn upload_asset(&self, tag: &str, name: &str, contents: &[u8]) -> Result<AssetUpload> {
        let op = "upload_asset";
        let id = self.release_id(op, tag)?;
        let url = format!(
            "{}/repos/{}/releases/{}/assets?name={}",
            self.upload_url, self.repo, id, name
        );
        let contents = contents.to_vec();
        let result = with_retry(&self.retry, op, || {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .header(USER_AGENT, "relbot")
                .header(ACCEPT, JSON_MEDIA_TYPE)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(contents.clone())
                .send()
                .map_err(|e| ReleaseError::transient(op, e.to_string()))?;
            let status = response.status();
            let text = response
                .text()
                .map_err(|e| ReleaseError::transient(op, e.to_string()))?;
            if status.is_success() {
                Ok(())
            } else {
                Err(ReleaseError::host(
                    op,
                    Self::classify(status),
                    format!("{}: {}", status, text.trim()),
                ))
            }
        });
        match result {
            Ok(()) => Ok(AssetUpload::Uploaded),
            Err(ReleaseError::Host { message, .. }) if message.contains("already_exists") => {
                Ok(AssetUpload::AlreadyExists)
            }
            Err(err) => Err(err),
        }
    }
}

impl IssueTracker for GithubHost {
    fn get_issue(&self, number: u64) -> Result<Option<Issue>> {
        let result = self.get_json("get_issue", &self.api(&format!("/issues/{}", number)));
        match optional(result)? {
            // The issues API also serves pull requests; those do not count
            // as issues here.
            Some(value) if value.pointer("/pull_request").is_some() => Ok(None),
            Some(value) => Ok(Some(parse_issue("get_issue", &value)?)),
            None => Ok(None),
        }
    }

    fn get_pull_request(&self, number: u64) -> Result<Option<PullRequest>> {
        let result = self.get_json(
            "get_pull_request",
            &self.api(&format!("/pulls/{}", number)),
        );
        match optional(result)? {
            Some(value) => Ok(Some(PullRequest {
                number,
                body: value
                    .pointer("/body")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })),
            None => Ok(None),
        }
    }

    fn close_issue(&self, number: u64, comment: &str) -> Result<()> {
        let op = "close_issue";
        let issue = self.get_json(op, &self.api(&format!("/issues/{}", number)))?;

        if issue.pointer("/state").and_then(Value::as_str) != Some("closed") {
            self.send_json(
                op,
                Method::PATCH,
                &self.api(&format!("/issues/{}", number)),
                Some(&json!({ "state": "closed" })),
            )?;
        }

        let comments = self.get_json(
            op,
            &self.api(&format!("/issues/{}/comments?per_page={}", number, PAGE_SIZE)),
        )?;
        let already_commented = comments
            .as_array()
            .map(|comments| {
                comments
                    .iter()
                    .filter_map(|c| c.pointer("/body").and_then(Value::as_str))
                    .any(|body| body == comment)
            })
            .unwrap_or(false);

        if !already_commented {
            self.send_json(
                op,
                Method::POST,
                &self.api(&format!("/issues/{}/comments", number)),
                Some(&json!({ "body": comment })),
            )?;
        }
        Ok(())
    }
}
