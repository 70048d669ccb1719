//! GitHub GraphQL commit source.
//!
//! A round becomes a single GraphQL document with one aliased `repository`
//! field per request, so every pending repository is fetched in one round
//! trip. Responses are validated alias by alias into [`PageResult`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{PageError, SourceError};
use crate::model::{PageInfo, PageRequest, PageResult, RepositoryIdentity};
use crate::source::{PageOutcome, PageSource};

pub const GITHUB_GRAPHQL: &str = "https://api.github.com/graphql";
pub const PAGE_SIZE: u32 = 100;
const OWNED_REPOSITORY_LIMIT: u32 = 100;
const USER_AGENT: &str = concat!("commit-hours/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub path: Vec<Value>,
}

impl GraphQlResponse {
    fn into_data(self) -> Result<Value, SourceError> {
        require_data(self.data, &self.errors)
    }
}

fn error_at<'a>(errors: &'a [GraphQlError], alias: &str) -> Option<&'a str> {
    errors
        .iter()
        .find(|err| err.path.first().and_then(Value::as_str) == Some(alias))
        .map(|err| err.message.as_str())
}

fn require_data(data: Option<Value>, errors: &[GraphQlError]) -> Result<Value, SourceError> {
    match data {
        Some(data @ Value::Object(_)) => Ok(data),
        _ => Err(SourceError::Decode(
            errors
                .first()
                .map(|err| err.message.clone())
                .unwrap_or_else(|| "response has no data".to_string()),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepository {
    name: Option<String>,
    owner: Option<RawOwner>,
    default_branch_ref: Option<RawBranchRef>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBranchRef {
    target: Option<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    history: Option<RawHistory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistory {
    total_count: Option<u64>,
    page_info: Option<RawPageInfo>,
    nodes: Option<Vec<RawCommit>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    has_next_page: Option<bool>,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommit {
    committed_date: Option<String>,
}

impl RawRepository {
    fn into_page(self, identity: &RepositoryIdentity) -> Result<PageResult, PageError> {
        let malformed = |reason: &str| PageError::malformed(identity.to_string(), reason);

        let name = self.name.ok_or_else(|| malformed("missing name"))?;
        let owner = self
            .owner
            .and_then(|o| o.login)
            .ok_or_else(|| malformed("missing owner login"))?;

        // Empty repositories have no default branch and count as zero commits.
        let Some(branch) = self.default_branch_ref else {
            return Ok(PageResult {
                name,
                owner,
                total_count: 0,
                timestamps: vec![],
                page_info: PageInfo::last(),
            });
        };

        let history = branch
            .target
            .and_then(|t| t.history)
            .ok_or_else(|| malformed("default branch has no commit history"))?;
        let total_count = history
            .total_count
            .ok_or_else(|| malformed("missing totalCount"))?;
        let raw_info = history
            .page_info
            .ok_or_else(|| malformed("missing pageInfo"))?;
        let has_more = raw_info
            .has_next_page
            .ok_or_else(|| malformed("missing hasNextPage"))?;
        if has_more && raw_info.end_cursor.is_none() {
            return Err(malformed("hasNextPage without endCursor"));
        }

        let timestamps = history
            .nodes
            .ok_or_else(|| malformed("missing commit nodes"))?
            .into_iter()
            .map(|commit| {
                let raw = commit
                    .committed_date
                    .ok_or_else(|| malformed("commit without committedDate"))?;
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|_| malformed(&format!("invalid committedDate: {raw}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResult {
            name,
            owner,
            total_count,
            timestamps,
            page_info: PageInfo {
                has_more,
                next_cursor: if has_more { raw_info.end_cursor } else { None },
            },
        })
    }
}

fn quote(value: &str) -> String {
    Value::from(value).to_string()
}

fn alias(index: usize) -> String {
    format!("r{index}")
}

/// Builds one GraphQL document covering every request of a round.
pub fn build_round_query(
    requests: &[PageRequest],
    author_id: Option<&str>,
    page_size: u32,
) -> String {
    let author = author_id
        .map(|id| format!(", author: {{id: {}}}", quote(id)))
        .unwrap_or_default();

    let fields: Vec<String> = requests
        .iter()
        .enumerate()
        .map(|(i, request)| {
            let after = request
                .cursor
                .as_deref()
                .map(|c| format!(", after: {}", quote(c)))
                .unwrap_or_default();
            format!(
                r#"  {alias}: repository(owner: {owner}, name: {name}) {{
    name
    owner {{ login }}
    defaultBranchRef {{
      target {{
        ... on Commit {{
          history(first: {page_size}{after}{author}) {{
            totalCount
            pageInfo {{ hasNextPage endCursor }}
            nodes {{ committedDate }}
          }}
        }}
      }}
    }}
  }}"#,
                alias = alias(i),
                owner = quote(&request.identity.owner),
                name = quote(&request.identity.name),
            )
        })
        .collect();

    format!("query {{\n{}\n}}", fields.join("\n"))
}

/// Splits a round response back into one outcome per request.
pub fn parse_round(
    requests: &[PageRequest],
    response: GraphQlResponse,
) -> Result<Vec<PageOutcome>, SourceError> {
    for err in &response.errors {
        debug!(message = %err.message, path = ?err.path, "graphql error");
    }
    let GraphQlResponse { data, errors } = response;
    let data = require_data(data, &errors)?;

    Ok(requests
        .iter()
        .enumerate()
        .map(|(i, request)| {
            let key = alias(i);
            match data.get(&key) {
                None | Some(Value::Null) => Err(PageError::fetch(
                    request.identity.to_string(),
                    error_at(&errors, &key).unwrap_or("repository not returned"),
                )),
                Some(value) => RawRepository::deserialize(value)
                    .map_err(|e| PageError::malformed(request.identity.to_string(), e.to_string()))
                    .and_then(|raw| raw.into_page(&request.identity)),
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Viewer {
    pub id: String,
    pub login: String,
}

#[derive(Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

#[derive(Deserialize)]
struct UserIdData {
    user: Option<UserId>,
}

#[derive(Deserialize)]
struct UserId {
    id: String,
}

fn user_id_query(login: &str) -> String {
    format!("query {{ user(login: {}) {{ id }} }}", quote(login))
}

fn parse_user_id(login: &str, response: GraphQlResponse) -> Result<String, SourceError> {
    let data: UserIdData = serde_json::from_value(response.into_data()?)
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    data.user
        .map(|user| user.id)
        .ok_or_else(|| SourceError::Decode(format!("unknown user: {login}")))
}

#[derive(Deserialize)]
struct OwnedData {
    user: Option<OwnedUser>,
}

#[derive(Deserialize)]
struct OwnedUser {
    repositories: OwnedConnection,
}

#[derive(Deserialize)]
struct OwnedConnection {
    nodes: Vec<OwnedNode>,
}

#[derive(Deserialize)]
struct OwnedNode {
    name: String,
    owner: RawOwner,
}

fn owned_repositories_query(login: &str) -> String {
    format!(
        r#"query {{
  user(login: {}) {{
    repositories(first: {OWNED_REPOSITORY_LIMIT}, ownerAffiliations: OWNER) {{
      nodes {{ name owner {{ login }} }}
    }}
  }}
}}"#,
        quote(login)
    )
}

fn parse_owned(
    login: &str,
    response: GraphQlResponse,
) -> Result<Vec<RepositoryIdentity>, SourceError> {
    let data: OwnedData = serde_json::from_value(response.into_data()?)
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    let user = data
        .user
        .ok_or_else(|| SourceError::Decode(format!("unknown user: {login}")))?;
    Ok(user
        .repositories
        .nodes
        .into_iter()
        .map(|node| {
            let owner = node.owner.login.unwrap_or_else(|| login.to_string());
            RepositoryIdentity::new(owner, node.name)
        })
        .collect())
}

/// Client for the GitHub GraphQL API. Each instance carries its own
/// credentials and endpoint.
pub struct GitHubClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
    author_id: Option<String>,
    page_size: u32,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Result<Self, SourceError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            endpoint: GITHUB_GRAPHQL.to_string(),
            token: token.into(),
            author_id: None,
            page_size: PAGE_SIZE,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Only count commits authored by this GitHub node id.
    pub fn with_author_id(mut self, author_id: Option<String>) -> Self {
        self.author_id = author_id;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self
    }

    fn post(&self, query: &str) -> Result<GraphQlResponse, SourceError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "query": query }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(response.json::<GraphQlResponse>()?)
    }

    /// The authenticated user's login and node id.
    pub fn fetch_viewer(&self) -> Result<Viewer, SourceError> {
        let data = self.post("query { viewer { id login } }")?.into_data()?;
        let parsed: ViewerData =
            serde_json::from_value(data).map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(parsed.viewer)
    }

    /// Node id of `login`, used to filter history by author.
    pub fn fetch_user_id(&self, login: &str) -> Result<String, SourceError> {
        let response = self.post(&user_id_query(login))?;
        parse_user_id(login, response)
    }

    /// Repositories owned by `login`, as far as the first listing page goes.
    pub fn discover_owned_repositories(
        &self,
        login: &str,
    ) -> Result<Vec<RepositoryIdentity>, SourceError> {
        let response = self.post(&owned_repositories_query(login))?;
        parse_owned(login, response)
    }
}

impl PageSource for GitHubClient {
    fn fetch_round(&self, requests: &[PageRequest]) -> Result<Vec<PageOutcome>, SourceError> {
        if requests.is_empty() {
            return Ok(vec![]);
        }
        let query = build_round_query(requests, self.author_id.as_deref(), self.page_size);
        let response = self.post(&query)?;
        parse_round(requests, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requests() -> Vec<PageRequest> {
        vec![
            PageRequest::first(RepositoryIdentity::new("octo", "widgets")),
            PageRequest {
                identity: RepositoryIdentity::new("acme", "gadgets"),
                cursor: Some("Y3Vyc29y".to_string()),
            },
        ]
    }

    fn response(value: Value) -> GraphQlResponse {
        serde_json::from_value(value).expect("valid fixture")
    }

    fn history(total: u64, has_next: bool, cursor: Option<&str>, dates: &[&str]) -> Value {
        json!({
            "totalCount": total,
            "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
            "nodes": dates.iter().map(|d| json!({ "committedDate": d })).collect::<Vec<_>>(),
        })
    }

    fn repo(name: &str, owner: &str, history: Value) -> Value {
        json!({
            "name": name,
            "owner": { "login": owner },
            "defaultBranchRef": { "target": { "history": history } },
        })
    }

    #[test]
    fn query_has_one_alias_per_request() {
        let query = build_round_query(&requests(), None, 100);
        assert!(query.contains("r0: repository(owner: \"octo\", name: \"widgets\")"));
        assert!(query.contains("r1: repository(owner: \"acme\", name: \"gadgets\")"));
        assert!(query.contains("history(first: 100, after: \"Y3Vyc29y\")"));
        assert!(query.contains("history(first: 100)"));
        assert!(!query.contains("author"));
    }

    #[test]
    fn query_filters_by_author() {
        let query = build_round_query(&requests()[..1], Some("MDQ6VXNlcjE="), 50);
        assert!(query.contains("history(first: 50, author: {id: \"MDQ6VXNlcjE=\"})"));
    }

    #[test]
    fn query_escapes_strings() {
        let reqs = vec![PageRequest::first(RepositoryIdentity::new("a\"b", "c"))];
        let query = build_round_query(&reqs, None, 100);
        assert!(query.contains(r#"owner: "a\"b""#));
    }

    #[test]
    fn parse_valid_round() {
        let resp = response(json!({
            "data": {
                "r0": repo("widgets", "octo", history(3, true, Some("c1"), &[
                    "2024-01-02T10:00:00Z",
                    "2024-01-02T09:00:00Z",
                ])),
                "r1": repo(
                    "gadgets",
                    "acme",
                    history(1, false, None, &["2024-01-01T00:00:00+02:00"])
                ),
            }
        }));
        let outcomes = parse_round(&requests(), resp).expect("round parses");
        let first = outcomes[0].as_ref().expect("page parses");
        assert_eq!(first.total_count, 3);
        assert_eq!(first.timestamps.len(), 2);
        assert_eq!(first.page_info, PageInfo::more("c1"));

        let second = outcomes[1].as_ref().expect("page parses");
        assert_eq!(second.page_info, PageInfo::last());
        assert_eq!(second.timestamps[0].to_rfc3339(), "2023-12-31T22:00:00+00:00");
    }

    #[test]
    fn missing_repository_uses_graphql_error() {
        let resp = response(json!({
            "data": { "r0": null, "r1": repo("gadgets", "acme", history(0, false, None, &[])) },
            "errors": [{ "message": "Could not resolve to a Repository", "path": ["r0"] }],
        }));
        let outcomes = parse_round(&requests(), resp).expect("round parses");
        assert_eq!(
            outcomes[0],
            Err(PageError::fetch("octo/widgets", "Could not resolve to a Repository"))
        );
        assert!(outcomes[1].is_ok());
    }

    #[test]
    fn missing_fields_are_malformed() {
        let resp = response(json!({
            "data": {
                "r0": { "name": "widgets", "owner": { "login": "octo" },
                        "defaultBranchRef": { "target": { "history": { "totalCount": 2 } } } },
                "r1": repo("gadgets", "acme", history(1, false, None, &["yesterday"])),
            }
        }));
        let outcomes = parse_round(&requests(), resp).expect("round parses");
        assert!(matches!(outcomes[0], Err(PageError::Malformed { .. })));
        assert!(matches!(outcomes[1], Err(PageError::Malformed { .. })));
    }

    #[test]
    fn next_page_without_cursor_is_malformed() {
        let resp = response(json!({
            "data": {
                "r0": repo("widgets", "octo", history(2, true, None, &["2024-01-02T10:00:00Z"])),
            }
        }));
        let outcomes = parse_round(&requests()[..1], resp).expect("round parses");
        assert!(matches!(outcomes[0], Err(PageError::Malformed { .. })));
    }

    #[test]
    fn empty_repository_is_zero_commits() {
        let resp = response(json!({
            "data": {
                "r0": { "name": "widgets", "owner": { "login": "octo" }, "defaultBranchRef": null }
            }
        }));
        let outcomes = parse_round(&requests()[..1], resp).expect("round parses");
        let page = outcomes[0].as_ref().expect("page parses");
        assert_eq!(page.total_count, 0);
        assert!(page.timestamps.is_empty());
    }

    #[test]
    fn response_without_data_fails_round() {
        let resp = response(json!({ "errors": [{ "message": "Bad credentials" }] }));
        match parse_round(&requests(), resp) {
            Err(SourceError::Decode(msg)) => assert_eq!(msg, "Bad credentials"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_owned_repositories() {
        let resp = response(json!({
            "data": { "user": { "repositories": { "nodes": [
                { "name": "widgets", "owner": { "login": "octo" } },
                { "name": "gizmos", "owner": { "login": "octo" } },
            ] } } }
        }));
        let repos = parse_owned("octo", resp).expect("owned repositories parse");
        assert_eq!(
            repos,
            vec![
                RepositoryIdentity::new("octo", "widgets"),
                RepositoryIdentity::new("octo", "gizmos"),
            ]
        );
        assert!(owned_repositories_query("octo").contains("user(login: \"octo\")"));
    }

    #[test]
    fn unknown_user_is_an_error() {
        let resp = response(json!({ "data": { "user": null } }));
        assert!(parse_owned("ghost", resp).is_err());
    }

    #[test]
    fn page_size_is_clamped_to_api_limit() {
        let client = GitHubClient::new("token").expect("client builds");
        assert_eq!(client.page_size, PAGE_SIZE);
        assert_eq!(client.with_page_size(500).page_size, PAGE_SIZE);
        let client = GitHubClient::new("token").expect("client builds");
        assert_eq!(client.with_page_size(0).page_size, 1);
    }

    #[test]
    fn parse_user_node_id() {
        let resp = response(json!({ "data": { "user": { "id": "MDQ6VXNlcjE=" } } }));
        assert_eq!(
            parse_user_id("octo", resp).expect("user id parses"),
            "MDQ6VXNlcjE="
        );
        assert_eq!(
            user_id_query("octo"),
            "query { user(login: \"octo\") { id } }"
        );
    }

    #[test]
    fn unknown_user_has_no_node_id() {
        let resp = response(json!({ "data": { "user": null } }));
        match parse_user_id("ghost", resp) {
            Err(SourceError::Decode(msg)) => assert_eq!(msg, "unknown user: ghost"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
