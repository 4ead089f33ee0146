use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::http::push_opt;
use super::{ApiClient, ToolExecutor, ToolSpec, ToolkitId, parse_args, unknown_tool};
use crate::error::ToolkitError;

pub(crate) const SYSTEM_PROMPT: &str = "You can use the GitHub toolkit to research code on GitHub. \
Search repositories to find projects, then fetch repository info for details. \
Search code to locate implementations and search users to find developers or organizations. \
GitHub search qualifiers such as language:rust or stars:>100 narrow results.";

pub(crate) fn tools() -> Vec<ToolSpec> {
    let paging = json!({
        "perPage": { "type": "integer", "minimum": 1, "maximum": 100 },
        "page": { "type": "integer", "minimum": 1 }
    });
    let search_schema = |extra: Value| {
        let mut props = json!({ "query": { "type": "string", "description": "GitHub search query" } });
        for src in [&paging, &extra] {
            if let (Some(dst), Some(src)) = (props.as_object_mut(), src.as_object()) {
                dst.extend(src.clone());
            }
        }
        json!({ "type": "object", "properties": props, "required": ["query"] })
    };

    vec![
        ToolSpec {
            name: "search_repositories",
            description: "Search GitHub repositories",
            input_schema: search_schema(json!({
                "sort": { "type": "string", "enum": ["stars", "forks", "updated"] },
                "order": { "type": "string", "enum": ["asc", "desc"] }
            })),
        },
        ToolSpec {
            name: "search_code",
            description: "Search code across GitHub repositories",
            input_schema: search_schema(json!({})),
        },
        ToolSpec {
            name: "search_users",
            description: "Search GitHub users and organizations",
            input_schema: search_schema(json!({})),
        },
        ToolSpec {
            name: "repo_info",
            description: "Get details, languages and recent commits of a repository",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": { "type": "string" },
                    "repo": { "type": "string" }
                },
                "required": ["owner", "repo"]
            }),
        },
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    order: Option<String>,
    #[serde(default)]
    per_page: Option<u32>,
    #[serde(default)]
    page: Option<u32>,
}

impl SearchArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![("q", self.query.clone())];
        push_opt(&mut q, "sort", self.sort.as_deref());
        push_opt(&mut q, "order", self.order.as_deref());
        q.push(("per_page", self.per_page.unwrap_or(10).clamp(1, 100).to_string()));
        push_opt(&mut q, "page", self.page);
        q
    }
}

#[derive(Debug, Deserialize)]
struct RepoArgs {
    owner: String,
    repo: String,
}

pub(crate) struct GithubTools {
    api: ApiClient,
}

impl GithubTools {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn search(&self, kind: &str, args: SearchArgs) -> Result<Value, ToolkitError> {
        let found = self.api.get(&["search", kind], &args.query()).await?;
        let items = found["items"].as_array().cloned().unwrap_or_default();
        let items: Vec<Value> = items
            .iter()
            .map(|item| match kind {
                "repositories" => json!({
                    "fullName": item["full_name"],
                    "description": item["description"],
                    "url": item["html_url"],
                    "stars": item["stargazers_count"],
                    "forks": item["forks_count"],
                    "language": item["language"],
                    "updatedAt": item["updated_at"],
                }),
                "code" => json!({
                    "name": item["name"],
                    "path": item["path"],
                    "repository": item["repository"]["full_name"],
                    "url": item["html_url"],
                }),
                _ => json!({
                    "login": item["login"],
                    "type": item["type"],
                    "url": item["html_url"],
                    "avatarUrl": item["avatar_url"],
                }),
            })
            .collect();
        Ok(json!({ "totalCount": found["total_count"], "items": items }))
    }

    async fn repo_info(&self, args: RepoArgs) -> Result<Value, ToolkitError> {
        let repo = self.api.get(&["repos", &args.owner, &args.repo], &[]).await?;
        let languages = self
            .api
            .get(&["repos", &args.owner, &args.repo, "languages"], &[])
            .await?;
        let commits = self
            .api
            .get(
                &["repos", &args.owner, &args.repo, "commits"],
                &[("per_page", "10".to_string())],
            )
            .await?;
        let commits: Vec<Value> = commits
            .as_array()
            .map(|list| {
                list.iter()
                    .map(|c| {
                        json!({
                            "sha": c["sha"],
                            "message": c["commit"]["message"],
                            "author": c["commit"]["author"]["name"],
                            "date": c["commit"]["author"]["date"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "fullName": repo["full_name"],
            "description": repo["description"],
            "url": repo["html_url"],
            "defaultBranch": repo["default_branch"],
            "stars": repo["stargazers_count"],
            "forks": repo["forks_count"],
            "openIssues": repo["open_issues_count"],
            "topics": repo["topics"],
            "license": repo["license"]["spdx_id"],
            "createdAt": repo["created_at"],
            "updatedAt": repo["updated_at"],
            "languages": languages,
            "recentCommits": commits,
        }))
    }
}

#[async_trait]
impl ToolExecutor for GithubTools {
    fn specs(&self) -> Vec<ToolSpec> {
        tools()
    }

    async fn call(&self, name: &str, args: Value) -> Result<Value, ToolkitError> {
        match name {
            "search_repositories" => self.search("repositories", parse_args(name, args)?).await,
            "search_code" => self.search("code", parse_args(name, args)?).await,
            "search_users" => self.search("users", parse_args(name, args)?).await,
            "repo_info" => self.repo_info(parse_args(name, args)?).await,
            other => Err(unknown_tool(ToolkitId::Github, other)),
        }
    }
}
