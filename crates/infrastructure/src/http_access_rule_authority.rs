use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use rolegate_application::{
    AccessRuleAuthority, AccessRuleDetail, CreateAccessRequestInput, CreatedAccessRequest,
    RemoteAccessRule, RuleApprover, RuleArgument, RuleArgumentOption,
};
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{AccessRequestStatus, AccessRuleId, RequestField};

/// HTTP client for the remote access-management API.
#[derive(Clone)]
pub struct HttpAccessRuleAuthority {
    http_client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAccessRulesResponse {
    access_rules: Vec<AccessRuleResponse>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessRuleResponse {
    id: String,
    name: String,
    target: AccessRuleTargetResponse,
    time_constraints: TimeConstraintsResponse,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AccessRuleTargetResponse {
    provider: TargetProviderResponse,
}

#[derive(Debug, Deserialize)]
struct TargetProviderResponse {
    id: String,
    #[serde(rename = "type")]
    provider_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeConstraintsResponse {
    max_duration_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct ListApproversResponse {
    users: Vec<ApproverResponse>,
}

#[derive(Debug, Deserialize)]
struct ApproverResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessRuleDetailResponse {
    target: AccessRuleDetailTargetResponse,
}

#[derive(Debug, Deserialize)]
struct AccessRuleDetailTargetResponse {
    #[serde(default)]
    arguments: BTreeMap<String, ArgumentResponse>,
}

#[derive(Debug, Deserialize)]
struct ArgumentResponse {
    #[serde(default)]
    options: Vec<ArgumentOptionResponse>,
}

#[derive(Debug, Deserialize)]
struct ArgumentOptionResponse {
    label: String,
    value: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequestBody {
    access_rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    timing: RequestTimingBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    with: Option<Vec<BTreeMap<String, Vec<String>>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestTimingBody {
    duration_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct CreateRequestResponse {
    requests: Vec<CreatedRequestResponse>,
}

#[derive(Debug, Deserialize)]
struct CreatedRequestResponse {
    id: String,
    status: AccessRequestStatus,
}

impl HttpAccessRuleAuthority {
    /// Creates an authority client for a deployment base URL.
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        api_token: Option<String>,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url.trim()).map_err(|error| {
            AppError::Validation(format!("invalid deployment url '{base_url}': {error}"))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "deployment url '{base_url}' cannot be used as a base url"
            )));
        }

        Ok(Self {
            http_client,
            base_url,
            api_token: api_token.filter(|token| !token.trim().is_empty()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Validation(format!(
                    "deployment url '{}' cannot be used as a base url",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);

        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        operation: &str,
    ) -> AppResult<T> {
        let response = self
            .authorized(builder)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| AppError::Remote(format!("failed to {operation}: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Remote(format!(
                "{operation} returned status {}: {body}",
                status.as_u16()
            )));
        }

        response.json::<T>().await.map_err(|error| {
            AppError::Remote(format!(
                "failed to parse response body of {operation}: {error}"
            ))
        })
    }
}

#[async_trait]
impl AccessRuleAuthority for HttpAccessRuleAuthority {
    async fn list_access_rules(&self) -> AppResult<Vec<RemoteAccessRule>> {
        let mut rules = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut url = self.endpoint(&["access-rules"])?;
            if let Some(token) = next_token.as_deref() {
                url.query_pairs_mut().append_pair("nextToken", token);
            }

            let page: ListAccessRulesResponse = self
                .send_json(self.http_client.get(url), "list access rules")
                .await?;
            rules.extend(page.access_rules.into_iter().map(remote_access_rule));

            match page.next.filter(|token| !token.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(rule_count = rules.len(), "listed remote access rules");
        Ok(rules)
    }

    async fn list_approvers(&self, rule_id: &AccessRuleId) -> AppResult<Vec<RuleApprover>> {
        let url = self.endpoint(&["access-rules", rule_id.as_str(), "approvers"])?;
        let response: ListApproversResponse = self
            .send_json(
                self.http_client.get(url),
                format!("list approvers of access rule '{rule_id}'").as_str(),
            )
            .await?;

        Ok(response
            .users
            .into_iter()
            .map(|user| RuleApprover {
                id: user.id,
                email: user.email,
            })
            .collect())
    }

    async fn get_rule_detail(&self, rule_id: &AccessRuleId) -> AppResult<AccessRuleDetail> {
        let url = self.endpoint(&["access-rules", rule_id.as_str()])?;
        let response: AccessRuleDetailResponse = self
            .send_json(
                self.http_client.get(url),
                format!("get access rule '{rule_id}'").as_str(),
            )
            .await?;

        Ok(access_rule_detail(response))
    }

    async fn create_access_request(
        &self,
        input: CreateAccessRequestInput,
    ) -> AppResult<Vec<CreatedAccessRequest>> {
        let url = self.endpoint(&["requests"])?;
        let body = create_request_body(input);
        let response: CreateRequestResponse = self
            .send_json(
                self.http_client.post(url).json(&body),
                "create access request",
            )
            .await?;

        Ok(response
            .requests
            .into_iter()
            .map(|request| CreatedAccessRequest {
                id: request.id,
                status: request.status,
            })
            .collect())
    }
}

fn remote_access_rule(response: AccessRuleResponse) -> RemoteAccessRule {
    RemoteAccessRule {
        id: response.id,
        name: response.name,
        target_provider_id: response.target.provider.id,
        target_provider_type: response.target.provider.provider_type,
        created_at: response.created_at.timestamp(),
        updated_at: response.updated_at.timestamp(),
        duration_seconds: response.time_constraints.max_duration_seconds,
    }
}

fn access_rule_detail(response: AccessRuleDetailResponse) -> AccessRuleDetail {
    AccessRuleDetail {
        arguments: response
            .target
            .arguments
            .into_iter()
            .map(|(key, argument)| {
                let options = argument
                    .options
                    .into_iter()
                    .map(|option| RuleArgumentOption {
                        label: option.label,
                        value: option.value,
                        description: option.description,
                    })
                    .collect();
                (key, RuleArgument { options })
            })
            .collect(),
    }
}

fn create_request_body(input: CreateAccessRequestInput) -> CreateRequestBody {
    CreateRequestBody {
        access_rule_id: input.access_rule_id.as_str().to_owned(),
        reason: input.reason,
        timing: RequestTimingBody {
            duration_seconds: input.duration_seconds,
        },
        with: input.with.map(|fields| vec![group_fields(fields)]),
    }
}

fn group_fields(fields: Vec<RequestField>) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for field in fields {
        grouped
            .entry(field.target_type.as_str().to_owned())
            .or_default()
            .push(field.value);
    }

    grouped
}
