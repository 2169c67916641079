//! Azure-backed implementations of the core service traits.
//!
//! Discovery goes through the Resource Graph query API; fresh reads and
//! full-replace tag writes go through the management plane. The session is
//! an already-issued bearer token; acquiring and refreshing credentials is
//! outside this tool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use retag_core::client::{QueryScope, ResourceExplorer, ResourceQuery, TagClient};
use retag_core::error::ServiceError;
use retag_core::model::ResourceRecord;

const MANAGEMENT_BASE: &str = "https://management.azure.com";

const RESOURCE_GRAPH_URL: &str = "https://management.azure.com\
/providers/Microsoft.ResourceGraph/resources?api-version=2022-10-01";

const RESOURCE_API_VERSION: &str = "2021-04-01";
const TAGS_API_VERSION: &str = "2021-04-01";

/// Read the session token from the `AZURE_ACCESS_TOKEN` environment variable.
pub fn get_access_token() -> Result<String, String> {
    std::env::var("AZURE_ACCESS_TOKEN").map_err(|_| {
        "AZURE_ACCESS_TOKEN environment variable is not set. \
         Export a management-plane bearer token to run against Azure."
            .to_string()
    })
}

pub struct AzureClient {
    agent: ureq::Agent,
    token: String,
}

impl AzureClient {
    pub fn new(token: String) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            token,
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn post_graph<T: for<'de> Deserialize<'de>>(
        &self,
        body: &GraphRequest,
        operation: &'static str,
    ) -> Result<T, ServiceError> {
        let response = self
            .agent
            .post(RESOURCE_GRAPH_URL)
            .header("Authorization", &self.bearer())
            .header("content-type", "application/json")
            .send_json(body)
            .map_err(|e| request_error(operation, e))?;
        response
            .into_body()
            .read_json::<T>()
            .map_err(|e| ServiceError::Malformed {
                operation,
                message: e.to_string(),
            })
    }
}

// -- Resource Graph wire types --

#[derive(Serialize)]
struct GraphRequest {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subscriptions: Option<Vec<String>>,
    options: serde_json::Value,
}

#[derive(Deserialize)]
struct PageResponse {
    #[serde(default)]
    data: Vec<ResourceRecord>,
}

#[derive(Deserialize)]
struct CountResponse {
    #[serde(default)]
    data: Vec<CountRow>,
}

#[derive(Deserialize)]
struct CountRow {
    #[serde(rename = "Count")]
    count: usize,
}

/// Render the KQL for a query. User-supplied values are embedded as string
/// literals, so single quotes are escaped.
fn render_kql(query: &ResourceQuery) -> String {
    let mut kql = String::from("Resources");
    if let Some(resource_type) = &query.resource_type {
        kql.push_str(&format!(" | where type =~ '{}'", kql_escape(resource_type)));
    }
    if let Some(tag) = &query.required_tag {
        kql.push_str(&format!(" | where isnotempty(tags['{}'])", kql_escape(tag)));
    }
    kql
}

fn kql_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn scope_subscriptions(scope: &QueryScope) -> Option<Vec<String>> {
    match scope {
        QueryScope::Subscription(id) => Some(vec![id.clone()]),
        QueryScope::Subscriptions(ids) => Some(ids.clone()),
        QueryScope::Tenant => None,
    }
}

/// Build the paging options object. The skip parameter is omitted entirely
/// when the offset is `None`; the service rejects an explicit zero.
fn page_options(limit: usize, offset: Option<usize>) -> serde_json::Value {
    let mut options = serde_json::json!({
        "resultFormat": "objectArray",
        "$top": limit,
    });
    if let Some(offset) = offset {
        options["$skip"] = offset.into();
    }
    options
}

impl ResourceExplorer for AzureClient {
    fn count(&self, query: &ResourceQuery) -> Result<usize, ServiceError> {
        let body = GraphRequest {
            query: format!("{} | count", render_kql(query)),
            subscriptions: scope_subscriptions(&query.scope),
            options: serde_json::json!({ "resultFormat": "objectArray" }),
        };
        let parsed: CountResponse = self.post_graph(&body, "count query")?;
        Ok(parsed.data.first().map(|row| row.count).unwrap_or(0))
    }

    fn page(
        &self,
        query: &ResourceQuery,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<Vec<ResourceRecord>, ServiceError> {
        let body = GraphRequest {
            query: render_kql(query),
            subscriptions: scope_subscriptions(&query.scope),
            options: page_options(limit, offset),
        };
        let parsed: PageResponse = self.post_graph(&body, "page query")?;
        Ok(parsed.data)
    }
}

// -- Management plane --

/// A resource as the management plane returns it. The resource group and
/// subscription are not echoed as fields; both are path segments of the id.
#[derive(Deserialize)]
struct ArmResource {
    id: String,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

impl ArmResource {
    fn into_record(self) -> ResourceRecord {
        let resource_group = path_segment_after(&self.id, "resourceGroups")
            .unwrap_or_default()
            .to_string();
        let subscription_id = path_segment_after(&self.id, "subscriptions")
            .unwrap_or_default()
            .to_string();
        ResourceRecord {
            id: self.id,
            name: self.name,
            resource_type: self.resource_type,
            resource_group,
            location: self.location,
            subscription_id,
            tags: self.tags.unwrap_or_default(),
        }
    }
}

fn path_segment_after<'a>(id: &'a str, marker: &str) -> Option<&'a str> {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case(marker) {
            return segments.next();
        }
    }
    None
}

impl TagClient for AzureClient {
    fn get_resource(&self, resource_id: &str) -> Result<Option<ResourceRecord>, ServiceError> {
        let url = format!("{MANAGEMENT_BASE}{resource_id}?api-version={RESOURCE_API_VERSION}");
        let response = match self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(e) => return Err(request_error("get_resource", e)),
        };
        let raw: ArmResource =
            response
                .into_body()
                .read_json()
                .map_err(|e| ServiceError::Malformed {
                    operation: "get_resource",
                    message: e.to_string(),
                })?;
        Ok(Some(raw.into_record()))
    }

    fn replace_tags(
        &self,
        resource_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), ServiceError> {
        let url = format!(
            "{MANAGEMENT_BASE}{resource_id}/providers/Microsoft.Resources/tags/default\
             ?api-version={TAGS_API_VERSION}"
        );
        let body = serde_json::json!({ "properties": { "tags": tags } });
        self.agent
            .put(&url)
            .header("Authorization", &self.bearer())
            .header("content-type", "application/json")
            .send_json(&body)
            .map_err(|e| request_error("replace_tags", e))?;
        Ok(())
    }
}

fn request_error(operation: &'static str, error: ureq::Error) -> ServiceError {
    match error {
        ureq::Error::StatusCode(status) => ServiceError::Http { operation, status },
        other => ServiceError::Transport {
            operation,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kql_reflects_type_and_tag_filters() {
        let mut query = ResourceQuery::new(QueryScope::Tenant);
        assert_eq!(render_kql(&query), "Resources");

        query.resource_type = Some("microsoft.compute/virtualmachines".to_string());
        query.required_tag = Some("Environment".to_string());
        assert_eq!(
            render_kql(&query),
            "Resources | where type =~ 'microsoft.compute/virtualmachines' \
             | where isnotempty(tags['Environment'])"
        );
    }

    #[test]
    fn kql_escapes_embedded_quotes() {
        let mut query = ResourceQuery::new(QueryScope::Tenant);
        query.required_tag = Some("O'Brien".to_string());
        assert!(render_kql(&query).contains("tags['O\\'Brien']"));
    }

    #[test]
    fn skip_is_omitted_for_the_first_page() {
        let options = page_options(100, None);
        assert!(options.get("$skip").is_none());
        assert_eq!(options["$top"], 100);

        let options = page_options(100, Some(200));
        assert_eq!(options["$skip"], 200);
    }

    #[test]
    fn group_and_subscription_come_from_the_id_path() {
        let id = "/subscriptions/sub-1/resourceGroups/rg-app/providers/\
                  Microsoft.Compute/virtualMachines/vm-1";
        assert_eq!(path_segment_after(id, "subscriptions"), Some("sub-1"));
        assert_eq!(path_segment_after(id, "resourceGroups"), Some("rg-app"));
        assert_eq!(path_segment_after(id, "managementGroups"), None);
    }
}
