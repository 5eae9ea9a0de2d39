//! Rancher v3 API collaborator contract and response helpers
//!
//! Reconcilers talk to Rancher exclusively through the [`ApiClient`] trait:
//! send JSON, receive status plus decoded JSON. The trait keeps the
//! reconciliation logic testable with a mocked collaborator while
//! [`RancherClient`] does the real HTTP work in production.
//!
//! List responses and resource objects share a common shape across Rancher
//! collections (`pagination.total`, `data`, `state`, `actions`,
//! `links.remove`); the helpers here interpret that shape in one place.

mod client;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::{Error, Result};

pub use client::{RancherClient, RancherConfig};

/// Status code plus decoded JSON body returned by every API call
#[derive(Clone, Debug)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,

    /// Decoded JSON body; [`Value::Null`] when the response body was empty
    pub body: Value,
}

/// Trait abstracting the Rancher HTTP API for reconcilers
///
/// All implementations carry bearer-token authorization on every request.
/// Rancher supplies action and removal endpoints as absolute URLs on the
/// resource objects themselves, so the contract distinguishes
/// collection-relative paths from self-reported absolute URLs.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// GET a collection-relative path with query parameters
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse>;

    /// POST a JSON body to a collection-relative path
    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse>;

    /// POST a JSON body to an absolute URL supplied by a resource's
    /// `actions` map
    async fn post_url(&self, url: &str, body: &Value) -> Result<ApiResponse>;

    /// DELETE an absolute URL supplied by a resource's `links.remove`
    async fn delete(&self, url: &str) -> Result<ApiResponse>;
}

/// Parsed Rancher list response
#[derive(Clone, Debug)]
pub struct Collection {
    /// Total match count reported by `pagination.total`
    pub total: u64,

    /// Resource objects from the `data` array
    pub data: Vec<Value>,
}

impl Collection {
    /// Classify a name-filtered list into zero, one, or many matches.
    ///
    /// Rancher does not guarantee name uniqueness, so all three cases are
    /// possible and each is handled distinctly by the reconcilers.
    pub fn into_lookup(self) -> Result<Lookup> {
        match self.total {
            0 => Ok(Lookup::None),
            1 => self
                .data
                .into_iter()
                .next()
                .map(Lookup::One)
                .ok_or_else(|| {
                    Error::decode("list response reported one match but data was empty")
                }),
            n => Ok(Lookup::Many(n)),
        }
    }
}

/// Outcome of a name-filtered lookup
#[derive(Clone, Debug)]
pub enum Lookup {
    /// No resource carries the name
    None,

    /// Exactly one match
    One(Value),

    /// More than one resource carries the name
    Many(u64),
}

/// Parse a list response body into a [`Collection`].
pub fn parse_collection(body: &Value) -> Result<Collection> {
    let total = body
        .get("pagination")
        .and_then(|p| p.get("total"))
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::decode("list response missing pagination.total"))?;

    let data = body
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(Collection { total, data })
}

/// Query a collection filtered by name and classify the matches.
pub async fn lookup_by_name(api: &dyn ApiClient, path: &str, name: &str) -> Result<Lookup> {
    let query = [("name".to_string(), name.to_string())];
    let response = api.get(path, &query).await?;
    parse_collection(&response.body)?.into_lookup()
}

/// Read a resource object's `id`.
pub fn resource_id(resource: &Value) -> Result<&str> {
    resource
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decode("resource missing id"))
}

/// Read a resource object's `state`.
pub fn resource_state(resource: &Value) -> Result<&str> {
    resource
        .get("state")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decode("resource missing state"))
}

/// Resolve an entry in a resource's `actions` capability map.
///
/// Rancher encodes which transitions a resource currently supports as a map
/// of action name to absolute URL; a missing entry means the remote does not
/// offer that transition right now.
pub fn action_url<'a>(resource: &'a Value, action: &str) -> Result<&'a str> {
    resource
        .get("actions")
        .and_then(|actions| actions.get(action))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decode(format!("resource does not offer the {action} action")))
}

/// Resolve a resource's self-reported removal link.
pub fn remove_url(resource: &Value) -> Result<&str> {
    resource
        .get("links")
        .and_then(|links| links.get("remove"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decode("resource missing links.remove"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_body(total: u64, data: Vec<Value>) -> Value {
        json!({
            "pagination": { "total": total },
            "data": data,
        })
    }

    mod collection_parsing {
        use super::*;

        #[test]
        fn test_parse_collection_reads_total_and_data() {
            let body = list_body(2, vec![json!({"id": "c-1"}), json!({"id": "c-2"})]);
            let collection = parse_collection(&body).unwrap();
            assert_eq!(collection.total, 2);
            assert_eq!(collection.data.len(), 2);
        }

        #[test]
        fn test_parse_collection_without_pagination_is_decode_error() {
            let err = parse_collection(&json!({"data": []})).unwrap_err();
            assert!(err.to_string().contains("pagination.total"));
        }

        #[test]
        fn test_parse_collection_tolerates_missing_data() {
            let collection = parse_collection(&json!({"pagination": {"total": 0}})).unwrap();
            assert_eq!(collection.total, 0);
            assert!(collection.data.is_empty());
        }
    }

    mod lookup_classification {
        use super::*;

        #[test]
        fn test_zero_matches() {
            let lookup = parse_collection(&list_body(0, vec![]))
                .unwrap()
                .into_lookup()
                .unwrap();
            assert!(matches!(lookup, Lookup::None));
        }

        #[test]
        fn test_exactly_one_match_yields_the_resource() {
            let lookup = parse_collection(&list_body(1, vec![json!({"id": "c-1"})]))
                .unwrap()
                .into_lookup()
                .unwrap();
            match lookup {
                Lookup::One(resource) => assert_eq!(resource["id"], "c-1"),
                _ => panic!("expected exactly one match"),
            }
        }

        #[test]
        fn test_many_matches_carry_the_count() {
            let lookup = parse_collection(&list_body(3, vec![]))
                .unwrap()
                .into_lookup()
                .unwrap();
            assert!(matches!(lookup, Lookup::Many(3)));
        }

        #[test]
        fn test_one_match_with_empty_data_is_decode_error() {
            let err = parse_collection(&list_body(1, vec![]))
                .unwrap()
                .into_lookup()
                .unwrap_err();
            assert!(err.to_string().contains("data was empty"));
        }
    }

    mod resource_accessors {
        use super::*;

        fn node() -> Value {
            json!({
                "id": "machine-x1",
                "state": "active",
                "actions": {
                    "cordon": "https://rancher.example.com/v3/nodes/machine-x1?action=cordon",
                },
                "links": {
                    "remove": "https://rancher.example.com/v3/nodes/machine-x1",
                },
            })
        }

        #[test]
        fn test_accessors_read_present_fields() {
            let node = node();
            assert_eq!(resource_id(&node).unwrap(), "machine-x1");
            assert_eq!(resource_state(&node).unwrap(), "active");
            assert!(action_url(&node, "cordon").unwrap().ends_with("action=cordon"));
            assert!(remove_url(&node).unwrap().ends_with("machine-x1"));
        }

        #[test]
        fn test_missing_action_names_the_action() {
            let err = action_url(&node(), "drain").unwrap_err();
            assert!(err.to_string().contains("drain action"));
        }

        #[test]
        fn test_missing_fields_are_decode_errors() {
            let empty = json!({});
            assert!(resource_id(&empty).is_err());
            assert!(resource_state(&empty).is_err());
            assert!(remove_url(&empty).is_err());
        }
    }
}
