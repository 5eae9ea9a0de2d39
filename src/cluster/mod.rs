//! Cluster presence reconciliation
//!
//! Converges a named Rancher cluster to a desired presence state: create it
//! (provisioning or reusing a registration token) or delete it. The remote
//! is the only source of truth and does not guarantee name uniqueness, so
//! every decision starts from a fresh lookup and ambiguous matches are
//! handled explicitly — a destructive action on an ambiguous target never
//! proceeds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::api::{self, ApiClient, Lookup};
use crate::outcome::Outcome;
use crate::Result;

/// Cluster collection endpoint
pub(crate) const CLUSTERS_PATH: &str = "/v3/clusters";

/// Registration token creation endpoint
pub(crate) const TOKEN_CREATE_PATH: &str = "/v3/clusterregistrationtoken";

/// Error reported when a name lookup matches more than one cluster
const AMBIGUOUS_NAME_ERROR: &str = "multiple clusters found using the provided name";

/// Desired presence of a cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ClusterState {
    /// The cluster should exist, with a registration token available
    #[default]
    Present,
    /// The cluster should not exist
    Absent,
}

impl std::str::FromStr for ClusterState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            _ => Err(crate::Error::decode(format!(
                "invalid cluster state: {s}, expected one of: present, absent"
            ))),
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// CNI plugins Rancher accepts for RKE clusters
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum NetworkPlugin {
    /// Canal (default)
    #[default]
    Canal,
    /// Calico
    Calico,
    /// Flannel
    Flannel,
}

impl std::str::FromStr for NetworkPlugin {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "canal" => Ok(Self::Canal),
            "calico" => Ok(Self::Calico),
            "flannel" => Ok(Self::Flannel),
            _ => Err(crate::Error::decode(format!(
                "invalid network plugin: {s}, expected one of: canal, calico, flannel"
            ))),
        }
    }
}

impl std::fmt::Display for NetworkPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canal => write!(f, "canal"),
            Self::Calico => write!(f, "calico"),
            Self::Flannel => write!(f, "flannel"),
        }
    }
}

/// Desired configuration for a managed cluster
///
/// Treated as a read-only snapshot for the duration of one reconciliation:
/// the payload builder reads it and constructs a fresh request body, never
/// mutating caller data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterSpec {
    /// Cluster name; the lookup identity (Rancher does not enforce
    /// uniqueness)
    pub name: String,

    /// CNI plugin for the RKE network configuration
    pub network_plugin: NetworkPlugin,

    /// Relax Rancher's docker version gate
    pub ignore_docker_version: bool,

    /// Free-form attributes forwarded verbatim into the creation payload
    /// (labels, annotations, description, image overrides, docker root
    /// dir, alerting and monitoring flags, ...)
    pub attributes: Map<String, Value>,
}

impl ClusterSpec {
    /// Create a spec for the given cluster name with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the CNI plugin and return self for chaining
    pub fn network_plugin(mut self, plugin: NetworkPlugin) -> Self {
        self.network_plugin = plugin;
        self
    }

    /// Set the docker version gate toggle and return self for chaining
    pub fn ignore_docker_version(mut self, ignore: bool) -> Self {
        self.ignore_docker_version = ignore;
        self
    }

    /// Add a pass-through attribute and return self for chaining
    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// How a 422 response to cluster creation is interpreted
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Conflict {
    /// The cluster name is already taken — an idempotent re-create
    DuplicateName,
    /// Any other validation failure
    OtherValidation,
}

/// Classify a 422 creation response by the error code in its body.
///
/// Rancher overloads 422 for both duplicate names and genuine validation
/// errors. Only a `NotUnique` code identifies the duplicate case; everything
/// else (including bodies with no code at all, as older Rancher versions
/// sent) falls through to [`Conflict::OtherValidation`], which the
/// reconciler downgrades to a benign no-op. That downgrade is the single
/// policy decision for the overloaded status code; it lives here so it is
/// not scattered through the flow.
pub(crate) fn classify_conflict(body: &Value) -> Conflict {
    match body.get("code").and_then(Value::as_str) {
        Some("NotUnique") => Conflict::DuplicateName,
        _ => Conflict::OtherValidation,
    }
}

/// Build the creation payload for a cluster.
///
/// Caller attributes are copied in first, then the identity and the fixed
/// RKE engine block, so a stray attribute can never override either.
fn creation_payload(spec: &ClusterSpec) -> Value {
    let mut payload = Map::new();
    for (key, value) in &spec.attributes {
        payload.insert(key.clone(), value.clone());
    }
    payload.insert("name".to_string(), json!(spec.name));
    payload.insert("type".to_string(), json!("cluster"));
    payload.insert(
        "rancherKubernetesEngineConfig".to_string(),
        rke_config(spec),
    );
    Value::Object(payload)
}

/// Fixed RKE engine configuration attached to every created cluster.
///
/// Constant template; only the network plugin and the docker version gate
/// come from the caller.
fn rke_config(spec: &ClusterSpec) -> Value {
    json!({
        "addonJobTimeout": 30,
        "ignoreDockerVersion": spec.ignore_docker_version,
        "sshAgentAuth": false,
        "type": "rancherKubernetesEngineConfig",
        "authentication": {
            "type": "authnConfig",
            "strategy": "x509",
        },
        "network": {
            "type": "networkConfig",
            "plugin": spec.network_plugin,
        },
        "ingress": {
            "type": "ingressConfig",
            "provider": "nginx",
        },
        "monitoring": {
            "type": "monitoringConfig",
            "provider": "metrics-server",
        },
        "services": {
            "type": "rkeConfigServices",
            "kubeApi": {
                "podSecurityPolicy": false,
                "type": "kubeAPIService",
            },
            "etcd": {
                "snapshot": false,
                "type": "etcdService",
                "extraArgs": {
                    "heartbeat-interval": 500,
                    "election-timeout": 5000,
                },
            },
        },
    })
}

/// Attach a registration token to a cluster payload under
/// `registration_token`.
fn with_registration_token(mut resource: Value, token: String) -> Value {
    if let Some(map) = resource.as_object_mut() {
        map.insert("registration_token".to_string(), Value::String(token));
    }
    resource
}

/// Reconciles cluster presence against the Rancher API
pub struct ClusterReconciler {
    api: Arc<dyn ApiClient>,
}

impl ClusterReconciler {
    /// Create a reconciler using the given API collaborator
    pub fn new(api: Arc<dyn ApiClient>) -> Self {
        Self { api }
    }

    /// Converge the named cluster to the desired state.
    ///
    /// Never returns an error: transport and decode failures are folded into
    /// a `failed` outcome so callers always receive a structured result.
    pub async fn apply(&self, desired: ClusterState, spec: &ClusterSpec) -> Outcome {
        let result = match desired {
            ClusterState::Present => self.ensure_present(spec).await,
            ClusterState::Absent => self.ensure_absent(spec).await,
        };
        result.unwrap_or_else(Outcome::from_error)
    }

    /// Create the cluster, or reuse it when it already exists.
    async fn ensure_present(&self, spec: &ClusterSpec) -> Result<Outcome> {
        debug!(cluster = %spec.name, "creating cluster");
        let response = self.api.post(CLUSTERS_PATH, &creation_payload(spec)).await?;

        match response.status {
            201 => {
                let id = api::resource_id(&response.body)?.to_string();
                let token = self.registration_token(&id).await?;
                info!(cluster = %spec.name, id = %id, "cluster created");
                Ok(Outcome::changed(with_registration_token(
                    response.body,
                    token,
                )))
            }
            422 => match classify_conflict(&response.body) {
                Conflict::DuplicateName => self.reuse_existing(spec).await,
                Conflict::OtherValidation => {
                    // Older Rancher versions returned 422 for every
                    // validation failure, so this path must stay non-fatal.
                    // The warning keeps genuine rejections visible in logs.
                    warn!(
                        cluster = %spec.name,
                        body = %response.body,
                        "cluster creation rejected with a validation error, treating as no-op"
                    );
                    Ok(Outcome::unchanged(response.body))
                }
            },
            status => Ok(Outcome::fatal(json!({
                "status": status,
                "response": response.body,
            }))),
        }
    }

    /// Resolve an already-existing cluster by name and attach its
    /// registration token.
    ///
    /// The lookup must resolve to exactly one match; anything else is a
    /// failure of the token step.
    async fn reuse_existing(&self, spec: &ClusterSpec) -> Result<Outcome> {
        debug!(cluster = %spec.name, "cluster already exists, reusing it");
        match api::lookup_by_name(self.api.as_ref(), CLUSTERS_PATH, &spec.name).await? {
            Lookup::One(cluster) => {
                let id = api::resource_id(&cluster)?.to_string();
                let token = self.registration_token(&id).await?;
                Ok(Outcome::unchanged(with_registration_token(cluster, token)))
            }
            Lookup::Many(count) => {
                warn!(cluster = %spec.name, count, "cluster name is ambiguous");
                Ok(Outcome::fatal(json!({ "error": AMBIGUOUS_NAME_ERROR })))
            }
            Lookup::None => Ok(Outcome::fatal(json!({
                "error": "cluster reported as existing but none found using the provided name",
            }))),
        }
    }

    /// Fetch the cluster's registration token, creating one if none exists.
    ///
    /// At most one creation request per invocation; concurrent callers are
    /// not serialized — the remote is the only source of truth.
    async fn registration_token(&self, cluster_id: &str) -> Result<String> {
        let path = format!("{CLUSTERS_PATH}/{cluster_id}/clusterregistrationtokens");
        let response = self.api.get(&path, &[]).await?;
        let tokens = api::parse_collection(&response.body)?;

        if tokens.total == 0 {
            debug!(cluster_id, "no registration token yet, creating one");
            let request = json!({
                "type": "clusterRegistrationToken",
                "clusterId": cluster_id,
            });
            let created = self.api.post(TOKEN_CREATE_PATH, &request).await?;
            return node_command(&created.body);
        }

        let first = tokens.data.into_iter().next().ok_or_else(|| {
            crate::Error::decode("token list reported matches but data was empty")
        })?;
        node_command(&first)
    }

    /// Delete the cluster if it exists and is unambiguous.
    async fn ensure_absent(&self, spec: &ClusterSpec) -> Result<Outcome> {
        match api::lookup_by_name(self.api.as_ref(), CLUSTERS_PATH, &spec.name).await? {
            Lookup::None => {
                debug!(cluster = %spec.name, "cluster already absent");
                Ok(Outcome::unchanged(json!({
                    "msg": "no clusters found using the provided name",
                })))
            }
            Lookup::Many(count) => {
                // Never delete on an ambiguous target.
                warn!(cluster = %spec.name, count, "refusing to delete an ambiguous cluster name");
                Ok(Outcome::fatal(json!({ "error": AMBIGUOUS_NAME_ERROR })))
            }
            Lookup::One(cluster) => {
                // Rancher supplies the exact deletion endpoint; it may
                // encode state-dependent preconditions.
                let url = api::remove_url(&cluster)?.to_string();
                let response = self.api.delete(&url).await?;
                match response.status {
                    200 => {
                        info!(cluster = %spec.name, "cluster deleted");
                        Ok(Outcome::changed(response.body))
                    }
                    // Already in a non-deletable or terminal state.
                    422 => Ok(Outcome::unchanged(response.body)),
                    status => Ok(Outcome::fatal(json!({
                        "status": status,
                        "response": response.body,
                    }))),
                }
            }
        }
    }
}

/// Read the node registration command off a token resource.
fn node_command(token: &Value) -> Result<String> {
    token
        .get("nodeCommand")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| crate::Error::decode("registration token missing nodeCommand"))
}
