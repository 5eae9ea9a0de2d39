//! Node scheduling reconciliation
//!
//! Transitions a named Rancher node between active, cordoned, and drained
//! states. The node's state machine lives remotely
//! (`active → cordoned → draining → drained`, plus `active ⇄ cordoned`);
//! this reconciler only reads observed state and invokes the transition
//! actions the node itself advertises, then — for drain only — polls until
//! the state is terminal or the caller's deadline elapses.
//!
//! Node identity must be unambiguous before any transition: every operation
//! fails immediately when the name lookup does not resolve to exactly one
//! node.

pub mod drain;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{self, ApiClient, Lookup};
use crate::node::drain::{DrainWatch, PollVerdict};
use crate::outcome::Outcome;
use crate::{Result, DEFAULT_DRAIN_TIMEOUT_SECS, DEFAULT_GRACE_PERIOD_SECS, DRAIN_POLL_INTERVAL};

/// Node collection endpoint
pub(crate) const NODES_PATH: &str = "/v3/nodes";

/// Desired scheduling state of a node
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum NodeState {
    /// Schedulable and running workloads
    #[default]
    Uncordoned,
    /// Unschedulable, existing workloads untouched
    Cordoned,
    /// Unschedulable with all evictable workloads evicted
    Drained,
}

impl std::str::FromStr for NodeState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uncordoned" => Ok(Self::Uncordoned),
            "cordoned" => Ok(Self::Cordoned),
            "drained" => Ok(Self::Drained),
            _ => Err(crate::Error::decode(format!(
                "invalid node state: {s}, expected one of: uncordoned, cordoned, drained"
            ))),
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uncordoned => write!(f, "uncordoned"),
            Self::Cordoned => write!(f, "cordoned"),
            Self::Drained => write!(f, "drained"),
        }
    }
}

/// Target configuration for a node reconciliation
///
/// The drain fields are only consulted for [`NodeState::Drained`]; cordon
/// and uncordon need the name alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    /// Node name; the lookup identity (Rancher does not enforce uniqueness)
    pub name: String,

    /// Continue even when pods are not managed by a controller
    pub force: bool,

    /// Delete pod-local data during eviction
    pub delete_local_data: bool,

    /// Leave daemon set pods in place
    pub ignore_daemon_sets: bool,

    /// Eviction grace period in seconds; -1 lets each pod use its own
    /// default
    pub grace_period: i64,

    /// Upper bound, in seconds, on total drain polling time
    pub timeout: u64,
}

impl NodeSpec {
    /// Create a spec for the given node name with default drain settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            force: false,
            delete_local_data: false,
            ignore_daemon_sets: true,
            grace_period: DEFAULT_GRACE_PERIOD_SECS,
            timeout: DEFAULT_DRAIN_TIMEOUT_SECS,
        }
    }

    /// Set the force flag and return self for chaining
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the local-data deletion flag and return self for chaining
    pub fn delete_local_data(mut self, delete: bool) -> Self {
        self.delete_local_data = delete;
        self
    }

    /// Set the daemon-set handling flag and return self for chaining
    pub fn ignore_daemon_sets(mut self, ignore: bool) -> Self {
        self.ignore_daemon_sets = ignore;
        self
    }

    /// Set the eviction grace period and return self for chaining
    pub fn grace_period(mut self, seconds: i64) -> Self {
        self.grace_period = seconds;
        self
    }

    /// Set the drain polling deadline and return self for chaining
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }
}

/// Cordon/uncordon pair: the observed state that makes the operation a
/// no-op, plus the advertised action that reaches it
#[derive(Clone, Copy, Debug)]
enum SchedulingTarget {
    Cordoned,
    Uncordoned,
}

impl SchedulingTarget {
    fn desired_state(self) -> &'static str {
        match self {
            Self::Cordoned => "cordoned",
            Self::Uncordoned => "active",
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::Cordoned => "cordon",
            Self::Uncordoned => "uncordon",
        }
    }
}

/// Build the request body for the drain action.
fn drain_request(spec: &NodeSpec) -> Value {
    json!({
        "deleteLocalData": spec.delete_local_data,
        "force": spec.force,
        "ignoreDaemonSets": spec.ignore_daemon_sets,
        "gracePeriod": spec.grace_period,
        "timeout": spec.timeout,
    })
}

/// Fatal outcome for a name lookup that did not resolve to exactly one node.
fn unknown_node_outcome() -> Outcome {
    Outcome::fatal(json!({
        "error": "node name not found or multiple nodes found",
    }))
}

/// Reconciles node scheduling state against the Rancher API
pub struct NodeReconciler {
    api: Arc<dyn ApiClient>,
}

impl NodeReconciler {
    /// Create a reconciler using the given API collaborator
    pub fn new(api: Arc<dyn ApiClient>) -> Self {
        Self { api }
    }

    /// Converge the named node to the desired scheduling state.
    ///
    /// Never returns an error: transport and decode failures are folded into
    /// a `failed` outcome so callers always receive a structured result. A
    /// drain that was started but did not reach the drained state reports
    /// `failed` and `changed` together — retry or escalate, it is not a
    /// no-op failure.
    pub async fn apply(&self, desired: NodeState, spec: &NodeSpec) -> Outcome {
        let result = match desired {
            NodeState::Cordoned => self.set_scheduling(spec, SchedulingTarget::Cordoned).await,
            NodeState::Uncordoned => {
                self.set_scheduling(spec, SchedulingTarget::Uncordoned).await
            }
            NodeState::Drained => self.drain(spec).await,
        };
        result.unwrap_or_else(Outcome::from_error)
    }

    /// Look up the node by name; `None` covers both a missing node and an
    /// ambiguous name.
    async fn find_node(&self, name: &str) -> Result<Option<Value>> {
        match api::lookup_by_name(self.api.as_ref(), NODES_PATH, name).await? {
            Lookup::One(node) => Ok(Some(node)),
            Lookup::None | Lookup::Many(_) => Ok(None),
        }
    }

    /// Cordon or uncordon the node, skipping the action when it is already
    /// in the target state.
    async fn set_scheduling(&self, spec: &NodeSpec, target: SchedulingTarget) -> Result<Outcome> {
        let Some(node) = self.find_node(&spec.name).await? else {
            return Ok(unknown_node_outcome());
        };

        let state = api::resource_state(&node)?;
        if state == target.desired_state() {
            debug!(node = %spec.name, state, "node already in desired state");
            return Ok(Outcome::unchanged(node));
        }

        let url = api::action_url(&node, target.action())?.to_string();
        let response = self.api.post_url(&url, &json!({})).await?;

        if response.status == 200 {
            info!(node = %spec.name, action = target.action(), "node scheduling updated");
            Ok(Outcome::changed(json!({ "status": "SUCCESS" })))
        } else {
            Ok(Outcome::fatal(json!({
                "status": response.status,
                "response": response.body,
            })))
        }
    }

    /// Start draining the node and poll until it finishes or the deadline
    /// elapses.
    async fn drain(&self, spec: &NodeSpec) -> Result<Outcome> {
        let Some(node) = self.find_node(&spec.name).await? else {
            return Ok(unknown_node_outcome());
        };

        if api::resource_state(&node)? == "drained" {
            debug!(node = %spec.name, "node already drained");
            return Ok(Outcome::unchanged(node));
        }

        let url = api::action_url(&node, "drain")?.to_string();
        let response = self.api.post_url(&url, &drain_request(spec)).await?;

        if response.status != 200 {
            // The request to start draining was itself rejected; nothing
            // was altered remotely.
            return Ok(Outcome::fatal(json!({
                "status": response.status,
                "response": response.body,
            })));
        }

        info!(node = %spec.name, timeout = spec.timeout, "drain started, waiting for completion");
        self.wait_for_drain(spec).await
    }

    /// Poll the node until the drain reaches a terminal verdict.
    ///
    /// Decision logic lives in [`DrainWatch`]; this loop only re-fetches the
    /// node and sleeps between observations. The sleep is the sole
    /// suspension point of a reconciliation.
    async fn wait_for_drain(&self, spec: &NodeSpec) -> Result<Outcome> {
        let mut watch = DrainWatch::new(Duration::from_secs(spec.timeout), DRAIN_POLL_INTERVAL);

        loop {
            let Some(node) = self.find_node(&spec.name).await? else {
                return Ok(unknown_node_outcome());
            };
            let state = api::resource_state(&node)?;

            match watch.observe(state) {
                PollVerdict::Continue => {
                    debug!(
                        node = %spec.name,
                        elapsed_secs = watch.elapsed().as_secs(),
                        "node still draining"
                    );
                    tokio::time::sleep(watch.interval()).await;
                }
                PollVerdict::Succeeded => {
                    info!(node = %spec.name, "node drained");
                    return Ok(Outcome::changed(json!({ "status": "SUCCESS" })));
                }
                PollVerdict::TimedOut => {
                    warn!(node = %spec.name, timeout = spec.timeout, "drain deadline elapsed");
                    return Ok(Outcome::partial(json!({
                        "status": "DRAIN FAILURE",
                        "error": "timed out waiting for the node to finish draining",
                    })));
                }
                PollVerdict::RemoteFailed(state) => {
                    warn!(node = %spec.name, state = %state, "drain failed remotely");
                    return Ok(Outcome::partial(json!({
                        "status": "DRAIN FAILURE",
                        "error": format!("drain left the node in state {state}"),
                    })));
                }
            }
        }
    }
}
