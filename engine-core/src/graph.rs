//! The graph data model (§3): nodes, edges, global settings.
//!
//! A [`Graph`] is immutable once constructed — safe to share across
//! concurrently-running conversations, the same way `langgraph-core`'s
//! `Graph` is treated as read-only shared data behind an `Arc`. Transitions
//! reference other nodes by string ID rather than by pointer, so the graph
//! has no internal cycles of ownership even when its logical topology does.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Node identifier — a free-form, non-empty string unique within a graph.
pub type NodeId = String;

/// The closed set of node kinds described in §3.
///
/// Kept as a single tagged sum so that the handler dispatch in
/// [`crate::handlers`] can be exhaustive over it. Graph JSON is tolerant of
/// unknown `type` strings (§6): they deserialize into [`NodeKind::Unknown`]
/// rather than failing to parse, and are handled at the one designated
/// "Unknown kind" branch rather than as a runtime string comparison
/// scattered through the rest of the engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Greeting,
    Message,
    End,
    Question,
    Name,
    Email,
    Phone,
    City,
    Address,
    TaxIdPerson,
    BirthDate,
    Interest,
    Budget,
    Urgency,
    Condition,
    Switch,
    Qualification,
    Action,
    WebhookCall,
    ApiIntegration,
    Notification,
    Alert,
    Followup,
    Proposal,
    Negotiation,
    Scheduling,
    Visit,
    Image,
    Document,
    Audio,
    Video,
    Delay,
    Loop,
    Parallel,
    Handoff,
    /// Any `type` tag outside the closed set above.
    Unknown(String),
}

impl NodeKind {
    /// The canonical tag string, as it appears in graph JSON.
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Greeting => "GREETING",
            NodeKind::Message => "MESSAGE",
            NodeKind::End => "END",
            NodeKind::Question => "QUESTION",
            NodeKind::Name => "NAME",
            NodeKind::Email => "EMAIL",
            NodeKind::Phone => "PHONE",
            NodeKind::City => "CITY",
            NodeKind::Address => "ADDRESS",
            NodeKind::TaxIdPerson => "TAXID_PERSON",
            NodeKind::BirthDate => "BIRTHDATE",
            NodeKind::Interest => "INTEREST",
            NodeKind::Budget => "BUDGET",
            NodeKind::Urgency => "URGENCY",
            NodeKind::Condition => "CONDITION",
            NodeKind::Switch => "SWITCH",
            NodeKind::Qualification => "QUALIFICATION",
            NodeKind::Action => "ACTION",
            NodeKind::WebhookCall => "WEBHOOK_CALL",
            NodeKind::ApiIntegration => "API_INTEGRATION",
            NodeKind::Notification => "NOTIFICATION",
            NodeKind::Alert => "ALERT",
            NodeKind::Followup => "FOLLOWUP",
            NodeKind::Proposal => "PROPOSAL",
            NodeKind::Negotiation => "NEGOTIATION",
            NodeKind::Scheduling => "SCHEDULING",
            NodeKind::Visit => "VISIT",
            NodeKind::Image => "IMAGE",
            NodeKind::Document => "DOCUMENT",
            NodeKind::Audio => "AUDIO",
            NodeKind::Video => "VIDEO",
            NodeKind::Delay => "DELAY",
            NodeKind::Loop => "LOOP",
            NodeKind::Parallel => "PARALLEL",
            NodeKind::Handoff => "HANDOFF",
            NodeKind::Unknown(tag) => tag,
        }
    }

    /// Parse a tag string, falling back to `Unknown` instead of failing.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "GREETING" => NodeKind::Greeting,
            "MESSAGE" => NodeKind::Message,
            "END" => NodeKind::End,
            "QUESTION" => NodeKind::Question,
            "NAME" => NodeKind::Name,
            "EMAIL" => NodeKind::Email,
            "PHONE" => NodeKind::Phone,
            "CITY" => NodeKind::City,
            "ADDRESS" => NodeKind::Address,
            "TAXID_PERSON" => NodeKind::TaxIdPerson,
            "BIRTHDATE" => NodeKind::BirthDate,
            "INTEREST" => NodeKind::Interest,
            "BUDGET" => NodeKind::Budget,
            "URGENCY" => NodeKind::Urgency,
            "CONDITION" => NodeKind::Condition,
            "SWITCH" => NodeKind::Switch,
            "QUALIFICATION" => NodeKind::Qualification,
            "ACTION" => NodeKind::Action,
            "WEBHOOK_CALL" => NodeKind::WebhookCall,
            "API_INTEGRATION" => NodeKind::ApiIntegration,
            "NOTIFICATION" => NodeKind::Notification,
            "ALERT" => NodeKind::Alert,
            "FOLLOWUP" => NodeKind::Followup,
            "PROPOSAL" => NodeKind::Proposal,
            "NEGOTIATION" => NodeKind::Negotiation,
            "SCHEDULING" => NodeKind::Scheduling,
            "VISIT" => NodeKind::Visit,
            "IMAGE" => NodeKind::Image,
            "DOCUMENT" => NodeKind::Document,
            "AUDIO" => NodeKind::Audio,
            "VIDEO" => NodeKind::Video,
            "DELAY" => NodeKind::Delay,
            "LOOP" => NodeKind::Loop,
            "PARALLEL" => NodeKind::Parallel,
            "HANDOFF" => NodeKind::Handoff,
            other => NodeKind::Unknown(other.to_string()),
        }
    }

    /// Terminal kinds never have the navigator look for a `next` node.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::End | NodeKind::Handoff)
    }

    /// The default field name a typed-input shortcut collects into, and the
    /// validator kind it implies. `None` for kinds that aren't typed input.
    pub fn default_field(&self) -> Option<(&'static str, crate::validators::FieldKind)> {
        use crate::validators::FieldKind as FK;
        match self {
            NodeKind::Name => Some(("name", FK::Name)),
            NodeKind::Email => Some(("email", FK::Email)),
            NodeKind::Phone => Some(("phone", FK::Phone)),
            NodeKind::City => Some(("city", FK::City)),
            NodeKind::Address => Some(("address", FK::Address)),
            NodeKind::TaxIdPerson => Some(("taxid", FK::TaxIdPerson)),
            NodeKind::BirthDate => Some(("birthdate", FK::BirthDate)),
            NodeKind::Interest => Some(("interest", FK::Text)),
            NodeKind::Budget => Some(("budget", FK::Currency)),
            NodeKind::Urgency => Some(("urgency", FK::Text)),
            _ => None,
        }
    }

    /// True for `QUESTION` and the typed-input shortcuts; these all share
    /// the two-phase prompt/validate handler in §4.5.
    pub fn is_input(&self) -> bool {
        matches!(self, NodeKind::Question) || self.default_field().is_some()
    }
}

impl Serialize for NodeKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(NodeKind::from_tag(&tag))
    }
}

/// A kind-dependent configuration record (§3: "config (kind-dependent
/// record)"). Kept schemaless — like the Python original's plain dict — so
/// the loader can accept lenient input; individual handlers and the
/// autocorrector pull out the keys they need.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig(pub serde_json::Map<String, Value>);

impl NodeConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(|s| s.to_string())
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn array(&self, key: &str) -> Option<&Vec<Value>> {
        self.0.get(key).and_then(Value::as_array)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// An advisory edge, purely for visualization (§3: "purely advisory ...
/// transitions authoritatively come from node fields"). The engine never
/// reads these during execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub label: Option<String>,
}

/// A node in the graph, with every transition slot from §3.
///
/// Unused slots for a given `kind` are simply left `None`/empty; nothing
/// enforces that at the type level (the kind-dependent validity is the
/// loader's job, not the type's).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default)]
    pub next: Option<NodeId>,
    #[serde(default)]
    pub on_true: Option<NodeId>,
    #[serde(default)]
    pub on_false: Option<NodeId>,
    #[serde(default)]
    pub cases: indexmap::IndexMap<String, NodeId>,
    #[serde(default)]
    pub parallel: Vec<NodeId>,
}

impl Node {
    /// All node IDs this node can transition to, for reachability/orphan
    /// analysis. Order doesn't matter here (unlike `cases` iteration during
    /// execution).
    pub fn transition_targets(&self) -> Vec<&NodeId> {
        let mut targets = Vec::new();
        targets.extend(self.next.iter());
        targets.extend(self.on_true.iter());
        targets.extend(self.on_false.iter());
        targets.extend(self.cases.values());
        targets.extend(self.parallel.iter());
        targets
    }
}

/// Qualification weights, keyed by collected-field name (§3).
pub type Weights = HashMap<String, f64>;

/// Global settings shared by every node in a graph (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub mandatory_fields: Vec<String>,
    pub message_timeout_secs: u64,
    pub session_timeout_secs: u64,
    pub idle_followup_secs: u64,
    pub max_retries: u32,
    pub qualification_weights: Weights,
    pub qualification_threshold: f64,
    pub timeout_message: String,
    pub validation_error_message: String,
    pub farewell_message: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            mandatory_fields: Vec::new(),
            message_timeout_secs: 300,
            session_timeout_secs: 1800,
            idle_followup_secs: 600,
            max_retries: 3,
            qualification_weights: default_weights(),
            qualification_threshold: 70.0,
            timeout_message: "We haven't heard from you in a while — feel free to pick this back up anytime.".to_string(),
            validation_error_message: "Sorry, that doesn't look right. Could you try again?".to_string(),
            farewell_message: "Thanks for chatting with us!".to_string(),
        }
    }
}

/// Default per-field weights, matching the scorer's §4.6 data-completeness
/// defaults so a graph that never overrides `qualification_weights` still
/// scores sensibly.
pub fn default_weights() -> Weights {
    HashMap::from([
        ("name".to_string(), 10.0),
        ("phone".to_string(), 15.0),
        ("email".to_string(), 10.0),
        ("city".to_string(), 5.0),
        ("interest".to_string(), 20.0),
        ("budget".to_string(), 25.0),
        ("urgency".to_string(), 15.0),
        ("cep".to_string(), 5.0),
        ("address".to_string(), 5.0),
        ("taxid".to_string(), 5.0),
        ("birthdate".to_string(), 3.0),
        ("product".to_string(), 10.0),
        ("model".to_string(), 8.0),
    ])
}

/// The top-level, immutable graph (§3, §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub start_node_id: NodeId,
    pub version: String,
    pub global_config: GlobalConfig,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Default for Graph {
    fn default() -> Self {
        Graph {
            nodes: Vec::new(),
            edges: Vec::new(),
            start_node_id: String::new(),
            version: "2.0".to_string(),
            global_config: GlobalConfig::default(),
            name: None,
            description: None,
        }
    }
}

impl Graph {
    /// Build an ID → node lookup. Cheap enough to recompute per call; the
    /// navigator and loader both need it but the graph itself doesn't keep
    /// one cached since it's immutable reference data shared behind an
    /// `Arc`, not a hot-path structure.
    pub fn index(&self) -> HashMap<&NodeId, &Node> {
        self.nodes.iter().map(|n| (&n.id, n)).collect()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
