//! # Caremind Flows
//!
//! Structured guided-conversation flows: predefined, reviewed conversation
//! nodes used for safety-sensitive and guided interactions, plus the safety
//! lexicon the router screens every query against.
//!
//! Flow content is vetted by humans. The safety path must always resolve,
//! so a built-in crisis node and lexicon back every loaded definition file.

use std::collections::HashMap;
use std::path::Path;

use caremind_core::config::CaremindConfig;
use caremind_core::error::{CaremindError, Result};
use serde::{Deserialize, Serialize};

/// Node id of the built-in crisis response.
pub const CRISIS_NODE: &str = "safety.crisis";

/// One reviewed node in a guided conversation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    /// The vetted response text for this node.
    pub prompt: String,
    /// Candidate follow-up nodes, surfaced as next steps.
    #[serde(default)]
    pub next_nodes: Vec<String>,
    /// Marks nodes belonging to the safety path.
    #[serde(default)]
    pub safety_flag: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FlowFile {
    #[serde(default)]
    nodes: HashMap<String, FlowNode>,
    #[serde(default)]
    safety_terms: Vec<String>,
}

/// Keyed lookup over reviewed flow nodes.
pub struct FlowStore {
    nodes: HashMap<String, FlowNode>,
    safety_terms: Vec<String>,
}

impl FlowStore {
    /// Built-in nodes and lexicon, always present.
    pub fn with_defaults() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            CRISIS_NODE.to_string(),
            FlowNode {
                prompt: "It sounds like you or someone you care for may be in crisis. \
                         You are not alone. If there is immediate danger, call your local \
                         emergency number now. In the US you can call or text 988 \
                         (Suicide & Crisis Lifeline) any time. Would you like help finding \
                         local crisis resources?"
                    .to_string(),
                next_nodes: vec!["safety.local_resources".to_string()],
                safety_flag: true,
            },
        );
        nodes.insert(
            "safety.local_resources".to_string(),
            FlowNode {
                prompt: "Local crisis lines, urgent care and family support services can \
                         respond faster than any online resource. A trusted clinician or \
                         social worker can also help you make a safety plan."
                    .to_string(),
                next_nodes: vec![],
                safety_flag: true,
            },
        );
        nodes.insert(
            "welcome".to_string(),
            FlowNode {
                prompt: "Welcome. I can help with questions about screening, diagnosis, \
                         therapies, school supports and daily routines. What is on your \
                         mind today?"
                    .to_string(),
                next_nodes: vec![
                    "guided.early_signs".to_string(),
                    "guided.screening".to_string(),
                    "guided.support_resources".to_string(),
                ],
                safety_flag: false,
            },
        );
        nodes.insert(
            "guided.early_signs".to_string(),
            FlowNode {
                prompt: "Early signs often involve differences in eye contact, response \
                         to name, pretend play and back-and-forth babbling. Every child \
                         develops differently; patterns over time matter more than any \
                         single behavior."
                    .to_string(),
                next_nodes: vec!["guided.screening".to_string()],
                safety_flag: false,
            },
        );
        nodes.insert(
            "guided.screening".to_string(),
            FlowNode {
                prompt: "Validated screening tools such as the M-CHAT-R are a common first \
                         step. Your pediatrician can administer one and refer you for a \
                         full evaluation if indicated."
                    .to_string(),
                next_nodes: vec!["guided.support_resources".to_string()],
                safety_flag: false,
            },
        );
        nodes.insert(
            "guided.support_resources".to_string(),
            FlowNode {
                prompt: "Support can include early intervention programs, speech and \
                         occupational therapy, parent training, and school-based services \
                         through an IEP or 504 plan."
                    .to_string(),
                next_nodes: vec![],
                safety_flag: false,
            },
        );

        let safety_terms = [
            "hurt myself",
            "kill myself",
            "suicide",
            "suicidal",
            "self-harm",
            "self harm",
            "end my life",
            "want to die",
            "being abused",
            "abusing",
            "abuse",
            "overdose",
            "medical emergency",
            "unresponsive",
            "not breathing",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self { nodes, safety_terms }
    }

    /// Load a flow definition file and merge it over the defaults.
    /// File nodes override built-ins of the same id; safety terms append.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaremindError::Flow(format!("Failed to read flow file: {e}")))?;
        let file: FlowFile = serde_json::from_str(&content)
            .map_err(|e| CaremindError::Flow(format!("Failed to parse flow file: {e}")))?;

        let mut store = Self::with_defaults();
        let loaded = file.nodes.len();
        store.nodes.extend(file.nodes);
        store.safety_terms.extend(file.safety_terms);
        tracing::info!("🧭 Loaded {loaded} flow node(s) from {}", path.display());
        Ok(store)
    }

    /// Resolve the store from configuration: an empty or missing path means
    /// built-in defaults only.
    pub fn from_config(config: &CaremindConfig) -> Result<Self> {
        if config.flows.path.is_empty() {
            return Ok(Self::with_defaults());
        }
        let path = Path::new(&config.flows.path);
        if !path.exists() {
            tracing::warn!("⚠️ Flow file not found, using built-in flows: {}", path.display());
            return Ok(Self::with_defaults());
        }
        Self::load(path)
    }

    /// Keyed lookup of a flow node.
    pub fn get_node(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.get(node_id)
    }

    /// The crisis node is guaranteed present.
    pub fn crisis_node(&self) -> &FlowNode {
        self.nodes
            .get(CRISIS_NODE)
            .expect("built-in crisis node always present")
    }

    /// The safety lexicon screened against every query.
    pub fn safety_terms(&self) -> &[String] {
        &self.safety_terms
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
