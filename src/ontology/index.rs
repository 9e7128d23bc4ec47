//! Lookup structures over the capability ontology.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use super::types::{CapabilityRecord, EdgeType, Layer, OntologyDocument, Risk};
use crate::error::LoadError;
use crate::schema::{ONTOLOGY_DOC, SchemaNode, SchemaResolver};

/// A capability with its contracts resolved.
#[derive(Debug, Clone)]
pub struct Capability {
    pub id: String,
    pub layer: Layer,
    pub description: String,
    pub risk: Risk,
    pub mutation: bool,
    pub provides_checkpoint: bool,
    pub input: Arc<SchemaNode>,
    pub output: Arc<SchemaNode>,
}

#[derive(Debug, Default)]
pub struct OntologyIndex {
    capabilities: BTreeMap<String, Capability>,
    /// Outgoing neighbours per edge type. Symmetric types are stored both ways.
    adjacency: HashMap<EdgeType, BTreeMap<String, BTreeSet<String>>>,
    /// `preceded_by[x]` = every `p` with `p precedes+ x`.
    preceded_by: BTreeMap<String, BTreeSet<String>>,
    /// `generalizations[c]` = every `x` with `c specializes+ x`.
    generalizations: BTreeMap<String, BTreeSet<String>>,
    checkpoint_providers: BTreeSet<String>,
    edge_count: usize,
}

/// Per-edge-type graph over capability ids, in the shape of the workflow
/// graph wrapper: node weights are ids, plus an id -> index map.
struct EdgeGraph<'a> {
    graph: DiGraph<&'a str, ()>,
    node_indices: HashMap<&'a str, NodeIndex>,
}

impl<'a> EdgeGraph<'a> {
    fn build(records: &'a [CapabilityRecord], edge_type: EdgeType) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        for record in records {
            let idx = graph.add_node(record.id.as_str());
            node_indices.insert(record.id.as_str(), idx);
        }
        for record in records {
            for (ty, to) in record.all_edges() {
                if ty != edge_type {
                    continue;
                }
                if let (Some(&s), Some(&t)) =
                    (node_indices.get(record.id.as_str()), node_indices.get(to))
                {
                    graph.update_edge(s, t, ());
                }
            }
        }
        EdgeGraph {
            graph,
            node_indices,
        }
    }

    fn check_acyclic(&self, edge_type: EdgeType) -> Result<(), LoadError> {
        let Err(cycle) = toposort(&self.graph, None) else {
            return Ok(());
        };
        let culprit = cycle.node_id();
        let mut members: Vec<String> = tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.contains(&culprit))
            .unwrap_or_else(|| vec![culprit])
            .into_iter()
            .map(|idx| self.graph[idx].to_string())
            .collect();
        members.sort();
        if let Some(first) = members.first().cloned() {
            members.push(first);
        }
        Err(LoadError::Cycle {
            edge: edge_type.to_string(),
            members,
        })
    }

    /// Everything reachable from `id`, excluding `id` itself.
    fn reachable(&self, id: &str) -> BTreeSet<String> {
        let Some(&start) = self.node_indices.get(id) else {
            return BTreeSet::new();
        };
        let mut out = BTreeSet::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(nx) = dfs.next(&self.graph) {
            if nx != start {
                out.insert(self.graph[nx].to_string());
            }
        }
        out
    }
}

impl OntologyIndex {
    /// Build the index. `resolver` must see the ontology document under
    /// [`ONTOLOGY_DOC`]; `extra_checkpoints` names capabilities treated as
    /// checkpoint providers in addition to those flagged in the ontology.
    pub fn build(
        document: &OntologyDocument,
        resolver: &mut SchemaResolver<'_>,
        extra_checkpoints: &[String],
    ) -> Result<Self, LoadError> {
        let records = &document.capabilities;

        let mut ids = BTreeSet::new();
        for record in records {
            if !ids.insert(record.id.as_str()) {
                return Err(LoadError::DuplicateCapability(record.id.clone()));
            }
        }

        let mut adjacency: HashMap<EdgeType, BTreeMap<String, BTreeSet<String>>> = HashMap::new();
        let mut edge_count = 0;
        for record in records {
            for (edge_type, to) in record.all_edges() {
                if !ids.contains(to) {
                    return Err(LoadError::UnknownEdgeTarget {
                        from: record.id.clone(),
                        edge: edge_type.to_string(),
                        to: to.to_string(),
                    });
                }
                if edge_type == EdgeType::Requires && to == record.id {
                    return Err(LoadError::SelfRequires(record.id.clone()));
                }
                edge_count += 1;
                let table = adjacency.entry(edge_type).or_default();
                table
                    .entry(record.id.clone())
                    .or_default()
                    .insert(to.to_string());
                if edge_type.policy().symmetric {
                    table
                        .entry(to.to_string())
                        .or_default()
                        .insert(record.id.clone());
                }
            }
        }

        let mut preceded_by: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut generalizations = BTreeMap::new();
        for edge_type in EdgeType::ALL {
            let policy = edge_type.policy();
            if !policy.acyclic && !policy.transitive {
                continue;
            }
            let graph = EdgeGraph::build(records, edge_type);
            if policy.acyclic {
                graph.check_acyclic(edge_type)?;
            }
            if !policy.transitive {
                continue;
            }
            for record in records {
                let reachable = graph.reachable(&record.id);
                match edge_type {
                    EdgeType::Precedes => {
                        for later in reachable {
                            preceded_by
                                .entry(later)
                                .or_default()
                                .insert(record.id.clone());
                        }
                    }
                    EdgeType::Specializes if !reachable.is_empty() => {
                        generalizations.insert(record.id.clone(), reachable);
                    }
                    _ => {}
                }
            }
        }

        let mut capabilities = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            let input = resolve_contract(resolver, record, i, "input_schema")?;
            let output = resolve_contract(resolver, record, i, "output_schema")?;
            capabilities.insert(
                record.id.clone(),
                Capability {
                    id: record.id.clone(),
                    layer: record.layer,
                    description: record.description.clone(),
                    risk: record.risk,
                    mutation: record.mutation,
                    provides_checkpoint: record.provides_checkpoint,
                    input,
                    output,
                },
            );
        }

        let mut checkpoint_providers: BTreeSet<String> = records
            .iter()
            .filter(|r| r.provides_checkpoint)
            .map(|r| r.id.clone())
            .collect();
        for id in extra_checkpoints {
            if ids.contains(id.as_str()) {
                checkpoint_providers.insert(id.clone());
            } else {
                tracing::warn!(capability = %id, "configured checkpoint capability is not in the ontology");
            }
        }
        let specialized: Vec<String> = generalizations
            .iter()
            .filter(|(_, general)| general.iter().any(|g| checkpoint_providers.contains(g)))
            .map(|(id, _)| id.clone())
            .collect();
        checkpoint_providers.extend(specialized);

        Ok(OntologyIndex {
            capabilities,
            adjacency,
            preceded_by,
            generalizations,
            checkpoint_providers,
            edge_count,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Capability> {
        self.capabilities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.capabilities.contains_key(id)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Direct neighbours of `id` along `edge_type`, in id order.
    pub fn neighbors(&self, id: &str, edge_type: EdgeType) -> impl Iterator<Item = &str> {
        self.adjacency
            .get(&edge_type)
            .and_then(|table| table.get(id))
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Capabilities that transitively precede `id`.
    pub fn preceded_by(&self, id: &str) -> impl Iterator<Item = &str> {
        self.preceded_by
            .get(id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// True when a step invoking `provided` discharges an obligation on
    /// `required`.
    pub fn satisfies(&self, provided: &str, required: &str) -> bool {
        provided == required
            || self
                .generalizations
                .get(provided)
                .is_some_and(|g| g.contains(required))
    }

    /// True when steps invoking `a` and `b` may not share a workflow.
    /// Either side may be a specialization of a declared conflict.
    pub fn conflicts(&self, a: &str, b: &str) -> bool {
        self.neighbors(a, EdgeType::ConflictsWith)
            .any(|x| self.satisfies(b, x))
            || self
                .neighbors(b, EdgeType::ConflictsWith)
                .any(|x| self.satisfies(a, x))
    }

    pub fn is_checkpoint_provider(&self, id: &str) -> bool {
        self.checkpoint_providers.contains(id)
    }

    /// The preferred capability to insert when a checkpoint is missing.
    pub fn default_checkpoint(&self) -> Option<&str> {
        self.checkpoint_providers
            .iter()
            .find(|id| !self.generalizations.contains_key(*id))
            .or_else(|| self.checkpoint_providers.iter().next())
            .map(String::as_str)
    }

    /// Nearest known id by edit distance, for "did you mean" hints.
    pub fn suggest(&self, unknown: &str) -> Option<&str> {
        let limit = (unknown.chars().count() / 3).max(2);
        self.capabilities
            .keys()
            .map(|id| (strsim::levenshtein(unknown, id), id))
            .filter(|(d, _)| *d <= limit)
            .min_by_key(|(d, _)| *d)
            .map(|(_, id)| id.as_str())
    }
}

fn resolve_contract(
    resolver: &mut SchemaResolver<'_>,
    record: &CapabilityRecord,
    index: usize,
    field: &str,
) -> Result<Arc<SchemaNode>, LoadError> {
    let present = match field {
        "input_schema" => record.input_schema.is_some(),
        _ => record.output_schema.is_some(),
    };
    if !present {
        return Ok(SchemaNode::any());
    }
    resolver
        .resolve_pointer(ONTOLOGY_DOC, &format!("/capabilities/{index}/{field}"))
        .map_err(|source| LoadError::CapabilitySchema {
            capability: record.id.clone(),
            source,
        })
}
