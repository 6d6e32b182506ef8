//! Physical transformations and the stream graph built from them.
//!
//! A plan is flattened into transformations in input-before-output order;
//! the stream graph is the serializable view handed out as JSON.

use serde::{Deserialize, Serialize};

use super::plan::{Distribution, PlanNode, PlanOp};
use crate::error::Result;

/// Partitioning applied on an edge between two transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShipStrategy {
    Forward,
    Hash,
    Global,
}

impl From<Distribution> for ShipStrategy {
    fn from(distribution: Distribution) -> Self {
        match distribution {
            Distribution::Forward => Self::Forward,
            Distribution::Hash => Self::Hash,
            Distribution::Global => Self::Global,
        }
    }
}

/// Role of a transformation in the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationKind {
    Source,
    Operator,
    Sink,
}

impl TransformationKind {
    fn pact(self) -> &'static str {
        match self {
            Self::Source => "Data Source",
            Self::Operator => "Operator",
            Self::Sink => "Data Sink",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Source => "Source: ",
            Self::Operator => "",
            Self::Sink => "Sink: ",
        }
    }
}

/// An input edge of a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformationInput {
    pub id: usize,
    pub ship_strategy: ShipStrategy,
}

/// One physical operator of a translated statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    pub id: usize,
    pub name: String,
    pub kind: TransformationKind,
    pub parallelism: u32,
    pub inputs: Vec<TransformationInput>,
}

/// Flattens `plan` into `out`, assigning ids from `next_id`.
///
/// Returns the id of the transformation produced for `plan` itself.
pub(crate) fn translate_plan(
    plan: &PlanNode,
    parallelism: u32,
    next_id: &mut usize,
    out: &mut Vec<Transformation>,
) -> usize {
    let strategy = ShipStrategy::from(plan.input_distribution());
    let inputs: Vec<TransformationInput> = plan
        .inputs
        .iter()
        .map(|input| TransformationInput {
            id: translate_plan(input, parallelism, next_id, out),
            ship_strategy: strategy,
        })
        .collect();

    let kind = match (&plan.op, inputs.is_empty()) {
        (PlanOp::Sink { .. }, _) => TransformationKind::Sink,
        (_, true) => TransformationKind::Source,
        (_, false) => TransformationKind::Operator,
    };
    let parallelism = if strategy == ShipStrategy::Global {
        1
    } else {
        parallelism
    };

    *next_id += 1;
    let id = *next_id;
    out.push(Transformation {
        id,
        name: plan.physical_description(),
        kind,
        parallelism,
        inputs,
    });
    id
}

/// A predecessor reference in the serialized graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predecessor {
    pub id: usize,
    pub ship_strategy: ShipStrategy,
    pub side: String,
}

/// A node of the serialized stream graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamNode {
    pub id: usize,
    #[serde(rename = "type")]
    pub node_type: String,
    pub pact: String,
    pub contents: String,
    pub parallelism: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predecessors: Vec<Predecessor>,
}

/// Serializable stream graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamGraph {
    pub nodes: Vec<StreamNode>,
}

impl StreamGraph {
    /// Builds the graph for a set of transformations.
    pub fn from_transformations(transformations: &[Transformation]) -> Self {
        let nodes = transformations
            .iter()
            .map(|t| {
                let node_type = format!("{}{}", t.kind.prefix(), t.name);
                StreamNode {
                    id: t.id,
                    contents: format!("[{}]:{}", t.id, node_type),
                    node_type,
                    pact: t.kind.pact().to_string(),
                    parallelism: t.parallelism,
                    predecessors: t
                        .inputs
                        .iter()
                        .map(|input| Predecessor {
                            id: input.id,
                            ship_strategy: input.ship_strategy,
                            side: "second".to_string(),
                        })
                        .collect(),
                }
            })
            .collect();
        Self { nodes }
    }

    /// Serializes the graph as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transformation(id: usize, kind: TransformationKind, inputs: &[usize]) -> Transformation {
        Transformation {
            id,
            name: format!("Op{id}"),
            kind,
            parallelism: 2,
            inputs: inputs
                .iter()
                .map(|&input| TransformationInput {
                    id: input,
                    ship_strategy: ShipStrategy::Forward,
                })
                .collect(),
        }
    }

    #[test]
    fn test_graph_node_shapes() {
        let graph = StreamGraph::from_transformations(&[
            transformation(1, TransformationKind::Source, &[]),
            transformation(2, TransformationKind::Sink, &[1]),
        ]);

        assert_eq!(graph.nodes[0].node_type, "Source: Op1");
        assert_eq!(graph.nodes[0].pact, "Data Source");
        assert_eq!(graph.nodes[0].contents, "[1]:Source: Op1");
        assert!(graph.nodes[0].predecessors.is_empty());

        assert_eq!(graph.nodes[1].node_type, "Sink: Op2");
        assert_eq!(graph.nodes[1].pact, "Data Sink");
        assert_eq!(
            graph.nodes[1].predecessors,
            vec![Predecessor {
                id: 1,
                ship_strategy: ShipStrategy::Forward,
                side: "second".to_string(),
            }]
        );
    }

    #[test]
    fn test_graph_json_layout() {
        let graph = StreamGraph::from_transformations(&[
            transformation(1, TransformationKind::Source, &[]),
            transformation(2, TransformationKind::Operator, &[1]),
        ]);
        let json: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();

        assert_eq!(json["nodes"][0]["type"], "Source: Op1");
        assert!(json["nodes"][0].get("predecessors").is_none());
        assert_eq!(json["nodes"][1]["pact"], "Operator");
        assert_eq!(json["nodes"][1]["parallelism"], 2);
        assert_eq!(json["nodes"][1]["predecessors"][0]["ship_strategy"], "FORWARD");
    }
}
