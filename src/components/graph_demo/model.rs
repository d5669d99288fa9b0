//! In-memory concept tree: nodes, derived parent/child edges and the three
//! expansion mutations.

use std::collections::HashMap;
use std::fmt;

use log::debug;

pub type NodeId = u32;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance(self, other: Point) -> f64 {
		(self.x - other.x).hypot(self.y - other.y)
	}
}

#[derive(Clone, Debug)]
pub struct Node {
	pub id: NodeId,
	pub name: String,
	pub info: String,
	/// `None` only for the current root.
	pub parent: Option<NodeId>,
	pub position: Point,
	/// Set once the user has dragged the node; the simulation never moves it.
	pub pinned: Option<Point>,
}

impl Node {
	fn new(id: NodeId, name: String, info: String, parent: Option<NodeId>) -> Self {
		Self {
			id,
			name,
			info,
			parent,
			position: Point::default(),
			pinned: None,
		}
	}

	pub fn is_root(&self) -> bool {
		self.parent.is_none()
	}
}

/// Parent → child link. Never stored, always derived from `Node::parent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
	pub source: NodeId,
	pub target: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
	/// The referenced id is not in the graph.
	UnknownNode(NodeId),
	/// Only the root may gain a parent.
	NotRoot(NodeId),
	/// No node has a null parent.
	MissingRoot,
}

impl fmt::Display for GraphError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GraphError::UnknownNode(id) => write!(f, "Unknown node: {}", id),
			GraphError::NotRoot(id) => write!(f, "Node {} already has a parent", id),
			GraphError::MissingRoot => write!(f, "Graph has no root node"),
		}
	}
}

impl std::error::Error for GraphError {}

/// The concept tree.
///
/// Exactly one node has no parent, every other parent id resolves, and ids
/// grow monotonically (`max + 1`). Nodes are only ever added, so cycles
/// cannot form.
#[derive(Clone, Debug)]
pub struct Graph {
	nodes: Vec<Node>,
	index: HashMap<NodeId, usize>,
	revision: u64,
}

impl Default for Graph {
	fn default() -> Self {
		Self::seed()
	}
}

impl Graph {
	/// One root with two children.
	pub fn seed() -> Self {
		let mut graph = Self {
			nodes: Vec::new(),
			index: HashMap::new(),
			revision: 0,
		};
		graph.push(Node::new(
			1,
			"Root Concept".into(),
			"This is the root concept".into(),
			None,
		));
		graph.push(Node::new(
			2,
			"Child Concept A".into(),
			"This is a child of the root concept".into(),
			Some(1),
		));
		graph.push(Node::new(
			3,
			"Child Concept B".into(),
			"This is another child of the root concept".into(),
			Some(1),
		));
		graph
	}

	fn push(&mut self, node: Node) {
		self.index.insert(node.id, self.nodes.len());
		self.nodes.push(node);
		self.revision += 1;
	}

	fn next_id(&self) -> NodeId {
		self.nodes.iter().map(|n| n.id).max().unwrap_or(0) + 1
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Bumped by every successful mutation; lets the layout tell whether the
	/// structure changed since its last pass.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	/// Per-node mutable access for position write-back. Ids and parents must
	/// not be changed through it.
	pub(super) fn nodes_mut(&mut self) -> std::slice::IterMut<'_, Node> {
		self.nodes.iter_mut()
	}

	pub fn node(&self, id: NodeId) -> Option<&Node> {
		self.index.get(&id).map(|&i| &self.nodes[i])
	}

	pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
		self.index.get(&id).map(|&i| &mut self.nodes[i])
	}

	pub fn root(&self) -> Option<&Node> {
		self.nodes.iter().find(|n| n.is_root())
	}

	pub fn edges(&self) -> Vec<Edge> {
		self.nodes
			.iter()
			.filter_map(|n| {
				n.parent.map(|p| Edge {
					source: p,
					target: n.id,
				})
			})
			.collect()
	}

	/// Children of `id` in insertion order.
	pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> + '_ {
		self.nodes.iter().filter(move |n| n.parent == Some(id))
	}

	/// Depth of every node reachable from the root (root = 0).
	pub fn depths(&self) -> HashMap<NodeId, usize> {
		let mut depths = HashMap::with_capacity(self.nodes.len());
		let Some(root) = self.root() else {
			return depths;
		};
		let mut stack = vec![(root.id, 0)];
		while let Some((id, depth)) = stack.pop() {
			depths.insert(id, depth);
			stack.extend(self.children(id).map(|c| (c.id, depth + 1)));
		}
		depths
	}

	pub fn add_child(&mut self, parent_id: NodeId) -> Result<NodeId, GraphError> {
		let parent_name = self
			.node(parent_id)
			.ok_or(GraphError::UnknownNode(parent_id))?
			.name
			.clone();
		let id = self.next_id();
		self.push(Node::new(
			id,
			concept_name(id),
			format!("This is a child of {}", parent_name),
			Some(parent_id),
		));
		debug!("added child {} under {}", id, parent_id);
		Ok(id)
	}

	/// Gives the current root a new parent, which becomes the new root.
	pub fn add_parent(&mut self, child_id: NodeId) -> Result<NodeId, GraphError> {
		let child = self.node(child_id).ok_or(GraphError::UnknownNode(child_id))?;
		if !child.is_root() {
			return Err(GraphError::NotRoot(child_id));
		}
		let child_name = child.name.clone();
		let id = self.next_id();
		self.push(Node::new(
			id,
			concept_name(id),
			format!("This is the parent of {}", child_name),
			None,
		));
		if let Some(child) = self.node_mut(child_id) {
			child.parent = Some(id);
		}
		debug!("added parent {} above {}; {} is the new root", id, child_id, id);
		Ok(id)
	}

	/// Adds a node sharing `node_id`'s parent. A root first gets a parent
	/// manufactured for it, so the graph keeps a single root.
	pub fn add_sibling(&mut self, node_id: NodeId) -> Result<NodeId, GraphError> {
		let node = self.node(node_id).ok_or(GraphError::UnknownNode(node_id))?;
		let (name, parent) = (node.name.clone(), node.parent);
		let parent_id = match parent {
			Some(parent_id) => parent_id,
			None => self.add_parent(node_id)?,
		};
		let id = self.next_id();
		self.push(Node::new(
			id,
			concept_name(id),
			format!("This is a sibling of {}", name),
			Some(parent_id),
		));
		debug!("added sibling {} next to {} under {}", id, node_id, parent_id);
		Ok(id)
	}

	/// Fixes `id` at `at`, updating both its position and pin.
	pub fn pin(&mut self, id: NodeId, at: Point) -> bool {
		match self.node_mut(id) {
			Some(node) => {
				node.position = at;
				node.pinned = Some(at);
				true
			}
			None => false,
		}
	}
}

/// `Concept A` … `Concept Z`, `Concept AA` …
pub fn concept_name(id: NodeId) -> String {
	let mut letters = Vec::new();
	let mut n = id;
	while n > 0 {
		let rem = (n - 1) % 26;
		letters.push((b'A' + rem as u8) as char);
		n = (n - 1) / 26;
	}
	letters.reverse();
	format!("Concept {}", letters.into_iter().collect::<String>())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn root_count(graph: &Graph) -> usize {
		graph.nodes().iter().filter(|n| n.is_root()).count()
	}

	fn parent_of(graph: &Graph, id: NodeId) -> Option<NodeId> {
		graph.node(id).and_then(|n| n.parent)
	}

	#[test]
	fn seed_has_one_root_and_two_children() {
		let graph = Graph::seed();
		assert_eq!(graph.len(), 3);
		assert_eq!(graph.root().map(|n| n.id), Some(1));
		assert_eq!(
			graph.edges(),
			vec![
				Edge { source: 1, target: 2 },
				Edge { source: 1, target: 3 },
			]
		);
	}

	#[test]
	fn add_child_adds_one_node_and_one_edge() {
		let mut graph = Graph::seed();
		let (nodes, edges) = (graph.len(), graph.edges().len());
		let id = graph.add_child(2).unwrap();
		assert_eq!(graph.len(), nodes + 1);
		assert_eq!(graph.edges().len(), edges + 1);
		assert_eq!(parent_of(&graph, id), Some(2));
		assert_eq!(graph.node(id).unwrap().info, "This is a child of Child Concept A");
	}

	#[test]
	fn add_parent_on_non_root_changes_nothing() {
		let mut graph = Graph::seed();
		let revision = graph.revision();
		assert_eq!(graph.add_parent(2), Err(GraphError::NotRoot(2)));
		assert_eq!(graph.len(), 3);
		assert_eq!(graph.edges().len(), 2);
		assert_eq!(graph.revision(), revision);
		assert_eq!(parent_of(&graph, 2), Some(1));
	}

	#[test]
	fn unknown_targets_are_rejected_without_change() {
		let mut graph = Graph::seed();
		assert_eq!(graph.add_child(42), Err(GraphError::UnknownNode(42)));
		assert_eq!(graph.add_parent(42), Err(GraphError::UnknownNode(42)));
		assert_eq!(graph.add_sibling(42), Err(GraphError::UnknownNode(42)));
		assert_eq!(graph.len(), 3);
	}

	#[test]
	fn add_sibling_on_root_manufactures_a_parent() {
		let mut graph = Graph::seed();
		let sibling = graph.add_sibling(1).unwrap();
		assert_eq!(graph.len(), 5);
		assert_eq!(root_count(&graph), 1);
		let new_root = graph.root().unwrap().id;
		assert_eq!(new_root, 4);
		assert_eq!(parent_of(&graph, 1), Some(new_root));
		assert_eq!(parent_of(&graph, sibling), Some(new_root));
	}

	#[test]
	fn add_sibling_on_child_adds_one_node() {
		let mut graph = Graph::seed();
		let id = graph.add_sibling(3).unwrap();
		assert_eq!(graph.len(), 4);
		assert_eq!(parent_of(&graph, id), Some(1));
	}

	#[test]
	fn scenario_from_seed() {
		let mut graph = Graph::seed();

		assert_eq!(graph.add_child(2), Ok(4));
		assert_eq!(parent_of(&graph, 4), Some(2));
		assert_eq!(graph.len(), 4);

		assert_eq!(graph.add_parent(1), Ok(5));
		assert_eq!(graph.root().unwrap().id, 5);
		assert_eq!(parent_of(&graph, 1), Some(5));
		assert_eq!(graph.len(), 5);

		assert_eq!(graph.add_sibling(3), Ok(6));
		assert_eq!(parent_of(&graph, 6), Some(1));
		assert_eq!(graph.len(), 6);
		assert_eq!(graph.root().unwrap().id, 5);
	}

	#[test]
	fn invariants_hold_across_mixed_mutations() {
		let mut graph = Graph::seed();
		let mut last_id = 3;
		for step in 0..60u32 {
			let ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
			let target = ids[(step as usize * 7) % ids.len()];
			let result = match step % 3 {
				0 => graph.add_child(target),
				1 => graph.add_parent(target),
				_ => graph.add_sibling(target),
			};
			assert_eq!(root_count(&graph), 1, "step {}", step);
			for node in graph.nodes() {
				if let Some(p) = node.parent {
					assert!(graph.node(p).is_some());
				}
			}
			if let Ok(id) = result {
				assert!(id > last_id);
				last_id = graph.nodes().iter().map(|n| n.id).max().unwrap();
			}
			assert_eq!(graph.depths().len(), graph.len());
		}
		let mut ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
		let before = ids.clone();
		ids.dedup();
		assert_eq!(ids, before);
		assert!(before.windows(2).all(|w| w[0] < w[1]));
	}

	#[test]
	fn names_are_lettered_from_the_id() {
		assert_eq!(concept_name(4), "Concept D");
		assert_eq!(concept_name(26), "Concept Z");
		assert_eq!(concept_name(27), "Concept AA");
		assert_eq!(concept_name(53), "Concept BA");
	}

	#[test]
	fn pin_sets_position_and_pin() {
		let mut graph = Graph::seed();
		assert!(graph.pin(2, Point::new(10.0, 20.0)));
		let node = graph.node(2).unwrap();
		assert_eq!(node.position, Point::new(10.0, 20.0));
		assert_eq!(node.pinned, Some(Point::new(10.0, 20.0)));
		assert!(!graph.pin(99, Point::default()));
	}
}
