//! Deterministic top-down tree placement.
//!
//! Subtrees are built bottom-up as per-depth contours (leftmost and
//! rightmost x relative to the subtree root). Each child subtree is pushed
//! right until it clears every level of its left neighbours by the sibling
//! spacing, then the parent is centred over its first and last child.

use std::collections::HashMap;

use super::layout::LayoutConfig;
use super::model::{Graph, GraphError, NodeId, Point};

/// (leftmost, rightmost) x per relative depth.
type Contour = Vec<(f64, f64)>;

/// Places the root at the origin with depth growing along +y.
pub fn tree_positions(
	graph: &Graph,
	config: &LayoutConfig,
) -> Result<HashMap<NodeId, Point>, GraphError> {
	let root = graph.root().ok_or(GraphError::MissingRoot)?.id;

	let children: HashMap<NodeId, Vec<NodeId>> = graph
		.nodes()
		.iter()
		.map(|n| (n.id, graph.children(n.id).map(|c| c.id).collect()))
		.collect();

	let mut offsets = HashMap::with_capacity(graph.len());
	subtree_contour(root, &children, config.sibling_spacing, &mut offsets);

	let depths = graph.depths();
	let mut positions = HashMap::with_capacity(graph.len());
	let mut stack = vec![(root, 0.0)];
	while let Some((id, x)) = stack.pop() {
		let depth = depths.get(&id).copied().unwrap_or(0);
		positions.insert(id, Point::new(x, depth as f64 * config.level_spacing));
		for &child in children.get(&id).into_iter().flatten() {
			let dx = offsets.get(&child).copied().unwrap_or(0.0);
			stack.push((child, x + dx));
		}
	}
	Ok(positions)
}

/// Lays out `id`'s subtree, recording each child's x offset from its parent.
fn subtree_contour(
	id: NodeId,
	children: &HashMap<NodeId, Vec<NodeId>>,
	spacing: f64,
	offsets: &mut HashMap<NodeId, f64>,
) -> Contour {
	let kids = children.get(&id).map(Vec::as_slice).unwrap_or_default();
	if kids.is_empty() {
		return vec![(0.0, 0.0)];
	}

	let mut merged: Contour = Vec::new();
	let mut shifts = Vec::with_capacity(kids.len());
	for &kid in kids {
		let contour = subtree_contour(kid, children, spacing, offsets);
		let shift = if merged.is_empty() {
			0.0
		} else {
			merged
				.iter()
				.zip(&contour)
				.map(|(&(_, right), &(left, _))| right - left + spacing)
				.fold(f64::NEG_INFINITY, f64::max)
		};
		for (depth, &(left, right)) in contour.iter().enumerate() {
			let (left, right) = (left + shift, right + shift);
			match merged.get_mut(depth) {
				Some(level) => {
					level.0 = level.0.min(left);
					level.1 = level.1.max(right);
				}
				None => merged.push((left, right)),
			}
		}
		shifts.push(shift);
	}

	let mid = (shifts[0] + shifts[shifts.len() - 1]) / 2.0;
	for (&kid, shift) in kids.iter().zip(&shifts) {
		offsets.insert(kid, shift - mid);
	}

	let mut contour = Vec::with_capacity(merged.len() + 1);
	contour.push((0.0, 0.0));
	contour.extend(merged.into_iter().map(|(l, r)| (l - mid, r - mid)));
	contour
}
