use std::collections::HashMap;
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::debug;

use super::layout::LayoutConfig;
use super::model::{Graph, NodeId, Point};

const GOLDEN_ANGLE: f64 = PI * 0.763_932_022_500_210_3;
/// Extra clearance added when two nodes are pushed apart, in world units.
const COLLISION_SLACK: f64 = 0.01;
pub const SETTLE_SWEEPS: usize = 200;

/// One force-directed relaxation run over a snapshot of the tree.
///
/// `force_graph` integrates charge repulsion and edge springs; each tick then
/// applies rest-length links, centering, depth bias and collision as position
/// corrections scaled by `alpha`. Pinned nodes are anchors and are never
/// moved by any of these passes.
pub struct Simulation {
	graph: ForceGraph<NodeId, ()>,
	slots: HashMap<NodeId, usize>,
	ids: Vec<NodeId>,
	positions: Vec<Point>,
	targets: Vec<Point>,
	pinned: Vec<Option<Point>>,
	links: Vec<(usize, usize)>,
	center: Point,
	alpha: f64,
	ticks: u32,
	energy: f64,
	running: bool,
}

impl Simulation {
	pub fn new(
		tree: &Graph,
		seeds: &HashMap<NodeId, Point>,
		targets: &HashMap<NodeId, Point>,
		alpha: f64,
		config: &LayoutConfig,
	) -> Self {
		let mut graph = ForceGraph::new(SimulationParameters {
			force_charge: config.force_charge,
			force_spring: config.force_spring,
			force_max: config.force_max,
			node_speed: config.node_speed,
			damping_factor: config.damping_factor,
		});
		let count = tree.len();
		let (mut slots, mut ids, mut positions, mut goal, mut pinned) = (
			HashMap::with_capacity(count),
			Vec::with_capacity(count),
			Vec::with_capacity(count),
			Vec::with_capacity(count),
			Vec::with_capacity(count),
		);
		let mut indices: HashMap<NodeId, DefaultNodeIdx> = HashMap::with_capacity(count);

		for node in tree.nodes() {
			let target = targets.get(&node.id).copied().unwrap_or(node.position);
			let at = node
				.pinned
				.or_else(|| seeds.get(&node.id).copied())
				.unwrap_or(target);
			let idx = graph.add_node(NodeData {
				x: at.x as f32,
				y: at.y as f32,
				mass: config.node_mass,
				is_anchor: node.pinned.is_some(),
				user_data: node.id,
			});
			indices.insert(node.id, idx);
			slots.insert(node.id, ids.len());
			ids.push(node.id);
			positions.push(at);
			goal.push(target);
			pinned.push(node.pinned);
		}

		let mut links = Vec::new();
		for edge in tree.edges() {
			if let (Some(&src), Some(&tgt)) = (indices.get(&edge.source), indices.get(&edge.target)) {
				graph.add_edge(src, tgt, EdgeData::default());
				links.push((slots[&edge.source], slots[&edge.target]));
			}
		}

		let center = centroid(&goal);
		debug!("simulation started: {} nodes, alpha {:.2}", count, alpha);
		Self {
			graph,
			slots,
			ids,
			positions,
			targets: goal,
			pinned,
			links,
			center,
			alpha,
			ticks: 0,
			energy: f64::INFINITY,
			running: true,
		}
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn ticks(&self) -> u32 {
		self.ticks
	}

	pub fn energy(&self) -> f64 {
		self.energy
	}

	#[cfg(test)]
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	/// Current positions; pinned nodes report their pin exactly.
	pub fn positions(&self) -> impl Iterator<Item = (NodeId, Point)> + '_ {
		self.ids
			.iter()
			.zip(&self.positions)
			.zip(&self.pinned)
			.map(|((&id, &at), pin)| (id, pin.unwrap_or(at)))
	}

	/// Advances one tick. Returns whether the run is still going.
	pub fn tick(&mut self, config: &LayoutConfig) -> bool {
		if !self.running {
			return false;
		}
		let before = self.positions.clone();

		self.graph.update((config.tick_dt * self.alpha) as f32);
		let slots = &self.slots;
		let positions = &mut self.positions;
		self.graph.visit_nodes(|node| {
			if let Some(&slot) = slots.get(&node.data.user_data) {
				let (x, y) = (node.x() as f64, node.y() as f64);
				if x.is_finite() && y.is_finite() {
					positions[slot] = Point::new(x, y);
				}
			}
		});

		self.apply_links(config);
		self.apply_centering(config);
		self.apply_bias(config);
		let fixed = self.fixed();
		resolve_collisions(&mut self.positions, &fixed, config.min_separation(), 1);
		self.restore_pins();
		self.write_back();

		self.energy = kinetic_energy(&before, &self.positions, &fixed);
		self.ticks += 1;
		self.alpha *= 1.0 - config.alpha_decay;

		if self.ticks >= config.max_ticks
			|| self.alpha < config.alpha_min
			|| (self.ticks >= config.min_ticks && self.energy < config.energy_threshold)
		{
			self.finish(config);
		}
		self.running
	}

	/// Halts the run, leaving a collision-free configuration where pins allow.
	pub fn finish(&mut self, config: &LayoutConfig) {
		if !self.running {
			return;
		}
		let fixed = self.fixed();
		let clean = resolve_collisions(
			&mut self.positions,
			&fixed,
			config.min_separation(),
			SETTLE_SWEEPS,
		);
		self.restore_pins();
		self.write_back();
		self.running = false;
		debug!(
			"simulation stopped after {} ticks (energy {:.4}, clean {})",
			self.ticks, self.energy, clean
		);
	}

	fn fixed(&self) -> Vec<bool> {
		self.pinned.iter().map(Option::is_some).collect()
	}

	fn apply_links(&mut self, config: &LayoutConfig) {
		let strength = config.link_strength * self.alpha;
		for &(a, b) in &self.links {
			let (pa, pb) = (self.positions[a], self.positions[b]);
			let (dx, dy) = (pb.x - pa.x, pb.y - pa.y);
			let dist = dx.hypot(dy).max(1e-6);
			let k = (dist - config.link_distance) / dist * strength;
			let (wa, wb) = weights(self.pinned[a].is_some(), self.pinned[b].is_some());
			self.positions[a].x += dx * k * wa;
			self.positions[a].y += dy * k * wa;
			self.positions[b].x -= dx * k * wb;
			self.positions[b].y -= dy * k * wb;
		}
	}

	fn apply_centering(&mut self, config: &LayoutConfig) {
		let mean = centroid(&self.positions);
		let s = config.center_strength * self.alpha;
		let (sx, sy) = ((self.center.x - mean.x) * s, (self.center.y - mean.y) * s);
		for (p, pin) in self.positions.iter_mut().zip(&self.pinned) {
			if pin.is_none() {
				p.x += sx;
				p.y += sy;
			}
		}
	}

	fn apply_bias(&mut self, config: &LayoutConfig) {
		let (bx, by) = (
			config.bias_x_strength * self.alpha,
			config.bias_y_strength * self.alpha,
		);
		for ((p, t), pin) in self
			.positions
			.iter_mut()
			.zip(&self.targets)
			.zip(&self.pinned)
		{
			if pin.is_none() {
				p.x += (t.x - p.x) * bx;
				p.y += (t.y - p.y) * by;
			}
		}
	}

	fn restore_pins(&mut self) {
		for (p, pin) in self.positions.iter_mut().zip(&self.pinned) {
			if let Some(at) = pin {
				*p = *at;
			}
		}
	}

	fn write_back(&mut self) {
		let slots = &self.slots;
		let positions = &self.positions;
		self.graph.visit_nodes_mut(|node| {
			if let Some(&slot) = slots.get(&node.data.user_data) {
				node.data.x = positions[slot].x as f32;
				node.data.y = positions[slot].y as f32;
			}
		});
	}
}

fn weights(a_fixed: bool, b_fixed: bool) -> (f64, f64) {
	match (a_fixed, b_fixed) {
		(false, false) => (0.5, 0.5),
		(true, false) => (0.0, 1.0),
		(false, true) => (1.0, 0.0),
		(true, true) => (0.0, 0.0),
	}
}

fn centroid(points: &[Point]) -> Point {
	if points.is_empty() {
		return Point::default();
	}
	let n = points.len() as f64;
	let (sx, sy) = points
		.iter()
		.fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
	Point::new(sx / n, sy / n)
}

/// Mean squared displacement of the free nodes over one tick.
fn kinetic_energy(before: &[Point], after: &[Point], fixed: &[bool]) -> f64 {
	let (sum, count) = before
		.iter()
		.zip(after)
		.zip(fixed)
		.filter(|(_, fixed)| !**fixed)
		.fold((0.0, 0usize), |(sum, count), ((a, b), _)| {
			let (dx, dy) = (b.x - a.x, b.y - a.y);
			(sum + dx * dx + dy * dy, count + 1)
		});
	if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Pushes overlapping pairs apart until every pair with a free member is at
/// least `min` apart, or `sweeps` passes run out. Returns whether it got
/// there.
pub fn resolve_collisions(positions: &mut [Point], fixed: &[bool], min: f64, sweeps: usize) -> bool {
	let n = positions.len();
	for _ in 0..sweeps {
		let mut clean = true;
		for i in 0..n {
			for j in (i + 1)..n {
				if fixed[i] && fixed[j] {
					continue;
				}
				let (dx, dy) = (
					positions[j].x - positions[i].x,
					positions[j].y - positions[i].y,
				);
				let dist = dx.hypot(dy);
				if dist >= min {
					continue;
				}
				clean = false;
				let (ux, uy) = if dist > 1e-9 {
					(dx / dist, dy / dist)
				} else {
					let angle = (i * 31 + j * 17) as f64 * GOLDEN_ANGLE;
					(angle.cos(), angle.sin())
				};
				let push = min - dist + COLLISION_SLACK;
				let (wi, wj) = weights(fixed[i], fixed[j]);
				positions[i].x -= ux * push * wi;
				positions[i].y -= uy * push * wi;
				positions[j].x += ux * push * wj;
				positions[j].y += uy * push * wj;
			}
		}
		if clean {
			return true;
		}
	}
	false
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::graph_demo::tree_layout::tree_positions;

	fn run(tree: &Graph, seeds: &HashMap<NodeId, Point>, config: &LayoutConfig) -> Simulation {
		let targets = tree_positions(tree, config).unwrap();
		let mut sim = Simulation::new(tree, seeds, &targets, config.initial_alpha, config);
		while sim.tick(config) {}
		sim
	}

	fn assert_separated(sim: &Simulation, min: f64) {
		let points: Vec<(NodeId, Point)> = sim.positions().collect();
		for (i, &(a, pa)) in points.iter().enumerate() {
			for &(b, pb) in &points[i + 1..] {
				let d = pa.distance(pb);
				assert!(d >= min - 1e-6, "{} and {} are {} apart", a, b, d);
			}
		}
	}

	#[test]
	fn settles_within_budget_without_overlap() {
		let mut tree = Graph::seed();
		for id in [2, 2, 3, 1, 4] {
			tree.add_child(id).unwrap();
		}
		tree.add_sibling(1).unwrap();
		let config = LayoutConfig::default();
		let sim = run(&tree, &HashMap::new(), &config);
		assert!(!sim.is_running());
		assert!(sim.ticks() <= config.max_ticks);
		assert_separated(&sim, config.min_separation());
	}

	#[test]
	fn coincident_seeds_are_pulled_apart() {
		let mut tree = Graph::seed();
		tree.add_child(1).unwrap();
		let seeds: HashMap<NodeId, Point> =
			tree.nodes().iter().map(|n| (n.id, Point::default())).collect();
		let config = LayoutConfig::default();
		let sim = run(&tree, &seeds, &config);
		assert_separated(&sim, config.min_separation());
	}

	#[test]
	fn pinned_nodes_do_not_move() {
		let mut tree = Graph::seed();
		tree.add_child(2).unwrap();
		let pin = Point::new(333.25, -41.5);
		tree.pin(2, pin);
		let config = LayoutConfig::default();
		let sim = run(&tree, &HashMap::new(), &config);
		let at = sim.positions().find(|(id, _)| *id == 2).map(|(_, p)| p);
		assert_eq!(at, Some(pin));
		assert_separated(&sim, config.min_separation());
	}

	#[test]
	fn finish_is_idempotent() {
		let tree = Graph::seed();
		let config = LayoutConfig::default();
		let targets = tree_positions(&tree, &config).unwrap();
		let mut sim = Simulation::new(&tree, &HashMap::new(), &targets, 0.3, &config);
		sim.finish(&config);
		let first: Vec<_> = sim.positions().collect();
		sim.finish(&config);
		assert!(!sim.tick(&config));
		assert_eq!(first, sim.positions().collect::<Vec<_>>());
	}

	#[test]
	fn collision_pass_leaves_fixed_pairs_alone() {
		let mut points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.5, 0.0)];
		let fixed = [true, true, false];
		assert!(!resolve_collisions(&mut points, &fixed, 10.0, 50));
		assert_eq!(points[0], Point::new(0.0, 0.0));
		assert_eq!(points[1], Point::new(1.0, 0.0));
	}
}
