use std::collections::HashMap;

use log::{debug, warn};

use super::model::{Graph, GraphError, NodeId, Point};
use super::simulation::{SETTLE_SWEEPS, Simulation, resolve_collisions};
use super::tree_layout::tree_positions;

/// Tunables for both layout modes.
#[derive(Clone, Debug)]
pub struct LayoutConfig {
	/// Visual radius of a node body.
	pub node_radius: f64,
	/// Minimum horizontal gap between neighbours on one tree level.
	pub sibling_spacing: f64,
	/// Vertical distance between tree levels.
	pub level_spacing: f64,
	/// Rest length of parent-child links.
	pub link_distance: f64,
	pub link_strength: f64,
	pub center_strength: f64,
	pub bias_x_strength: f64,
	pub bias_y_strength: f64,
	/// Minimum centre distance is `node_radius * collision_factor`.
	pub collision_factor: f64,
	pub max_ticks: u32,
	/// Ticks that always run before the energy threshold can stop a run.
	pub min_ticks: u32,
	pub initial_alpha: f64,
	/// Intensity used when a structural change restarts the simulation.
	pub reheat_alpha: f64,
	pub alpha_decay: f64,
	pub alpha_min: f64,
	/// Mean squared per-tick displacement below which a run is settled.
	pub energy_threshold: f64,
	/// Seconds of simulated time per tick at full intensity.
	pub tick_dt: f64,
	pub node_mass: f32,
	pub force_charge: f32,
	pub force_spring: f32,
	pub force_max: f32,
	pub node_speed: f32,
	pub damping_factor: f32,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			node_radius: 30.0,
			sibling_spacing: 120.0,
			level_spacing: 150.0,
			link_distance: 150.0,
			link_strength: 0.5,
			center_strength: 0.05,
			bias_x_strength: 0.08,
			bias_y_strength: 0.2,
			collision_factor: 2.4,
			max_ticks: 300,
			min_ticks: 15,
			initial_alpha: 1.0,
			reheat_alpha: 0.3,
			alpha_decay: 0.0228,
			alpha_min: 0.001,
			energy_threshold: 0.01,
			tick_dt: 0.016,
			node_mass: 10.0,
			force_charge: 150.0,
			force_spring: 0.01,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
		}
	}
}

impl LayoutConfig {
	pub fn min_separation(&self) -> f64 {
		self.node_radius * self.collision_factor
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutMode {
	/// Pure tree placement, no simulation.
	Hierarchical,
	/// Tree placement refined by the force simulation.
	#[default]
	Force,
}

/// Turns the current tree into positions and keeps them stable between
/// passes.
///
/// The position cache is consulted on every pass rather than overwritten:
/// nodes that already have a place keep it, new nodes are seeded next to a
/// placed relative, and only then does the simulation (briefly) resettle.
pub struct LayoutEngine {
	config: LayoutConfig,
	mode: LayoutMode,
	cache: HashMap<NodeId, Point>,
	revision: Option<u64>,
	simulation: Option<Simulation>,
}

impl LayoutEngine {
	pub fn new(config: LayoutConfig, mode: LayoutMode) -> Self {
		Self {
			config,
			mode,
			cache: HashMap::new(),
			revision: None,
			simulation: None,
		}
	}

	pub fn config(&self) -> &LayoutConfig {
		&self.config
	}

	pub fn is_running(&self) -> bool {
		self.simulation.as_ref().is_some_and(Simulation::is_running)
	}

	pub fn position(&self, id: NodeId) -> Option<Point> {
		self.cache.get(&id).copied()
	}

	/// Records a position set outside the layout (a drag).
	pub fn set_position(&mut self, id: NodeId, at: Point) {
		self.cache.insert(id, at);
	}

	/// Runs a pass only when the structure changed since the last one;
	/// otherwise copies cached positions back into the model. Returns
	/// whether a pass ran.
	pub fn refresh(&mut self, graph: &mut Graph) -> bool {
		if self.revision == Some(graph.revision()) {
			for node in graph.nodes_mut() {
				if let Some(&at) = self.cache.get(&node.id) {
					node.position = node.pinned.unwrap_or(at);
				}
			}
			return false;
		}
		let alpha = if self.revision.is_none() {
			self.config.initial_alpha
		} else {
			self.config.reheat_alpha
		};
		self.relayout(graph, alpha).is_ok()
	}

	/// Full pass at the given simulation intensity. Any running simulation
	/// is stopped first. Without a root the previous positions are kept.
	pub fn relayout(&mut self, graph: &mut Graph, alpha: f64) -> Result<(), GraphError> {
		self.stop(graph);
		let targets = match tree_positions(graph, &self.config) {
			Ok(targets) => targets,
			Err(err) => {
				warn!("layout skipped: {}", err);
				return Err(err);
			}
		};
		let targets = self.align_to_cache(graph, targets);
		self.revision = Some(graph.revision());

		match self.mode {
			LayoutMode::Hierarchical => self.commit(graph, &targets),
			LayoutMode::Force => {
				let seeds = self.seed_positions(graph, &targets);
				self.commit(graph, &seeds);
				self.simulation = Some(Simulation::new(
					graph,
					&seeds,
					&targets,
					alpha,
					&self.config,
				));
			}
		}
		Ok(())
	}

	/// Advances the simulation one tick and writes positions back. Returns
	/// whether it is still running.
	pub fn tick(&mut self, graph: &mut Graph) -> bool {
		let Some(simulation) = self.simulation.as_mut() else {
			return false;
		};
		let running = simulation.tick(&self.config);
		let positions: HashMap<NodeId, Point> = simulation.positions().collect();
		if !running {
			debug!(
				"layout settled after {} ticks (energy {:.4})",
				simulation.ticks(),
				simulation.energy()
			);
			self.simulation = None;
		}
		self.commit(graph, &positions);
		running
	}

	/// Ticks until the run halts; bounded by `max_ticks`.
	#[cfg(test)]
	pub fn settle(&mut self, graph: &mut Graph) {
		while self.tick(graph) {}
	}

	/// Stops the running simulation, if any, and keeps the collision-free
	/// positions its final sweep produced. Safe to call repeatedly.
	pub fn stop(&mut self, graph: &mut Graph) {
		if let Some(mut simulation) = self.simulation.take() {
			simulation.finish(&self.config);
			debug!("simulation cancelled after {} ticks", simulation.ticks());
			let positions: HashMap<NodeId, Point> = simulation.positions().collect();
			self.commit(graph, &positions);
		}
	}

	/// Pushes free nodes off any node they overlap, pinned nodes holding
	/// still. Used after a drag drops a pin onto its neighbours. No-op in
	/// hierarchical mode or while a run is in progress.
	pub fn separate(&mut self, graph: &mut Graph) {
		if self.mode != LayoutMode::Force || self.is_running() {
			return;
		}
		let ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
		let mut positions: Vec<Point> = graph.nodes().iter().map(|n| n.position).collect();
		let fixed: Vec<bool> = graph.nodes().iter().map(|n| n.pinned.is_some()).collect();
		if !resolve_collisions(
			&mut positions,
			&fixed,
			self.config.min_separation(),
			SETTLE_SWEEPS,
		) {
			warn!("overlaps left after separating {} nodes", ids.len());
		}
		let positions: HashMap<NodeId, Point> = ids.into_iter().zip(positions).collect();
		self.commit(graph, &positions);
	}

	fn commit(&mut self, graph: &mut Graph, positions: &HashMap<NodeId, Point>) {
		for node in graph.nodes_mut() {
			let at = match (node.pinned, positions.get(&node.id)) {
				(Some(pin), _) => pin,
				(None, Some(&at)) => at,
				(None, None) => continue,
			};
			node.position = at;
			self.cache.insert(node.id, at);
		}
	}

	/// Shifts tree targets into the frame of the already-placed nodes, so a
	/// new root does not drag the whole tree down.
	fn align_to_cache(
		&self,
		graph: &Graph,
		mut targets: HashMap<NodeId, Point>,
	) -> HashMap<NodeId, Point> {
		let (mut dx, mut dy, mut count) = (0.0, 0.0, 0usize);
		for node in graph.nodes().iter().filter(|n| n.pinned.is_none()) {
			if let (Some(cached), Some(target)) = (self.cache.get(&node.id), targets.get(&node.id)) {
				dx += cached.x - target.x;
				dy += cached.y - target.y;
				count += 1;
			}
		}
		if count > 0 {
			let (dx, dy) = (dx / count as f64, dy / count as f64);
			for target in targets.values_mut() {
				target.x += dx;
				target.y += dy;
			}
		}
		targets
	}

	/// Starting points: pins, then cached positions, then an offset from the
	/// nearest placed relative, then the raw target.
	fn seed_positions(
		&self,
		graph: &Graph,
		targets: &HashMap<NodeId, Point>,
	) -> HashMap<NodeId, Point> {
		let mut seeds: HashMap<NodeId, Point> = graph
			.nodes()
			.iter()
			.filter_map(|n| n.pinned.or_else(|| self.cache.get(&n.id).copied()).map(|p| (n.id, p)))
			.collect();

		loop {
			let mut placed = false;
			for node in graph.nodes() {
				if seeds.contains_key(&node.id) {
					continue;
				}
				let Some(&target) = targets.get(&node.id) else {
					continue;
				};
				let relative = node
					.parent
					.into_iter()
					.chain(graph.children(node.id).map(|c| c.id))
					.find_map(|r| Some((*seeds.get(&r)?, *targets.get(&r)?)));
				if let Some((anchor, anchor_target)) = relative {
					let jitter = f64::from(node.id % 5) - 2.0;
					seeds.insert(
						node.id,
						Point::new(
							anchor.x + target.x - anchor_target.x + jitter,
							anchor.y + target.y - anchor_target.y,
						),
					);
					placed = true;
				}
			}
			if !placed {
				break;
			}
		}

		for (&id, &target) in targets {
			seeds.entry(id).or_insert(target);
		}
		seeds
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn engine(mode: LayoutMode) -> LayoutEngine {
		LayoutEngine::new(LayoutConfig::default(), mode)
	}

	#[test]
	fn first_refresh_places_every_node() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		assert!(layout.refresh(&mut graph));
		assert!(layout.is_running());
		for node in graph.nodes() {
			assert!(layout.position(node.id).is_some());
		}
		layout.settle(&mut graph);
		assert!(!layout.is_running());
	}

	#[test]
	fn refresh_without_mutation_keeps_positions() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		let before: Vec<Point> = graph.nodes().iter().map(|n| n.position).collect();
		assert!(!layout.refresh(&mut graph));
		assert!(!layout.is_running());
		let after: Vec<Point> = graph.nodes().iter().map(|n| n.position).collect();
		assert_eq!(before, after);
	}

	#[test]
	fn new_child_is_seeded_below_its_parent() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		let parent = layout.position(2).unwrap();
		let child = graph.add_child(2).unwrap();
		assert!(layout.refresh(&mut graph));
		let seeded = layout.position(child).unwrap();
		assert!(seeded.y > parent.y);
		layout.settle(&mut graph);
	}

	#[test]
	fn new_root_does_not_shift_the_tree_frame() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Hierarchical);
		layout.refresh(&mut graph);
		let old_root = layout.position(1).unwrap();
		let new_root = graph.add_parent(1).unwrap();
		layout.refresh(&mut graph);
		assert_eq!(layout.position(1), Some(old_root));
		assert!(layout.position(new_root).unwrap().y < old_root.y);
	}

	#[test]
	fn hierarchical_mode_never_simulates() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Hierarchical);
		assert!(layout.refresh(&mut graph));
		assert!(!layout.is_running());
		assert!(!layout.tick(&mut graph));
	}

	#[test]
	fn settled_layout_keeps_minimum_separation() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		for step in 0..12u32 {
			let ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
			let target = ids[(step as usize * 5) % ids.len()];
			let _ = match step % 3 {
				0 => graph.add_child(target),
				1 => graph.add_sibling(target),
				_ => graph.add_parent(target),
			};
			layout.refresh(&mut graph);
			layout.settle(&mut graph);
		}
		let min = layout.config().min_separation();
		let nodes = graph.nodes();
		for (i, a) in nodes.iter().enumerate() {
			for b in &nodes[i + 1..] {
				let d = a.position.distance(b.position);
				assert!(d >= min - 1e-6, "{} and {} are {} apart", a.id, b.id, d);
			}
		}
	}

	#[test]
	fn pinned_node_survives_relayout() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		let pin = Point::new(-210.5, 64.25);
		graph.pin(3, pin);
		layout.set_position(3, pin);
		layout.relayout(&mut graph, layout.config().reheat_alpha).unwrap();
		layout.settle(&mut graph);
		assert_eq!(graph.node(3).unwrap().position, pin);
		assert_eq!(layout.position(3), Some(pin));
	}

	#[test]
	fn stop_is_idempotent() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.stop(&mut graph);
		layout.stop(&mut graph);
		assert!(!layout.is_running());
		assert!(!layout.tick(&mut graph));
	}

	fn assert_separated(graph: &Graph, min: f64) {
		let nodes = graph.nodes();
		for (i, a) in nodes.iter().enumerate() {
			for b in &nodes[i + 1..] {
				let d = a.position.distance(b.position);
				assert!(d >= min - 1e-6, "{} and {} are {} apart", a.id, b.id, d);
			}
		}
	}

	#[test]
	fn stopping_mid_run_commits_the_cleaned_positions() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		for _ in 0..6 {
			graph.add_child(2).unwrap();
			layout.refresh(&mut graph);
		}
		layout.tick(&mut graph);
		layout.stop(&mut graph);
		assert_separated(&graph, layout.config().min_separation());
		for node in graph.nodes() {
			assert_eq!(layout.position(node.id), Some(node.position));
		}
	}

	#[test]
	fn separate_pushes_free_nodes_off_a_pin() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		let onto = graph.node(2).unwrap().position;
		let pin = Point::new(onto.x + 5.0, onto.y);
		graph.pin(3, pin);
		layout.set_position(3, pin);
		layout.separate(&mut graph);
		assert_eq!(graph.node(3).unwrap().position, pin);
		assert_separated(&graph, layout.config().min_separation());
	}

	#[test]
	fn first_run_starts_at_full_intensity() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		let alpha = layout.simulation.as_ref().map(Simulation::alpha);
		assert_eq!(alpha, Some(layout.config().initial_alpha));
	}

	#[test]
	fn mutation_restarts_at_reduced_intensity() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		graph.add_child(2).unwrap();
		assert!(layout.refresh(&mut graph));
		let alpha = layout.simulation.as_ref().map(Simulation::alpha);
		assert_eq!(alpha, Some(layout.config().reheat_alpha));
		assert!(layout.config().reheat_alpha < layout.config().initial_alpha);
	}

	#[test]
	fn settled_nodes_barely_move_when_a_child_is_added() {
		let mut graph = Graph::seed();
		let mut layout = engine(LayoutMode::Force);
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		let before: Vec<(NodeId, Point)> = graph.nodes().iter().map(|n| (n.id, n.position)).collect();
		graph.add_child(2).unwrap();
		layout.refresh(&mut graph);
		layout.settle(&mut graph);
		let bound = layout.config().node_radius;
		for (id, was) in before {
			let moved = graph.node(id).unwrap().position.distance(was);
			assert!(moved <= bound, "node {} moved {}", id, moved);
		}
	}
}
