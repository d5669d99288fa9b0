use log::{debug, warn};

use super::layout::{LayoutConfig, LayoutEngine, LayoutMode};
use super::model::{Graph, Node, NodeId, Point};

pub const MIN_ZOOM: f64 = 0.2;
pub const MAX_ZOOM: f64 = 3.0;
pub const INITIAL_ZOOM: f64 = 0.8;
pub const AFFORDANCE_RADIUS: f64 = 10.0;
/// Screen pixels a press must travel before it becomes a drag or pan.
pub const DRAG_THRESHOLD: f64 = 3.0;
/// Clicks arriving this soon after a drag or pan ends are swallowed.
pub const CLICK_COOLDOWN_MS: f64 = 250.0;

/// The "+" controls drawn around a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Affordance {
	AddParent,
	AddSibling,
	AddChild,
}

impl Affordance {
	pub const ALL: [Affordance; 3] = [
		Affordance::AddParent,
		Affordance::AddSibling,
		Affordance::AddChild,
	];

	/// Offset from the node centre, in world units.
	pub fn offset(self, node_radius: f64) -> (f64, f64) {
		match self {
			Affordance::AddParent => (0.0, -node_radius * 2.0),
			Affordance::AddSibling => (node_radius * 2.0, 0.0),
			Affordance::AddChild => (0.0, node_radius * 2.0),
		}
	}

	/// Only the root offers "add parent".
	pub fn is_offered(self, node: &Node) -> bool {
		self != Affordance::AddParent || node.is_root()
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DragState {
	pub node: NodeId,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start: Point,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub moved: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Mode {
	#[default]
	Idle,
	Dragging(DragState),
	Simulating,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeDetails {
	pub name: String,
	pub info: String,
}

/// Interaction controller: owns the tree, its layout and everything the
/// pointer can change.
pub struct GraphDemoState {
	pub graph: Graph,
	pub layout: LayoutEngine,
	pub transform: ViewTransform,
	pub mode: Mode,
	pub selected: Option<NodeId>,
	pub pan: PanState,
	pub lock_drag_to_x: bool,
	pub width: f64,
	pub height: f64,
	/// Seconds since mount; drives the selection highlight.
	pub clock: f64,
	press: Option<DragState>,
	pinch_distance: Option<f64>,
	suppress_click_until: f64,
}

impl GraphDemoState {
	pub fn new(
		width: f64,
		height: f64,
		config: LayoutConfig,
		mode: LayoutMode,
		lock_drag_to_x: bool,
	) -> Self {
		let mut graph = Graph::seed();
		let mut layout = LayoutEngine::new(config, mode);
		layout.refresh(&mut graph);
		let transform = fit_transform(&graph, width, height);
		let mode = if layout.is_running() {
			Mode::Simulating
		} else {
			Mode::Idle
		};
		Self {
			graph,
			layout,
			transform,
			mode,
			selected: None,
			pan: PanState::default(),
			lock_drag_to_x,
			width,
			height,
			clock: 0.0,
			press: None,
			pinch_distance: None,
			suppress_click_until: f64::NEG_INFINITY,
		}
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_radius(&self) -> f64 {
		self.layout.config().node_radius
	}

	/// Topmost node whose body contains the screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<NodeId> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let radius = self.node_radius();
		self.graph
			.nodes()
			.iter()
			.rev()
			.find(|n| n.position.distance(Point::new(gx, gy)) < radius)
			.map(|n| n.id)
	}

	pub fn affordance_at(&self, sx: f64, sy: f64) -> Option<(NodeId, Affordance)> {
		let at = {
			let (gx, gy) = self.screen_to_graph(sx, sy);
			Point::new(gx, gy)
		};
		let radius = self.node_radius();
		self.graph.nodes().iter().rev().find_map(|node| {
			Affordance::ALL
				.into_iter()
				.filter(|a| a.is_offered(node))
				.find(|a| {
					let (dx, dy) = a.offset(radius);
					let centre = Point::new(node.position.x + dx, node.position.y + dy);
					centre.distance(at) < AFFORDANCE_RADIUS
				})
				.map(|a| (node.id, a))
		})
	}

	pub fn pointer_down(&mut self, sx: f64, sy: f64) {
		if self.affordance_at(sx, sy).is_some() {
			return;
		}
		if let Some(id) = self.node_at_position(sx, sy) {
			let node_start = self
				.graph
				.node(id)
				.map(|n| n.position)
				.unwrap_or_default();
			self.press = Some(DragState {
				node: id,
				start_x: sx,
				start_y: sy,
				node_start,
			});
		} else {
			self.pan = PanState {
				active: true,
				moved: false,
				start_x: sx,
				start_y: sy,
				transform_start_x: self.transform.x,
				transform_start_y: self.transform.y,
			};
		}
	}

	pub fn pointer_move(&mut self, sx: f64, sy: f64) {
		if let Some(press) = self.press.take() {
			if (sx - press.start_x).hypot(sy - press.start_y) > DRAG_THRESHOLD {
				self.layout.stop(&mut self.graph);
				debug!("dragging node {}", press.node);
				self.mode = Mode::Dragging(press);
			} else {
				self.press = Some(press);
			}
		}

		let dragged = match &self.mode {
			Mode::Dragging(drag) => {
				let k = self.transform.k;
				let x = drag.node_start.x + (sx - drag.start_x) / k;
				let y = if self.lock_drag_to_x {
					drag.node_start.y
				} else {
					drag.node_start.y + (sy - drag.start_y) / k
				};
				Some((drag.node, Point::new(x, y)))
			}
			_ => None,
		};

		if let Some((id, at)) = dragged {
			self.graph.pin(id, at);
			self.layout.set_position(id, at);
		} else if self.pan.active {
			let (dx, dy) = (sx - self.pan.start_x, sy - self.pan.start_y);
			if dx.hypot(dy) > DRAG_THRESHOLD {
				self.pan.moved = true;
			}
			self.transform.x = self.pan.transform_start_x + dx;
			self.transform.y = self.pan.transform_start_y + dy;
		}
	}

	/// Ends a press, drag or pan. `now_ms` is the event timestamp.
	pub fn pointer_up(&mut self, now_ms: f64) {
		self.press = None;
		self.mode = match std::mem::take(&mut self.mode) {
			Mode::Dragging(drag) => {
				if let Some(node) = self.graph.node(drag.node) {
					debug!("pinned node {} at {:?}", node.id, node.position);
				}
				self.layout.separate(&mut self.graph);
				self.suppress_click_until = now_ms + CLICK_COOLDOWN_MS;
				Mode::Idle
			}
			other => other,
		};
		if self.pan.active && self.pan.moved {
			self.suppress_click_until = now_ms + CLICK_COOLDOWN_MS;
		}
		self.pan = PanState::default();
	}

	/// Routes a click: affordance, then node body, then background.
	pub fn click(&mut self, sx: f64, sy: f64, now_ms: f64) {
		if now_ms < self.suppress_click_until {
			debug!("click swallowed after drag");
			return;
		}
		if let Some((id, affordance)) = self.affordance_at(sx, sy) {
			self.expand(id, affordance);
			return;
		}
		match self.node_at_position(sx, sy) {
			Some(id) => self.toggle_selection(id),
			None => self.clear_selection(),
		}
	}

	pub fn toggle_selection(&mut self, id: NodeId) {
		if self.graph.node(id).is_none() {
			return;
		}
		self.selected = if self.selected == Some(id) {
			None
		} else {
			Some(id)
		};
	}

	pub fn clear_selection(&mut self) {
		self.selected = None;
	}

	pub fn selected_details(&self) -> Option<NodeDetails> {
		let node = self.graph.node(self.selected?)?;
		Some(NodeDetails {
			name: node.name.clone(),
			info: node.info.clone(),
		})
	}

	/// Applies an expansion and restarts the layout. Rejected mutations
	/// change nothing.
	pub fn expand(&mut self, id: NodeId, affordance: Affordance) -> Option<NodeId> {
		if matches!(self.mode, Mode::Dragging(_)) {
			return None;
		}
		let result = match affordance {
			Affordance::AddParent => self.graph.add_parent(id),
			Affordance::AddSibling => self.graph.add_sibling(id),
			Affordance::AddChild => self.graph.add_child(id),
		};
		match result {
			Ok(new_id) => {
				self.layout.refresh(&mut self.graph);
				self.mode = if self.layout.is_running() {
					Mode::Simulating
				} else {
					Mode::Idle
				};
				Some(new_id)
			}
			Err(err) => {
				warn!("{:?} on node {} ignored: {}", affordance, id, err);
				None
			}
		}
	}

	/// Zooms by `factor` keeping the screen point fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
		let new_k = (self.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		self.zoom_at(sx, sy, factor);
	}

	/// A second finger landed: the current spread becomes the reference for
	/// the next `pinch`, whatever an earlier gesture left behind.
	pub fn pinch_start(&mut self, sx: f64, sy: f64, distance: f64) {
		self.pinch_distance = None;
		self.pinch(sx, sy, distance);
	}

	/// Two-finger gesture centred at (`sx`, `sy`) with the given finger spread.
	pub fn pinch(&mut self, sx: f64, sy: f64, distance: f64) {
		self.press = None;
		self.pan = PanState::default();
		if let Some(previous) = self.pinch_distance.filter(|d| *d > 0.0) {
			self.zoom_at(sx, sy, distance / previous);
		}
		self.pinch_distance = Some(distance);
	}

	pub fn pinch_end(&mut self) {
		self.pinch_distance = None;
	}

	/// One animation frame.
	pub fn tick(&mut self, dt: f64) {
		self.clock += dt;
		if self.mode == Mode::Simulating && !self.layout.tick(&mut self.graph) {
			self.mode = Mode::Idle;
		}
	}

	/// Teardown: halts any running simulation.
	pub fn stop(&mut self) {
		self.layout.stop(&mut self.graph);
		if self.mode == Mode::Simulating {
			self.mode = Mode::Idle;
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

/// Centres the tree horizontally, a third of the way down, at the initial
/// zoom.
fn fit_transform(graph: &Graph, width: f64, height: f64) -> ViewTransform {
	let k = INITIAL_ZOOM;
	let mut nodes = graph.nodes().iter().map(|n| n.position);
	let Some(first) = nodes.next() else {
		return ViewTransform {
			x: width / 2.0,
			y: height / 2.0,
			k,
		};
	};
	let (min_x, max_x, min_y, max_y) = nodes.fold(
		(first.x, first.x, first.y, first.y),
		|(min_x, max_x, min_y, max_y), p| {
			(min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
		},
	);
	ViewTransform {
		x: width / 2.0 - k * (min_x + max_x) / 2.0,
		y: (height - k * (max_y - min_y)) / 3.0 - k * min_y,
		k,
	}
}
