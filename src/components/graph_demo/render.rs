use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::state::{AFFORDANCE_RADIUS, Affordance, GraphDemoState};

const BACKGROUND: &str = "#f7f9fb";
const EDGE_COLOR: &str = "#999";
const NODE_COLOR: &str = "#69b3a2";
const ROOT_COLOR: &str = "#ff9966";
const PIN_COLOR: &str = "#33415c";

pub fn render(state: &GraphDemoState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	// Nothing sensible to lay out without a root.
	if state.graph.root().is_none() {
		return;
	}
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
	draw_affordances(state, ctx);
	ctx.restore();
}

/// Vertical S-curves from parent to child.
fn draw_edges(state: &GraphDemoState, ctx: &CanvasRenderingContext2d) {
	ctx.set_stroke_style_str(EDGE_COLOR);
	ctx.set_line_width(2.0);
	for edge in state.graph.edges() {
		let (Some(source), Some(target)) = (
			state.graph.node(edge.source),
			state.graph.node(edge.target),
		) else {
			continue;
		};
		let (s, t) = (source.position, target.position);
		let mid_y = (s.y + t.y) / 2.0;
		ctx.begin_path();
		ctx.move_to(s.x, s.y);
		ctx.bezier_curve_to(s.x, mid_y, t.x, mid_y, t.x, t.y);
		ctx.stroke();
	}
}

fn draw_nodes(state: &GraphDemoState, ctx: &CanvasRenderingContext2d) {
	let radius = state.node_radius();
	let breath = 0.5 + 0.5 * (state.clock * 3.0).sin();

	for node in state.graph.nodes() {
		let (x, y) = (node.position.x, node.position.y);

		if state.selected == Some(node.id) {
			let glow_radius = radius * (1.5 + 0.25 * breath);
			if let Ok(gradient) = ctx.create_radial_gradient(x, y, radius * 0.8, x, y, glow_radius) {
				let alpha = 0.25 + 0.25 * breath;
				let _ = gradient.add_color_stop(0.0, &format!("rgba(105, 179, 162, {})", alpha));
				let _ = gradient.add_color_stop(1.0, "rgba(105, 179, 162, 0)");
				ctx.begin_path();
				let _ = ctx.arc(x, y, glow_radius, 0.0, 2.0 * PI);
				#[allow(deprecated)]
				ctx.set_fill_style(&gradient);
				ctx.fill();
			}
		}

		ctx.begin_path();
		let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(if node.is_root() { ROOT_COLOR } else { NODE_COLOR });
		ctx.fill();
		ctx.set_stroke_style_str("#fff");
		ctx.set_line_width(2.0);
		ctx.stroke();

		if node.pinned.is_some() {
			ctx.begin_path();
			let _ = ctx.arc(x + radius * 0.7, y - radius * 0.7, 4.0, 0.0, 2.0 * PI);
			ctx.set_fill_style_str(PIN_COLOR);
			ctx.fill();
		}

		ctx.set_fill_style_str("#fff");
		ctx.set_font("12px sans-serif");
		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		let _ = ctx.fill_text(&node.name, x, y);
	}
}

/// "+" buttons: top (root only), right, bottom.
fn draw_affordances(state: &GraphDemoState, ctx: &CanvasRenderingContext2d) {
	let radius = state.node_radius();
	ctx.set_font("bold 16px sans-serif");
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	ctx.set_line_width(2.0);

	for node in state.graph.nodes() {
		for affordance in Affordance::ALL.into_iter().filter(|a| a.is_offered(node)) {
			let (dx, dy) = affordance.offset(radius);
			let (x, y) = (node.position.x + dx, node.position.y + dy);
			ctx.begin_path();
			let _ = ctx.arc(x, y, AFFORDANCE_RADIUS, 0.0, 2.0 * PI);
			ctx.set_fill_style_str("#fff");
			ctx.fill();
			ctx.set_stroke_style_str(NODE_COLOR);
			ctx.stroke();
			ctx.set_fill_style_str(NODE_COLOR);
			let _ = ctx.fill_text("+", x, y);
		}
	}
}
