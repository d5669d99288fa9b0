use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, warn};
use send_wrapper::SendWrapper;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, TouchEvent, WheelEvent};

use super::layout::{LayoutConfig, LayoutMode};
use super::render;
use super::state::{GraphDemoState, NodeDetails};

const FRAME_DT: f64 = 0.016;
const DEFAULT_WIDTH: f64 = 800.0;
const DEFAULT_HEIGHT: f64 = 600.0;

type SharedState = Rc<RefCell<Option<GraphDemoState>>>;
type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn canvas_point(
	canvas_ref: NodeRef<leptos::html::Canvas>,
	client_x: f64,
	client_y: f64,
) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((client_x - rect.left(), client_y - rect.top()))
}

/// Midpoint and spread of the first two touches, in canvas pixels.
fn pinch_geometry(
	canvas_ref: NodeRef<leptos::html::Canvas>,
	ev: &TouchEvent,
) -> Option<(f64, f64, f64)> {
	let touches = ev.touches();
	let (a, b) = (touches.get(0)?, touches.get(1)?);
	let (ax, ay) = canvas_point(canvas_ref, a.client_x() as f64, a.client_y() as f64)?;
	let (bx, by) = canvas_point(canvas_ref, b.client_x() as f64, b.client_y() as f64)?;
	Some(((ax + bx) / 2.0, (ay + by) / 2.0, (bx - ax).hypot(by - ay)))
}

fn first_touch(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &TouchEvent) -> Option<(f64, f64)> {
	let touch = ev.touches().get(0)?;
	canvas_point(canvas_ref, touch.client_x() as f64, touch.client_y() as f64)
}

fn with_state<R>(state: &SharedState, f: impl FnOnce(&mut GraphDemoState) -> R) -> Option<R> {
	state.borrow_mut().as_mut().map(f)
}

/// Interactive concept tree: expand with the "+" buttons, drag nodes to pin
/// them, pan and zoom the canvas, click a node to read about it.
#[component]
pub fn GraphDemo(
	#[prop(default = LayoutMode::Force)] mode: LayoutMode,
	#[prop(default = false)] lock_drag_to_x: bool,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let details = RwSignal::new(None::<NodeDetails>);
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: FrameCallback = Rc::new(RefCell::new(None));
	let resize_cb: FrameCallback = Rc::new(RefCell::new(None));
	let frame = Rc::new(Cell::new(0));
	let (state_init, animate_init, resize_cb_init, frame_init) =
		(state.clone(), animate.clone(), resize_cb.clone(), frame.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if state_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			warn!("no window; graph demo not started");
			return;
		};

		let (w, h) = if fullscreen {
			(
				window
					.inner_width()
					.ok()
					.and_then(|v| v.as_f64())
					.unwrap_or(DEFAULT_WIDTH),
				window
					.inner_height()
					.ok()
					.and_then(|v| v.as_f64())
					.unwrap_or(DEFAULT_HEIGHT),
			)
		} else {
			(
				width.unwrap_or(DEFAULT_WIDTH),
				height.unwrap_or(DEFAULT_HEIGHT),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			warn!("no 2d context; graph demo not started");
			return;
		};
		*state_init.borrow_mut() = Some(GraphDemoState::new(
			w,
			h,
			LayoutConfig::default(),
			mode,
			lock_drag_to_x,
		));
		debug!("graph demo mounted at {}x{}", w, h);

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (Some(nw), Some(nh)) = (
					win.inner_width().ok().and_then(|v| v.as_f64()),
					win.inner_height().ok().and_then(|v| v.as_f64()),
				) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				with_state(&state_resize, |s| s.resize(nw, nh));
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner, frame_anim) =
			(state_init.clone(), animate_init.clone(), frame_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				s.tick(FRAME_DT);
				render::render(s, &ctx);
			}
			if let (Some(cb), Some(win)) = (animate_inner.borrow().as_ref(), web_sys::window()) {
				if let Ok(handle) = win.request_animation_frame(cb.as_ref().unchecked_ref()) {
					frame_anim.set(handle);
				}
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			if let Ok(handle) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
				frame_init.set(handle);
			}
		}
	});

	// The frame loop holds itself through `animate`; dropping the closures
	// here breaks that cycle and detaches the resize listener.
	let teardown = SendWrapper::new((state.clone(), animate, resize_cb, frame));
	on_cleanup(move || {
		let (state, animate, resize_cb, frame) = teardown.take();
		let window = web_sys::window();
		if let Some(ref win) = window {
			let _ = win.cancel_animation_frame(frame.get());
		}
		if let (Some(cb), Some(win)) = (resize_cb.borrow_mut().take(), window.as_ref()) {
			let _ = win.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
		animate.borrow_mut().take();
		with_state(&state, GraphDemoState::stop);
		debug!("graph demo unmounted");
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, ev.client_x() as f64, ev.client_y() as f64)
		else {
			return;
		};
		with_state(&state_md, |s| s.pointer_down(x, y));
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, ev.client_x() as f64, ev.client_y() as f64)
		else {
			return;
		};
		with_state(&state_mm, |s| s.pointer_move(x, y));
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		with_state(&state_mu, |s| s.pointer_up(js_sys::Date::now()));
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		with_state(&state_ml, |s| s.pointer_up(js_sys::Date::now()));
	};

	let state_ck = state.clone();
	let on_click = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, ev.client_x() as f64, ev.client_y() as f64)
		else {
			return;
		};
		let selected = with_state(&state_ck, |s| {
			s.click(x, y, js_sys::Date::now());
			s.selected_details()
		});
		details.set(selected.flatten());
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = canvas_point(canvas_ref, ev.client_x() as f64, ev.client_y() as f64)
		else {
			return;
		};
		with_state(&state_wh, |s| s.wheel(x, y, ev.delta_y()));
	};

	// Touch: one finger drags or pans and taps like a click, two fingers pinch.
	let tap: Rc<Cell<Option<(f64, f64)>>> = Rc::new(Cell::new(None));

	let (state_ts, tap_ts) = (state.clone(), tap.clone());
	let on_touchstart = move |ev: TouchEvent| {
		ev.prevent_default();
		if ev.touches().length() >= 2 {
			tap_ts.set(None);
			with_state(&state_ts, |s| s.pointer_up(js_sys::Date::now()));
			if let Some((x, y, d)) = pinch_geometry(canvas_ref, &ev) {
				with_state(&state_ts, |s| s.pinch_start(x, y, d));
			}
		} else if let Some((x, y)) = first_touch(canvas_ref, &ev) {
			tap_ts.set(Some((x, y)));
			with_state(&state_ts, |s| s.pointer_down(x, y));
		}
	};

	let (state_tm, tap_tm) = (state.clone(), tap.clone());
	let on_touchmove = move |ev: TouchEvent| {
		ev.prevent_default();
		if ev.touches().length() >= 2 {
			if let Some((x, y, d)) = pinch_geometry(canvas_ref, &ev) {
				with_state(&state_tm, |s| s.pinch(x, y, d));
			}
		} else if let Some((x, y)) = first_touch(canvas_ref, &ev) {
			if tap_tm.get().is_some() {
				tap_tm.set(Some((x, y)));
			}
			with_state(&state_tm, |s| s.pointer_move(x, y));
		}
	};

	let (state_te, tap_te) = (state.clone(), tap);
	let on_touchend = move |ev: TouchEvent| {
		ev.prevent_default();
		let remaining = ev.touches().length();
		if remaining < 2 {
			with_state(&state_te, GraphDemoState::pinch_end);
		}
		if remaining > 0 {
			return;
		}
		let now = js_sys::Date::now();
		let tapped = tap_te.take();
		let selected = with_state(&state_te, |s| {
			s.pointer_up(now);
			if let Some((x, y)) = tapped {
				s.click(x, y, now);
			}
			s.selected_details()
		});
		details.set(selected.flatten());
	};

	view! {
		<div class="graph-container" style="position: relative;">
			<canvas
				node_ref=canvas_ref
				class="graph-demo-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:click=on_click
				on:wheel=on_wheel
				on:touchstart=on_touchstart
				on:touchmove=on_touchmove
				on:touchend=on_touchend
				style="display: block; cursor: grab; touch-action: none;"
			/>
			{move || {
				details
					.get()
					.map(|d| {
						view! {
							<div class="info-callout">
								<h3>{d.name}</h3>
								<p>{d.info}</p>
							</div>
						}
					})
			}}
		</div>
	}
}
