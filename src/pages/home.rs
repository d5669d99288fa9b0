use leptos::prelude::*;

use crate::components::graph_demo::{GraphDemo, LayoutMode};

const INSTRUCTIONS: &[&str] = &[
	"Drag the canvas to move around the tree",
	"Zoom in/out using the mouse wheel or a pinch",
	"Drag a node to pin it in place",
	"Click on a node to select it and see more information",
	"Click the bottom \"+\" button to add a child node",
	"Click the right \"+\" button to add a sibling (for the root, this first adds a parent)",
	"Click the top \"+\" button on the root to add a parent",
];

/// Demo page: the interactive knowledge tree and how to use it.
#[component]
pub fn Home() -> impl IntoView {
	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="graph-demo-container">
				<h2>"Interactive Knowledge Tree Demo"</h2>
				<GraphDemo mode=LayoutMode::Force />
				<div class="graph-instructions">
					<h3>"How to use:"</h3>
					<ul>
						{INSTRUCTIONS.iter().map(|line| view! { <li>{*line}</li> }).collect_view()}
					</ul>
				</div>
			</div>
		</ErrorBoundary>
	}
}
