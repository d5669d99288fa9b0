pub mod graph_demo;
