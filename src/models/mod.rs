pub mod potential_flow;
