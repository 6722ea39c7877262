#[path = "../../convene-game/tests/catalog_shapes.rs"]
mod catalog_shapes;

#[path = "../../convene-game/tests/roll_properties.rs"]
mod roll_properties;

#[path = "../../convene-game/tests/session_flow.rs"]
mod session_flow;
