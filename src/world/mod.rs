pub mod area;
pub mod dispatcher;
pub mod item_types;
pub mod map;
pub mod position;
pub mod state;
