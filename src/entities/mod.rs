pub mod creature;
pub mod item;
pub mod item_attributes;
pub mod stats;
