pub mod conditions;
pub mod context;
pub mod damage;
pub mod definitions;
pub mod engine;
pub mod legality;
pub mod params;
pub mod rules;
