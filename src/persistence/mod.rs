pub mod file_loader;
pub mod prop_stream;
pub mod world_store;
