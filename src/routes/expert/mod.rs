mod handler;
mod import;
pub mod model;

pub use handler::{create_expert, delete_expert, get_expert, list_experts, update_expert};
pub use import::import_experts;
