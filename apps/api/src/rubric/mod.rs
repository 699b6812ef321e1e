// Rubric templates: parsing a combined evaluation document and re-emitting
// one standalone template per scoring criterion.

pub mod builder;
pub mod defaults;
pub mod handlers;
pub mod models;
pub mod parser;
