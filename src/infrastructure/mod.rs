pub mod context_repo;
pub mod store;
