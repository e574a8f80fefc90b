pub mod context;
pub mod engine;
pub mod overrides;
pub mod phase;
pub mod system;
