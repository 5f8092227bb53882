pub mod node;
pub mod span;
pub mod stats;
