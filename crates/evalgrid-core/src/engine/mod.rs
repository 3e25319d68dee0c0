pub mod runner;

pub use runner::{preflight, Runner};
