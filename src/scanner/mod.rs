pub mod walk;

pub use walk::{classify, Classifier};
