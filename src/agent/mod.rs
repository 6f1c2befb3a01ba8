//! User-agent classification

mod classifier;

pub use classifier::{AgentClassifier, UserAgentClassifier};
