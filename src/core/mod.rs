pub mod backend;
pub mod format;
pub mod inference;
pub mod markov;
pub mod pipeline;
