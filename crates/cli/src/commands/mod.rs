//! Command handlers for the Lingua CLI.

pub mod ask;
pub mod corpus;

pub use ask::AskCommand;
pub use corpus::CorpusCommand;
