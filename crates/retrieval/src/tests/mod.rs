//! Cross-module tests: full pipeline runs against in-process fakes, and the
//! SQL similarity scan checked against the in-memory reference.

mod pipeline_flow;
mod similarity_contract;
