pub mod batch_tracker;
pub mod gallery;
pub mod monitor;
pub mod pipeline;
pub mod query_strategy;
pub mod registry;
pub mod remote;
pub mod source;
pub mod storage;
pub mod verdict;
