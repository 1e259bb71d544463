pub mod batch;
pub mod claim;
pub mod task;
pub mod verdict;
pub mod verification;
