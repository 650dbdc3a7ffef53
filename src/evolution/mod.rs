pub mod aggregator;
pub mod crayfish;
pub mod partitioner;
pub mod runner;
