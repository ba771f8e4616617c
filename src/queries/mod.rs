pub mod catalog;
pub mod dataset;
pub mod station;
