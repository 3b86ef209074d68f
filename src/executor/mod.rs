pub mod coordinator;
pub mod input;
pub mod safety;
