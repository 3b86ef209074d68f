pub mod engine;
pub mod history;
pub mod interrupt;
pub mod loop_control;
pub mod session;
pub mod state;
