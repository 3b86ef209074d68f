pub mod decision;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod response_parser;
pub mod types;
