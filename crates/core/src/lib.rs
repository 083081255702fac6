pub mod audit;
pub mod config;
pub mod contracts;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod knowledge;
pub mod session;
pub mod text;
