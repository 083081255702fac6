pub mod conversation;
pub mod course;
pub mod intent;
pub mod safety;
pub mod workflow;
