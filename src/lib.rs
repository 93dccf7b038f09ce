pub mod compare;
pub mod config;
pub mod detect;
pub mod driver;
pub mod grader;
pub mod intake;
pub mod isolate;
pub mod render;
pub mod report;
