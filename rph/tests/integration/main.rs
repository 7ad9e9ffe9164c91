#[path = "../common/mod.rs"]
mod common;

mod command_tests;
mod hook_tests;
