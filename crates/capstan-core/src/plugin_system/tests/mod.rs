mod common;

pub mod manifest_tests;
pub mod version_tests;
