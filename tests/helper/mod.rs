#![allow(dead_code)]

pub mod registry;
pub mod workspace;

#[allow(unused_imports)]
pub use registry::{FlakyDownloader, MockRegistry, create_test_resolver};
#[allow(unused_imports)]
pub use workspace::{HEADER, TestWorkspace};
