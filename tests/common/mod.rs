#![allow(dead_code, unused_imports)]

pub use globmirror_test_utils::builders::{snapshot, TestTree};
pub use globmirror_test_utils::stages::{CountingStage, FailingStage, UpperStage};
pub use globmirror_test_utils::{init_tracing, wait_until, with_timeout};
