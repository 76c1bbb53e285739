//! Modra testing utilities
//!
//! Mock modules, factories, and registry fixtures for testing chains and
//! orchestration without real module logic or live artifacts outside a temp
//! directory.

pub mod fixtures;

pub use fixtures::RegistryFixture;
pub use modules::{FailingFactory, MockFactory, MockModule};

/// Assert that a context carries the degraded-continuation markers for a
/// failure in the given step.
#[macro_export]
macro_rules! assert_degraded {
    ($context:expr, $step:expr) => {
        assert_eq!($context.get_u64("error_in_step"), Some($step));
        assert_eq!($context.get_bool("degraded_mode"), Some(true));
    };
}
