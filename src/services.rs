mod provisioner;

pub use provisioner::{DEFAULT_WARMUP, EnsureOutcome, Provisioner, Readiness};
