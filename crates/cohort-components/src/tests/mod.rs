//! Crate-level integration and BDD tests.

mod behaviour;
