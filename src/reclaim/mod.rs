//! Background reclamation of expired state.

pub mod sweeper;

pub use sweeper::{Reclaimer, ReclaimerHandle};
