/**
 * A practice engine for the theory tests of Chinese driving licences: question banks,
 * topic labels, selection strategies, answer checking and progress tracking.
 */
#[macro_use]
pub mod iohelper;
pub mod common;
pub mod config;
pub mod engine;
pub mod persistence;
pub mod progress;
pub mod quiz;
pub mod selection;
pub mod stats;
pub mod topics;

pub use common::{QuizError, Result};
pub use config::Config;
pub use engine::{CheckOutcome, Engine, FavoriteAction, FavoriteOutcome};
