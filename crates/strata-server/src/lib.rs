//! Strata world server.
//!
//! Opens a world directory, runs the emerge worker pool against it and
//! drives map upkeep from a fixed-step loop.

pub mod error;
pub mod server;
pub mod tick;
pub mod world;

pub use error::ServerError;
pub use server::{Server, StepReport};
pub use tick::{MAX_FRAME_TIME, SERVER_STEP, TickLoop};
pub use world::{CONTENT_FILE_NAME, load_registry, resolve_world_dir};
