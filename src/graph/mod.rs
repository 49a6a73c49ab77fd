//! Dataflow graph primitives the processing layer is built from: typed entry/exit
//! points, the per-module firing gate, the command bus, and the [`Manager`] that wires
//! sources and listeners into a running graph (§4.1).

pub mod command;
pub mod entry_point;
pub mod exit_point;
pub mod gate;
pub mod manager;

pub use command::{Command, CommandParam};
pub use entry_point::EntryPoint;
pub use exit_point::ExitPoint;
pub use gate::FiringGate;
pub use manager::Manager;
