//! Source and listener front objects: what the application actually touches. They own
//! the processors, wire them to the graph's exit/entry ports, and expose the
//! set-transform/set-buffer/get-buffers surface (§4.9).

pub mod listener;
pub mod source;

pub use listener::Listener;
pub use source::Source;
