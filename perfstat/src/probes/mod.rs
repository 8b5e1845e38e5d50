pub mod event;
pub use event::Event;

pub mod scope;
pub use scope::Scope;

pub mod probe;
pub use probe::Probe;

pub mod handle;
pub use handle::{ProbeError, ProbeHandle};
