pub mod physics;
pub mod sawmill;
pub mod state;

pub use sawmill::{AlarmCause, Sawmill, TickOutcome};
pub use state::{SawmillState, TargetValues};
