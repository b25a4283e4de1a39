pub mod nodes;
pub mod probe;
pub mod server;

pub use nodes::{Folder, SawmillNodes, SawmillVar};
pub use probe::probe;
pub use server::{simulate_tick, SawmillServer};
