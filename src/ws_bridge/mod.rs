pub mod bridge;

pub use bridge::{router, snapshot_message, start_ws_server};
