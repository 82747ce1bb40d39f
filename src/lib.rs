mod activity;
mod manager;
mod peer;
mod preset;
mod state;
mod transport;

pub use manager::*;
pub use peer::*;
pub use preset::*;
pub use state::*;
pub use transport::*;
