mod link_actor;
mod link_state;
mod link_table;
mod peer_link;
mod pending_candidates;

pub use link_actor::*;
pub use link_state::*;
pub use link_table::*;
pub use peer_link::*;
pub use pending_candidates::*;
