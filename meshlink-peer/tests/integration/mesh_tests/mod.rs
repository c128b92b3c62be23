pub mod test_glare;
pub mod test_host_promotion;
pub mod test_leave_and_rejoin;
pub mod test_peer_left;
pub mod test_room_gate;
pub mod test_third_peer_joins;
