pub mod test_ws_relay;
