pub mod interface;
pub mod peer;
