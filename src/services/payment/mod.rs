pub mod interface;
pub mod khalti;
