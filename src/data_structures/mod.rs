//! Specialized data structures used by the island manager.

pub mod bit_vec;
pub mod elem_pool;
