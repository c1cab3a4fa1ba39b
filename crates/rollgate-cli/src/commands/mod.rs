pub mod gate;
pub mod risk;
