pub mod predict;
pub mod smoke;
pub mod train;
