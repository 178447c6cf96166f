pub mod deleter;
pub mod frame_manager;
pub mod platform;
pub mod staging;
