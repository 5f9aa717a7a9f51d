pub mod attendance;
pub mod holiday;
pub mod qr;
pub mod user;
