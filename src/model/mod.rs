pub mod attendance;
pub mod holiday;
pub mod password_reset;
pub mod qr_code;
pub mod user;
