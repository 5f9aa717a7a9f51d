pub mod account;
pub mod attendance;
pub mod holiday;
pub mod otp;
pub mod qr;
pub mod report;
