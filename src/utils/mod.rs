pub mod db_utils;
pub mod holiday_api;
pub mod mailer;
