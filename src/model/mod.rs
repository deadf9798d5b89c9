pub mod notification;
pub mod project;
pub mod role;
pub mod time_record;
pub mod timesheet;
pub mod user;
