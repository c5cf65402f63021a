pub mod attendance;
pub mod attendance_policy;
pub mod role;
