//! Backend route paths, relative to the API root (`<base>/api`).

pub const SCAN_LECTURE: &str = "/attendance/scan-lecture";
pub const SCAN_STUDENT: &str = "/attendance/scan-student";
pub const MANUAL_MARK: &str = "/attendance/manual";
pub const SECTIONS: &str = "/sections";
pub const LOGIN: &str = "/auth/token";
pub const USERS: &str = "/users/";
pub const ATTENDANCE_COUNT: &str = "/attendance/count";

pub fn student_qr_token(user_id: i64) -> String {
    format!("/student/qr-token/{user_id}")
}

pub fn enable_lecture_mode(teacher_id: i64) -> String {
    format!("/teacher/master-qr/enable/{teacher_id}")
}

pub fn disable_lecture_mode(teacher_id: i64) -> String {
    format!("/teacher/master-qr/disable/{teacher_id}")
}
