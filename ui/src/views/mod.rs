mod exam;
pub use exam::ExamAttempt;

mod home;
pub use home::Home;
