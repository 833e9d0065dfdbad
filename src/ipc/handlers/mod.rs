pub mod classes;
pub mod core;
pub mod subjects;
pub mod teachers;
pub mod timetable;
