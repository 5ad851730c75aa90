pub mod achievements;
pub mod recommendations;
pub mod reminders;
