pub mod alerts;
pub mod reminders;
