pub mod contact;
pub mod conversation;
pub mod reminder;

pub use contact::SavedContact;
pub use conversation::{ConversationTurn, Role};
pub use reminder::{NewReminder, ReminderRecord, DEFAULT_REMINDER_TITLE};
