pub mod email;
pub mod notification;

pub use email::{EmailMessage, EmailSender, ResendEmailClient};
pub use notification::NotificationService;
