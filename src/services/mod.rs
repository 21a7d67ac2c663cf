pub mod database;
pub mod donor;
pub mod message;
pub mod notification;
pub mod request;

// 重新导出常用类型
pub use database::Database;
pub use donor::DonorService;
pub use message::MessageService;
pub use notification::NotificationService;
pub use request::RequestService;
