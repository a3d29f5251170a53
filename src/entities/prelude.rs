pub use super::episodes::Entity as Episodes;
pub use super::series::Entity as Series;
