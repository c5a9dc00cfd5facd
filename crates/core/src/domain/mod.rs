pub mod application;
pub mod customer;
pub mod target;

pub use application::Application;
pub use customer::{CustomerCode, CustomerRecord};
pub use target::RestartTarget;
