mod user;

pub use user::{Actor, User};
