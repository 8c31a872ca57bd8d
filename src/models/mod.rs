mod link;

pub use link::{CreateLinkRequest, Shortlink};
