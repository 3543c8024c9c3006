//! Request middleware

pub mod visit_tracking;
pub mod visitor_cookie;

pub use visit_tracking::track_blog_visit;
pub use visitor_cookie::provision_visitor_cookie;
