mod post;
mod view;

pub use post::{PostId, PostPath};
pub use view::{ViewRecord, VisitedSet};
