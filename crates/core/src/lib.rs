pub mod binding;
pub mod id;

pub use binding::Binding;
pub use id::{InvalidObjectId, ObjectId};
