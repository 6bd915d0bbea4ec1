pub mod note;
pub mod user;

pub use note::{NewNote, Note, NoteChanges, Visibility};
pub use user::{NewUser, Role, User};
