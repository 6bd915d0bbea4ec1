pub mod account_service;
pub mod note_service;
pub mod validation;

pub use account_service::{
    AccountError, AccountService, Credentials, RefreshRequest, RegisteredAccount, Registration,
    TokenPair,
};
pub use note_service::{NoteError, NoteInput, NotePatch, NoteService};
