pub mod collection;
pub mod record;
pub mod utils;

// Re-export handler functions for use in routing
pub use collection::get as collection_get;
pub use collection::post as collection_post;
pub use collection::private_get;

pub use record::delete as record_delete;
pub use record::get as record_get;
pub use record::put as record_put;
