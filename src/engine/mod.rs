pub mod matcher;
pub mod persistence;
pub mod record;
pub mod store;
pub mod vault;

pub use matcher::{Descriptor, Matcher};
pub use persistence::load;
pub use record::{Record, ID_FIELD};
pub use store::{FindOptions, ResultSet, Store};
