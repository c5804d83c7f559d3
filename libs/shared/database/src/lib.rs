pub mod memory;
pub mod store;
pub mod supabase;

pub use memory::InMemoryStore;
pub use store::{tables, Filter, Order, Query, Store};
pub use supabase::SupabaseClient;
