pub mod memory;
pub mod supabase;
pub mod traits;

pub use memory::MemoryBackend;
pub use supabase::SupabaseClient;
pub use traits::{AuthProvider, AuthUser, ImageStore, PropertyStore, Query, Session};
