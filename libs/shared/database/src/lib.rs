pub mod query;
pub mod supabase;

pub use query::{Condition, ListQuery, Page, PageRequest, PaginationMeta, SortDirection, SortSpec};
pub use supabase::{DatabaseError, SupabaseClient};
