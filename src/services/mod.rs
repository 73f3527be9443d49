pub mod form_service;
pub mod records;
pub mod session_sweeper;
pub mod storage;
pub mod supabase;
