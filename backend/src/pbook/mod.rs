pub mod lister;
pub mod source;
