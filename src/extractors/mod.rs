pub mod tenant;

pub use tenant::{tenant_signal, REQUEST_ID_HEADER, USER_ID_HEADER};
