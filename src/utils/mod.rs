pub mod time;

pub use time::unix_millis;
