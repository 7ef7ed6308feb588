pub mod progress;
pub mod xyz;
