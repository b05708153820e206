mod common;
mod lease;
