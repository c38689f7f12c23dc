pub mod chat;
pub mod health;
pub mod liveness;
pub mod query;
pub mod root;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;
