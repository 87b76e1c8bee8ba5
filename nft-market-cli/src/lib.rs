pub mod client;
pub mod cmd;
pub mod serde;
pub mod settings;

pub mod result {
    pub type Result<T = ()> = anyhow::Result<T>;
}
