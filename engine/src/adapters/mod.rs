pub mod address_channel;

pub use address_channel::{spawn_address_publisher, AddressClient, AddressRequest};
