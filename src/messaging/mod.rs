mod consumer;
mod redpanda;

pub use consumer::OrderStreamConsumer;
pub use redpanda::{OrderPublisher, RedpandaClient};

#[cfg(test)]
pub(crate) use redpanda::testing;
