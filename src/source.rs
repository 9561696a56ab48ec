use std::collections::VecDeque;

use async_trait::async_trait;

use crate::types::ControllerEndpoint;

/// Where candidate controller addresses come from.
///
/// Discovery itself (mDNS or anything else) lives outside this crate; the
/// client only needs something it can ask for the next candidate to dial.
/// Returning `None` means the source is exhausted, at which point connecting
/// fails with [`crate::DeakoError::NoDevicesFound`].
#[async_trait]
pub trait AddressSource: Send {
    /// Next candidate to dial, or `None` when there are no more.
    async fn next_address(&mut self) -> Option<ControllerEndpoint>;
}

/// A fixed list of candidates, handed out in order.
#[derive(Debug, Clone, Default)]
pub struct StaticAddresses {
    addresses: VecDeque<ControllerEndpoint>,
}

impl StaticAddresses {
    pub fn new(addresses: impl IntoIterator<Item = ControllerEndpoint>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Convenience for the common single-controller setup.
    pub fn single(endpoint: ControllerEndpoint) -> Self {
        Self::new([endpoint])
    }
}

#[async_trait]
impl AddressSource for StaticAddresses {
    async fn next_address(&mut self) -> Option<ControllerEndpoint> {
        self.addresses.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hands_out_addresses_in_order_then_runs_dry() {
        let mut source = StaticAddresses::new([
            ControllerEndpoint::new("10.0.0.1", 23, "first"),
            ControllerEndpoint::new("10.0.0.2", 23, "second"),
        ]);

        assert_eq!(source.next_address().await.unwrap().host, "10.0.0.1");
        assert_eq!(source.next_address().await.unwrap().host, "10.0.0.2");
        assert!(source.next_address().await.is_none());
    }
}
