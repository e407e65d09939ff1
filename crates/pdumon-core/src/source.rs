//! Abstract metric source.
//!
//! A [`MetricSource`] resolves a batch of addresses to values. The batch as a
//! whole can fail ([`TransportError`]); inside a successful batch each value
//! can independently be [`Unresolvable`]. Results correspond positionally to
//! the request.

use async_trait::async_trait;

use crate::address::Address;
use crate::error::{TransportError, Unresolvable};

/// One value from a batch response.
pub type Reading = Result<f64, Unresolvable>;

/// Anything that can answer a batch of counter reads.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetch every address in `batch`, in order.
    async fn fetch(&self, batch: &[Address]) -> Result<Vec<Reading>, TransportError>;
}
