// file: src/intel/provider.rs
// description: threat intelligence provider seam
// reference: https://docs.rs/futures/latest/futures/future/type.BoxFuture.html

use crate::error::Result;
use crate::models::ThreatRecord;
use futures::future::BoxFuture;

/// One reputation source. Returns a boxed future so providers can sit behind
/// `Arc<dyn ThreatIntelProvider>`.
pub trait ThreatIntelProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `ip` is a bare IPv4 address; candidate cleanup happens before dispatch.
    fn query<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<ThreatRecord>>;
}
