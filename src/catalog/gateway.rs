use std::future::Future;
use std::sync::Arc;

use super::product::{Cursor, ProductPage};
use crate::error::Error;

/// Remote source of cursor-paginated products.
///
/// `after = None` requests the start of the list. Implementations report the
/// page flags and cursors exactly as the service returned them.
pub trait CatalogGateway: Send + Sync + 'static {
    fn fetch_products(
        &self,
        first: u32,
        after: Option<&Cursor>,
    ) -> impl Future<Output = Result<ProductPage, Error>> + Send;
}

impl<T: CatalogGateway> CatalogGateway for Arc<T> {
    fn fetch_products(
        &self,
        first: u32,
        after: Option<&Cursor>,
    ) -> impl Future<Output = Result<ProductPage, Error>> + Send {
        (**self).fetch_products(first, after)
    }
}
