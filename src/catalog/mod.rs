//! Product catalog: a cursor-paginated gateway, a page-indexed cache in front
//! of it and next/previous navigation on top.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_client::catalog::{GraphqlCatalog, PageCache, PaginationController};
//!
//! let gateway = GraphqlCatalog::new("https://shop.example.com/graphql/".parse()?);
//! let pager = PaginationController::new(Arc::new(PageCache::new(gateway, 10)));
//!
//! pager.sync().await?;          // page 1
//! pager.go_next().await?;       // page 2, fetched with page 1's end cursor
//! pager.go_previous().await?;   // page 1 again, served from the cache
//! ```

mod cache;
mod gateway;
mod graphql;
mod pagination;
mod product;

pub use cache::{LoadOutcome, PageCache};
pub use gateway::CatalogGateway;
#[cfg(feature = "graphql")]
pub use graphql::GraphqlCatalog;
pub use graphql::PRODUCTS_QUERY;
pub use pagination::PaginationController;
pub use product::{Cursor, PageEntry, Product, ProductPage};
