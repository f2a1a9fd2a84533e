use serde::{Deserialize, Serialize};

use super::product::{self, Cursor, Product, ProductPage};
use crate::error::Error;

/// Products connection query. `$after` is null for the first page.
pub const PRODUCTS_QUERY: &str = r"
query GetProducts($first: Int!, $after: String) {
  products(first: $first, after: $after) {
    edges {
      node {
        id
        name
        description
        pricing { priceRange { start { gross { amount currency } } } }
        thumbnail { url alt }
        category { name }
      }
      cursor
    }
    pageInfo {
      hasNextPage
      hasPreviousPage
      startCursor
      endCursor
    }
  }
}
";

#[derive(Debug, Serialize)]
pub(crate) struct ProductsRequest<'a> {
    pub query: &'static str,
    pub variables: ProductsVariables<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductsVariables<'a> {
    pub first: u32,
    pub after: Option<&'a str>,
}

impl<'a> ProductsRequest<'a> {
    pub(crate) fn new(first: u32, after: Option<&'a Cursor>) -> Self {
        Self {
            query: PRODUCTS_QUERY,
            variables: ProductsVariables {
                first,
                after: after.map(Cursor::as_str),
            },
        }
    }
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ProductsResponse {
    #[serde(default)]
    data: Option<ProductsData>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductsData {
    #[serde(default)]
    products: Option<Connection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: Node,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    has_previous_page: bool,
    #[serde(default)]
    start_cursor: Option<String>,
    #[serde(default)]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Node {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    pricing: Option<Pricing>,
    #[serde(default)]
    thumbnail: Option<Thumbnail>,
    #[serde(default)]
    category: Option<Category>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pricing {
    #[serde(default)]
    price_range: Option<PriceRange>,
}

#[derive(Debug, Deserialize)]
struct PriceRange {
    #[serde(default)]
    start: Option<TaxedMoney>,
}

#[derive(Debug, Deserialize)]
struct TaxedMoney {
    #[serde(default)]
    gross: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct Money {
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    alt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(default)]
    name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<Node> for Product {
    fn from(node: Node) -> Self {
        let gross = node
            .pricing
            .and_then(|p| p.price_range)
            .and_then(|r| r.start)
            .and_then(|s| s.gross);
        let (amount, currency) = match gross {
            Some(money) => (money.amount, money.currency),
            None => (None, None),
        };
        let (image, alt) = match node.thumbnail {
            Some(thumbnail) => (thumbnail.url, thumbnail.alt),
            None => (None, None),
        };

        Self {
            id: node.id,
            description: non_empty(node.description)
                .unwrap_or_else(|| product::DEFAULT_DESCRIPTION.to_owned()),
            price: amount.unwrap_or(0.0),
            currency: non_empty(currency).unwrap_or_else(|| product::DEFAULT_CURRENCY.to_owned()),
            image: non_empty(image),
            image_alt: non_empty(alt).unwrap_or_else(|| node.name.clone()),
            category: non_empty(node.category.and_then(|c| c.name))
                .unwrap_or_else(|| product::DEFAULT_CATEGORY.to_owned()),
            name: node.name,
        }
    }
}

impl ProductsResponse {
    /// Maps a GraphQL response body to a page.
    ///
    /// Any `errors` entry fails the whole page, even when `data` is present.
    pub(crate) fn into_page(self) -> Result<ProductPage, Error> {
        if let Some(errors) = self.errors {
            let message = errors
                .into_iter()
                .next()
                .and_then(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "GraphQL error occurred".to_owned());
            return Err(Error::GatewayGraphql(message));
        }

        let connection = self
            .data
            .and_then(|d| d.products)
            .ok_or(Error::GatewayEmptyResponse)?;

        Ok(ProductPage {
            items: connection.edges.into_iter().map(|e| e.node.into()).collect(),
            has_next_page: connection.page_info.has_next_page,
            has_previous_page: connection.page_info.has_previous_page,
            start_cursor: connection.page_info.start_cursor.map(Cursor::from),
            end_cursor: connection.page_info.end_cursor.map(Cursor::from),
        })
    }
}

#[cfg(feature = "graphql")]
pub use http::GraphqlCatalog;

#[cfg(feature = "graphql")]
mod http {
    use url::Url;

    use super::{ProductsRequest, ProductsResponse};
    use crate::catalog::gateway::CatalogGateway;
    use crate::catalog::product::{Cursor, ProductPage};
    use crate::error::Error;

    /// [`CatalogGateway`] backed by a GraphQL endpoint over HTTP.
    #[derive(Debug, Clone)]
    pub struct GraphqlCatalog {
        endpoint: Url,
        http: reqwest::Client,
        bearer_token: Option<String>,
    }

    impl GraphqlCatalog {
        #[must_use]
        pub fn new(endpoint: Url) -> Self {
            Self {
                endpoint,
                http: reqwest::Client::new(),
                bearer_token: None,
            }
        }

        /// Use a custom HTTP client (for connection pool reuse or testing).
        #[must_use]
        pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
            self.http = client;
            self
        }

        /// Send `Authorization: Bearer <token>` with every query.
        #[must_use]
        pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
            self.bearer_token = Some(token.into());
            self
        }

        #[must_use]
        pub fn endpoint(&self) -> &Url {
            &self.endpoint
        }
    }

    impl CatalogGateway for GraphqlCatalog {
        async fn fetch_products(
            &self,
            first: u32,
            after: Option<&Cursor>,
        ) -> Result<ProductPage, Error> {
            let mut request = self
                .http
                .post(self.endpoint.clone())
                .json(&ProductsRequest::new(first, after));
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), "Catalog request failed");
                return Err(Error::GatewayHttp {
                    status: status.as_u16(),
                });
            }

            response.json::<ProductsResponse>().await?.into_page()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: serde_json::Value) -> Result<ProductPage, Error> {
        serde_json::from_value::<ProductsResponse>(body)
            .unwrap()
            .into_page()
    }

    #[test]
    fn test_full_node_maps_verbatim() {
        let page = parse(serde_json::json!({
            "data": { "products": {
                "edges": [{
                    "node": {
                        "id": "UHJvZHVjdDo3Mg==",
                        "name": "Apple Juice",
                        "description": "Fresh",
                        "pricing": { "priceRange": { "start": { "gross": { "amount": 4.5, "currency": "EUR" } } } },
                        "thumbnail": { "url": "https://cdn.example.com/a.png", "alt": "Bottle" },
                        "category": { "name": "Juices" }
                    },
                    "cursor": "YXJyYXljb25uZWN0aW9uOjA="
                }],
                "pageInfo": {
                    "hasNextPage": true,
                    "hasPreviousPage": false,
                    "startCursor": "YXJyYXljb25uZWN0aW9uOjA=",
                    "endCursor": "YXJyYXljb25uZWN0aW9uOjA="
                }
            } }
        }))
        .unwrap();

        assert!(page.has_next_page);
        assert_eq!(page.end_cursor, Some(Cursor::from("YXJyYXljb25uZWN0aW9uOjA=")));
        let product = &page.items[0];
        assert_eq!(product.name, "Apple Juice");
        assert_eq!(product.description, "Fresh");
        assert!((product.price - 4.5).abs() < f64::EPSILON);
        assert_eq!(product.currency, "EUR");
        assert_eq!(product.image.as_deref(), Some("https://cdn.example.com/a.png"));
        assert_eq!(product.image_alt, "Bottle");
        assert_eq!(product.category, "Juices");
    }

    #[test]
    fn test_sparse_node_uses_fallbacks() {
        let page = parse(serde_json::json!({
            "data": { "products": {
                "edges": [{
                    "node": {
                        "id": "1",
                        "name": "Mystery",
                        "description": "",
                        "pricing": null,
                        "thumbnail": { "url": null, "alt": "" },
                        "category": null
                    },
                    "cursor": "c"
                }],
                "pageInfo": { "hasNextPage": false, "hasPreviousPage": true, "startCursor": "c", "endCursor": null }
            } }
        }))
        .unwrap();

        assert_eq!(page.items[0], Product::new("1", "Mystery"));
        assert!(!page.has_next_page);
        assert!(page.has_previous_page);
        assert_eq!(page.end_cursor, None);
    }

    #[test]
    fn test_errors_take_first_message() {
        let err = parse(serde_json::json!({
            "data": null,
            "errors": [{ "message": "Syntax error" }, { "message": "second" }]
        }))
        .unwrap_err();
        assert!(matches!(err, Error::GatewayGraphql(ref m) if m == "Syntax error"));

        let err = parse(serde_json::json!({ "errors": [{}] })).unwrap_err();
        assert_eq!(err.to_string(), "GraphQL error occurred");
    }

    #[test]
    fn test_missing_products_is_empty_response() {
        let err = parse(serde_json::json!({ "data": { "products": null } })).unwrap_err();
        assert!(matches!(err, Error::GatewayEmptyResponse));

        let err = parse(serde_json::json!({})).unwrap_err();
        assert_eq!(err.to_string(), "No products data received");
    }

    #[test]
    fn test_request_variables() {
        let cursor = Cursor::from("c1");
        let body = serde_json::to_value(ProductsRequest::new(2, Some(&cursor))).unwrap();
        assert_eq!(body["variables"]["first"], 2);
        assert_eq!(body["variables"]["after"], "c1");

        let body = serde_json::to_value(ProductsRequest::new(10, None)).unwrap();
        assert!(body["variables"]["after"].is_null());
        assert!(body["query"].as_str().unwrap().contains("products(first: $first, after: $after)"));
    }
}
