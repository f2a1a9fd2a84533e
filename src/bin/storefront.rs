use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use storefront_client::{
    AuthController, AuthorizationOutcome, AuthorizationRequest, FileTokenStore, GraphqlCatalog,
    HttpIdentityProvider, PageCache, PaginationController, StorefrontConfig, UserAgent,
};

const DEFAULT_TOKEN_FILE: &str = ".storefront/tokens.json";

#[derive(Parser)]
#[command(name = "storefront", about = "Log in to the storefront and browse its catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the identity provider (authorization code + PKCE)
    Login,

    /// Forget the stored tokens
    Logout,

    /// Show the logged-in user and their roles
    Whoami,

    /// Print catalog pages, following the cursor chain
    Products {
        /// Number of pages to print
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Query the catalog without the stored access token
        #[arg(long)]
        anonymous: bool,
    },
}

/// Prints the authorization URL and reads the redirect URL back from stdin.
struct TerminalUserAgent;

impl UserAgent for TerminalUserAgent {
    async fn authorize(&self, request: &AuthorizationRequest) -> AuthorizationOutcome {
        println!("Open this URL in a browser and sign in:\n\n  {}\n", request.url);
        println!("Paste the URL you were redirected to (empty line to cancel):");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) => return AuthorizationOutcome::Dismiss,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read redirect URL");
                return AuthorizationOutcome::Unknown;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            return AuthorizationOutcome::Cancel;
        }
        match line.parse::<url::Url>() {
            Ok(url) => AuthorizationOutcome::from_redirect(&url),
            Err(e) => {
                tracing::warn!(error = %e, "Redirect URL is not a valid URL");
                AuthorizationOutcome::Unknown
            }
        }
    }
}

type Controller = AuthController<HttpIdentityProvider, FileTokenStore>;

fn controller(config: &StorefrontConfig) -> Controller {
    let token_file = config
        .token_file
        .clone()
        .unwrap_or_else(|| DEFAULT_TOKEN_FILE.into());
    AuthController::new(
        config.oauth.clone(),
        HttpIdentityProvider::new(config.oauth.issuer().clone()),
        FileTokenStore::new(token_file),
    )
}

async fn run_login(auth: &Controller) -> anyhow::Result<()> {
    auth.discover()
        .await
        .context("identity provider discovery failed")?;
    let request = auth.authorization_request()?;
    let session = auth.begin_login(&request, &TerminalUserAgent).await?;
    auth.flush().await;

    println!(
        "Logged in as {}",
        session.identity.display_name().unwrap_or("unknown user")
    );
    Ok(())
}

fn run_whoami(auth: &Controller) {
    if !auth.is_logged_in() {
        println!("Not logged in");
        return;
    }
    let session = auth.session();
    let identity = &session.identity;
    println!("user:     {}", identity.display_name().unwrap_or("-"));
    println!("email:    {}", identity.email.as_deref().unwrap_or("-"));
    println!("roles:    {}", session.roles.join(", "));
}

async fn run_products(
    config: &StorefrontConfig,
    auth: &Controller,
    pages: u32,
    anonymous: bool,
) -> anyhow::Result<()> {
    let mut gateway = GraphqlCatalog::new(config.catalog_endpoint.clone());
    if !anonymous {
        if let Some(token) = auth.access_token() {
            gateway = gateway.with_bearer_token(token);
        }
    }
    let pager = PaginationController::new(Arc::new(PageCache::new(gateway, config.page_size)));

    pager.sync().await.context("failed to load the first page")?;
    for printed in 1..=pages {
        println!("── page {} ──", pager.current_page());
        for product in pager.current_items() {
            println!(
                "{:<40} {:>10.2} {}  [{}]",
                product.name, product.price, product.currency, product.category
            );
        }
        if !pager.has_next_page() {
            println!("(last page)");
            break;
        }
        if printed == pages {
            break;
        }
        let before = pager.current_page();
        pager.go_next().await?;
        if pager.current_page() == before {
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (controlled by RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront_client=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = StorefrontConfig::from_env()?;
    let auth = controller(&config);
    auth.restore().await;

    match cli.command {
        Commands::Login => run_login(&auth).await?,
        Commands::Logout => {
            auth.logout();
            auth.flush().await;
            println!("Logged out");
        }
        Commands::Whoami => run_whoami(&auth),
        Commands::Products { pages, anonymous } => {
            run_products(&config, &auth, pages, anonymous).await?;
        }
    }
    Ok(())
}
