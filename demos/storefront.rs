use serde::Deserialize;
use storefront_client::{AuthenticatedHttpClient, Config, ConfigLocation, MemoryCredentialStore};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the example
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // STOREFRONT_API_URL=http://localhost:5000 cargo run --example storefront --features unstable-example
    let cfg = Config::load(ConfigLocation::Env)?;
    let store = MemoryCredentialStore::persistent("target/storefront-credentials.json")?;
    let client = AuthenticatedHttpClient::new(cfg, store)?;

    let login: LoginResponse = client
        .post_json(
            "/api/auth/login",
            &serde_json::json!({ "email": "demo@example.com", "password": "demo" }),
        )
        .await?
        .json()?;
    client.login(login.access_token, login.refresh_token);

    let products: serde_json::Value = client.get_json("/api/products").await?;
    println!("products: {products}");
    let me: serde_json::Value = client.get_json("/api/users/profile").await?;
    println!("profile: {me}");
    Ok(())
}
