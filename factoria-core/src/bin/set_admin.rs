use dotenv::dotenv;
use factoria_core::auth::{IdentityProvider, JwtVerifier, PgIdentityProvider};
use factoria_core::config::Config;
use factoria_core::db;
use factoria_core::models::Role;
use std::process::ExitCode;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Operator tool granting the admin role to a user, looked up by e-mail.
///
/// Usage: `set-admin <email>`
///
/// The user has to have signed in to the API at least once so that they are
/// in the directory. The new role applies from their next request.
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [email] = args.as_slice() else {
        eprintln!("Usage: set-admin <email>");
        eprintln!("Example: set-admin ops@factoria.pe");
        return Ok(ExitCode::FAILURE);
    };

    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url, 1).await?;
    let directory = PgIdentityProvider::new(JwtVerifier::new(&config.jwt_secret), pool);

    let Some(user) = directory.get_user_by_email(email).await? else {
        error!(
            "No user found with e-mail '{}'; they must sign in once before a role can be assigned",
            email
        );
        return Ok(ExitCode::FAILURE);
    };

    info!("Found user {} ({})", user.uid, email);

    directory.set_role(&user.uid, Role::Admin).await?;

    let current = directory
        .get_user(&user.uid)
        .await?
        .and_then(|u| u.role)
        .unwrap_or_else(|| "none".to_string());

    println!("Role for {} is now: {}", email, current);
    println!("The new role applies from the user's next request.");

    Ok(ExitCode::SUCCESS)
}
