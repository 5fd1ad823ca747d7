mod app;
mod auth;
mod config;
mod format;
mod library;
mod share;
mod store;

pub const USER_AGENT: &str = concat!("vidshelf/", env!("CARGO_PKG_VERSION"));

use app::App;
use clap::{Parser, Subcommand};
use config::Config;
use library::FilterState;
use tracing::info;

#[derive(Parser)]
#[command(name = "vidshelf", version, about = "Browse a hosted video library from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List videos matching the given filters, 20 per page
    List {
        /// Match title, description or tags
        #[arg(short = 'q', long, default_value = "")]
        text: String,
        /// Category to include (repeatable; any selected category matches)
        #[arg(short, long = "category")]
        categories: Vec<String>,
        #[arg(short, long, default_value = "")]
        language: String,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Show the categories and languages available for filtering
    Options,
    /// Show a video with related videos and share links
    Watch { title: String },
    /// Show videos related to a video
    Related { title: String },
    /// Print share links for a video
    Share { title: String },
    /// Sign in with email and password
    Login {
        email: String,
        #[arg(long, env = "VIDSHELF_PASSWORD", hide_env_values = true)]
        password: String,
        /// Route to continue at after sign-in
        #[arg(long)]
        next: Option<String>,
    },
    /// Create an account
    Signup {
        email: String,
        #[arg(long, env = "VIDSHELF_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        next: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Email a password reset link
    ResetPassword { email: String },
    /// Print the URL that starts a third-party sign-in
    OauthUrl {
        #[arg(default_value = "google")]
        provider: String,
        #[arg(long)]
        next: Option<String>,
    },
    /// Show the signed-in user
    Whoami,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vidshelf=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!(table = %config.table, "starting vidshelf");
    let app = App::new(config)?;

    let output = match cli.command {
        Command::List {
            text,
            categories,
            language,
            page,
        } => {
            let mut filter = FilterState::default();
            filter.set_text(&text);
            filter.set_categories(categories);
            filter.set_language(&language);
            filter.set_page(page);
            app.list(&filter).await?
        }
        Command::Options => app.options().await?,
        Command::Watch { title } => app.watch(&title).await?,
        Command::Related { title } => app.related(&title).await?,
        Command::Share { title } => app.share(&title),
        Command::Login {
            email,
            password,
            next,
        } => app.login(&email, &password, next.as_deref()).await?,
        Command::Signup {
            email,
            password,
            next,
        } => app.signup(&email, &password, next.as_deref()).await?,
        Command::Logout => app.logout().await?,
        Command::ResetPassword { email } => app.reset_password(&email).await?,
        Command::OauthUrl { provider, next } => app.oauth_url(&provider, next.as_deref())?,
        Command::Whoami => app.whoami().await?,
    };

    print!("{output}");
    Ok(())
}
