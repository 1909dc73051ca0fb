use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "console", about = "dealgate operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Plan and feature catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Print the entitlement a subscription would get right now
    Resolve {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        status: String,
        /// RFC 3339
        #[arg(long)]
        trial_end: Option<String>,
        /// RFC 3339
        #[arg(long)]
        past_due_since: Option<String>,
        /// Days a past-due subscription keeps its features; defaults to the configured value
        #[arg(long, value_name = "DAYS", allow_hyphen_values = true)]
        grace_days: Option<i64>,
        #[arg(long, value_name = "FILE")]
        file: Option<String>,
    },
    /// Print a billing-signature header for a webhook payload
    Sign {
        #[arg(long, env = "BILLING_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
        #[arg(long, value_name = "FILE")]
        file: String,
    },
}

#[derive(Debug, Subcommand)]
enum CatalogCommands {
    /// Load the catalog and check its invariants
    Validate {
        #[arg(long, value_name = "FILE")]
        file: Option<String>,
    },
    /// Print every tier with its cumulative features and plans
    Show {
        #[arg(long, value_name = "FILE")]
        file: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    get_command(cli)?.call()
}

fn get_command(cli: Cli) -> Result<Box<dyn dealgate::console::commands::CallableTrait>, String> {
    match cli.command {
        Commands::Catalog { command } => match command {
            CatalogCommands::Validate { file } => Ok(Box::new(
                dealgate::console::commands::catalog::ValidateCommand::new(file),
            )),
            CatalogCommands::Show { file } => Ok(Box::new(
                dealgate::console::commands::catalog::ShowCommand::new(file),
            )),
        },
        Commands::Resolve {
            plan,
            status,
            trial_end,
            past_due_since,
            grace_days,
            file,
        } => Ok(Box::new(dealgate::console::commands::resolve::ResolveCommand::new(
            plan,
            status,
            trial_end,
            past_due_since,
            grace_days,
            file,
        ))),
        Commands::Sign { secret, file } => Ok(Box::new(
            dealgate::console::commands::sign::SignCommand::new(secret, file),
        )),
    }
}
