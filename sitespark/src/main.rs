use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use sitespark::chat::{GuidedWorkflow, WorkflowStep};
use sitespark::config::{Args, Command};
use sitespark::generation::{GenerationProgress, WebsiteGenerationInput};
use sitespark::pagination::Pagination;
use sitespark::{AppState, Config, telemetry};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a generation while printing its progress to stderr, then export the result to `out`.
async fn generate(state: &AppState, input: WebsiteGenerationInput, out: &Path) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<GenerationProgress>(16);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            eprintln!("[{:>3}%] {}", update.progress, update.message);
        }
    });

    let result = state.generation.generate_website(input, Some(&tx)).await;
    drop(tx);
    printer.await?;
    let generated = result?;

    let written = sitespark::sites::export_site(&generated.website, out).await?;
    for path in &written {
        eprintln!("wrote {}", path.display());
    }
    print_json(&generated)
}

/// Walk the guided questions on stdin and return the collected brief
async fn guided_brief() -> anyhow::Result<GuidedWorkflow> {
    let mut workflow = GuidedWorkflow::new();
    println!("{}", workflow.welcome());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while workflow.step != WorkflowStep::Generating {
        let line = lines.next_line().await?.context("stdin closed before the questions were answered")?;
        match workflow.answer(&line) {
            Ok(reply) => println!("\n{reply}"),
            Err(e) => println!("{e}"),
        }
    }
    Ok(workflow)
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Migrate => info!("Migrations applied"),
        Command::Register { email, password, name } => {
            let user = state.accounts.register(&email, &password, name).await?;
            print_json(&user)?;
        }
        Command::Login { email, password } => {
            let signed_in = state.accounts.sign_in(&email, &password).await?;
            print_json(&signed_in)?;
        }
        Command::Balance { user } => {
            let balance = state.ledger.get_balance(user).await?;
            print_json(&serde_json::json!({
                "balance": balance,
                "costs": state.ledger.costs(),
            }))?;
        }
        Command::History { user, page, limit } => {
            let history = state.ledger.transaction_history(user, &Pagination::new(page, limit)).await?;
            print_json(&history)?;
        }
        Command::Grant { user, amount, description } => {
            let receipt = state.ledger.grant(user, amount, description).await?;
            print_json(&receipt)?;
        }
        Command::Generate {
            user,
            name,
            subdomain,
            prompt,
            description,
            out,
        } => {
            let input = WebsiteGenerationInput {
                user_id: user,
                name,
                subdomain,
                prompt,
                description,
            };
            generate(state, input, &out).await?;
        }
        Command::Chat { user, subdomain, out } => {
            let mut workflow = guided_brief().await?;
            let input = WebsiteGenerationInput {
                user_id: user,
                name: workflow.data.business_name.clone().unwrap_or_else(|| subdomain.clone()),
                subdomain,
                prompt: workflow.generation_prompt(),
                description: workflow.data.business_type.clone(),
            };
            generate(state, input, &out).await?;
            workflow.complete();
        }
        Command::Publish { user, website } => {
            let website = state.sites.publish_website(user, website).await?;
            print_json(&website)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.log_format)?;

    tracing::debug!("{:?}", args);

    let pool = sitespark::db::connect(&config.database).await?;
    sitespark::migrator().run(&pool).await?;

    let Some(command) = args.command else {
        info!("Migrations applied, no command given");
        return Ok(());
    };

    let state = AppState::from_config(pool, config);
    run(&state, command).await
}
