use std::sync::Arc;

use agent::{AgentLoop, CatalogSettings, LoopSettings, LoopState, SessionController, ToolCatalog};
use anyhow::Context;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

const CLEAR_COMMAND: &str = "/clear";
const QUIT_COMMAND: &str = "/quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // connection settings may live in a `.env` file next to the binary
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,sqlchat=info,agent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "could not read the .env file"),
    }

    let conf = config::SqlChatConfig::get_or_default();
    let db_url = conf.database.resolve_url()?;

    cliclack::intro("sqlchat".bold().to_string())?;

    let spinner = cliclack::spinner();
    spinner.start(format!("Connecting to {}", db::redact(&db_url)));
    let database = db::connect(&db_url, &db::PoolSettings::from(&conf.database))
        .await
        .context("could not connect to the database")?;
    let catalog = ToolCatalog::build(
        Arc::clone(&database),
        &CatalogSettings::from_config(&conf.database, &conf.agent),
    )
    .await
    .context("could not read the table list")?;
    spinner.stop(format!(
        "Connected to {} ({} tables)",
        catalog.dialect(),
        catalog.metadata().tables.len()
    ));

    let model = ai::from_config(&conf.ai)
        .await
        .context("could not set up the language model")?;
    tracing::info!(provider = ?conf.ai.provider, model = %conf.ai.model, "model ready");

    let prompt = agent::system_prompt(
        catalog.dialect(),
        conf.agent.top_k,
        &catalog.metadata().tables,
    );
    let agent = AgentLoop::new(
        model,
        Arc::new(catalog),
        LoopSettings::new(conf.agent.max_iterations, prompt),
    );
    let controller = SessionController::new(Arc::new(agent), conf.agent.intro_message.clone());
    let session = controller.open();

    print_assistant(&conf.agent.intro_message);
    let result = chat(&controller, session.id(), &conf.agent.intro_message).await;

    database.close().await;
    cliclack::outro("Bye!")?;
    result
}

async fn chat(controller: &SessionController, session_id: &str, intro: &str) -> anyhow::Result<()> {
    loop {
        let Ok(question) = cliclack::input("You")
            .placeholder("Ask a question about the database, /clear or /quit")
            .interact::<String>()
        else {
            return Ok(());
        };

        match question.trim() {
            "" => continue,
            QUIT_COMMAND => return Ok(()),
            CLEAR_COMMAND => {
                controller.reset(session_id)?;
                cliclack::log::info("History cleared")?;
                print_assistant(intro);
                continue;
            }
            _ => {}
        }

        let spinner = cliclack::spinner();
        spinner.start("Thinking...");

        let submit = controller.submit(session_id, &question);
        tokio::pin!(submit);
        let finished = tokio::select! {
            outcome = &mut submit => Some(outcome),
            _ = tokio::signal::ctrl_c() => None,
        };
        let outcome = match finished {
            Some(outcome) => outcome,
            None => {
                controller.cancel(session_id);
                submit.await
            }
        };

        match outcome {
            Ok(outcome) => {
                spinner.stop(format!("{} ({} steps)", outcome.state, outcome.iterations));
                match outcome.state {
                    LoopState::Done => print_assistant(&outcome.answer),
                    _ => println!("{}\n", outcome.answer.yellow()),
                }
            }
            Err(err) => {
                spinner.error(err.to_string());
            }
        }
    }
}

fn print_assistant(text: &str) {
    println!("{} {}\n", "[Assistant]".blue(), text);
}
