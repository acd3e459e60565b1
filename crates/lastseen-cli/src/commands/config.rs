//! `lastseen config`: log in and store a fresh token

use anyhow::Result;

use crate::commands::Settings;
use crate::output::print_success;

/// Run the whole login flow, replacing any previous token
pub async fn config_command(settings: &Settings) -> Result<()> {
    let agent = settings.agent()?;
    let mut prompt = settings.prompt();

    agent.configure(&mut *prompt).await?;

    print_success(&format!(
        "Logged in, token saved to {}",
        agent.store().path().display()
    ));
    Ok(())
}
