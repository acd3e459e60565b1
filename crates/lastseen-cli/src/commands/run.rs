//! `lastseen run`: record presence once

use anyhow::Result;

use crate::commands::Settings;
use crate::output::{print_info, print_success};

/// Ping once with the stored token, logging in first when there is none
pub async fn run_command(settings: &Settings) -> Result<()> {
    let agent = settings.agent()?;
    let had_token = agent.store().exists();
    if !had_token {
        print_info(&format!(
            "config file [{}] not found, let's create it, shall we",
            agent.store().path().display()
        ));
    }

    let mut prompt = settings.prompt();
    agent.run_or_configure(&mut *prompt).await?;

    if had_token {
        print_success("updated lastseen time and refreshed token");
    } else {
        print_success("Logged in, token saved");
    }
    Ok(())
}
