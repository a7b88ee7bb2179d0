use crate::cli::output::Output;
use crate::cli::ConfigAction;
use crate::config::{load_settings, save_settings};
use crate::errors::Result;
use crate::git::current_repository_root;
use std::path::Path;

/// Handle configuration commands
pub async fn run(action: ConfigAction) -> Result<()> {
    let repo_root = current_repository_root()?;

    match action {
        ConfigAction::Set { key, value } => set_config_value(&repo_root, &key, &value).await,
        ConfigAction::Get { key } => get_config_value(&repo_root, &key).await,
        ConfigAction::List => list_config_values(&repo_root).await,
    }
}

async fn set_config_value(repo_root: &Path, key: &str, value: &str) -> Result<()> {
    let mut settings = load_settings(repo_root)?;
    settings.set_value(key, value)?;
    save_settings(repo_root, &settings)?;

    Output::success(format!("Configuration updated: {key} = {value}"));

    if key == "stack.allow_push_conflicts" && value == "false" {
        Output::tip("Conflicting pushes will now halt without touching the working tree");
    }
    Ok(())
}

async fn get_config_value(repo_root: &Path, key: &str) -> Result<()> {
    let settings = load_settings(repo_root)?;
    let value = settings.get_value(key)?;
    println!("{key} = {}", display_value(&value));
    Ok(())
}

async fn list_config_values(repo_root: &Path) -> Result<()> {
    let settings = load_settings(repo_root)?;

    Output::section("Patchstack configuration");
    for (key, value) in settings.entries() {
        println!("  {key} = {}", display_value(&value));
    }
    Ok(())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
