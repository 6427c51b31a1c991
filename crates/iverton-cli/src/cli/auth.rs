//! Sign-in subcommands.
//!
//! The volatile session area lives only as long as the process, so `login`
//! remembers the session in durable storage unless `--ephemeral` is given.

use anyhow::{Result, bail};
use clap::Subcommand;
use console::style;
use dialoguer::{Input, Password};

use iverton_core::auth::AuthOutcome;
use iverton_types::auth::{Credentials, SignUpRequest, User};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: Option<String>,

        /// Password (prompted when omitted).
        #[arg(long, env = "IVERTON_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Do not remember the session after this command exits.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Create an account and sign in.
    Signup {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, env = "IVERTON_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the remembered session.
    Logout,

    /// Show the signed-in user.
    Whoami,
}

pub async fn handle_auth_command(cmd: AuthCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        AuthCommand::Login { email, password, ephemeral } => {
            let email = prompt_or(email, "Email")?;
            let password = password_or(password, "Password", false)?;
            let outcome = state
                .auth
                .sign_in(Credentials::new(email, password), !ephemeral)
                .await?;
            report_outcome(outcome, json)
        }
        AuthCommand::Signup { name, email, password } => {
            let name = prompt_or(name, "Name")?;
            let email = prompt_or(email, "Email")?;
            let (password, confirm_password) = match password {
                Some(p) => (p.clone(), p),
                None => {
                    let p = password_or(None, "Password", true)?;
                    (p.clone(), p)
                }
            };
            let outcome = state
                .auth
                .sign_up(SignUpRequest {
                    name,
                    email,
                    password,
                    confirm_password,
                })
                .await?;
            report_outcome(outcome, json)
        }
        AuthCommand::Logout => {
            state.auth.sign_out().await;
            if json {
                println!("{}", serde_json::json!({"signed_out": true}));
            } else {
                println!("  {} Signed out.", style("✓").green().bold());
            }
            Ok(())
        }
        AuthCommand::Whoami => {
            let user = state.auth.restore_session().await;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "authenticated": user.is_some(),
                        "user": user,
                        "error": state.auth.error(),
                    }))?
                );
                return Ok(());
            }
            match user {
                Some(user) => print_user(&user),
                None => {
                    let reason = state.auth.error().unwrap_or_else(|| "Not signed in".to_string());
                    println!("  {} {}", style("i").blue().bold(), reason);
                }
            }
            Ok(())
        }
    }
}

fn report_outcome(outcome: AuthOutcome, json: bool) -> Result<()> {
    match outcome {
        AuthOutcome::Authenticated(user) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("  {} Signed in", style("✓").green().bold());
                print_user(&user);
            }
            Ok(())
        }
        AuthOutcome::Rejected(error) => bail!("{error}"),
    }
}

fn print_user(user: &User) {
    println!();
    println!("  {}   {}", style("Name:").bold(), style(&user.name).cyan());
    println!("  {}  {}", style("Email:").bold(), user.email);
    println!("  {}   {}", style("Role:").bold(), user.role);
    println!();
}

fn prompt_or(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::<String>::new().with_prompt(prompt).interact_text()?),
    }
}

fn password_or(value: Option<String>, prompt: &str, confirm: bool) -> Result<String> {
    if let Some(v) = value {
        return Ok(v);
    }
    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(input.interact()?)
}
