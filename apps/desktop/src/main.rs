use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{
    DurableIdentityStore, FunnelClient, FunnelConfig, MissingAnalyticsSink, VerifyOtpOutcome,
};
use shared::domain::{Screen, SignupMethod};
use tracing::info;

mod config;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(url) = args.api_base_url {
        settings.api_base_url = url;
    }
    if let Some(url) = args.database_url {
        settings.database_url = url;
    }

    info!(
        api_base_url = %settings.api_base_url,
        database_url = %settings.database_url,
        "starting signup funnel"
    );

    let identity = DurableIdentityStore::initialize(&settings.database_url).await?;
    let client = FunnelClient::new_with_dependencies(
        FunnelConfig {
            api_base_url: settings.api_base_url,
            platform: settings.platform,
            device: settings.device,
        },
        Arc::new(MissingAnalyticsSink),
        identity,
    );

    println!("Signup Funnel POC");

    loop {
        let snapshot = client.snapshot().await;
        println!();
        println!("Step {} of 6", snapshot.step);

        match snapshot.screen {
            Screen::Start => {
                let method = match prompt("Signup method (email/phone)")?.parse::<SignupMethod>() {
                    Ok(method) => method,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                let label = match method {
                    SignupMethod::Email => "Email",
                    SignupMethod::Phone => "Phone number",
                };
                let identifier = prompt(label)?;
                client.begin_signup(&identifier, method).await?;
            }
            Screen::Submitted => {
                // Only reachable if a previous OTP send was interrupted.
                println!("OTP request did not complete; restarting the flow.");
                client.restart().await?;
            }
            Screen::Otp => {
                println!(
                    "OTP sent (from backend). For this POC, use: {}",
                    snapshot.server_otp
                );
                let otp = prompt("Enter OTP")?;
                if client.verify_otp(&otp).await? == VerifyOtpOutcome::Rejected {
                    println!("Invalid OTP. Try again.");
                }
            }
            Screen::Profile => {
                let name = prompt("Profile name")?;
                client.complete_profile(&name).await?;
            }
            Screen::Finish => {
                prompt("Ready to finish signup? Press enter")?;
                client.finish_signup().await?;
            }
            Screen::Done => {
                println!("Signup completed.");
                let answer = prompt("Restart flow? (y/n)")?;
                if answer.eq_ignore_ascii_case("y") {
                    client.restart().await?;
                } else {
                    break;
                }
            }
        }
    }

    Ok(())
}
