use anyhow::Result;
use clap::Parser;
use nano_prompt_generator::app::{App, RunPlan};
use nano_prompt_generator::models::Config;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "nano-prompt-generator")]
#[command(about = "Derive, optimize and test image-editing prompts")]
struct CliArgs {
    /// Image the prompt should reproduce.
    #[arg(long, value_name = "PATH")]
    target: PathBuf,

    /// Optional input images, in order. The first one is the default test reference.
    #[arg(long = "input", value_name = "PATH")]
    inputs: Vec<PathBuf>,

    /// Image to use for the test render instead of the first input.
    #[arg(long, value_name = "PATH")]
    reference: Option<PathBuf>,

    /// Additional requirements for the generated prompt.
    #[arg(long, value_name = "TEXT", value_parser = parse_requirements)]
    requirements: Option<String>,

    /// Optimize the generated prompt.
    #[arg(long)]
    optimize: bool,

    /// Render a test image from the final prompt.
    #[arg(long)]
    test: bool,

    /// Where test images are written.
    #[arg(long, value_name = "DIR", default_value = "output")]
    output: PathBuf,
}

fn parse_requirements(input: &str) -> std::result::Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Requirements must not be blank".to_string());
    }
    Ok(trimmed.to_string())
}

impl CliArgs {
    fn plan(&self) -> RunPlan {
        RunPlan {
            target: self.target.clone(),
            inputs: self.inputs.clone(),
            reference: self.reference.clone(),
            requirements: self.requirements.clone(),
            optimize: self.optimize,
            test: self.test,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nano_prompt_generator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    info!("Starting nano-prompt-generator");

    let app = match Config::from_env().and_then(|config| App::from_config(&config, args.output.clone())) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match app.run(&args.plan()).await {
        Ok(report) => {
            if let Some(prompt) = &report.prompt {
                println!("{}", prompt);
            }
            if let Some(path) = &report.test_image_path {
                info!("Test image: {}", path.display());
            }
            for (operation, reason) in &report.failures {
                error!("{} failed: {}", operation, reason);
            }
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_collects_repeated_inputs_in_order() {
        let args = CliArgs::try_parse_from([
            "nano-prompt-generator",
            "--target",
            "t.png",
            "--input",
            "a.png",
            "--input",
            "b.png",
            "--test",
        ])
        .unwrap();
        let plan = args.plan();
        assert_eq!(plan.inputs, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert!(plan.test);
        assert!(!plan.optimize);
        assert_eq!(args.output, PathBuf::from("output"));
    }

    #[test]
    fn test_parse_requirements_rejects_blank() {
        assert!(parse_requirements("   ").is_err());
        assert_eq!(parse_requirements(" cartoon ").unwrap(), "cartoon");
    }
}
