use super::{CommandContext, OutputFormat};
use anyhow::Result;

use epgsync::Config;

pub enum ConfigCommand {
    Init { force: bool },
    Show { format: OutputFormat },
}

impl ConfigCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        match self {
            Self::Init { force } => Self::init(&context, force),
            Self::Show { format } => Self::show(&context, format),
        }
    }

    fn init(context: &CommandContext, force: bool) -> Result<()> {
        let path = &context.config_path;
        if path.exists() && !force {
            anyhow::bail!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            );
        }

        Config::default().save(path)?;
        println!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    fn show(context: &CommandContext, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&context.config)?);
            }
            OutputFormat::Text => {
                eprintln!("# {}", context.config_path.display());
                print!("{}", toml::to_string_pretty(&context.config)?);
            }
        }
        Ok(())
    }
}
