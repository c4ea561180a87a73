//! `config` handlers. These run before the config file is loaded.

use bluewake_config::{Config, config_path, load_config_from, save_config};
use bluewake_core::Severity;

use crate::cli::{ColorMode, ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, should_color, status_line};

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
        }
        ConfigCommand::Show => {
            let cfg = load_config_from(&path)?;
            let rendered = output::render_single(
                global.output.unwrap_or(OutputFormat::Table),
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("# {e}")),
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("# {e}")),
            );
            output::print_output(rendered.trim_end(), global.quiet);
        }
        ConfigCommand::Init => {
            if path.exists() && !global.yes {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            save_config(&Config::default(), &path)?;
            if !global.quiet {
                let color = should_color(global.color.unwrap_or(ColorMode::Auto), &std::io::stderr());
                eprintln!(
                    "{}",
                    status_line(
                        Severity::Success,
                        &format!("Wrote {}", path.display()),
                        color
                    )
                );
            }
        }
    }
    Ok(())
}
