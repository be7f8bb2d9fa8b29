//! Config subcommand handlers.

use std::io::{self, IsTerminal};

use lumifly_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init) => handle_init(&init, global),
        ConfigCommand::Show => handle_show(global),
        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string(), global.quiet);
            Ok(())
        }
    }
}

fn handle_init(args: &InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.count == 0 {
        return Err(CliError::Validation {
            field: "count".into(),
            reason: "a roster needs at least one module".into(),
        });
    }
    let path = config::config_file(global);
    if path.exists() && !confirm_overwrite(&path.display().to_string(), global.yes)? {
        output::print_output("Roster left unchanged.", global.quiet);
        return Ok(());
    }

    let cfg = Config::sample(&args.host, args.base_port, args.count);
    // Catch a bad host before it lands on disk.
    cfg.registry()?;
    lumifly_config::save_config_to(&cfg, &path)?;

    output::print_output(
        &format!(
            "Wrote {} modules to {}",
            cfg.devices.len(),
            path.display()
        ),
        global.quiet,
    );
    Ok(())
}

fn handle_show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_roster(global)?;
    // Surface roster problems here rather than at the next fleet command.
    let registry = cfg.registry()?;
    let rendered = output::render_single(
        &global.output,
        &cfg,
        |c| c.to_toml().unwrap_or_else(|e| format!("# {e}")),
        |_| {
            registry
                .iter()
                .map(|d| d.endpoint.clone())
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(rendered.trim_end(), global.quiet);
    Ok(())
}

fn confirm_overwrite(path: &str, yes: bool) -> Result<bool, CliError> {
    if yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::ConfigExists { path: path.into() });
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(format!("Overwrite {path}?"))
        .default(false)
        .interact()?)
}
