//! Destroy command - remove containers and every trace of the app

use crate::bootstrap::BootstrapLevel;
use crate::cli::args::DestroyArgs;
use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::ui::{TaskSpinner, UiContext};
use std::io::{self, Write};

/// Execute the destroy command
pub async fn execute(args: DestroyArgs, config: &Config) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let mut bootstrap = super::bootstrap(config, BootstrapLevel::App).await?;
    let (app, lifecycle) = bootstrap.app()?;

    if !args.yes {
        if !ctx.use_fancy_output() {
            return Err(BerthError::User(
                "Refusing to destroy without --yes in a non-interactive session".to_string(),
            ));
        }
        print!("Destroy {} and all of its data? [y/N] ", app.name);
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Destroying {}...", app.name));
    if let Err(e) = app.destroy(lifecycle).await {
        spinner.stop_error(&format!("Could not destroy {}", app.name));
        return Err(e);
    }
    spinner.stop(&format!("Destroyed {}", app.name));
    Ok(())
}
