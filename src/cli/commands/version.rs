//! Version command implementation

use crate::cli::Output;
use crate::{PKG_NAME, VERSION};
use anyhow::Result;

/// Execute the version command
pub async fn execute(output: &Output) -> Result<()> {
    let description = env!("CARGO_PKG_DESCRIPTION");

    output.header("drainpool version information");
    output.status_indicator("VERSION", &format!("{PKG_NAME} v{VERSION}"), true);
    output.blank_line();

    output.category("About");
    output.key_value("Description:", description, false);
    output.key_value("CPU cores:", &num_cpus::get().to_string(), false);

    output.category("Build Information");
    output.key_value("Target:", std::env::consts::ARCH, false);
    output.key_value(
        "Profile:",
        if cfg!(debug_assertions) { "debug" } else { "release" },
        false,
    );

    output.blank_line();
    output.success("Run 'drainpool --help' for usage information");

    Ok(())
}
