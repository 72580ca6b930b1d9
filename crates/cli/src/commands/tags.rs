use facultag_line::{HttpLineClient, TagApi};

use crate::commands::{current_thread_runtime, load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("tags") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("tags") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let client = match HttpLineClient::from_config(&config.line) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure("tags", "platform_client", error.to_string(), 4);
        }
    };

    match runtime.block_on(client.list_tags()) {
        Ok(tags) => {
            let missing: Vec<&str> = config
                .catalog
                .categories
                .iter()
                .map(String::as_str)
                .filter(|label| !tags.iter().any(|tag| tag.name == *label))
                .collect();
            let message = if missing.is_empty() {
                format!("{} tag(s) on the platform; every category has a tag", tags.len())
            } else {
                format!(
                    "{} tag(s) on the platform; {} category label(s) without a tag: {}",
                    tags.len(),
                    missing.len(),
                    missing.join(", ")
                )
            };
            CommandResult::success_with_data("tags", message, serde_json::to_value(&tags).ok())
        }
        Err(error) => CommandResult::failure("tags", "platform_request", error.to_string(), 5),
    }
}
