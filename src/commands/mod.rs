use lizzy::http::ReqwestTransport;
use lizzy::Settings;

pub type CmdResult<T> = lizzy::Result<(T, i32)>;

pub mod config;
pub mod datadog;
pub mod github;
pub mod gitlab;
pub mod terraform;
pub mod workflows;

/// Shared state built once per invocation and handed to every handler.
pub(crate) struct GlobalArgs {
    pub settings: Settings,
    pub transport: ReqwestTransport,
}

impl GlobalArgs {
    pub fn load() -> lizzy::Result<Self> {
        Ok(Self {
            settings: Settings::load()?,
            transport: ReqwestTransport::new()?,
        })
    }
}

macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (lizzy::Result<serde_json::Value>, i32) {
    // Config and workflow commands must work with a broken settings file.
    match command {
        crate::Commands::Config(args) => return dispatch!(args, config),
        crate::Commands::Workflows(args) => return dispatch!(args, workflows),
        _ => {}
    }

    let global = match GlobalArgs::load() {
        Ok(global) => global,
        Err(err) => return crate::output::map_cmd_result_to_json::<()>(Err(err)),
    };

    match command {
        crate::Commands::Terraform(args) => dispatch!(args, &global, terraform),
        crate::Commands::Datadog(args) => dispatch!(args, &global, datadog),
        crate::Commands::Github(args) => dispatch!(args, &global, github),
        crate::Commands::Gitlab(args) => dispatch!(args, &global, gitlab),
        crate::Commands::Config(_) | crate::Commands::Workflows(_) => {
            let err = lizzy::Error::internal_unexpected("command already dispatched");
            crate::output::map_cmd_result_to_json::<()>(Err(err))
        }
    }
}
