use crate::commands::{open_database, preflight, CommandResult, Preflight};

pub fn run() -> CommandResult {
    let Preflight { config, runtime } = match preflight("migrate") {
        Ok(preflight) => preflight,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        match open_database("migrate", &config).await {
            Ok(pool) => {
                pool.close().await;
                CommandResult::success(
                    "migrate",
                    format!("applied pending migrations to `{}`", config.database.url),
                )
            }
            Err(failure) => failure,
        }
    })
}
