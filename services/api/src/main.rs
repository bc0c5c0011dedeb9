use crm_desk_api::run;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("application error: {err}");
            std::process::ExitCode::from(err.exit_code())
        }
    }
}
