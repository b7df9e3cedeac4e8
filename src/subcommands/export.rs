use color_eyre::{Result, eyre::eyre};
use vlogs_export::{download::DownloadController, query::QueryParameters, transfer::Transfer};

pub struct Options {
    pub filename: Option<String>,
    pub json: bool,
}

pub async fn command(
    transfer: &dyn Transfer,
    params: Option<QueryParameters>,
    options: Options,
) -> Result<()> {
    let mut controller = DownloadController::new();
    if let Some(filename) = options.filename {
        controller.set_filename(filename);
    }

    let pending = controller
        .begin(params.as_ref())
        .ok_or_else(|| eyre!("a download is already in progress"))?;
    let event = pending.run(transfer).await;
    let outcome = match controller.finish(event) {
        Some(Ok(outcome)) => outcome,
        Some(Err(message)) => return Err(eyre!(message)),
        None => return Err(eyre!("download result was discarded")),
    };

    if options.json {
        let summary = serde_json::json!({
            "path": outcome.path.display().to_string(),
            "bytes": outcome.bytes,
            "lines": outcome.lines,
        });
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }

    println!("{}", outcome.path.display());
    Ok(())
}
